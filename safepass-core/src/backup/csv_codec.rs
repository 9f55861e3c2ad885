//! Plain CSV backups: a header row, then `site,email,password` per record.

use tracing::debug;

use crate::error::{Result, SafePassError};
use crate::vault::CredentialRecord;

pub const CSV_HEADER: [&str; 3] = ["site", "email", "password"];

/// Serialize records as RFC 4180 CSV.
///
/// Fields containing a comma, quote or line break are quoted, with embedded
/// quotes doubled.
pub fn export_csv(records: &[CredentialRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());

    writer.write_record(CSV_HEADER).map_err(std::io::Error::from)?;
    for record in records {
        writer
            .write_record([&record.service, &record.login, &record.secret])
            .map_err(std::io::Error::from)?;
    }

    writer
        .into_inner()
        .map_err(|e| SafePassError::Io(e.into_error()))
}

/// Parse a CSV backup, skipping rows that are not usable records.
///
/// The first non-blank row is the header. A row is kept when it has at
/// least three columns and its first three are non-blank; anything else is
/// dropped without failing the import.
pub fn import_csv(bytes: &[u8]) -> Result<Vec<CredentialRecord>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(SafePassError::ImportParse("CSV file is empty".into()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                debug!("Skipping malformed CSV row: {}", e);
                skipped += 1;
                continue;
            }
        };

        let (Some(service), Some(login), Some(secret)) = (row.get(0), row.get(1), row.get(2))
        else {
            skipped += 1;
            continue;
        };
        if [service, login, secret].iter().any(|f| f.trim().is_empty()) {
            skipped += 1;
            continue;
        }

        records.push(CredentialRecord::new(service, login, secret));
    }

    debug!(
        "Parsed {} records from CSV ({} rows skipped)",
        records.len(),
        skipped
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_with_commas_and_quotes() {
        let records = vec![CredentialRecord::new("Bank, Inc.", "a\"b", "p@ss")];
        let bytes = export_csv(&records).unwrap();
        assert_eq!(import_csv(&bytes).unwrap(), records);
    }

    #[test]
    fn test_export_quoting() {
        let records = vec![
            CredentialRecord::new("Bank, Inc.", "a\"b", "p@ss"),
            CredentialRecord::new("multi", "line", "one\ntwo"),
        ];
        let text = String::from_utf8(export_csv(&records).unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("site,email,password"));
        assert_eq!(lines.next(), Some(r#""Bank, Inc.","a""b",p@ss"#));
        assert_eq!(import_csv(text.as_bytes()).unwrap(), records);
    }

    #[test]
    fn test_header_only_is_empty_backup() {
        let bytes = export_csv(&[]).unwrap();
        assert!(import_csv(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_empty_file_is_an_error() {
        assert!(matches!(
            import_csv(b""),
            Err(SafePassError::ImportParse(_))
        ));
        assert!(import_csv(b"\n\n  \n").is_err());
    }

    #[test]
    fn test_tolerant_import() {
        let text = "site,email,password\n\
                    \n\
                    GitHub,me@example.com,hunter2\n\
                    too,few\n\
                    ,missing@service.com,secret\n\
                    Mail,me@example.com,\n\
                    Extra,me@example.com,pw,note\n\
                    \r\n\
                    Last,me,\"quoted \"\"pw\"\"\"\r\n";
        let records = import_csv(text.as_bytes()).unwrap();
        assert_eq!(
            records,
            vec![
                CredentialRecord::new("GitHub", "me@example.com", "hunter2"),
                CredentialRecord::new("Extra", "me@example.com", "pw"),
                CredentialRecord::new("Last", "me", "quoted \"pw\""),
            ]
        );
    }

    #[test]
    fn test_invalid_utf8_row_is_dropped() {
        let mut bytes = b"site,email,password\nA,b,c\n".to_vec();
        bytes.extend_from_slice(b"B,\xff\xfe,c\n");
        bytes.extend_from_slice(b"C,d,e\n");
        let records = import_csv(&bytes).unwrap();
        assert_eq!(
            records,
            vec![
                CredentialRecord::new("A", "b", "c"),
                CredentialRecord::new("C", "d", "e"),
            ]
        );
    }
}
