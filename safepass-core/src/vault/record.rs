use serde::{Deserialize, Serialize};

use crate::error::{Result, SafePassError};

/// One stored credential.
///
/// Field names on the wire are `site`, `email` and `password`; every stored
/// vault and backup file since the first release uses them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(rename = "site")]
    pub service: String,
    #[serde(rename = "email")]
    pub login: String,
    #[serde(rename = "password")]
    pub secret: String,
}

impl CredentialRecord {
    pub fn new(
        service: impl Into<String>,
        login: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            login: login.into(),
            secret: secret.into(),
        }
    }

    /// Reject records with a blank service, login or secret.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("service", &self.service),
            ("login", &self.login),
            ("secret", &self.secret),
        ] {
            if value.trim().is_empty() {
                return Err(SafePassError::InvalidRecord(format!("{} is empty", name)));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the secret
        f.debug_struct("CredentialRecord")
            .field("service", &self.service)
            .field("login", &self.login)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let record = CredentialRecord::new("X", "a@a", "p");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"site":"X","email":"a@a","password":"p"}"#);

        let back: CredentialRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        assert!(CredentialRecord::new("X", "a@a", "p").validate().is_ok());
        assert!(matches!(
            CredentialRecord::new("  ", "a@a", "p").validate(),
            Err(SafePassError::InvalidRecord(_))
        ));
        assert!(CredentialRecord::new("X", "", "p").validate().is_err());
        assert!(CredentialRecord::new("X", "a@a", "\t").validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let record = CredentialRecord::new("Bank", "me", "hunter2");
        let debug = format!("{:?}", record);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("Bank"));
    }
}
