//! Encryption codec for record sequences.
//!
//! The cipher is a strategy behind `VaultCipher`. `XorCipher` is the scheme
//! every existing vault was written with; it offers no real confidentiality
//! and exists for format compatibility. `AesGcmCipher` is the authenticated
//! alternative a deployment can switch to.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use data_encoding::BASE64;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::warn;

use super::format::{CurrentEnvelope, ENVELOPE_VERSION};
use super::key::KeyMaterial;
use super::record::CredentialRecord;
use crate::error::{Result, SafePassError};

/// Nonce size for AES-GCM (96 bits = 12 bytes)
const NONCE_SIZE: usize = 12;

/// Symmetric cipher turning plaintext bytes into text-safe ciphertext.
pub trait VaultCipher: Send + Sync {
    /// Written into the envelope `iv` field to name the strategy.
    fn marker(&self) -> &'static str;
    fn seal(&self, plaintext: &[u8], key: &KeyMaterial) -> Result<String>;
    fn open(&self, ciphertext: &str, key: &KeyMaterial) -> Result<Vec<u8>>;
}

/// Cyclic XOR against the key bytes, base64 encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct XorCipher;

impl XorCipher {
    fn apply(data: &[u8], key: &[u8]) -> Vec<u8> {
        data.iter()
            .zip(key.iter().cycle())
            .map(|(byte, k)| byte ^ k)
            .collect()
    }
}

impl VaultCipher for XorCipher {
    fn marker(&self) -> &'static str {
        "xor"
    }

    fn seal(&self, plaintext: &[u8], key: &KeyMaterial) -> Result<String> {
        if key.as_bytes().is_empty() {
            return Err(SafePassError::Encryption("Key material is empty".into()));
        }
        Ok(BASE64.encode(&Self::apply(plaintext, key.as_bytes())))
    }

    fn open(&self, ciphertext: &str, key: &KeyMaterial) -> Result<Vec<u8>> {
        if key.as_bytes().is_empty() {
            return Err(SafePassError::Decrypt("Key material is empty".into()));
        }
        let data = BASE64
            .decode(ciphertext.trim().as_bytes())
            .map_err(|e| SafePassError::Decrypt(format!("Invalid base64: {}", e)))?;
        Ok(Self::apply(&data, key.as_bytes()))
    }
}

/// AES-256-GCM keyed by SHA-256 of the key material.
///
/// Format before base64: `[12-byte nonce][ciphertext with 16-byte auth tag]`
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmCipher;

impl AesGcmCipher {
    fn cipher(key: &KeyMaterial) -> Result<Aes256Gcm> {
        let digest = Sha256::digest(key.as_bytes());
        Aes256Gcm::new_from_slice(&digest)
            .map_err(|e| SafePassError::Encryption(format!("Invalid key: {}", e)))
    }
}

impl VaultCipher for AesGcmCipher {
    fn marker(&self) -> &'static str {
        "aes-256-gcm"
    }

    fn seal(&self, plaintext: &[u8], key: &KeyMaterial) -> Result<String> {
        let cipher = Self::cipher(key)?;

        // Generate random nonce
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| SafePassError::Encryption(format!("Encryption failed: {}", e)))?;

        // Prepend nonce to ciphertext
        let mut output = nonce_bytes.to_vec();
        output.extend(ciphertext);
        Ok(BASE64.encode(&output))
    }

    fn open(&self, ciphertext: &str, key: &KeyMaterial) -> Result<Vec<u8>> {
        let data = BASE64
            .decode(ciphertext.trim().as_bytes())
            .map_err(|e| SafePassError::Decrypt(format!("Invalid base64: {}", e)))?;

        if data.len() < NONCE_SIZE {
            return Err(SafePassError::Decrypt("Data too short".into()));
        }

        let (nonce_bytes, sealed) = data.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        Self::cipher(key)?
            .decrypt(nonce, sealed)
            .map_err(|_| SafePassError::Decrypt("Wrong key or tampered data".into()))
    }
}

/// Serialize and seal records, without an envelope.
pub fn seal_records(
    cipher: &dyn VaultCipher,
    records: &[CredentialRecord],
    key: &KeyMaterial,
) -> Result<String> {
    let plaintext = serde_json::to_vec(records)?;
    cipher.seal(&plaintext, key)
}

/// Open and deserialize records sealed by `seal_records`.
pub fn open_records(
    cipher: &dyn VaultCipher,
    ciphertext: &str,
    key: &KeyMaterial,
) -> Result<Vec<CredentialRecord>> {
    let plaintext = cipher.open(ciphertext, key)?;
    serde_json::from_slice(&plaintext)
        .map_err(|e| SafePassError::Decrypt(format!("Decoded data is not a record list: {}", e)))
}

pub fn encrypt(
    cipher: &dyn VaultCipher,
    records: &[CredentialRecord],
    key: &KeyMaterial,
) -> Result<CurrentEnvelope> {
    Ok(CurrentEnvelope {
        encrypted: seal_records(cipher, records, key)?,
        iv: cipher.marker().to_string(),
        version: ENVELOPE_VERSION.to_string(),
    })
}

/// Strict inverse of `encrypt`.
///
/// An envelope whose marker names another cipher is rejected; a blank
/// marker is accepted so hand-written envelopes still open.
pub fn try_decrypt(
    cipher: &dyn VaultCipher,
    envelope: &CurrentEnvelope,
    key: &KeyMaterial,
) -> Result<Vec<CredentialRecord>> {
    if !envelope.iv.is_empty() && envelope.iv != cipher.marker() {
        return Err(SafePassError::Decrypt(format!(
            "Envelope sealed with '{}', active cipher is '{}'",
            envelope.iv,
            cipher.marker()
        )));
    }
    open_records(cipher, &envelope.encrypted, key)
}

/// Inverse of `encrypt`; a corrupt envelope yields an empty vault.
pub fn decrypt(
    cipher: &dyn VaultCipher,
    envelope: &CurrentEnvelope,
    key: &KeyMaterial,
) -> Vec<CredentialRecord> {
    match try_decrypt(cipher, envelope, key) {
        Ok(records) => records,
        Err(e) => {
            warn!("Vault envelope is corrupt, treating vault as empty: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tracing_test::traced_test;

    fn key(text: &str) -> KeyMaterial {
        KeyMaterial::from_passphrase(text).unwrap()
    }

    fn sample() -> Vec<CredentialRecord> {
        vec![
            CredentialRecord::new("Bank, Inc.", "a\"b", "p@ss"),
            CredentialRecord::new("Почта", "user@example.com", "пароль 🔑"),
        ]
    }

    #[test]
    fn test_xor_roundtrip_including_empty() {
        let k = KeyMaterial::derive("seed");
        for records in [Vec::new(), sample()] {
            let envelope = encrypt(&XorCipher, &records, &k).unwrap();
            assert_eq!(envelope.version, "1.0");
            assert_eq!(envelope.iv, "xor");
            assert_eq!(decrypt(&XorCipher, &envelope, &k), records);
        }
    }

    #[test]
    fn test_xor_is_deterministic_and_hides_plaintext() {
        let k = key("k3y");
        let a = encrypt(&XorCipher, &sample(), &k).unwrap();
        let b = encrypt(&XorCipher, &sample(), &k).unwrap();
        assert_eq!(a, b);
        assert!(!a.encrypted.contains("Bank"));
    }

    #[test]
    fn test_aes_roundtrip_and_wrong_key() {
        let envelope = encrypt(&AesGcmCipher, &sample(), &key("right")).unwrap();
        assert_eq!(envelope.iv, "aes-256-gcm");
        assert_eq!(
            try_decrypt(&AesGcmCipher, &envelope, &key("right")).unwrap(),
            sample()
        );
        assert!(matches!(
            try_decrypt(&AesGcmCipher, &envelope, &key("wrong")),
            Err(SafePassError::Decrypt(_))
        ));
    }

    #[test]
    fn test_marker_mismatch_is_rejected() {
        let k = key("k");
        let envelope = encrypt(&AesGcmCipher, &sample(), &k).unwrap();
        assert!(matches!(
            try_decrypt(&XorCipher, &envelope, &k),
            Err(SafePassError::Decrypt(_))
        ));
    }

    #[test]
    fn test_blank_marker_is_accepted() {
        let k = key("k");
        let mut envelope = encrypt(&XorCipher, &sample(), &k).unwrap();
        envelope.iv.clear();
        assert_eq!(try_decrypt(&XorCipher, &envelope, &k).unwrap(), sample());
    }

    #[traced_test]
    #[test]
    fn test_corrupt_envelope_decrypts_to_empty_and_logs() {
        let envelope = CurrentEnvelope {
            encrypted: BASE64.encode(b"definitely not json"),
            iv: "xor".into(),
            version: "1.0".into(),
        };
        assert!(decrypt(&XorCipher, &envelope, &key("k")).is_empty());
        assert!(logs_contain("corrupt"));
    }

    #[test]
    fn test_wrong_xor_key_is_corrupt_not_garbage() {
        let envelope = encrypt(&XorCipher, &sample(), &key("right")).unwrap();
        assert!(try_decrypt(&XorCipher, &envelope, &key("wrong")).is_err());
    }

    proptest! {
        #[test]
        fn prop_xor_roundtrip(
            fields in proptest::collection::vec((".*", ".*", ".*"), 0..8),
            key_text in "[ -~]{1,40}",
        ) {
            let records: Vec<CredentialRecord> = fields
                .into_iter()
                .map(|(s, l, p)| CredentialRecord::new(s, l, p))
                .collect();
            let k = key(&key_text);
            let envelope = encrypt(&XorCipher, &records, &k).unwrap();
            prop_assert_eq!(try_decrypt(&XorCipher, &envelope, &k).unwrap(), records);
        }
    }
}
