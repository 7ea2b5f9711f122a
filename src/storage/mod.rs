//! Persisted WiFi credentials.
//!
//! One current record, no history. A record is written whole or not at all;
//! a record that cannot be read back is reported as [`StoreError::Corrupt`]
//! and treated as absent by [`CredentialStore::load`].
//!
//! # Record format
//!
//! A small JSON object, identical for every backend:
//!
//! ```json
//! {
//!   "ssid": "HomeNet",
//!   "password": "secret123"
//! }
//! ```

mod file;
#[cfg(test)]
pub(crate) mod mock;
#[cfg(feature = "esp32")]
mod nvs;

pub use file::{default_credentials_path, FileCredentialStore};
#[cfg(feature = "esp32")]
pub use nvs::NvsCredentialStore;

use crate::config::Credentials;
use log::warn;
use std::fmt;
use std::io;

/// Storage backend for the current credentials record.
///
/// Single-threaded use only; no concurrent writers are assumed.
pub trait CredentialStore {
    /// Read the record.
    ///
    /// `Ok(None)` when nothing was ever saved (or it was cleared),
    /// `Err(StoreError::Corrupt)` when something is stored but unusable.
    fn try_load(&self) -> Result<Option<Credentials>, StoreError>;

    /// Replace the record. The previous record stays readable if the write
    /// is interrupted.
    fn save(&mut self, credentials: &Credentials) -> Result<(), StoreError>;

    /// Remove the record.
    fn clear(&mut self) -> Result<(), StoreError>;

    /// Read the record, treating a corrupt one as absent.
    fn load(&self) -> Option<Credentials> {
        match self.try_load() {
            Ok(creds) => creds,
            Err(e) => {
                warn!("Ignoring stored WiFi credentials: {}", e);
                None
            }
        }
    }
}

/// Serialize a record.
pub fn encode_record(credentials: &Credentials) -> Result<Vec<u8>, StoreError> {
    let mut bytes = serde_json::to_vec_pretty(credentials)
        .map_err(|e| StoreError::WriteFailed(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse and validate a record.
pub fn decode_record(bytes: &[u8]) -> Result<Credentials, StoreError> {
    let creds: Credentials =
        serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    creds
        .validate()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Ok(creds)
}

/// Credential storage errors.
#[derive(Debug)]
pub enum StoreError {
    /// The stored record is unreadable or malformed.
    Corrupt(String),
    /// The record could not be written durably.
    WriteFailed(io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupt(msg) => write!(f, "corrupt credentials record: {}", msg),
            Self::WriteFailed(e) => write!(f, "failed to write credentials: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::WriteFailed(e) => Some(e),
            Self::Corrupt(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_roundtrip() {
        let creds = Credentials::new("HomeNet", "secret123").unwrap();
        let bytes = encode_record(&creds).unwrap();
        assert_eq!(decode_record(&bytes).unwrap(), creds);
    }

    #[test]
    fn test_record_is_human_readable() {
        let creds = Credentials::new("HomeNet", "secret123").unwrap();
        let text = String::from_utf8(encode_record(&creds).unwrap()).unwrap();
        assert!(text.contains("\"ssid\": \"HomeNet\""));
        assert!(text.contains("\"password\": \"secret123\""));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_record_preserves_awkward_characters() {
        let creds = Credentials::new(" Net \"quoted\"", "p=a\\ss\nword' ").unwrap();
        let bytes = encode_record(&creds).unwrap();
        assert_eq!(decode_record(&bytes).unwrap(), creds);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode_record(b"SSID = 'HomeNet'"),
            Err(StoreError::Corrupt(_))
        ));
        assert!(matches!(decode_record(b""), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_decode_missing_field() {
        assert!(matches!(
            decode_record(br#"{"ssid":"HomeNet"}"#),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_decode_partial_record() {
        assert!(matches!(
            decode_record(br#"{"ssid":"HomeNet","password":""}"#),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_load_maps_corrupt_to_none() {
        let store = mock::MemoryStore::with_raw(b"{not json".to_vec());
        assert!(matches!(store.try_load(), Err(StoreError::Corrupt(_))));
        assert_eq!(store.load(), None);
    }
}

#[cfg(feature = "tap-tests")]
mod tap_tests {
    use super::*;
    use aqi_monitor_esp32_macros::tap_test;

    #[tap_test]
    fn record_roundtrip() -> crate::testing::TestResult {
        let creds = Credentials::new("HomeNet", "secret123")?;
        let decoded = decode_record(&encode_record(&creds)?)?;
        assert_eq!(decoded, creds);
        Ok(())
    }

    #[tap_test]
    fn truncated_record_is_corrupt() {
        assert!(matches!(
            decode_record(br#"{"ssid":"Home"#),
            Err(StoreError::Corrupt(_))
        ));
    }
}
