//! WiFi credential types.
//!
//! Platform-independent and host-testable.
//!
//! # Example
//!
//! ```
//! use aqi_monitor_esp32::config::{ConfigError, Credentials};
//!
//! let creds = Credentials::new("HomeNet", "secret123").unwrap();
//! assert_eq!(creds.ssid(), "HomeNet");
//!
//! assert_eq!(Credentials::new("", "secret123"), Err(ConfigError::SsidEmpty));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum SSID length per IEEE 802.11.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum WPA2 passphrase length.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Credentials for joining an existing network in station mode.
///
/// A value of this type always has a non-empty SSID and a non-empty password,
/// so a record built from it is never partial. Both fields are wiped from
/// memory on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    ssid: String,
    password: String,
}

impl Credentials {
    /// Create validated credentials.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Result<Self, ConfigError> {
        let creds = Self {
            ssid: ssid.into(),
            password: password.into(),
        };
        creds.validate()?;
        Ok(creds)
    }

    /// Check the invariants a stored or submitted record must satisfy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() {
            return Err(ConfigError::SsidEmpty);
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(ConfigError::SsidTooLong {
                len: self.ssid.len(),
                max: MAX_SSID_LEN,
            });
        }
        if self.password.is_empty() {
            return Err(ConfigError::PasswordEmpty);
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(ConfigError::PasswordTooLong {
                len: self.password.len(),
                max: MAX_PASSWORD_LEN,
            });
        }
        Ok(())
    }

    /// Network identifier.
    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Network secret.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &format_args!("**** ({} chars)", self.password.len()))
            .finish()
    }
}

/// Errors that can occur while building or loading configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// SSID is empty.
    SsidEmpty,
    /// SSID exceeds maximum length.
    SsidTooLong { len: usize, max: usize },
    /// Password is empty.
    PasswordEmpty,
    /// Password exceeds maximum length.
    PasswordTooLong { len: usize, max: usize },
    /// A configuration value could not be parsed.
    InvalidFormat(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "network name cannot be empty"),
            Self::SsidTooLong { len, max } => {
                write!(f, "network name too long: {} bytes (max {})", len, max)
            }
            Self::PasswordEmpty => write!(f, "password cannot be empty"),
            Self::PasswordTooLong { len, max } => {
                write!(f, "password too long: {} bytes (max {})", len, max)
            }
            Self::InvalidFormat(msg) => write!(f, "invalid format: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}


#[cfg(feature = "tap-tests")]
mod tap_tests {
    use super::*;
    use aqi_monitor_esp32_macros::tap_test;

    #[tap_test]
    fn credentials_reject_empty_fields() {
        assert_eq!(Credentials::new("", "pw"), Err(ConfigError::SsidEmpty));
        assert_eq!(
            Credentials::new("HomeNet", ""),
            Err(ConfigError::PasswordEmpty)
        );
    }

    #[tap_test]
    fn credentials_accept_utf8_ssid() -> crate::testing::TestResult {
        let creds = Credentials::new("Café-Net", "pässwörd")?;
        assert_eq!(creds.ssid(), "Café-Net");
        Ok(())
    }
}
