//! Device configuration.
//!
//! # Components
//!
//! - [`wifi`] - station credentials and their validation
//! - [`boot`] - per-boot settings (access point identity, retry policy, ports)

mod boot;
mod wifi;

pub use boot::{
    AccessPointConfig, BootConfig, RetryPolicy, AP_GATEWAY, DEFAULT_AP_SSID,
    DEFAULT_ATTEMPT_INTERVAL, DEFAULT_HTTP_PORT, DEFAULT_MAX_ATTEMPTS, DEFAULT_RESTART_DELAY,
};
pub use wifi::{ConfigError, Credentials, MAX_PASSWORD_LEN, MAX_SSID_LEN};
