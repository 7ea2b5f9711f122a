//! AQI monitor ESP32 firmware library.
//!
//! Brings the device onto a WiFi network at boot: join the stored network,
//! or open the `AQISetup` access point and collect new credentials through a
//! small web form, save them and restart. Once online, sensor readings are
//! served over HTTP.
//!
//! Everything except the `esp32`-gated drivers builds and tests on the host.

// Allow the crate to reference itself by name (needed for proc-macro generated code)
extern crate self as aqi_monitor_esp32;

pub mod bootstrap;
pub mod config;
pub mod network;
pub mod provisioning;
pub mod restart;
pub mod sensor;
pub mod storage;
#[cfg(feature = "tap-tests")]
pub mod testing;
pub mod wifi;

// Re-export commonly used items
pub use bootstrap::{BootError, BootEvent, BootOutcome, BootState, Bootstrap};
pub use config::{BootConfig, ConfigError, Credentials};
pub use provisioning::{Provision, ProvisioningError, ProvisioningServer};
pub use restart::{Restart, SoftRestart};
pub use storage::{CredentialStore, StoreError};
pub use wifi::{ConnectError, ConnectionInfo, NetworkConnector, Radio};

#[cfg(feature = "tap-tests")]
pub use testing::TestRunner;
