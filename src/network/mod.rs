//! Host networking and the status service.
//!
//! - [`HostRadio`]: stands in for the device radio when running on a PC
//! - [`StatusServer`]: serves sensor readings once the device is online
//!
//! # Example
//!
//! ```ignore
//! use aqi_monitor_esp32::network::StatusServer;
//! use aqi_monitor_esp32::sensor::FixedReadings;
//!
//! // After the bootstrap reports `BootOutcome::Connected(info)`
//! let server = StatusServer::start(info.ip, 80, FixedReadings::indoor())?;
//! ```

mod host;
mod status_server;

pub use host::HostRadio;
pub use status_server::StatusServer;
