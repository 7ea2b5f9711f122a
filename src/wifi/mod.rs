//! WiFi radio and station connection.
//!
//! # Components
//!
//! - [`radio`] - the [`Radio`] driver abstraction and mode switching
//! - [`connection`] - [`NetworkConnector`], bounded-retry join of a known network
//! - `esp` - ESP-IDF radio driver (ESP32 only)
//!
//! Credential types live in [`crate::config`], persistence in [`crate::storage`].

mod connection;
#[cfg(feature = "esp32")]
mod esp;
#[cfg(test)]
pub(crate) mod mock;
mod radio;

pub use connection::{
    AttemptOutcome, ConnectError, ConnectionAttempt, ConnectionInfo, NetworkConnector,
};
#[cfg(feature = "esp32")]
pub use esp::EspRadio;
pub use radio::{
    enter_access_point, enter_station, AssociationFailure, LinkStatus, Radio, RadioError,
    RadioMode,
};
