//! Radio abstraction.
//!
//! Station mode and access-point mode share one radio. A [`Radio`] reports a
//! single [`RadioMode`] at a time, and the [`enter_station`] /
//! [`enter_access_point`] helpers always shut the current mode down before
//! bringing up another one.

use crate::config::{AccessPointConfig, Credentials};
use log::{debug, info};
use std::fmt;
use std::net::IpAddr;

/// Operating mode of the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    /// Radio is down.
    Off,
    /// Joining or joined to an existing network.
    Station,
    /// Hosting the provisioning network.
    AccessPoint,
}

impl fmt::Display for RadioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Station => write!(f, "station"),
            Self::AccessPoint => write!(f, "access point"),
        }
    }
}

/// Why a network refused the station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationFailure {
    /// Authentication failed (bad password).
    WrongPassword,
    /// No network with this SSID is in range.
    NetworkNotFound,
    /// Any other association refusal reported by the driver.
    Other(String),
}

// Station disconnect reasons (802.11 reason codes and ESP-IDF `wifi_err_reason_t`).
const REASON_AUTH_EXPIRE: u16 = 2;
const REASON_4WAY_HANDSHAKE_TIMEOUT: u16 = 15;
const REASON_NO_AP_FOUND: u16 = 201;
const REASON_AUTH_FAIL: u16 = 202;
const REASON_HANDSHAKE_TIMEOUT: u16 = 204;

impl AssociationFailure {
    /// Classify the reason code of a station disconnect event. Returns `None`
    /// for reasons that say nothing about the credentials, such as a lost beacon.
    pub fn from_disconnect_reason(reason: u16) -> Option<Self> {
        match reason {
            REASON_AUTH_EXPIRE
            | REASON_4WAY_HANDSHAKE_TIMEOUT
            | REASON_AUTH_FAIL
            | REASON_HANDSHAKE_TIMEOUT => Some(Self::WrongPassword),
            REASON_NO_AP_FOUND => Some(Self::NetworkNotFound),
            _ => None,
        }
    }
}

impl fmt::Display for AssociationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongPassword => write!(f, "wrong password"),
            Self::NetworkNotFound => write!(f, "network not found"),
            Self::Other(reason) => write!(f, "{}", reason),
        }
    }
}

/// Station link status as reported by one poll of the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// Station is up but no join is in progress.
    Idle,
    /// Join in progress (associating, authenticating or waiting for DHCP).
    Connecting,
    /// Joined with the given local address.
    Connected(IpAddr),
    /// The network refused the station.
    Rejected(AssociationFailure),
}

/// Radio driver operations needed by the bootstrap.
pub trait Radio {
    /// Current mode.
    fn mode(&self) -> RadioMode;

    /// Bring the radio up in station mode. Only called when the radio is off.
    fn start_station(&mut self) -> Result<(), RadioError>;

    /// Start joining `credentials`. Returns once the join is initiated; the
    /// result is observed through [`Radio::link_status`].
    fn join(&mut self, credentials: &Credentials) -> Result<(), RadioError>;

    /// Poll the station link.
    fn link_status(&mut self) -> LinkStatus;

    /// Bring the radio up as an access point and return the gateway address.
    /// Only called when the radio is off.
    fn start_access_point(&mut self, config: &AccessPointConfig) -> Result<IpAddr, RadioError>;

    /// Take the radio down, whatever mode it is in.
    fn stop(&mut self) -> Result<(), RadioError>;
}

/// Switch the radio to station mode.
pub fn enter_station<R: Radio + ?Sized>(radio: &mut R) -> Result<(), RadioError> {
    match radio.mode() {
        RadioMode::Station => return Ok(()),
        RadioMode::AccessPoint => {
            debug!("Stopping access point before station start");
            radio.stop()?;
        }
        RadioMode::Off => {}
    }
    radio.start_station()?;
    info!("Radio in station mode");
    Ok(())
}

/// Switch the radio to access-point mode and return the gateway address.
pub fn enter_access_point<R: Radio + ?Sized>(
    radio: &mut R,
    config: &AccessPointConfig,
) -> Result<IpAddr, RadioError> {
    if radio.mode() != RadioMode::Off {
        debug!("Stopping {} before access point start", radio.mode());
        radio.stop()?;
    }
    let ip = radio.start_access_point(config)?;
    info!("Radio in access point mode: '{}' at {}", config.ssid, ip);
    Ok(ip)
}

/// Errors reported by a radio driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    /// The radio is in use and cannot change mode right now.
    Busy,
    /// The requested mode is not supported by this hardware.
    Unsupported(RadioMode),
    /// The network refused the credentials outright when the join started.
    Rejected(AssociationFailure),
    /// Any other driver failure.
    Driver(String),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "radio busy"),
            Self::Unsupported(mode) => write!(f, "{} mode not supported", mode),
            Self::Rejected(reason) => write!(f, "association rejected: {}", reason),
            Self::Driver(msg) => write!(f, "radio driver error: {}", msg),
        }
    }
}

impl std::error::Error for RadioError {}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for RadioError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Driver(format!("{:?}", e))
    }
}
