//! Host radio.
//!
//! On a PC the OS owns the real network interface. `HostRadio` plays the
//! device's radio so the full boot cycle can run on the host: station joins
//! resolve to the machine's own address, and the access point is the
//! loopback interface.

use crate::config::{AccessPointConfig, Credentials};
use crate::wifi::{AssociationFailure, LinkStatus, Radio, RadioError, RadioMode};
use log::info;
use std::net::{IpAddr, Ipv4Addr};

/// Simulated radio for development on a PC.
pub struct HostRadio {
    mode: RadioMode,
    /// When set, only these credentials join.
    known_network: Option<Credentials>,
    status: LinkStatus,
}

impl HostRadio {
    /// Radio where any credentials join.
    pub fn new() -> Self {
        Self {
            mode: RadioMode::Off,
            known_network: None,
            status: LinkStatus::Idle,
        }
    }

    /// Radio where only `credentials` join; anything else is refused.
    pub fn with_network(credentials: Credentials) -> Self {
        Self {
            known_network: Some(credentials),
            ..Self::new()
        }
    }

    /// Get the primary local IP address.
    ///
    /// This uses a trick: create a UDP socket and "connect" to a public IP
    /// (doesn't actually send anything), then check which local address was chosen.
    fn detect_local_ip() -> Option<IpAddr> {
        use std::net::UdpSocket;

        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("8.8.8.8:80").ok()?;
        let local_addr = socket.local_addr().ok()?;
        Some(local_addr.ip())
    }
}

impl Default for HostRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl Radio for HostRadio {
    fn mode(&self) -> RadioMode {
        self.mode
    }

    fn start_station(&mut self) -> Result<(), RadioError> {
        if self.mode != RadioMode::Off {
            return Err(RadioError::Busy);
        }
        self.mode = RadioMode::Station;
        self.status = LinkStatus::Idle;
        Ok(())
    }

    fn join(&mut self, credentials: &Credentials) -> Result<(), RadioError> {
        if self.mode != RadioMode::Station {
            return Err(RadioError::Unsupported(self.mode));
        }

        self.status = match &self.known_network {
            Some(net) if net.ssid() != credentials.ssid() => {
                LinkStatus::Rejected(AssociationFailure::NetworkNotFound)
            }
            Some(net) if net != credentials => {
                LinkStatus::Rejected(AssociationFailure::WrongPassword)
            }
            _ => {
                let ip = Self::detect_local_ip().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
                LinkStatus::Connected(ip)
            }
        };
        Ok(())
    }

    fn link_status(&mut self) -> LinkStatus {
        if self.mode == RadioMode::Station {
            self.status.clone()
        } else {
            LinkStatus::Idle
        }
    }

    fn start_access_point(&mut self, config: &AccessPointConfig) -> Result<IpAddr, RadioError> {
        if self.mode != RadioMode::Off {
            return Err(RadioError::Busy);
        }
        self.mode = RadioMode::AccessPoint;
        info!(
            "Host access point '{}' simulated on loopback (device gateway would be {})",
            config.ssid, config.gateway
        );
        Ok(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    fn stop(&mut self) -> Result<(), RadioError> {
        self.mode = RadioMode::Off;
        self.status = LinkStatus::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::wifi::{enter_access_point, ConnectError, NetworkConnector};
    use std::time::Duration;

    fn connector() -> NetworkConnector {
        NetworkConnector::new(RetryPolicy {
            max_attempts: 2,
            attempt_interval: Duration::ZERO,
        })
    }

    fn home() -> Credentials {
        Credentials::new("HomeNet", "secret123").unwrap()
    }

    #[test]
    fn test_any_network_joins() {
        let mut radio = HostRadio::new();
        let info = connector().connect(&mut radio, &home()).unwrap();
        assert_eq!(info.attempts, 1);
        assert_eq!(radio.mode(), RadioMode::Station);
    }

    #[test]
    fn test_known_network_refuses_wrong_password() {
        let mut radio = HostRadio::with_network(home());
        let wrong = Credentials::new("HomeNet", "nope-nope").unwrap();

        let err = connector().connect(&mut radio, &wrong).unwrap_err();
        assert_eq!(
            err,
            ConnectError::Rejected(AssociationFailure::WrongPassword)
        );
        assert_eq!(radio.mode(), RadioMode::Off);
    }

    #[test]
    fn test_known_network_refuses_other_ssid() {
        let mut radio = HostRadio::with_network(home());
        let other = Credentials::new("Cafe", "secret123").unwrap();
        assert_eq!(
            connector().connect(&mut radio, &other).unwrap_err(),
            ConnectError::Rejected(AssociationFailure::NetworkNotFound)
        );
    }

    #[test]
    fn test_access_point_on_loopback() {
        let mut radio = HostRadio::new();
        radio.start_station().unwrap();
        assert_eq!(
            radio.start_access_point(&AccessPointConfig::default()),
            Err(RadioError::Busy)
        );

        let ip = enter_access_point(&mut radio, &AccessPointConfig::default()).unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(radio.mode(), RadioMode::AccessPoint);
    }

    #[test]
    fn test_detect_local_ip() {
        // IP might be None in CI/air-gapped environments
        if let Some(addr) = HostRadio::detect_local_ip() {
            assert!(addr.is_ipv4() || addr.is_ipv6());
        }
    }
}
