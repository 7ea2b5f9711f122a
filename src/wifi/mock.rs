//! Scripted radio for unit tests.
//!
//! Tracks station and access-point activity separately and panics if both are
//! ever up at once, so every test that drives it also checks mode exclusivity.

use super::radio::{AssociationFailure, LinkStatus, Radio, RadioError, RadioMode};
use crate::config::{AccessPointConfig, Credentials};
use std::net::{IpAddr, Ipv4Addr};

pub(crate) const STATION_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 42));

pub(crate) struct MockRadio {
    mode: RadioMode,
    station_active: bool,
    ap_active: bool,
    transitions: Vec<RadioMode>,
    /// Network in range, if any.
    network: Option<Credentials>,
    /// Report refusals as `Rejected` (true) or keep reporting `Connecting`.
    reports_rejection: bool,
    /// Poll (1-based) on which a correct join reports `Connected`.
    connect_on_poll: u32,
    pending: Option<LinkStatus>,
    polls_since_join: u32,
    polls: u32,
    joins: Vec<String>,
    station_error: Option<RadioError>,
    ap_error: Option<RadioError>,
    ap_ssids: Vec<String>,
}

impl MockRadio {
    /// A radio with no network in range.
    pub fn new() -> Self {
        Self {
            mode: RadioMode::Off,
            station_active: false,
            ap_active: false,
            transitions: Vec::new(),
            network: None,
            reports_rejection: true,
            connect_on_poll: 1,
            pending: None,
            polls_since_join: 0,
            polls: 0,
            joins: Vec::new(),
            station_error: None,
            ap_error: None,
            ap_ssids: Vec::new(),
        }
    }

    /// Put a network in range that accepts exactly `credentials`.
    pub fn with_network(mut self, credentials: Credentials) -> Self {
        self.network = Some(credentials);
        self
    }

    /// Never report a refusal; a bad join just never completes.
    pub fn silent_rejection(mut self) -> Self {
        self.reports_rejection = false;
        self
    }

    /// Report `Connected` on the given poll after a correct join.
    pub fn connect_on_poll(mut self, poll: u32) -> Self {
        self.connect_on_poll = poll;
        self
    }

    pub fn failing_station(mut self, err: RadioError) -> Self {
        self.station_error = Some(err);
        self
    }

    pub fn failing_ap(mut self, err: RadioError) -> Self {
        self.ap_error = Some(err);
        self
    }

    pub fn transitions(&self) -> &[RadioMode] {
        &self.transitions
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn joins(&self) -> &[String] {
        &self.joins
    }

    pub fn ap_ssids(&self) -> &[String] {
        &self.ap_ssids
    }

    fn set_mode(&mut self, mode: RadioMode) {
        self.station_active = mode == RadioMode::Station;
        self.ap_active = mode == RadioMode::AccessPoint;
        assert!(
            !(self.station_active && self.ap_active),
            "station and access point active at once"
        );
        if self.mode != mode {
            self.transitions.push(mode);
        }
        self.mode = mode;
    }
}

impl Radio for MockRadio {
    fn mode(&self) -> RadioMode {
        self.mode
    }

    fn start_station(&mut self) -> Result<(), RadioError> {
        assert!(!self.ap_active, "station start while access point is up");
        if let Some(err) = self.station_error.clone() {
            return Err(err);
        }
        self.set_mode(RadioMode::Station);
        Ok(())
    }

    fn join(&mut self, credentials: &Credentials) -> Result<(), RadioError> {
        assert_eq!(self.mode, RadioMode::Station, "join outside station mode");
        self.joins.push(credentials.ssid().to_string());
        self.polls_since_join = 0;

        let refusal = match &self.network {
            Some(net) if net == credentials => None,
            Some(net) if net.ssid() == credentials.ssid() => Some(AssociationFailure::WrongPassword),
            Some(_) => Some(AssociationFailure::NetworkNotFound),
            None => {
                self.pending = Some(LinkStatus::Connecting);
                return Ok(());
            }
        };

        self.pending = match refusal {
            None => None,
            Some(reason) if self.reports_rejection => Some(LinkStatus::Rejected(reason)),
            Some(_) => Some(LinkStatus::Connecting),
        };
        Ok(())
    }

    fn link_status(&mut self) -> LinkStatus {
        assert_eq!(self.mode, RadioMode::Station, "poll outside station mode");
        self.polls += 1;
        self.polls_since_join += 1;
        match &self.pending {
            Some(status) => status.clone(),
            None if self.joins.is_empty() => LinkStatus::Idle,
            None if self.polls_since_join >= self.connect_on_poll => {
                LinkStatus::Connected(STATION_IP)
            }
            None => LinkStatus::Connecting,
        }
    }

    fn start_access_point(&mut self, config: &AccessPointConfig) -> Result<IpAddr, RadioError> {
        assert!(!self.station_active, "access point start while station is up");
        if let Some(err) = self.ap_error.clone() {
            return Err(err);
        }
        self.ap_ssids.push(config.ssid.clone());
        self.set_mode(RadioMode::AccessPoint);
        Ok(IpAddr::V4(config.gateway))
    }

    fn stop(&mut self) -> Result<(), RadioError> {
        self.set_mode(RadioMode::Off);
        Ok(())
    }
}
