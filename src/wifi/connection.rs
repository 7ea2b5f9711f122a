//! Joining a known network with a bounded number of attempts.

use super::radio::{enter_station, AssociationFailure, LinkStatus, Radio, RadioError};
use crate::config::{Credentials, RetryPolicy};
use log::{debug, info, warn};
use std::fmt;
use std::net::IpAddr;
use std::thread;

/// Result of a successful join, handed to the status service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Network that was joined.
    pub ssid: String,
    /// Address assigned to the device.
    pub ip: IpAddr,
    /// Polls it took to come up.
    pub attempts: u32,
}

/// Outcome of a [`ConnectionAttempt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Pending,
    Connected,
    Failed,
}

/// Bookkeeping for one join, created fresh for every [`NetworkConnector::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttempt {
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub outcome: AttemptOutcome,
}

impl ConnectionAttempt {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt_count: 0,
            max_attempts,
            outcome: AttemptOutcome::Pending,
        }
    }

    /// Whether another poll is allowed.
    pub fn can_poll(&self) -> bool {
        self.outcome == AttemptOutcome::Pending && self.attempt_count < self.max_attempts
    }

    fn record_poll(&mut self) -> u32 {
        self.attempt_count += 1;
        self.attempt_count
    }
}

/// Joins networks in station mode according to a [`RetryPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct NetworkConnector {
    policy: RetryPolicy,
}

impl NetworkConnector {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Join `credentials`, polling the link at most `max_attempts` times.
    /// The first poll happens right after the join starts; each later poll
    /// waits `attempt_interval`.
    ///
    /// A refusal reported by the radio ends the attempt immediately with
    /// [`ConnectError::Rejected`]. On any failure the station is stopped
    /// before returning.
    pub fn connect<R: Radio + ?Sized>(
        &self,
        radio: &mut R,
        credentials: &Credentials,
    ) -> Result<ConnectionInfo, ConnectError> {
        self.connect_with(radio, credentials, |_, _| {})
    }

    /// Like [`connect`](Self::connect), calling `on_poll(attempt, max_attempts)`
    /// before every poll.
    pub fn connect_with<R, F>(
        &self,
        radio: &mut R,
        credentials: &Credentials,
        mut on_poll: F,
    ) -> Result<ConnectionInfo, ConnectError>
    where
        R: Radio + ?Sized,
        F: FnMut(u32, u32),
    {
        let result = self.try_connect(radio, credentials, &mut on_poll);
        if let Err(e) = &result {
            warn!("WiFi join of '{}' failed: {}", credentials.ssid(), e);
            if let Err(stop_err) = radio.stop() {
                warn!("Failed to stop station after join failure: {}", stop_err);
            }
        }
        result
    }

    fn try_connect<R, F>(
        &self,
        radio: &mut R,
        credentials: &Credentials,
        on_poll: &mut F,
    ) -> Result<ConnectionInfo, ConnectError>
    where
        R: Radio + ?Sized,
        F: FnMut(u32, u32),
    {
        info!(
            "Connecting to WiFi '{}' (max {} attempts)",
            credentials.ssid(),
            self.policy.max_attempts
        );

        enter_station(radio)?;
        match radio.join(credentials) {
            Ok(()) => {}
            Err(RadioError::Rejected(reason)) => return Err(ConnectError::Rejected(reason)),
            Err(e) => return Err(e.into()),
        }

        let mut attempt = ConnectionAttempt::new(self.policy.max_attempts);
        while attempt.can_poll() {
            if attempt.attempt_count > 0 {
                thread::sleep(self.policy.attempt_interval);
            }
            let n = attempt.record_poll();
            on_poll(n, attempt.max_attempts);

            match radio.link_status() {
                LinkStatus::Connected(ip) => {
                    attempt.outcome = AttemptOutcome::Connected;
                    info!("Connected to WiFi '{}', IP: {}", credentials.ssid(), ip);
                    return Ok(ConnectionInfo {
                        ssid: credentials.ssid().to_string(),
                        ip,
                        attempts: n,
                    });
                }
                LinkStatus::Rejected(reason) => {
                    attempt.outcome = AttemptOutcome::Failed;
                    return Err(ConnectError::Rejected(reason));
                }
                LinkStatus::Connecting | LinkStatus::Idle => {
                    debug!("Attempt {}/{}: not connected yet", n, attempt.max_attempts);
                }
            }
        }

        attempt.outcome = AttemptOutcome::Failed;
        Err(ConnectError::Timeout {
            attempts: attempt.attempt_count,
        })
    }
}

/// Why a join did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The network refused these credentials; retrying them is pointless.
    Rejected(AssociationFailure),
    /// No answer within the allowed number of polls.
    Timeout { attempts: u32 },
    /// The radio could not be put into station mode or start the join.
    Radio(RadioError),
}

impl ConnectError {
    /// Whether another pass with the same credentials could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(reason) => write!(f, "rejected: {}", reason),
            Self::Timeout { attempts } => {
                write!(f, "not connected after {} attempts", attempts)
            }
            Self::Radio(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ConnectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Radio(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RadioError> for ConnectError {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}
