//! Connectivity bootstrap.
//!
//! Runs once per boot: try the stored network, fall back to the provisioning
//! access point, save what the user submits and restart.
//!
//! ```text
//! Start -> TryStoredCreds -> Connected
//!                 |
//!                 v
//!          NeedsProvisioning -> ProvisioningDone -> Rebooting
//! ```
//!
//! Only two failures are fatal: the access point not coming up and the new
//! credentials not being saved. Neither leads to a restart.

use crate::config::{BootConfig, Credentials};
use crate::provisioning::{PortalInfo, Provision, ProvisioningError};
use crate::restart::Restart;
use crate::storage::{CredentialStore, StoreError};
use crate::wifi::{ConnectError, ConnectionInfo, NetworkConnector, Radio};
use log::{error, info, warn};
use std::fmt;
use std::net::SocketAddr;
use std::thread;

/// Bootstrap state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    Start,
    TryStoredCreds,
    Connected,
    NeedsProvisioning,
    ProvisioningDone,
    Rebooting,
}

impl fmt::Display for BootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::TryStoredCreds => "try-stored-credentials",
            Self::Connected => "connected",
            Self::NeedsProvisioning => "needs-provisioning",
            Self::ProvisioningDone => "provisioning-done",
            Self::Rebooting => "rebooting",
        };
        write!(f, "{}", name)
    }
}

/// How a boot cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    /// Joined the stored network. Hand the address to the status service.
    Connected(ConnectionInfo),
    /// New credentials were saved and the restart primitive was invoked.
    Restarting,
}

/// Progress notifications for a status LED or display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootEvent {
    /// About to poll the link.
    Connecting { attempt: u32, max_attempts: u32 },
    /// The stored network could not be joined.
    ConnectionFailed(ConnectError),
    /// The provisioning form is reachable.
    PortalReady { ssid: String, address: SocketAddr },
    /// The user submitted acceptable credentials.
    CredentialsReceived { ssid: String },
    /// Credentials are saved; restart follows.
    Restarting,
}

type Observer = Box<dyn FnMut(&BootEvent)>;

fn notify(observer: &mut Option<Observer>, event: BootEvent) {
    if let Some(callback) = observer.as_mut() {
        callback(&event);
    }
}

/// A running provisioning session.
#[derive(Debug, Default)]
pub struct ProvisioningSession {
    pub active: bool,
    pub submitted: Option<Credentials>,
}

impl ProvisioningSession {
    fn start() -> Self {
        Self {
            active: true,
            submitted: None,
        }
    }
}

/// Boot orchestrator. One instance per boot cycle.
pub struct Bootstrap<R, S, P, X> {
    config: BootConfig,
    radio: R,
    store: S,
    provisioner: P,
    restarter: X,
    state: BootState,
    transitions: Vec<BootState>,
    session: Option<ProvisioningSession>,
    restarted: bool,
    observer: Option<Observer>,
}

impl<R, S, P, X> Bootstrap<R, S, P, X>
where
    R: Radio,
    S: CredentialStore,
    P: Provision,
    X: Restart,
{
    pub fn new(config: BootConfig, radio: R, store: S, provisioner: P, restarter: X) -> Self {
        Self {
            config,
            radio,
            store,
            provisioner,
            restarter,
            state: BootState::Start,
            transitions: vec![BootState::Start],
            session: None,
            restarted: false,
            observer: None,
        }
    }

    /// Register a callback for [`BootEvent`]s.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&BootEvent) + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> BootState {
        self.state
    }

    /// Every state entered so far, starting with `Start`.
    pub fn transitions(&self) -> &[BootState] {
        &self.transitions
    }

    /// Provisioning session, while one is open or after it failed.
    pub fn session(&self) -> Option<&ProvisioningSession> {
        self.session.as_ref()
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    pub fn restarter(&self) -> &X {
        &self.restarter
    }

    /// Give the radio back, e.g. to keep the station link for the status service.
    pub fn into_radio(self) -> R {
        self.radio
    }

    fn enter(&mut self, next: BootState) {
        info!("Boot: {} -> {}", self.state, next);
        self.state = next;
        self.transitions.push(next);
    }

    /// Run the boot cycle to its end.
    pub fn run(&mut self) -> Result<BootOutcome, BootError> {
        self.enter(BootState::TryStoredCreds);

        match self.store.load() {
            Some(creds) => match self.connect_stored(&creds) {
                Ok(conn) => {
                    self.enter(BootState::Connected);
                    return Ok(BootOutcome::Connected(conn));
                }
                Err(e) => {
                    warn!("Stored network '{}' unavailable: {}", creds.ssid(), e);
                    notify(&mut self.observer, BootEvent::ConnectionFailed(e));
                }
            },
            None => info!("No stored WiFi credentials"),
        }

        self.enter(BootState::NeedsProvisioning);
        let creds = self.provision()?;

        self.enter(BootState::ProvisioningDone);
        if let Err(e) = self.store.save(&creds) {
            error!("Failed to save WiFi credentials, not restarting: {}", e);
            if let Err(stop_err) = self.radio.stop() {
                warn!("Failed to stop access point: {}", stop_err);
            }
            return Err(BootError::Store(e));
        }
        info!("Saved WiFi credentials for '{}'", creds.ssid());
        self.session = None;

        self.enter(BootState::Rebooting);
        notify(&mut self.observer, BootEvent::Restarting);
        self.restart();
        Ok(BootOutcome::Restarting)
    }

    /// Join the stored network, running further passes only after timeouts.
    fn connect_stored(&mut self, creds: &Credentials) -> Result<ConnectionInfo, ConnectError> {
        let connector = NetworkConnector::new(self.config.retry);
        let passes = self.config.connect_passes.max(1);
        let observer = &mut self.observer;
        let mut pass = 1;

        loop {
            let result = connector.connect_with(&mut self.radio, creds, |attempt, max_attempts| {
                notify(
                    observer,
                    BootEvent::Connecting {
                        attempt,
                        max_attempts,
                    },
                )
            });
            match result {
                Ok(conn) => return Ok(conn),
                Err(e) if e.is_retryable() && pass < passes => {
                    warn!("Connection pass {}/{} failed: {}", pass, passes, e);
                    pass += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn provision(&mut self) -> Result<Credentials, BootError> {
        self.session = Some(ProvisioningSession::start());
        let observer = &mut self.observer;

        let result = self
            .provisioner
            .provision(&mut self.radio, &mut |portal: &PortalInfo| {
                notify(
                    observer,
                    BootEvent::PortalReady {
                        ssid: portal.ap_ssid.clone(),
                        address: portal.local_addr,
                    },
                )
            });

        match result {
            Ok(creds) => {
                notify(
                    &mut self.observer,
                    BootEvent::CredentialsReceived {
                        ssid: creds.ssid().to_string(),
                    },
                );
                if let Some(session) = self.session.as_mut() {
                    session.active = false;
                    session.submitted = Some(creds.clone());
                }
                Ok(creds)
            }
            Err(e) => {
                error!("Provisioning failed: {}", e);
                if let Some(session) = self.session.as_mut() {
                    session.active = false;
                }
                Err(BootError::Provisioning(e))
            }
        }
    }

    /// Let the last response drain, take the radio down, restart. At most once.
    fn restart(&mut self) {
        if self.restarted {
            warn!("Restart already requested this boot cycle");
            return;
        }
        self.restarted = true;

        if !self.config.restart_delay.is_zero() {
            thread::sleep(self.config.restart_delay);
        }
        if let Err(e) = self.radio.stop() {
            warn!("Failed to stop radio before restart: {}", e);
        }
        self.restarter.restart();
    }
}

/// Fatal boot cycle failures.
#[derive(Debug)]
pub enum BootError {
    /// The provisioning access point or its listener could not be started.
    Provisioning(ProvisioningError),
    /// Submitted credentials could not be saved.
    Store(StoreError),
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisioning(e) => write!(f, "provisioning failed: {}", e),
            Self::Store(e) => write!(f, "credential save failed: {}", e),
        }
    }
}

impl std::error::Error for BootError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Provisioning(e) => Some(e),
            Self::Store(e) => Some(e),
        }
    }
}

impl From<ProvisioningError> for BootError {
    fn from(e: ProvisioningError) -> Self {
        Self::Provisioning(e)
    }
}

impl From<StoreError> for BootError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
