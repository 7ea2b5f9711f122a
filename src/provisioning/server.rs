//! Provisioning access point and HTTP listener.
//!
//! Brings the radio up as the `AQISetup` access point, serves the form with
//! `tiny_http` until one valid submission arrives, then stops listening and
//! hands the credentials back. The access point itself is left up so the
//! final response can drain; the caller takes the radio down before restart.
//!
//! While the form is served a [`CaptiveDns`] responder resolves every name to
//! the gateway, which is what makes phones pop the form up on their own.

use super::dns::CaptiveDns;
use super::portal::{Portal, PortalReply, PortalState, MAX_FORM_BODY};
use crate::config::{AccessPointConfig, BootConfig, Credentials};
use crate::wifi::{enter_access_point, Radio, RadioError};
use log::{error, info, warn};
use std::fmt;
use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tiny_http::{Header, Request, Response, Server};

/// Where the portal can be reached, reported once it is listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalInfo {
    /// Access point network name.
    pub ap_ssid: String,
    /// Access point gateway address.
    pub gateway: IpAddr,
    /// Address the HTTP listener is bound to.
    pub local_addr: SocketAddr,
    /// Address of the captive DNS responder, if it is running.
    pub dns_addr: Option<SocketAddr>,
}

/// Standard DNS port.
pub const DNS_PORT: u16 = 53;

/// Collects new credentials while the device has no working network.
pub trait Provision {
    /// Run a provisioning session to completion. `on_ready` is called once
    /// the form can be reached.
    fn provision<R: Radio + ?Sized>(
        &mut self,
        radio: &mut R,
        on_ready: &mut dyn FnMut(&PortalInfo),
    ) -> Result<Credentials, ProvisioningError>;
}

/// Access point plus form endpoint.
#[derive(Debug)]
pub struct ProvisioningServer {
    ap: AccessPointConfig,
    bind_ip: IpAddr,
    port: u16,
    dns_port: Option<u16>,
    state: PortalState,
}

impl ProvisioningServer {
    /// Listen on all interfaces at `port` while `ap` is up.
    pub fn new(ap: AccessPointConfig, port: u16) -> Self {
        Self {
            ap,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port,
            dns_port: Some(DNS_PORT),
            state: PortalState::Idle,
        }
    }

    pub fn from_config(config: &BootConfig) -> Self {
        Self::new(config.access_point.clone(), config.portal_port)
    }

    /// Bind the listener to a specific address instead of all interfaces.
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Port for the captive DNS responder, or `None` to run without it.
    pub fn with_dns_port(mut self, port: Option<u16>) -> Self {
        self.dns_port = port;
        self
    }

    /// State the last session ended in.
    pub fn state(&self) -> PortalState {
        self.state
    }

    /// Run one session: start the access point, serve until a valid
    /// submission, stop listening.
    pub fn serve<R: Radio + ?Sized>(
        &mut self,
        radio: &mut R,
        on_ready: &mut dyn FnMut(&PortalInfo),
    ) -> Result<Credentials, ProvisioningError> {
        let mut portal = Portal::new(IpAddr::V4(self.ap.gateway));
        self.state = portal.state();

        let gateway = enter_access_point(radio, &self.ap).map_err(|e| {
            error!("Failed to start access point '{}': {}", self.ap.ssid, e);
            ProvisioningError::ApStartFailed(e)
        })?;
        portal.ap_started(gateway);

        let result = self.run_portal(&mut portal, gateway, on_ready);
        portal.stop();
        self.state = portal.state();

        if let Err(e) = &result {
            error!("Provisioning portal failed: {}", e);
            if let Err(stop_err) = radio.stop() {
                warn!("Failed to stop access point: {}", stop_err);
            }
        }
        result
    }

    fn run_portal(
        &self,
        portal: &mut Portal,
        gateway: IpAddr,
        on_ready: &mut dyn FnMut(&PortalInfo),
    ) -> Result<Credentials, ProvisioningError> {
        let requested = SocketAddr::new(self.bind_ip, self.port);
        let server =
            Server::http(requested).map_err(|e| ProvisioningError::Bind(e.to_string()))?;
        let local_addr = server.server_addr().to_ip().unwrap_or(requested);

        let dns = self.start_dns(gateway);

        portal.listening(local_addr.port());
        info!(
            "Provisioning form at {} (join '{}', listening on {})",
            portal.form_url(),
            self.ap.ssid,
            local_addr
        );
        on_ready(&PortalInfo {
            ap_ssid: self.ap.ssid.clone(),
            gateway,
            local_addr,
            dns_addr: dns.as_ref().map(CaptiveDns::local_addr),
        });

        loop {
            let mut request = server.recv().map_err(ProvisioningError::Io)?;

            let (reply, submitted) = match read_body(&mut request) {
                Ok(Some(body)) => portal.handle(request.method(), request.url(), &body),
                Ok(None) => (PortalReply::too_large(), None),
                Err(e) => {
                    warn!("Failed to read request body: {}", e);
                    continue;
                }
            };

            respond(request, reply);

            if let Some(creds) = submitted {
                return Ok(creds);
            }
        }
    }
}

impl ProvisioningServer {
    /// The form still works by address without DNS, so a failure here only warns.
    fn start_dns(&self, gateway: IpAddr) -> Option<CaptiveDns> {
        let port = self.dns_port?;
        let IpAddr::V4(answer) = gateway else {
            warn!("Captive DNS needs an IPv4 gateway, got {}", gateway);
            return None;
        };
        match CaptiveDns::start(SocketAddr::new(self.bind_ip, port), answer) {
            Ok(dns) => Some(dns),
            Err(e) => {
                warn!("Captive DNS not started on port {}: {}", port, e);
                None
            }
        }
    }
}

impl Provision for ProvisioningServer {
    fn provision<R: Radio + ?Sized>(
        &mut self,
        radio: &mut R,
        on_ready: &mut dyn FnMut(&PortalInfo),
    ) -> Result<Credentials, ProvisioningError> {
        self.serve(radio, on_ready)
    }
}

/// Read at most [`MAX_FORM_BODY`] bytes. `Ok(None)` if the body is larger.
fn read_body(request: &mut Request) -> io::Result<Option<Vec<u8>>> {
    if request.body_length().is_some_and(|len| len > MAX_FORM_BODY) {
        return Ok(None);
    }
    let mut body = Vec::new();
    request
        .as_reader()
        .take(MAX_FORM_BODY as u64 + 1)
        .read_to_end(&mut body)?;
    if body.len() > MAX_FORM_BODY {
        return Ok(None);
    }
    Ok(Some(body))
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn respond(request: Request, reply: PortalReply) {
    let mut response = Response::from_string(reply.body).with_status_code(reply.status);
    let headers = [
        Some(("Content-Type", reply.content_type)),
        reply.location.as_deref().map(|l| ("Location", l)),
        reply.allow.map(|a| ("Allow", a)),
        Some(("Cache-Control", "no-store")),
    ];
    for (name, value) in headers.into_iter().flatten() {
        match header(name, value) {
            Some(h) => response.add_header(h),
            None => warn!("Dropping invalid {} header", name),
        }
    }

    if let Err(e) = request.respond(response) {
        warn!("Failed to send portal response: {}", e);
    }
}

/// Fatal provisioning failures.
#[derive(Debug)]
pub enum ProvisioningError {
    /// The radio could not be brought up as an access point.
    ApStartFailed(RadioError),
    /// The HTTP listener could not be bound.
    Bind(String),
    /// The listener failed while waiting for requests.
    Io(io::Error),
}

impl fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApStartFailed(e) => write!(f, "access point failed to start: {}", e),
            Self::Bind(msg) => write!(f, "cannot bind provisioning listener: {}", msg),
            Self::Io(e) => write!(f, "provisioning listener error: {}", e),
        }
    }
}

impl std::error::Error for ProvisioningError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ApStartFailed(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Bind(_) => None,
        }
    }
}
