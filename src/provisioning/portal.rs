//! Provisioning portal state machine and routing.
//!
//! Kept free of sockets so every transition can be driven directly; the
//! server in [`super::server`] only moves bytes between `tiny_http` and
//! [`Portal::handle`].
//!
//! ```text
//! Idle -> ApActive -> AwaitingSubmission -> Submitted -> Stopped
//!                        ^            |
//!                        +------------+  GET, or POST with an empty field
//! ```

use super::form::parse_form;
use super::html;
use crate::config::Credentials;
use log::{info, warn};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use tiny_http::Method;

/// Largest accepted form body.
pub const MAX_FORM_BODY: usize = 4096;

/// Paths operating systems probe to detect a captive portal.
const CAPTIVE_PROBES: &[&str] = &[
    "/generate_204",
    "/gen_204",
    "/hotspot-detect.html",
    "/connecttest.txt",
    "/ncsi.txt",
];

/// Lifecycle of one provisioning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalState {
    Idle,
    ApActive,
    AwaitingSubmission,
    Submitted,
    Stopped,
}

impl fmt::Display for PortalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ApActive => "ap-active",
            Self::AwaitingSubmission => "awaiting-submission",
            Self::Submitted => "submitted",
            Self::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// HTTP response produced by the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    /// `Location` header for redirects.
    pub location: Option<String>,
    /// `Allow` header for 405 responses.
    pub allow: Option<&'static str>,
}

impl PortalReply {
    fn html(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "text/html; charset=utf-8",
            body,
            location: None,
            allow: None,
        }
    }

    fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.to_string(),
            location: None,
            allow: None,
        }
    }

    fn redirect(location: String) -> Self {
        Self {
            location: Some(location),
            ..Self::text(302, "Redirecting to setup form")
        }
    }

    /// Reply for a body larger than [`MAX_FORM_BODY`].
    pub fn too_large() -> Self {
        Self::text(413, "Form data too large")
    }
}

/// Request router for the provisioning form.
#[derive(Debug)]
pub struct Portal {
    state: PortalState,
    gateway: IpAddr,
    port: u16,
}

impl Portal {
    /// New portal in `Idle`. `gateway` is where captive-portal probes are sent.
    pub fn new(gateway: IpAddr) -> Self {
        Self {
            state: PortalState::Idle,
            gateway,
            port: 80,
        }
    }

    pub fn state(&self) -> PortalState {
        self.state
    }

    /// Access point is up.
    pub fn ap_started(&mut self, gateway: IpAddr) {
        self.gateway = gateway;
        self.transition(PortalState::ApActive);
    }

    /// Listener is bound on `port`; requests may arrive.
    pub fn listening(&mut self, port: u16) {
        self.port = port;
        self.transition(PortalState::AwaitingSubmission);
    }

    /// Address of the form as a client on the access point reaches it.
    pub fn form_url(&self) -> String {
        match (self.gateway, self.port) {
            (IpAddr::V4(ip), 80) => format!("http://{}/", ip),
            (IpAddr::V6(ip), 80) => format!("http://[{}]/", ip),
            (ip, port) => format!("http://{}/", SocketAddr::new(ip, port)),
        }
    }

    /// Portal torn down.
    pub fn stop(&mut self) {
        self.transition(PortalState::Stopped);
    }

    fn transition(&mut self, next: PortalState) {
        if self.state != next {
            info!("Portal: {} -> {}", self.state, next);
            self.state = next;
        }
    }

    /// Handle one request. Returns the reply and, when the request was an
    /// acceptable submission, the credentials it carried.
    pub fn handle(
        &mut self,
        method: &Method,
        url: &str,
        body: &[u8],
    ) -> (PortalReply, Option<Credentials>) {
        if self.state == PortalState::Submitted || self.state == PortalState::Stopped {
            return (PortalReply::html(503, html::restarting_page()), None);
        }

        let path = url.split('?').next().unwrap_or("/");

        match (method, path) {
            (Method::Get, "/") => (PortalReply::html(200, html::form_page(None, "")), None),
            (Method::Get, "/favicon.ico") => (PortalReply::text(404, "Not Found"), None),
            (Method::Get, p) => {
                if CAPTIVE_PROBES.contains(&p) {
                    info!("Captive portal probe {}", p);
                }
                (PortalReply::redirect(self.form_url()), None)
            }
            (Method::Post, "/") | (Method::Post, "/submit") => self.handle_submission(body),
            (Method::Post, _) => (PortalReply::text(404, "Not Found"), None),
            _ => (
                PortalReply {
                    allow: Some("GET, POST"),
                    ..PortalReply::text(405, "Method Not Allowed")
                },
                None,
            ),
        }
    }

    fn handle_submission(&mut self, body: &[u8]) -> (PortalReply, Option<Credentials>) {
        let fields = match std::str::from_utf8(body)
            .map_err(|_| "form data is not valid UTF-8".to_string())
            .and_then(|text| parse_form(text).map_err(|e| e.to_string()))
        {
            Ok(fields) => fields,
            Err(msg) => {
                warn!("Rejected provisioning form: {}", msg);
                return (PortalReply::html(400, html::form_page(Some(&msg), "")), None);
            }
        };

        let ssid = fields.ssid.unwrap_or_default();
        let password = fields.password.unwrap_or_default();

        match Credentials::new(ssid.as_str(), password) {
            Ok(creds) => {
                info!("Credentials submitted for '{}'", creds.ssid());
                self.transition(PortalState::Submitted);
                (PortalReply::html(200, html::received_page(creds.ssid())), Some(creds))
            }
            Err(e) => {
                warn!("Rejected provisioning form: {}", e);
                let page = html::form_page(Some(&e.to_string()), &ssid);
                (PortalReply::html(400, page), None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AP_GATEWAY;

    fn awaiting() -> Portal {
        let mut portal = Portal::new(IpAddr::V4(AP_GATEWAY));
        portal.ap_started(IpAddr::V4(AP_GATEWAY));
        portal.listening(80);
        portal
    }

    #[test]
    fn test_lifecycle() {
        let mut portal = Portal::new(IpAddr::V4(AP_GATEWAY));
        assert_eq!(portal.state(), PortalState::Idle);
        portal.ap_started(IpAddr::V4(AP_GATEWAY));
        assert_eq!(portal.state(), PortalState::ApActive);
        portal.listening(80);
        assert_eq!(portal.state(), PortalState::AwaitingSubmission);
        portal.stop();
        assert_eq!(portal.state(), PortalState::Stopped);
    }

    #[test]
    fn test_get_root_serves_form() {
        let mut portal = awaiting();
        let (reply, creds) = portal.handle(&Method::Get, "/", b"");
        assert_eq!(reply.status, 200);
        assert!(reply.body.contains(r#"name="ssid""#));
        assert!(creds.is_none());
        assert_eq!(portal.state(), PortalState::AwaitingSubmission);
    }

    #[test]
    fn test_valid_post_submits() {
        let mut portal = awaiting();
        let (reply, creds) = portal.handle(&Method::Post, "/", b"ssid=HomeNet&password=secret123");

        assert_eq!(reply.status, 200);
        assert!(reply.body.contains("HomeNet"));
        assert_eq!(creds, Some(Credentials::new("HomeNet", "secret123").unwrap()));
        assert_eq!(portal.state(), PortalState::Submitted);
    }

    #[test]
    fn test_legacy_submit_path() {
        let mut portal = awaiting();
        let (_, creds) = portal.handle(&Method::Post, "/submit", b"ssid=HomeNet&password=secret123");
        assert!(creds.is_some());
    }

    #[test]
    fn test_empty_ssid_reprompts() {
        let mut portal = awaiting();
        let (reply, creds) = portal.handle(&Method::Post, "/", b"ssid=&password=secret123");

        assert_eq!(reply.status, 400);
        assert!(reply.body.contains("network name cannot be empty"));
        assert!(reply.body.contains(r#"name="password""#));
        assert!(creds.is_none());
        assert_eq!(portal.state(), PortalState::AwaitingSubmission);
    }

    #[test]
    fn test_empty_password_reprompts_with_ssid() {
        let mut portal = awaiting();
        let (reply, creds) = portal.handle(&Method::Post, "/", b"ssid=HomeNet&password=");

        assert_eq!(reply.status, 400);
        assert!(reply.body.contains("password cannot be empty"));
        assert!(reply.body.contains(r#"value="HomeNet""#));
        assert!(creds.is_none());
        assert_eq!(portal.state(), PortalState::AwaitingSubmission);
    }

    #[test]
    fn test_missing_fields_reprompt() {
        let mut portal = awaiting();
        let (reply, creds) = portal.handle(&Method::Post, "/", b"");
        assert_eq!(reply.status, 400);
        assert!(creds.is_none());
    }

    #[test]
    fn test_malformed_body_reprompts() {
        let mut portal = awaiting();
        let (reply, _) = portal.handle(&Method::Post, "/", b"ssid=%zz&password=x");
        assert_eq!(reply.status, 400);

        let (reply, _) = portal.handle(&Method::Post, "/", &[0xff, 0xfe]);
        assert_eq!(reply.status, 400);
        assert_eq!(portal.state(), PortalState::AwaitingSubmission);
    }

    #[test]
    fn test_reprompt_then_submit() {
        let mut portal = awaiting();
        let (_, first) = portal.handle(&Method::Post, "/", b"ssid=HomeNet&password=");
        assert!(first.is_none());
        let (_, second) = portal.handle(&Method::Post, "/", b"ssid=HomeNet&password=secret123");
        assert!(second.is_some());
    }

    #[test]
    fn test_requests_after_submission_get_503() {
        let mut portal = awaiting();
        portal.handle(&Method::Post, "/", b"ssid=HomeNet&password=secret123");

        let (reply, creds) = portal.handle(&Method::Post, "/", b"ssid=Other&password=secret123");
        assert_eq!(reply.status, 503);
        assert!(creds.is_none());
        assert_eq!(portal.state(), PortalState::Submitted);
    }

    #[test]
    fn test_captive_probe_redirects_to_gateway() {
        let mut portal = awaiting();
        let (reply, _) = portal.handle(&Method::Get, "/generate_204", b"");
        assert_eq!(reply.status, 302);
        assert_eq!(reply.location.as_deref(), Some("http://192.168.4.1/"));
    }

    #[test]
    fn test_redirect_carries_non_default_port() {
        let mut portal = Portal::new(IpAddr::V4(AP_GATEWAY));
        portal.ap_started(IpAddr::V4(AP_GATEWAY));
        portal.listening(8080);
        let (reply, _) = portal.handle(&Method::Get, "/hotspot-detect.html", b"");
        assert_eq!(reply.status, 302);
        assert_eq!(reply.location.as_deref(), Some("http://192.168.4.1:8080/"));
    }

    #[test]
    fn test_query_string_ignored() {
        let mut portal = awaiting();
        let (reply, _) = portal.handle(&Method::Get, "/?lang=en", b"");
        assert_eq!(reply.status, 200);
    }

    #[test]
    fn test_other_methods_not_allowed() {
        let mut portal = awaiting();
        let (reply, _) = portal.handle(&Method::Put, "/", b"");
        assert_eq!(reply.status, 405);
        assert_eq!(reply.allow, Some("GET, POST"));
    }
}
