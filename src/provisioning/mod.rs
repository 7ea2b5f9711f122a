//! Provisioning access point and credentials form.
//!
//! # Components
//!
//! - [`dns`] - catch-all DNS so clients find the form on their own
//! - [`form`] - urlencoded POST body decoding
//! - `html` - form and confirmation pages
//! - [`portal`] - request routing and the session state machine
//! - [`server`] - [`ProvisioningServer`], access point plus `tiny_http` listener

pub mod dns;
pub mod form;
mod html;
pub mod portal;
mod server;

pub use dns::CaptiveDns;
pub use form::{parse_form, FormError, FormFields, PASSWORD_FIELD, SSID_FIELD};
pub use portal::{Portal, PortalReply, PortalState, MAX_FORM_BODY};
pub use server::{PortalInfo, DNS_PORT, Provision, ProvisioningError, ProvisioningServer};

#[cfg(test)]
pub(crate) use server::tests::http as test_http;
