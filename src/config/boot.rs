//! Boot cycle configuration.
//!
//! Everything the bootstrap needs is carried in one [`BootConfig`] value that
//! is handed to the orchestrator at construction.

use super::ConfigError;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

/// Network name of the provisioning access point.
pub const DEFAULT_AP_SSID: &str = "AQISetup";

/// Gateway address of the provisioning access point. Documented to users as
/// the address to open when the form does not pop up by itself.
pub const AP_GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

/// Join attempts before giving up on the stored network.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Wait between two link status polls.
pub const DEFAULT_ATTEMPT_INTERVAL: Duration = Duration::from_secs(1);

/// Port of the provisioning form and of the status page.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Delay between accepting credentials and restarting, so the last HTTP
/// response reaches the browser.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(2);

/// Access point identity used while provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointConfig {
    /// Broadcast network name.
    pub ssid: String,
    /// Gateway (and DNS) address handed out to clients.
    pub gateway: Ipv4Addr,
    /// WiFi channel.
    pub channel: u8,
    /// Maximum simultaneously associated clients.
    pub max_connections: u16,
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            ssid: DEFAULT_AP_SSID.to_string(),
            gateway: AP_GATEWAY,
            channel: 1,
            max_connections: 4,
        }
    }
}

/// Bounded retry policy for joining a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of link status polls before the attempt times out.
    pub max_attempts: u32,
    /// Sleep before each poll.
    pub attempt_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_interval: DEFAULT_ATTEMPT_INTERVAL,
        }
    }
}

/// Configuration of one boot cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootConfig {
    /// Provisioning access point identity.
    pub access_point: AccessPointConfig,
    /// Join retry policy.
    pub retry: RetryPolicy,
    /// Connection passes with the stored credentials when a pass times out.
    /// A rejected association never gets a second pass.
    pub connect_passes: u32,
    /// Port the provisioning form listens on.
    pub portal_port: u16,
    /// Port the status page listens on once connected.
    pub status_port: u16,
    /// Delay before invoking the restart primitive.
    pub restart_delay: Duration,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            access_point: AccessPointConfig::default(),
            retry: RetryPolicy::default(),
            connect_passes: 1,
            portal_port: DEFAULT_HTTP_PORT,
            status_port: DEFAULT_HTTP_PORT,
            restart_delay: DEFAULT_RESTART_DELAY,
        }
    }
}

impl BootConfig {
    /// Defaults overridden by `AQI_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `AQI_*` key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ssid) = lookup("AQI_AP_SSID") {
            if ssid.is_empty() {
                return Err(ConfigError::InvalidFormat("AQI_AP_SSID is empty".into()));
            }
            config.access_point.ssid = ssid;
        }
        if let Some(v) = lookup("AQI_MAX_ATTEMPTS") {
            config.retry.max_attempts = parse_var("AQI_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("AQI_ATTEMPT_INTERVAL_MS") {
            config.retry.attempt_interval =
                Duration::from_millis(parse_var("AQI_ATTEMPT_INTERVAL_MS", &v)?);
        }
        if let Some(v) = lookup("AQI_CONNECT_PASSES") {
            config.connect_passes = parse_var("AQI_CONNECT_PASSES", &v)?;
        }
        if let Some(v) = lookup("AQI_PORTAL_PORT") {
            config.portal_port = parse_var("AQI_PORTAL_PORT", &v)?;
        }
        if let Some(v) = lookup("AQI_STATUS_PORT") {
            config.status_port = parse_var("AQI_STATUS_PORT", &v)?;
        }
        if let Some(v) = lookup("AQI_RESTART_DELAY_MS") {
            config.restart_delay = Duration::from_millis(parse_var("AQI_RESTART_DELAY_MS", &v)?);
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidFormat(format!("{}: cannot parse '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BootConfig::default();
        assert_eq!(config.access_point.ssid, "AQISetup");
        assert_eq!(config.access_point.gateway, Ipv4Addr::new(192, 168, 4, 1));
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.retry.attempt_interval, Duration::from_secs(1));
        assert_eq!(config.connect_passes, 1);
        assert_eq!(config.portal_port, 80);
    }

    #[test]
    fn test_no_overrides_is_default() {
        let config = BootConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, BootConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = BootConfig::from_lookup(lookup_from(&[
            ("AQI_AP_SSID", "LabSetup"),
            ("AQI_MAX_ATTEMPTS", "3"),
            ("AQI_ATTEMPT_INTERVAL_MS", "250"),
            ("AQI_PORTAL_PORT", "8080"),
            ("AQI_RESTART_DELAY_MS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.access_point.ssid, "LabSetup");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.attempt_interval, Duration::from_millis(250));
        assert_eq!(config.portal_port, 8080);
        assert_eq!(config.restart_delay, Duration::ZERO);
        assert_eq!(config.status_port, 80);
    }

    #[test]
    fn test_bad_number() {
        let result = BootConfig::from_lookup(lookup_from(&[("AQI_MAX_ATTEMPTS", "ten")]));
        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));
    }

    #[test]
    fn test_empty_ap_ssid() {
        let result = BootConfig::from_lookup(lookup_from(&[("AQI_AP_SSID", "")]));
        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));
    }
}
