//! ESP-IDF radio driver.
//!
//! Wraps `BlockingWifi<EspWifi>` with both a station and an access-point
//! netif. The access-point netif is configured as a router on the configured
//! gateway address so clients get DHCP leases and use the device as DNS.
//!
//! `esp_wifi_connect` returns before association, so a refused join shows up
//! later as a `StaDisconnected` event. The reason code of the last one is kept
//! and turned into [`LinkStatus::Rejected`] on the next poll.

use super::radio::{AssociationFailure, LinkStatus, Radio, RadioError, RadioMode};
use crate::config::{AccessPointConfig, Credentials};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::ipv4::{self, Mask, Subnet};
use esp_idf_svc::netif::{EspNetif, NetifConfiguration, NetifStack};
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
    EspWifi, WifiDriver, WifiEvent,
};
use esp_idf_sys::EspError;
use log::{info, warn};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

/// No disconnect seen since the last join.
const NO_REASON: u16 = 0;

/// Rejection recorded by the disconnect handler, if any.
fn pending_rejection(last_reason: &AtomicU16) -> Option<AssociationFailure> {
    match last_reason.load(Ordering::Acquire) {
        NO_REASON => None,
        reason => AssociationFailure::from_disconnect_reason(reason),
    }
}

/// Station-or-access-point radio on the ESP32 modem.
pub struct EspRadio<'a> {
    wifi: BlockingWifi<EspWifi<'a>>,
    mode: RadioMode,
    last_disconnect: Arc<AtomicU16>,
    _disconnects: EspSubscription<'static, System>,
}

impl<'a> EspRadio<'a> {
    /// Take the modem. `ap` provides the gateway address of the access point netif.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        ap: &AccessPointConfig,
    ) -> Result<Self, RadioError> {
        let ap_netif_config = NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Router(ipv4::RouterConfiguration {
                subnet: Subnet {
                    gateway: ap.gateway,
                    mask: Mask(24),
                },
                dhcp_enabled: true,
                dns: Some(ap.gateway),
                secondary_dns: None,
            })),
            ..NetifConfiguration::wifi_default_router()
        };

        let last_disconnect = Arc::new(AtomicU16::new(NO_REASON));
        let reason_sink = last_disconnect.clone();
        let disconnects = sysloop.subscribe::<WifiEvent, _>(move |event| {
            if let WifiEvent::StaDisconnected(disconnected) = event {
                let reason = disconnected.reason() as u16;
                warn!("Station disconnected, reason {}", reason);
                reason_sink.store(reason, Ordering::Release);
            }
        })?;

        let driver = WifiDriver::new(modem, sysloop.clone(), None)?;
        let sta_netif = EspNetif::new(NetifStack::Sta)?;
        let ap_netif = EspNetif::new_with_conf(&ap_netif_config)?;
        let wifi = BlockingWifi::wrap(EspWifi::wrap_all(driver, sta_netif, ap_netif)?, sysloop)?;

        Ok(Self {
            wifi,
            mode: RadioMode::Off,
            last_disconnect,
            _disconnects: disconnects,
        })
    }

    fn station_ip(&self) -> Result<Option<IpAddr>, EspError> {
        let info = self.wifi.wifi().sta_netif().get_ip_info()?;
        Ok(info.ip.to_string().parse().ok())
    }
}

/// Map synchronous `esp_wifi_connect` failures that mean "these credentials
/// will never work".
fn classify_join_error(e: EspError) -> RadioError {
    let code = e.code();
    if code == esp_idf_sys::ESP_ERR_WIFI_SSID as i32 {
        RadioError::Rejected(AssociationFailure::NetworkNotFound)
    } else if code == esp_idf_sys::ESP_ERR_WIFI_PASSWORD as i32 {
        RadioError::Rejected(AssociationFailure::WrongPassword)
    } else {
        RadioError::from(e)
    }
}

impl Radio for EspRadio<'_> {
    fn mode(&self) -> RadioMode {
        self.mode
    }

    fn start_station(&mut self) -> Result<(), RadioError> {
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        self.wifi.start()?;
        self.mode = RadioMode::Station;
        Ok(())
    }

    fn join(&mut self, credentials: &Credentials) -> Result<(), RadioError> {
        let config = Configuration::Client(ClientConfiguration {
            ssid: credentials.ssid().try_into().map_err(|_| {
                RadioError::Rejected(AssociationFailure::Other("SSID too long".into()))
            })?,
            password: credentials.password().try_into().map_err(|_| {
                RadioError::Rejected(AssociationFailure::Other("password too long".into()))
            })?,
            auth_method: AuthMethod::WPA2Personal,
            ..Default::default()
        });
        self.wifi.set_configuration(&config)?;
        self.last_disconnect.store(NO_REASON, Ordering::Release);

        // Non-blocking connect; progress is observed through link_status().
        self.wifi.wifi_mut().connect().map_err(classify_join_error)
    }

    fn link_status(&mut self) -> LinkStatus {
        if let Some(failure) = pending_rejection(&self.last_disconnect) {
            return LinkStatus::Rejected(failure);
        }
        match self.wifi.is_up() {
            Ok(true) => match self.station_ip() {
                Ok(Some(ip)) => LinkStatus::Connected(ip),
                Ok(None) => LinkStatus::Connecting,
                Err(e) => {
                    warn!("Failed to read station IP: {:?}", e);
                    LinkStatus::Connecting
                }
            },
            Ok(false) => LinkStatus::Connecting,
            Err(e) => {
                warn!("Failed to read link state: {:?}", e);
                LinkStatus::Connecting
            }
        }
    }

    fn start_access_point(&mut self, config: &AccessPointConfig) -> Result<IpAddr, RadioError> {
        let ap_config = AccessPointConfiguration {
            ssid: config
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| RadioError::Driver("access point SSID too long".into()))?,
            ssid_hidden: false,
            channel: config.channel,
            auth_method: AuthMethod::None,
            max_connections: config.max_connections,
            ..Default::default()
        };

        self.wifi
            .set_configuration(&Configuration::AccessPoint(ap_config))?;
        self.wifi.start()?;
        self.mode = RadioMode::AccessPoint;

        let info = self.wifi.wifi().ap_netif().get_ip_info()?;
        info!("SoftAP '{}' up at {}", config.ssid, info.ip);
        info.ip
            .to_string()
            .parse()
            .map_err(|_| RadioError::Driver(format!("bad AP address {}", info.ip)))
    }

    fn stop(&mut self) -> Result<(), RadioError> {
        if self.mode == RadioMode::Station {
            if let Err(e) = self.wifi.disconnect() {
                warn!("Disconnect before stop failed: {:?}", e);
            }
        }
        if self.mode != RadioMode::Off {
            self.wifi.stop()?;
        }
        self.mode = RadioMode::Off;
        Ok(())
    }
}

#[cfg(feature = "tap-tests")]
mod tap_tests {
    use super::*;
    use aqi_monitor_esp32_macros::tap_test;

    #[tap_test]
    fn disconnect_reason_becomes_rejection() -> crate::testing::TestResult {
        let last = AtomicU16::new(NO_REASON);
        assert_eq!(pending_rejection(&last), None);

        last.store(202, Ordering::Release);
        assert_eq!(
            pending_rejection(&last),
            Some(AssociationFailure::WrongPassword)
        );

        last.store(201, Ordering::Release);
        assert_eq!(
            pending_rejection(&last),
            Some(AssociationFailure::NetworkNotFound)
        );

        // Beacon timeout keeps the join pending.
        last.store(200, Ordering::Release);
        assert_eq!(pending_rejection(&last), None);
        Ok(())
    }
}
