//! Host-based AQI monitor for development and testing.
//!
//! Runs the device boot cycle on a PC: the stored credentials live in a file,
//! the "access point" is the loopback interface and a restart simply starts
//! the next boot cycle in-process.
//!
//! # Usage
//!
//! ```bash
//! AQI_PORTAL_PORT=8080 AQI_STATUS_PORT=8081 cargo run --bin host-device
//! ```
//!
//! Then open http://localhost:8080/ to submit credentials. With
//! `AQI_HOST_NETWORK_SSID` / `AQI_HOST_NETWORK_PASSWORD` set, only that pair
//! joins; otherwise any credentials do.

use aqi_monitor_esp32::bootstrap::{BootOutcome, Bootstrap};
use aqi_monitor_esp32::config::{BootConfig, Credentials};
use aqi_monitor_esp32::network::{HostRadio, StatusServer};
use aqi_monitor_esp32::provisioning::ProvisioningServer;
use aqi_monitor_esp32::restart::SoftRestart;
use aqi_monitor_esp32::sensor::FixedReadings;
use aqi_monitor_esp32::storage::{default_credentials_path, FileCredentialStore};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Duration;

fn host_radio() -> HostRadio {
    let ssid = std::env::var("AQI_HOST_NETWORK_SSID").ok();
    let password = std::env::var("AQI_HOST_NETWORK_PASSWORD").ok();

    match (ssid, password) {
        (Some(ssid), Some(password)) => match Credentials::new(ssid, password) {
            Ok(creds) => {
                info!("Simulated network '{}'", creds.ssid());
                HostRadio::with_network(creds)
            }
            Err(e) => {
                warn!("Ignoring simulated network: {}", e);
                HostRadio::new()
            }
        },
        _ => HostRadio::new(),
    }
}

fn credentials_path() -> PathBuf {
    if let Ok(path) = std::env::var("AQI_CREDENTIALS_PATH") {
        return PathBuf::from(path);
    }
    match default_credentials_path() {
        Ok(path) => path,
        Err(e) => {
            warn!("{}; using ./wifi_credentials.json", e);
            PathBuf::from("wifi_credentials.json")
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== AQI monitor (host) starting ===");

    let config = match BootConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };
    let path = credentials_path();
    info!("Credentials file: {}", path.display());

    let mut cycle = 1u32;
    loop {
        info!("--- Boot cycle {} ---", cycle);

        let mut boot = Bootstrap::new(
            config.clone(),
            host_radio(),
            FileCredentialStore::new(&path),
            ProvisioningServer::from_config(&config),
            SoftRestart::new(),
        )
        .with_observer(|event| info!("Boot event: {:?}", event));

        match boot.run() {
            Ok(BootOutcome::Connected(conn)) => {
                info!("Online as {} on '{}'", conn.ip, conn.ssid);
                let _status =
                    match StatusServer::start(conn.ip, config.status_port, FixedReadings::indoor()) {
                        Ok(server) => server,
                        Err(e) => {
                            error!("Failed to start status server: {}", e);
                            std::process::exit(1);
                        }
                    };

                info!("Serving readings (Ctrl+C to exit)...");
                loop {
                    std::thread::sleep(Duration::from_secs(60));
                }
            }
            Ok(BootOutcome::Restarting) if boot.restarter().requested() => {
                cycle += 1;
            }
            Ok(BootOutcome::Restarting) => {
                error!("Boot cycle ended without a restart request");
                std::process::exit(1);
            }
            Err(e) => {
                error!("Boot failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}
