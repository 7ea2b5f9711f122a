//! AQI monitor ESP32 firmware binary.
//!
//! Boot cycle: join the stored network, or open the `AQISetup` access point
//! and wait for credentials; once online, serve readings on the status page.

#[cfg(feature = "esp32")]
fn run() -> Result<(), Box<dyn std::error::Error>> {
    use aqi_monitor_esp32::bootstrap::{BootOutcome, Bootstrap};
    use aqi_monitor_esp32::config::BootConfig;
    use aqi_monitor_esp32::network::StatusServer;
    use aqi_monitor_esp32::provisioning::ProvisioningServer;
    use aqi_monitor_esp32::restart::EspRestart;
    use aqi_monitor_esp32::sensor::Apc1;
    use aqi_monitor_esp32::storage::NvsCredentialStore;
    use aqi_monitor_esp32::wifi::EspRadio;
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_hal::units::Hertz;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::{error, info};
    use std::time::Duration;

    let config = BootConfig::default();

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // APC1 on the default ESP32 I2C pins (SDA 21, SCL 22) at 100 kHz.
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21,
        peripherals.pins.gpio22,
        &I2cConfig::new().baudrate(Hertz(100_000)),
    )?;
    let sensor = Apc1::new(i2c);

    let radio = EspRadio::new(peripherals.modem, sysloop, &config.access_point)?;
    let store = NvsCredentialStore::new(nvs)?;
    let provisioner = ProvisioningServer::from_config(&config);

    let mut boot = Bootstrap::new(config.clone(), radio, store, provisioner, EspRestart)
        .with_observer(|event| info!("Boot event: {:?}", event));

    match boot.run() {
        Ok(BootOutcome::Connected(conn)) => {
            info!("Online as {} on '{}'", conn.ip, conn.ssid);
            // Keep the station link alive for as long as the status page runs.
            let _radio = boot.into_radio();
            let _status = StatusServer::start(conn.ip, config.status_port, sensor)?;
            loop {
                std::thread::sleep(Duration::from_secs(60));
            }
        }
        Ok(BootOutcome::Restarting) => Ok(()),
        Err(e) => {
            error!("Boot failed, halting: {}", e);
            loop {
                std::thread::sleep(Duration::from_secs(60));
            }
        }
    }
}

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("=== AQI monitor starting ===");

    if let Err(e) = run() {
        log::error!("Fatal: {}", e);
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use the 'host-device' binary to run the boot cycle on a PC.");
}
