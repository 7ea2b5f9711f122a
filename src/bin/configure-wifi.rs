//! WiFi credential seeding utility for the ESP32.
//!
//! Writes credentials baked in at compile time to NVS, so the monitor joins
//! the network on its first boot without going through the `AQISetup` form.
//!
//! Usage:
//!   WIFI_SSID="MyNetwork" WIFI_PASSWORD="secret" cargo configure-wifi
//!
//! Pass `WIFI_CLEAR=1` instead to erase the stored credentials, which makes
//! the next boot open the provisioning access point.

#[cfg(feature = "esp32")]
const WIFI_SSID: Option<&str> = option_env!("WIFI_SSID");

#[cfg(feature = "esp32")]
const WIFI_PASSWORD: Option<&str> = option_env!("WIFI_PASSWORD");

#[cfg(feature = "esp32")]
const WIFI_CLEAR: Option<&str> = option_env!("WIFI_CLEAR");

/// Print error message and exit after giving the serial monitor time to flush.
#[cfg(feature = "esp32")]
fn halt_with_error(msg: &str) -> ! {
    eprintln!("\n{}", msg);
    eprintln!("\n=== Configuration failed ===\n");
    std::thread::sleep(std::time::Duration::from_secs(2));
    std::process::exit(1);
}

#[cfg(feature = "esp32")]
fn main() {
    use aqi_monitor_esp32::config::Credentials;
    use aqi_monitor_esp32::storage::{CredentialStore, NvsCredentialStore};
    use esp_idf_svc::nvs::EspDefaultNvsPartition;

    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    println!("\n=== WiFi Configuration Utility ===\n");

    let mut store = match EspDefaultNvsPartition::take().map(NvsCredentialStore::new) {
        Ok(Ok(store)) => store,
        Ok(Err(e)) | Err(e) => halt_with_error(&format!("Error opening NVS: {:?}", e)),
    };

    if WIFI_CLEAR.is_some_and(|v| v == "1") {
        if let Err(e) = store.clear() {
            halt_with_error(&format!("Error clearing NVS: {}", e));
        }
        println!("Stored credentials erased; the next boot starts the setup access point.");
        std::thread::sleep(std::time::Duration::from_secs(2));
        return;
    }

    let ssid = match WIFI_SSID {
        Some(s) if !s.is_empty() => s,
        _ => halt_with_error(
            "Error: WIFI_SSID environment variable not set at compile time.\n\n\
             Usage:\n  \
             WIFI_SSID=\"MyNetwork\" WIFI_PASSWORD=\"secret\" cargo configure-wifi",
        ),
    };
    let password = WIFI_PASSWORD.unwrap_or("");

    println!("SSID: {}", ssid);
    println!("Password: **** ({} chars)", password.len());

    let creds = match Credentials::new(ssid, password) {
        Ok(creds) => creds,
        Err(e) => halt_with_error(&format!("Error: {}", e)),
    };

    if let Err(e) = store.save(&creds) {
        halt_with_error(&format!("Error saving to NVS: {}", e));
    }

    println!("\n=== WiFi configuration saved to NVS ===");
    println!("Credentials persist across reboots.");
    println!("\n=== Done - you can disconnect the device ===\n");

    std::thread::sleep(std::time::Duration::from_secs(2));
}

#[cfg(not(feature = "esp32"))]
fn main() {
    eprintln!("This binary must be built for ESP32.");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  WIFI_SSID=\"MyNetwork\" WIFI_PASSWORD=\"secret\" cargo configure-wifi");
    std::process::exit(1);
}
