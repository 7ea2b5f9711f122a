//! TAP test runner binary.
//!
//! Runs the tests registered with `#[tap_test]` and prints TAP output.
//!
//! # Usage
//!
//! ```bash
//! # Run on host, optionally only tests whose name contains a filter
//! cargo run --bin device-tests --features tap-tests -- record
//!
//! # Flash to hardware
//! cargo espflash flash --bin device-tests --features esp32,tap-tests --release --monitor
//! ```
//!
//! On the board the filter is taken from `TAP_FILTER` at compile time.

#[cfg(feature = "esp32")]
use esp_idf_svc::sys as _;

fn main() {
    #[cfg(feature = "esp32")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();
    }

    #[cfg(feature = "esp32")]
    let filter: Option<String> = option_env!("TAP_FILTER").map(str::to_string);
    #[cfg(not(feature = "esp32"))]
    let filter: Option<String> = {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
        std::env::args().nth(1)
    };

    let success = aqi_monitor_esp32::testing::run_matching(filter.as_deref());

    #[cfg(feature = "esp32")]
    {
        log::info!("Tests complete ({}). Halting.", if success { "pass" } else { "fail" });
        loop {
            std::thread::sleep(std::time::Duration::from_secs(1));
        }
    }

    #[cfg(not(feature = "esp32"))]
    std::process::exit(if success { 0 } else { 1 });
}
