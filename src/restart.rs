//! Device restart primitive.

use log::info;

/// Restarts the device into a fresh boot cycle.
pub trait Restart {
    /// Request a restart. On hardware this does not return.
    fn restart(&mut self);
}

/// Host stand-in: records the request so the caller can start a new boot
/// cycle in-process.
#[derive(Debug, Default)]
pub struct SoftRestart {
    requested: bool,
}

impl SoftRestart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a restart was requested since the last [`take`](Self::take).
    pub fn requested(&self) -> bool {
        self.requested
    }

    /// Return and clear the pending request.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.requested)
    }
}

impl Restart for SoftRestart {
    fn restart(&mut self) {
        info!("Soft restart requested");
        self.requested = true;
    }
}

/// Full chip reset through ESP-IDF.
#[cfg(feature = "esp32")]
#[derive(Debug, Default)]
pub struct EspRestart;

#[cfg(feature = "esp32")]
impl Restart for EspRestart {
    fn restart(&mut self) {
        info!("Restarting device");
        unsafe { esp_idf_sys::esp_restart() }
    }
}
