//! NVS-backed credential store for the ESP32.
//!
//! The record lives under a single NVS key. NVS writes a new entry before
//! erasing the old one, so an interrupted `set_raw` leaves the previous
//! record readable.

use super::{decode_record, encode_record, CredentialStore, StoreError};
use crate::config::{Credentials, MAX_PASSWORD_LEN, MAX_SSID_LEN};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_sys::EspError;
use log::{debug, info};
use std::io;

/// NVS namespace for WiFi configuration.
const NVS_NAMESPACE: &str = "wifi_config";

/// NVS key for the stored record.
const NVS_KEY: &str = "credentials";

/// Upper bound of an encoded record: both fields fully escaped (`\uXXXX`,
/// six bytes per input byte) plus the JSON framing.
const MAX_RECORD_SIZE: usize = 6 * (MAX_SSID_LEN + MAX_PASSWORD_LEN) + 64;

fn write_failed(e: EspError) -> StoreError {
    StoreError::WriteFailed(io::Error::new(
        io::ErrorKind::Other,
        format!("ESP error: {:?}", e),
    ))
}

/// Credential record in the default NVS partition.
pub struct NvsCredentialStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsCredentialStore {
    /// Open the WiFi namespace on `partition`.
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, EspError> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)?;
        Ok(Self { nvs })
    }

    fn read_raw<'b>(&self, buf: &'b mut [u8]) -> Result<Option<&'b [u8]>, StoreError> {
        self.nvs
            .get_raw(NVS_KEY, buf)
            .map_err(|e| StoreError::Corrupt(format!("NVS read failed: {:?}", e)))
    }
}

impl CredentialStore for NvsCredentialStore {
    fn try_load(&self) -> Result<Option<Credentials>, StoreError> {
        let mut buf = [0u8; MAX_RECORD_SIZE];
        match self.read_raw(&mut buf)? {
            Some(bytes) => decode_record(bytes).map(Some),
            None => {
                debug!("No WiFi credentials in NVS");
                Ok(None)
            }
        }
    }

    /// Save with read-back verification to catch flash writes that fail
    /// without an error code.
    fn save(&mut self, credentials: &Credentials) -> Result<(), StoreError> {
        let bytes = encode_record(credentials)?;
        self.nvs.set_raw(NVS_KEY, &bytes).map_err(write_failed)?;

        let mut verify_buf = [0u8; MAX_RECORD_SIZE];
        let read_back = self
            .nvs
            .get_raw(NVS_KEY, &mut verify_buf)
            .map_err(write_failed)?;
        if read_back != Some(bytes.as_slice()) {
            return Err(StoreError::WriteFailed(io::Error::new(
                io::ErrorKind::InvalidData,
                "NVS read-back mismatch after save",
            )));
        }

        info!("WiFi credentials for '{}' saved to NVS", credentials.ssid());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.nvs.remove(NVS_KEY).map_err(write_failed)?;
        info!("WiFi credentials cleared from NVS");
        Ok(())
    }
}

#[cfg(feature = "tap-tests")]
mod tap_tests {
    use super::*;
    use aqi_monitor_esp32_macros::tap_test;

    #[tap_test]
    fn nvs_roundtrip_and_clear() -> crate::testing::TestResult {
        let partition = EspDefaultNvsPartition::take()?;
        let mut store = NvsCredentialStore::new(partition)?;
        let previous = store.try_load().ok().flatten();

        let creds = Credentials::new("TapTestNet", "tap-secret")?;
        store.save(&creds)?;
        assert_eq!(store.load(), Some(creds));

        store.clear()?;
        assert_eq!(store.load(), None);

        if let Some(previous) = previous {
            store.save(&previous)?;
        }
        Ok(())
    }
}
