//! File-backed credential store.
//!
//! Used on the host and on any target with a std filesystem. Defaults to
//! `~/.aqi-monitor-esp32/wifi_credentials.json`.
//!
//! Saves go through a temporary sibling file that is fsynced and then renamed
//! over the record, so an interrupted save leaves the old record in place.

use super::{decode_record, encode_record, CredentialStore, StoreError};
use crate::config::Credentials;
use log::{debug, info};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Default record location.
///
/// Returns `~/.aqi-monitor-esp32/wifi_credentials.json`
pub fn default_credentials_path() -> io::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home)
        .join(".aqi-monitor-esp32")
        .join("wifi_credentials.json"))
}

/// Credential record stored in a single file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at [`default_credentials_path`].
    pub fn at_default_path() -> io::Result<Self> {
        Ok(Self::new(default_credentials_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_atomically(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.temp_path();
        {
            let mut file = File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }

        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        // Persist the rename itself. Not every platform can open a directory.
        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        // Read back to catch silent write failures.
        let read_back = fs::read(&self.path)?;
        if read_back != bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "verification failed: wrote {} bytes, read {} bytes",
                    bytes.len(),
                    read_back.len()
                ),
            ));
        }
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn try_load(&self) -> Result<Option<Credentials>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No credentials file at {:?}", self.path);
                return Ok(None);
            }
            Err(e) => return Err(StoreError::Corrupt(format!("{:?}: {}", self.path, e))),
        };
        decode_record(&bytes).map(Some)
    }

    fn save(&mut self, credentials: &Credentials) -> Result<(), StoreError> {
        let bytes = encode_record(credentials)?;
        self.write_atomically(&bytes)
            .map_err(StoreError::WriteFailed)?;
        info!(
            "WiFi credentials for '{}' saved to {:?}",
            credentials.ssid(),
            self.path
        );
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("WiFi credentials cleared from {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::WriteFailed(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU32, Ordering};

    // Unique files even when tests run in parallel
    static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn unique_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let pid = std::process::id();
        env::temp_dir().join(format!("aqi-store-test-{}-{}", pid, id))
    }

    fn store_in(dir: &Path) -> FileCredentialStore {
        FileCredentialStore::new(dir.join("wifi_credentials.json"))
    }

    #[test]
    fn test_roundtrip() {
        let dir = unique_dir();
        let mut store = store_in(&dir);
        let creds = Credentials::new("HomeNet", "secret123").unwrap();

        store.save(&creds).expect("save failed");
        assert_eq!(store.load(), Some(creds));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_without_save_is_none() {
        let dir = unique_dir();
        let store = store_in(&dir);
        assert!(matches!(store.try_load(), Ok(None)));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_corrupt_file_is_none() {
        let dir = unique_dir();
        fs::create_dir_all(&dir).unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "SSID = 'HomeNet'\nPASSWORD = 'secret123'\n").unwrap();

        assert!(matches!(store.try_load(), Err(StoreError::Corrupt(_))));
        assert_eq!(store.load(), None);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_replaces_previous_record() {
        let dir = unique_dir();
        let mut store = store_in(&dir);
        let first = Credentials::new("HomeNet", "secret123").unwrap();
        let second = Credentials::new("CafeNet", "latte4all").unwrap();

        store.save(&first).unwrap();
        store.save(&second).unwrap();
        assert_eq!(store.load(), Some(second));
        assert!(!store.temp_path().exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_leftover_temp_file_does_not_affect_record() {
        let dir = unique_dir();
        let mut store = store_in(&dir);
        let creds = Credentials::new("HomeNet", "secret123").unwrap();
        store.save(&creds).unwrap();

        // A save interrupted before the rename leaves only a partial temp file.
        fs::write(store.temp_path(), "{\"ssid\": \"Half").unwrap();
        assert_eq!(store.load(), Some(creds));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_into_unwritable_location_fails() {
        let dir = unique_dir();
        fs::create_dir_all(&dir).unwrap();
        // Parent "directory" is a regular file.
        let blocker = dir.join("blocker");
        fs::write(&blocker, "x").unwrap();
        let mut store = FileCredentialStore::new(blocker.join("wifi_credentials.json"));

        let creds = Credentials::new("HomeNet", "secret123").unwrap();
        assert!(matches!(store.save(&creds), Err(StoreError::WriteFailed(_))));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_clear() {
        let dir = unique_dir();
        let mut store = store_in(&dir);
        store
            .save(&Credentials::new("HomeNet", "secret123").unwrap())
            .unwrap();

        store.clear().unwrap();
        assert_eq!(store.load(), None);
        // Clearing twice is fine.
        store.clear().unwrap();

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let store = FileCredentialStore::new("/data/wifi_credentials.json");
        assert_eq!(
            store.temp_path(),
            PathBuf::from("/data/wifi_credentials.json.tmp")
        );
    }
}
