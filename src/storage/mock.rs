//! In-memory credential store for unit tests.

use super::{decode_record, encode_record, CredentialStore, StoreError};
use crate::config::Credentials;
use std::io;

#[derive(Default)]
pub(crate) struct MemoryStore {
    raw: Option<Vec<u8>>,
    fail_writes: bool,
    saves: u32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(credentials: &Credentials) -> Self {
        Self {
            raw: encode_record(credentials).ok(),
            ..Self::default()
        }
    }

    pub fn with_raw(raw: Vec<u8>) -> Self {
        Self {
            raw: Some(raw),
            ..Self::default()
        }
    }

    /// Every save fails; the existing record is left untouched.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn saves(&self) -> u32 {
        self.saves
    }
}

impl CredentialStore for MemoryStore {
    fn try_load(&self) -> Result<Option<Credentials>, StoreError> {
        self.raw.as_deref().map(decode_record).transpose()
    }

    fn save(&mut self, credentials: &Credentials) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::WriteFailed(io::Error::new(
                io::ErrorKind::Other,
                "flash write failed",
            )));
        }
        self.raw = Some(encode_record(credentials)?);
        self.saves += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.raw = None;
        Ok(())
    }
}
