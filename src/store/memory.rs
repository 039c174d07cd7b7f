//! In-memory backend for tests and ephemeral runs.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::onboarding::model::UserRecord;

use super::traits::{StoreBackend, UserEntries};

/// Holds the last saved document in memory. Saves can be made to fail.
#[derive(Default)]
pub struct MemoryBackend {
    saved: Mutex<UserEntries>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `users` already persisted.
    pub fn with_users(users: UserEntries) -> Self {
        Self {
            saved: Mutex::new(users),
            ..Self::default()
        }
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// The last successfully saved document.
    pub fn saved(&self) -> UserEntries {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn load(&self) -> Result<UserEntries, StoreError> {
        Ok(self.saved())
    }

    async fn save(&self, users: &[(String, UserRecord)]) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: self.describe(),
                source: std::io::Error::other("simulated write failure"),
            });
        }
        *self.saved.lock().unwrap_or_else(|e| e.into_inner()) = users.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
