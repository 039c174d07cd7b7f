//! `StoreBackend` trait: where the whole user set is loaded from and saved to.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::onboarding::model::UserRecord;

/// Ordered `(user id, record)` pairs; the persisted document shape.
pub type UserEntries = Vec<(String, UserRecord)>;

/// Backend-agnostic persistence for the user set.
///
/// Implementations rewrite the whole document on every save and must make
/// that rewrite atomic from a reader's perspective.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Load every stored user. A store that does not exist yet is empty.
    async fn load(&self) -> Result<UserEntries, StoreError>;

    /// Replace the stored user set with `users`.
    async fn save(&self, users: &[(String, UserRecord)]) -> Result<(), StoreError>;

    /// Keep a copy of an unreadable store before it gets overwritten.
    async fn quarantine(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Short human-readable location, for logs.
    fn describe(&self) -> String;
}
