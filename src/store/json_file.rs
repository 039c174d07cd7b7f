//! JSON file backend: a single array of `[userId, record]` pairs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;
use crate::onboarding::model::UserRecord;

use super::traits::{StoreBackend, UserEntries};

/// Stores users in one pretty-printed JSON document.
///
/// Saves go to `<file>.tmp` in the same directory and are renamed over the
/// target, so a reader sees either the old or the new document.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "users.json".into());
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl StoreBackend for JsonFileBackend {
    async fn load(&self) -> Result<UserEntries, StoreError> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(&self.path, e)),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        // Invalid UTF-8 is a parse failure too, not an I/O error.
        serde_json::from_slice(&data).map_err(|e| StoreError::Malformed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    async fn save(&self, users: &[(String, UserRecord)]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(parent, e))?;
        }

        let data = serde_json::to_vec_pretty(users)?;
        let tmp = self.sibling(".tmp");

        let mut file = fs::File::create(&tmp)
            .await
            .map_err(|e| self.io_error(&tmp, e))?;
        file.write_all(&data)
            .await
            .map_err(|e| self.io_error(&tmp, e))?;
        file.sync_all()
            .await
            .map_err(|e| self.io_error(&tmp, e))?;
        drop(file);

        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(&self.path, e))?;
        Ok(())
    }

    async fn quarantine(&self) -> Result<(), StoreError> {
        let target = self.sibling(".corrupt");
        fs::copy(&self.path, &target)
            .await
            .map_err(|e| self.io_error(&target, e))?;
        tracing::warn!(
            path = %self.path.display(),
            copy = %target.display(),
            "Kept a copy of the unreadable user store"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
