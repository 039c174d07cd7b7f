//! Interaction log: an append-only JSON-lines record of what users sent and
//! what the bot did, written off the request path by a background task.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// What kind of event an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// Free text received from a user.
    Message,
    /// A recognized command token.
    Command,
    /// A reminder that was dispatched.
    Reminder,
    /// A broadcast sent from the admin surface.
    Broadcast,
}

/// One line of the log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    pub content: String,
}

enum LogCommand {
    Append(Interaction),
    Drain(oneshot::Sender<()>),
}

/// Cheap-to-clone handle for appending entries.
///
/// Appends never block and never fail from the caller's point of view.
#[derive(Clone)]
pub struct InteractionLog {
    tx: Option<mpsc::UnboundedSender<LogCommand>>,
}

impl InteractionLog {
    /// Start the writer task appending to `path`.
    pub fn spawn(path: impl Into<PathBuf>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(path.into(), rx));
        (Self { tx: Some(tx) }, handle)
    }

    /// A log that drops everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn append(&self, user_id: &str, kind: InteractionKind, content: impl Into<String>) {
        let Some(tx) = &self.tx else {
            return;
        };
        let entry = Interaction {
            timestamp: Utc::now(),
            user_id: user_id.to_string(),
            kind,
            content: content.into(),
        };
        if tx.send(LogCommand::Append(entry)).is_err() {
            debug!("Interaction log writer has stopped, entry dropped");
        }
    }

    /// Wait until every entry appended before this call has been written.
    pub async fn drain(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(LogCommand::Drain(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run_writer(path: PathBuf, mut rx: mpsc::UnboundedReceiver<LogCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            LogCommand::Append(entry) => {
                if let Err(e) = write_entry(&path, &entry).await {
                    warn!(path = %path.display(), error = %e, "Failed to write interaction log");
                }
            }
            LogCommand::Drain(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn write_entry(path: &Path, entry: &Interaction) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut line = serde_json::to_vec(entry).map_err(std::io::Error::other)?;
    line.push(b'\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await
}
