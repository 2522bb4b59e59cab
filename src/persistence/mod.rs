//! Disk snapshots of the channel registry.
//!
//! The snapshot is a single JSON object:
//! ```text
//! { "<channel>": { "<message id>": { "id", "channel", "data" | "bytes_data", "trace_id" } } }
//! ```
//! Bytes payloads are base64 encoded. Saves overwrite the file in place.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::queue::{Message, QueueService};

/// Default period between automatic saves.
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(300);

type Snapshot = HashMap<String, HashMap<String, Message>>;

/// Errors from snapshot save/load.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// What a load found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No snapshot file; every known channel was emptied.
    Missing,
    /// Snapshot applied.
    Restored { channels: usize, messages: usize },
}

/// Saves and restores the registry of one queue service.
#[derive(Clone)]
pub struct PersistenceManager {
    queue: QueueService,
    path: PathBuf,
    interval: Duration,
}

impl PersistenceManager {
    pub fn new(queue: QueueService, path: impl Into<PathBuf>) -> Self {
        Self {
            queue,
            path: path.into(),
            interval: DEFAULT_SAVE_INTERVAL,
        }
    }

    /// Set custom autosave interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current state of every channel to the snapshot file.
    ///
    /// The registry lock is held only while serializing.
    pub async fn save_snapshot(&self) -> Result<()> {
        let (encoded, channels) = {
            let registry = self.queue.registry().await;
            let snapshot: Snapshot = registry
                .channels()
                .map(|channel| {
                    let messages = channel
                        .messages()
                        .map(|m| (m.id.clone(), m.clone()))
                        .collect();
                    (channel.name().to_string(), messages)
                })
                .collect();
            (serde_json::to_vec_pretty(&snapshot)?, snapshot.len())
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|source| PersistenceError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, &encoded)
            .await
            .map_err(|source| PersistenceError::Io {
                path: self.path.clone(),
                source,
            })?;

        debug!(
            path = %self.path.display(),
            channels,
            bytes = encoded.len(),
            "Saved snapshot"
        );
        Ok(())
    }

    /// Restore channel contents from the snapshot file.
    ///
    /// Channels named in the file are created if unknown; known channels the
    /// file does not mention end up empty. A missing file empties every known
    /// channel. A file that cannot be read or parsed leaves state untouched.
    /// Loading never produces replication notifications.
    pub async fn load_snapshot(&self) -> Result<LoadOutcome> {
        let snapshot: Snapshot = match fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut registry = self.queue.registry().await;
                for channel in registry.channels_mut() {
                    channel.replace_messages(HashMap::new());
                }
                info!(path = %self.path.display(), "No snapshot found, starting empty");
                return Ok(LoadOutcome::Missing);
            }
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut registry = self.queue.registry().await;
        for channel in registry.channels_mut() {
            if !snapshot.contains_key(channel.name()) {
                channel.replace_messages(HashMap::new());
            }
        }

        let channels = snapshot.len();
        let mut messages = 0;
        for (name, stored) in snapshot {
            messages += stored.len();
            registry.find_or_create(&name).replace_messages(stored);
        }

        info!(
            path = %self.path.display(),
            channels,
            messages,
            "Restored snapshot"
        );
        Ok(LoadOutcome::Restored { channels, messages })
    }

    /// Spawn the autosave loop. The first save happens immediately.
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_autosave(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                if let Err(e) = self.save_snapshot().await {
                    warn!(path = %self.path.display(), error = %e, "Periodic snapshot failed");
                }
            }
        })
    }

    /// Final save, called once by the process on shutdown.
    pub async fn shutdown_hook(&self) {
        info!(path = %self.path.display(), "Saving snapshot before shutdown");
        match self.save_snapshot().await {
            Ok(()) => info!("Shutdown snapshot written"),
            Err(e) => error!(error = %e, "Shutdown snapshot failed"),
        }
    }
}

#[cfg(test)]
mod tests;
