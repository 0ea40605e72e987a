//! Profile persistence interface.
//!
//! The save scheduler and the host talk to storage exclusively through
//! [`PlayerStore`]. A JSON-file implementation ships with the crate for
//! standalone deployments; anything heavier (SQL, key-value stores) is
//! implemented host-side against the same trait.

use crate::players::PlayerRecord;
use async_trait::async_trait;
use herald_events::PlayerId;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Errors raised by profile storage backends.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Underlying I/O failure.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The record could not be encoded or decoded.
    #[error("profile serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Durable storage for player profiles.
///
/// Implementations must tolerate concurrent saves of different players; the
/// save scheduler flushes dirty records in parallel.
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Persists a record, replacing any previous version.
    async fn save(&self, record: &PlayerRecord) -> Result<(), PersistError>;

    /// Loads a record, or `None` if the player has never been saved.
    async fn load(&self, player: PlayerId) -> Result<Option<PlayerRecord>, PersistError>;
}

/// One-JSON-file-per-player storage under a directory.
pub struct JsonFileStore {
    directory: PathBuf,
}

impl JsonFileStore {
    /// Creates a store rooted at the given directory. The directory is
    /// created on first save.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn path_for(&self, player: PlayerId) -> PathBuf {
        self.directory.join(format!("{}.json", player))
    }
}

#[async_trait]
impl PlayerStore for JsonFileStore {
    async fn save(&self, record: &PlayerRecord) -> Result<(), PersistError> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let json = serde_json::to_string_pretty(record)?;
        tokio::fs::write(self.path_for(record.id), json).await?;
        debug!("Saved profile for {}", record.id);
        Ok(())
    }

    async fn load(&self, player: PlayerId) -> Result<Option<PlayerRecord>, PersistError> {
        let path = self.path_for(player);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record = serde_json::from_str(&raw)?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_events::ChannelName;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let mut record = PlayerRecord::new(PlayerId::new(), "Steve");
        record.muted = true;
        record.memberships.insert(ChannelName::from("global"));

        store.save(&record).await.unwrap();
        let loaded = store.load(record.id).await.unwrap().unwrap();

        assert_eq!(loaded.username, "Steve");
        assert!(loaded.muted);
        assert!(loaded.is_member(&ChannelName::from("global")));
    }

    #[tokio::test]
    async fn loading_unsaved_player_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let loaded = store.load(PlayerId::new()).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn save_replaces_previous_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let mut record = PlayerRecord::new(PlayerId::new(), "Steve");
        store.save(&record).await.unwrap();

        record.nickname = Some("Captain".to_string());
        store.save(&record).await.unwrap();

        let loaded = store.load(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.nickname.as_deref(), Some("Captain"));
    }
}
