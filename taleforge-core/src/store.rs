//! World-state persistence.
//!
//! The store reads and writes the whole document at once. There is no merge
//! logic here and no partial write: a save replaces the previous document.

use crate::state::WorldState;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of the world-state document.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the document, or `None` if nothing has been saved yet.
    async fn load(&self) -> Result<Option<WorldState>, PersistError>;

    /// Overwrite the stored document.
    async fn save(&self, state: &WorldState) -> Result<(), PersistError>;

    /// Human-readable location of the store, for log lines.
    fn describe(&self) -> String;
}

/// A single JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "world_state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<Option<WorldState>, PersistError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state = serde_json::from_str(&content)?;
        Ok(Some(state))
    }

    async fn save(&self, state: &WorldState) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Write beside the target then rename, so a crash mid-write never
        // leaves a truncated document behind.
        let content = serde_json::to_string_pretty(state)?;
        let temp = self.temp_path();
        fs::write(&temp, content).await?;
        fs::rename(&temp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), "world state saved");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory store, used by tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Option<WorldState>>,
    saves: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a document.
    pub fn with_state(state: WorldState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            ..Default::default()
        }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every subsequent save fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of the stored document.
    pub async fn snapshot(&self) -> Option<WorldState> {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<Option<WorldState>, PersistError> {
        Ok(self.state.lock().await.clone())
    }

    async fn save(&self, state: &WorldState) -> Result<(), PersistError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistError::Unavailable("memory store set to fail".to_string()));
        }
        *self.state.lock().await = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Build a save path for a named session, replacing awkward characters.
pub fn session_save_path(base_dir: impl AsRef<Path>, session_name: &str) -> PathBuf {
    let sanitized = session_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    base_dir.as_ref().join(format!("{sanitized}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::START_LOCATION_ID;
    use tempfile::TempDir;

    #[test]
    fn test_session_save_path() {
        let path = session_save_path("/saves", "My Tale!");
        assert!(path.to_string_lossy().ends_with("My_Tale_.json"));
    }

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = JsonFileStore::new(temp_dir.path().join("nested").join("world.json"));

        assert!(store.load().await.expect("load should succeed").is_none());

        let mut state = WorldState::genesis();
        state.player.hp = 7;
        store.save(&state).await.expect("save should succeed");

        let loaded = store.load().await.expect("load should succeed").unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.current_location_id, START_LOCATION_ID);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_json_store_rejects_garbage() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("world.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load().await, Err(PersistError::Json(_))));
    }

    #[tokio::test]
    async fn test_memory_store_failure_switch() {
        let store = MemoryStore::new();
        let state = WorldState::genesis();

        store.save(&state).await.unwrap();
        store.set_failing(true);
        assert!(store.save(&state).await.is_err());
        store.set_failing(false);
        store.save(&state).await.unwrap();

        assert_eq!(store.save_count(), 2);
        assert_eq!(store.snapshot().await, Some(state));
    }
}
