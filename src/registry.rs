use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::types::TaskHandle;

/// Durable store holding at most one in-flight [`TaskHandle`].
///
/// The registry is the single source of truth for "is a task in flight":
/// any component can query liveness by calling [`load`](HandleStore::load)
/// alone. `save` overwrites unconditionally; starting a second task while
/// one is registered replaces the first's tracking. The replaced task keeps
/// running server-side but becomes untrackable from this client; that is a
/// documented limitation of the single-task design, not something the store
/// tries to detect.
pub trait HandleStore: Send + Sync {
    /// Persist the handle, replacing any existing one.
    fn save(&self, handle: &TaskHandle) -> Result<()>;

    /// Read the current handle, if any.
    fn load(&self) -> Result<Option<TaskHandle>>;

    /// Remove the stored handle. Idempotent; clearing an empty store is a no-op.
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryRecord {
    task_id: TaskHandle,
}

/// File-backed registry surviving process restarts.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write never leaves a torn record. Concurrent processes sharing
/// the file race with last-write-wins semantics; there is no locking.
#[derive(Debug, Clone)]
pub struct FileHandleStore {
    path: PathBuf,
}

impl FileHandleStore {
    /// Create a store backed by the given file. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_err(context: &str, source: std::io::Error) -> TrackerError {
        TrackerError::Storage {
            context: context.to_string(),
            source,
        }
    }
}

impl HandleStore for FileHandleStore {
    fn save(&self, handle: &TaskHandle) -> Result<()> {
        let record = RegistryRecord {
            task_id: handle.clone(),
        };
        let json = serde_json::to_string(&record)?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| Self::storage_err("Failed to write task registry", e))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Self::storage_err("Failed to replace task registry", e))?;
        Ok(())
    }

    fn load(&self) -> Result<Option<TaskHandle>> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::storage_err("Failed to read task registry", e)),
        };
        let record: RegistryRecord = serde_json::from_str(&json)?;
        Ok(Some(record.task_id))
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::storage_err("Failed to clear task registry", e)),
        }
    }
}

/// In-memory registry for tests and hosts that do not need durability.
#[derive(Debug, Default)]
pub struct MemoryHandleStore {
    slot: Mutex<Option<TaskHandle>>,
}

impl MemoryHandleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryHandleStore {
    fn slot(&self) -> std::sync::MutexGuard<'_, Option<TaskHandle>> {
        // The slot is a plain Option; a poisoned lock is still usable.
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(e) => e.into_inner(),
        }
    }
}

impl HandleStore for MemoryHandleStore {
    fn save(&self, handle: &TaskHandle) -> Result<()> {
        *self.slot() = Some(handle.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<TaskHandle>> {
        Ok(self.slot().clone())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}
