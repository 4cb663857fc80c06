//! Object storage for stage outputs
//!
//! Keys encode tenant prefix, stage, pipeline and partition:
//! `<base>/<stage>/job_name=<pipeline>/date=<YYYYMMDD>/data.json`, or
//! `<base>/<stage>/job_name=<pipeline>/latest/data.json` for unpartitioned
//! runs. Callers treat the returned path as opaque.

use crate::error::{CoreError, CoreResult};
use crate::identifier::PipelineName;
use crate::partition::PartitionKey;
use crate::stage::StageKind;
use crate::table::Table;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// File name of every stored object
pub const OBJECT_FILE: &str = "data.json";

/// Location of one stage output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey {
    base_path: String,
    stage: StageKind,
    pipeline: PipelineName,
    partition: Option<PartitionKey>,
}

impl StorageKey {
    pub fn new(
        base_path: impl Into<String>,
        stage: StageKind,
        pipeline: PipelineName,
        partition: Option<PartitionKey>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            stage,
            pipeline,
            partition,
        }
    }

    /// Relative object path
    pub fn path(&self) -> String {
        let partition = match &self.partition {
            Some(key) => format!("date={}", key.compact()),
            None => "latest".to_string(),
        };
        format!(
            "{}/{}/job_name={}/{}/{}",
            self.base_path, self.stage, self.pipeline, partition, OBJECT_FILE
        )
    }
}

/// Persists and retrieves tables
pub trait ObjectStore: Send + Sync {
    /// Path an object written at `key` is (or would be) stored under
    fn locate(&self, key: &StorageKey) -> String {
        key.path()
    }

    /// Write `table` at `key`, replacing any previous object; returns its path
    fn write(&self, table: &Table, key: &StorageKey) -> CoreResult<String>;

    /// Read the table stored at a path returned by [`ObjectStore::write`]
    fn read(&self, path: &str) -> CoreResult<Table>;
}

fn storage_error(path: &str, message: impl ToString) -> CoreError {
    CoreError::Storage {
        path: path.to_string(),
        message: message.to_string(),
    }
}

/// In-process store, used for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Table>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths of every stored object, sorted
    pub fn paths(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn write(&self, table: &Table, key: &StorageKey) -> CoreResult<String> {
        let path = key.path();
        let mut objects = self
            .objects
            .lock()
            .map_err(|e| storage_error(&path, e))?;
        objects.insert(path.clone(), table.clone());
        Ok(path)
    }

    fn read(&self, path: &str) -> CoreResult<Table> {
        let objects = self.objects.lock().map_err(|e| storage_error(path, e))?;
        objects
            .get(path)
            .cloned()
            .ok_or_else(|| storage_error(path, "object not found"))
    }
}

/// Store writing JSON files under a root directory
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ObjectStore for LocalObjectStore {
    fn locate(&self, key: &StorageKey) -> String {
        self.root.join(key.path()).display().to_string()
    }

    fn write(&self, table: &Table, key: &StorageKey) -> CoreResult<String> {
        let display = self.locate(key);
        let path = PathBuf::from(&display);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| storage_error(&display, e))?;
        }
        let body = serde_json::to_vec(table)?;
        std::fs::write(&path, body).map_err(|e| storage_error(&display, e))?;
        log::debug!("Wrote {} rows to {}", table.len(), display);
        Ok(display)
    }

    fn read(&self, path: &str) -> CoreResult<Table> {
        let body = std::fs::read(path).map_err(|e| storage_error(path, e))?;
        serde_json::from_slice(&body).map_err(|e| storage_error(path, e))
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
