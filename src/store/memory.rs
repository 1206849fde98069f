//! In-memory artifact store using `DashMap`.
//!
//! This is the default backend for tests and embedding - data is lost on
//! process restart. For persistence, use [`super::FsStore`].

use std::collections::BTreeMap;
use std::sync::Mutex;

use dashmap::DashMap;

use super::ArtifactStore;
use crate::{Error, Result};

/// In-memory artifact store.
///
/// Experiments live in a lock-free concurrent hashmap; the promoted space
/// and the current pointer sit behind one mutex so version allocation and
/// publication happen as a single atomic step.
#[derive(Default)]
pub struct MemoryStore {
    experiments: DashMap<String, (Vec<u8>, Vec<u8>)>,
    promoted: Mutex<BTreeMap<u32, (Vec<u8>, Vec<u8>)>>,
    current: Mutex<Option<u32>>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered experiments.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    fn promoted_lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<u32, (Vec<u8>, Vec<u8>)>>> {
        self.promoted
            .lock()
            .map_err(|_| Error::Storage("promoted space poisoned".to_string()))
    }

    fn current_lock(&self) -> Result<std::sync::MutexGuard<'_, Option<u32>>> {
        self.current
            .lock()
            .map_err(|_| Error::Storage("current pointer poisoned".to_string()))
    }
}

impl ArtifactStore for MemoryStore {
    fn put_experiment(&self, id: &str, model: &[u8], metrics_json: &[u8]) -> Result<()> {
        if self.experiments.contains_key(id) {
            return Err(Error::Storage(format!(
                "experiment '{id}' already exists (records are immutable)"
            )));
        }
        self.experiments
            .insert(id.to_string(), (model.to_vec(), metrics_json.to_vec()));
        Ok(())
    }

    fn experiment(&self, id: &str) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        Ok(self.experiments.get(id).map(|entry| entry.value().clone()))
    }

    fn experiment_exists(&self, id: &str) -> Result<bool> {
        Ok(self.experiments.contains_key(id))
    }

    fn publish_version(&self, model: &[u8], metrics_json: &[u8]) -> Result<u32> {
        let mut promoted = self.promoted_lock()?;
        let next = promoted.keys().next_back().map_or(1, |max| max + 1);
        promoted.insert(next, (model.to_vec(), metrics_json.to_vec()));
        Ok(next)
    }

    fn version_model(&self, version: u32) -> Result<Option<Vec<u8>>> {
        Ok(self
            .promoted_lock()?
            .get(&version)
            .map(|(model, _)| model.clone()))
    }

    fn version_metrics(&self, version: u32) -> Result<Option<Vec<u8>>> {
        Ok(self
            .promoted_lock()?
            .get(&version)
            .map(|(_, metrics)| metrics.clone()))
    }

    fn versions(&self) -> Result<Vec<u32>> {
        Ok(self.promoted_lock()?.keys().copied().collect())
    }

    fn current_version(&self) -> Result<Option<u32>> {
        Ok(*self.current_lock()?)
    }

    fn set_current(&self, version: u32) -> Result<()> {
        if !self.promoted_lock()?.contains_key(&version) {
            return Err(Error::Storage(format!(
                "cannot point current at missing version v{version}"
            )));
        }
        *self.current_lock()? = Some(version);
        Ok(())
    }
}
