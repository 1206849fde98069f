//! Version Registry - experiment registration and the promotion engine
//!
//! The registry persists a trained model artifact plus its evaluation
//! metrics under a unique, timestamp-ordered experiment identifier. The
//! promotion engine (submodule) then decides whether that experiment
//! becomes the active "current" model.

mod promotion;

pub use promotion::PromotionEngine;

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::events::EventLog;
use crate::store::ArtifactStore;
use crate::Result;

/// Metric key used by the promotion comparison. Lower is better.
pub const RMSE: &str = "rmse";

/// Evaluation metrics map. Minimally carries `rmse` (non-negative, lower is
/// better).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metrics(BTreeMap<String, f64>);

impl Metrics {
    /// Create an empty metrics map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if no metrics were produced (evaluation skipped).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert or overwrite a metric.
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    /// Look up a metric by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    /// The RMSE metric, if present.
    #[must_use]
    pub fn rmse(&self) -> Option<f64> {
        self.get(RMSE)
    }

    /// Serialize to pretty-printed JSON bytes (the durable wire form).
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not a JSON object of numbers.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl From<BTreeMap<String, f64>> for Metrics {
    fn from(map: BTreeMap<String, f64>) -> Self {
        Self(map)
    }
}

/// Opaque handle locating a registered (model, metrics) pair in the store.
///
/// Derived from the creation timestamp at second resolution
/// (`run_YYYYMMDD_HHMMSS`); identifiers colliding within the same second are
/// disambiguated with a `-N` suffix, so rapid repeated registrations never
/// overwrite a prior record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExperimentId(String);

impl ExperimentId {
    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Experiment registration over an artifact store.
pub struct Registry<'a> {
    store: &'a dyn ArtifactStore,
    events: &'a EventLog,
}

impl<'a> Registry<'a> {
    /// Create a registry over the given store and event log.
    #[must_use]
    pub fn new(store: &'a dyn ArtifactStore, events: &'a EventLog) -> Self {
        Self { store, events }
    }

    /// Register a trained model and its metrics as an immutable experiment
    /// record.
    ///
    /// Returns `Ok(None)` when no model was supplied (skip, not a failure):
    /// registration never fails the pipeline for a missing model. Otherwise
    /// both artifact and metrics are persisted together under a fresh
    /// identifier, which is returned as an opaque handle.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot persist the record.
    pub fn register(
        &self,
        model: Option<&[u8]>,
        metrics: &Metrics,
    ) -> Result<Option<ExperimentId>> {
        let Some(model) = model else {
            tracing::info!("experiment registration skipped: no model");
            self.events.record(
                "registration_skipped",
                serde_json::json!({"reason": "no_model"}),
            );
            return Ok(None);
        };

        let id = self.next_id()?;
        let metrics_json = metrics.to_json_bytes()?;
        self.store.put_experiment(id.as_str(), model, &metrics_json)?;

        tracing::info!(run = %id, "experiment registered");
        self.events.record(
            "experiment_registered",
            serde_json::json!({"run": id.as_str(), "metrics": metrics}),
        );

        Ok(Some(id))
    }

    /// Allocate an identifier unique under second-resolution timestamping.
    ///
    /// Disambiguation probes store existence rather than an in-memory
    /// counter, so it holds across process restarts.
    fn next_id(&self) -> Result<ExperimentId> {
        let base = format!("run_{}", Utc::now().format("%Y%m%d_%H%M%S"));
        let mut candidate = base.clone();
        let mut suffix = 1u32;
        while self.store.experiment_exists(&candidate)? {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
        Ok(ExperimentId(candidate))
    }
}
