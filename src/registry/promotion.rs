//! Promotion Engine - strictly-better-RMSE promotion decisions
//!
//! State machine over the current pointer: `Unset` or `Pointing(v)`. From
//! `Unset`, any candidate carrying an `rmse` promotes unconditionally to v1.
//! From `Pointing(v)`, the candidate promotes iff its `rmse` is strictly
//! lower than the current version's (equal RMSE does NOT promote - no
//! hysteresis, no tie tolerance).
//!
//! The engine exclusively owns the promoted-version sequence and the
//! current pointer. Version numbers come from the store's atomic
//! `publish_version`, never an in-memory counter, so they keep increasing
//! across restarts and are never reused.

use crate::events::EventLog;
use crate::store::ArtifactStore;
use crate::{Error, Result};

use super::{ExperimentId, Metrics};

/// Promotion decisions over an artifact store.
pub struct PromotionEngine<'a> {
    store: &'a dyn ArtifactStore,
    events: &'a EventLog,
}

impl<'a> PromotionEngine<'a> {
    /// Create a promotion engine over the given store and event log.
    #[must_use]
    pub fn new(store: &'a dyn ArtifactStore, events: &'a EventLog) -> Self {
        Self { store, events }
    }

    /// Decide whether a registered experiment becomes the current model.
    ///
    /// Returns `Ok(true)` on promotion, `Ok(false)` on rejection. A missing
    /// experiment id or a candidate without `rmse` rejects immediately,
    /// without comparison.
    ///
    /// On promotion, the experiment's model and metrics bytes are copied
    /// verbatim into the promoted space (so current metrics read back
    /// byte-identical to what the registry wrote), then the current pointer
    /// is repointed atomically.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read or written, or if the
    /// current pointer references a version with unreadable metrics.
    pub fn promote(
        &self,
        experiment: Option<&ExperimentId>,
        metrics: &Metrics,
    ) -> Result<bool> {
        let Some(experiment) = experiment else {
            return Ok(false);
        };
        let Some(candidate_rmse) = metrics.rmse() else {
            return Ok(false);
        };

        if let Some(current) = self.store.current_version()? {
            let current_rmse = self.current_rmse(current)?;
            if candidate_rmse >= current_rmse {
                tracing::info!(
                    new_rmse = candidate_rmse,
                    current_rmse,
                    "model not promoted (no improvement)"
                );
                self.events.record(
                    "promotion_rejected",
                    serde_json::json!({
                        "new_rmse": candidate_rmse,
                        "current_rmse": current_rmse,
                    }),
                );
                return Ok(false);
            }
        }

        let version = self.publish(experiment)?;

        tracing::info!(version, rmse = candidate_rmse, "model promoted");
        self.events.record(
            "model_promoted",
            serde_json::json!({
                "version": format!("v{version}"),
                "rmse": candidate_rmse,
            }),
        );

        Ok(true)
    }

    /// RMSE of the version the current pointer references.
    fn current_rmse(&self, version: u32) -> Result<f64> {
        let bytes = self.store.version_metrics(version)?.ok_or_else(|| {
            Error::Storage(format!("current pointer references missing metrics for v{version}"))
        })?;
        Metrics::from_json_bytes(&bytes)?.rmse().ok_or_else(|| {
            Error::Storage(format!("metrics for current version v{version} carry no rmse"))
        })
    }

    /// Copy the experiment's artifact pair into the promoted space and
    /// repoint current at the new version.
    fn publish(&self, experiment: &ExperimentId) -> Result<u32> {
        let (model, metrics_json) = self.store.experiment(experiment.as_str())?.ok_or_else(|| {
            Error::Storage(format!("experiment '{experiment}' not found in store"))
        })?;

        let version = self.store.publish_version(&model, &metrics_json)?;
        self.store.set_current(version)?;
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, RMSE};
    use crate::store::MemoryStore;

    fn rmse_metrics(value: f64) -> Metrics {
        let mut metrics = Metrics::new();
        metrics.insert(RMSE, value);
        metrics
    }

    /// Register an experiment and return its id.
    fn registered(store: &MemoryStore, events: &EventLog, rmse: f64) -> ExperimentId {
        Registry::new(store, events)
            .register(Some(b"model"), &rmse_metrics(rmse))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_none_experiment_rejects() {
        let store = MemoryStore::new();
        let events = EventLog::null();
        let engine = PromotionEngine::new(&store, &events);

        assert!(!engine.promote(None, &rmse_metrics(1.0)).unwrap());
        assert!(store.current_version().unwrap().is_none());
    }

    #[test]
    fn test_missing_rmse_rejects() {
        let store = MemoryStore::new();
        let events = EventLog::null();
        let id = registered(&store, &events, 1.0);
        let engine = PromotionEngine::new(&store, &events);

        assert!(!engine.promote(Some(&id), &Metrics::new()).unwrap());
        assert!(store.current_version().unwrap().is_none());
    }

    #[test]
    fn test_first_promotion_is_unconditional() {
        let store = MemoryStore::new();
        let events = EventLog::null();
        let id = registered(&store, &events, 9_999_999.0);
        let engine = PromotionEngine::new(&store, &events);

        assert!(engine.promote(Some(&id), &rmse_metrics(9_999_999.0)).unwrap());
        assert_eq!(store.current_version().unwrap(), Some(1));
    }

    #[test]
    fn test_strictly_lower_rmse_promotes() {
        let store = MemoryStore::new();
        let events = EventLog::null();
        let engine = PromotionEngine::new(&store, &events);

        let first = registered(&store, &events, 500.0);
        engine.promote(Some(&first), &rmse_metrics(500.0)).unwrap();

        let better = registered(&store, &events, 450.0);
        assert!(engine.promote(Some(&better), &rmse_metrics(450.0)).unwrap());
        assert_eq!(store.current_version().unwrap(), Some(2));
        assert_eq!(store.versions().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_higher_rmse_rejected() {
        let store = MemoryStore::new();
        let events = EventLog::null();
        let engine = PromotionEngine::new(&store, &events);

        let first = registered(&store, &events, 400.0);
        engine.promote(Some(&first), &rmse_metrics(400.0)).unwrap();

        let worse = registered(&store, &events, 420.0);
        assert!(!engine.promote(Some(&worse), &rmse_metrics(420.0)).unwrap());
        assert_eq!(store.current_version().unwrap(), Some(1));
        assert_eq!(store.versions().unwrap(), vec![1]);
    }

    #[test]
    fn test_equal_rmse_does_not_promote() {
        let store = MemoryStore::new();
        let events = EventLog::null();
        let engine = PromotionEngine::new(&store, &events);

        let first = registered(&store, &events, 300.0);
        engine.promote(Some(&first), &rmse_metrics(300.0)).unwrap();

        let tied = registered(&store, &events, 300.0);
        assert!(!engine.promote(Some(&tied), &rmse_metrics(300.0)).unwrap());
        assert_eq!(store.current_version().unwrap(), Some(1));
    }

    #[test]
    fn test_promoted_metrics_are_byte_identical_to_registered() {
        let store = MemoryStore::new();
        let events = EventLog::null();
        let engine = PromotionEngine::new(&store, &events);

        let metrics = rmse_metrics(123.456);
        let id = Registry::new(&store, &events)
            .register(Some(b"model"), &metrics)
            .unwrap()
            .unwrap();
        engine.promote(Some(&id), &metrics).unwrap();

        let (_, registered_bytes) = store.experiment(id.as_str()).unwrap().unwrap();
        let promoted_bytes = store.version_metrics(1).unwrap().unwrap();
        assert_eq!(registered_bytes, promoted_bytes);
    }

    #[test]
    fn test_promotion_outcomes_leave_event_trail() {
        use crate::events::MemorySink;
        use std::sync::Arc;

        let store = MemoryStore::new();
        let sink = Arc::new(MemorySink::new());
        let log = EventLog::new(sink.clone());
        let engine = PromotionEngine::new(&store, &log);

        let first = registered(&store, &log, 100.0);
        engine.promote(Some(&first), &rmse_metrics(100.0)).unwrap();
        let worse = registered(&store, &log, 150.0);
        assert!(!engine.promote(Some(&worse), &rmse_metrics(150.0)).unwrap());

        let names = sink.names();
        assert!(names.contains(&"model_promoted".to_string()));
        assert!(names.contains(&"promotion_rejected".to_string()));
    }
}
