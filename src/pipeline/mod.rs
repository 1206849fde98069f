//! Pipeline Orchestrator
//!
//! Sequences ingestion → validation → preprocessing → training → evaluation
//! → registration → promotion with fail-fast, no-retry, no-compensation
//! semantics: any empty/falsy step result terminates the run immediately and
//! performs no further side effects. A full re-run from an external
//! scheduler is the retry mechanism.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::events::EventLog;
use crate::ingest::BatchSource;
use crate::prepare::split_features;
use crate::registry::{PromotionEngine, Registry};
use crate::schema::SchemaContract;
use crate::store::ArtifactStore;
use crate::train::{evaluate, train};
use crate::validate::validate;
use crate::{Error, Result};

/// Pipeline run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rows pulled from the lakehouse per run.
    pub micro_batch_size: usize,
    /// Drop the transient buffer after a successful promotion.
    #[serde(default)]
    pub clear_buffer_on_promotion: bool,
}

impl PipelineConfig {
    /// Load configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Storage(format!(
                "failed to read pipeline config {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Where a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Ingestion pulled zero rows.
    NoNewData,
    /// Validation skipped (empty buffer).
    ValidationSkipped,
    /// Preprocessing produced no rows.
    NothingToTrain,
    /// Too few rows to train and hold out.
    TrainingSkipped,
    /// Evaluation produced no metrics.
    EvaluationSkipped,
    /// The run reached the promotion decision.
    Completed {
        /// Whether the new model was promoted to current.
        promoted: bool,
    },
}

impl RunOutcome {
    /// Whether the run reached promotion and promoted.
    #[must_use]
    pub const fn promoted(&self) -> bool {
        matches!(self, Self::Completed { promoted: true })
    }
}

/// One-shot retraining pipeline over a batch source and an artifact store.
pub struct Pipeline<'a> {
    source: &'a mut dyn BatchSource,
    contract: &'a SchemaContract,
    store: &'a dyn ArtifactStore,
    config: &'a PipelineConfig,
    events: EventLog,
}

impl<'a> Pipeline<'a> {
    /// Assemble a pipeline.
    #[must_use]
    pub fn new(
        source: &'a mut dyn BatchSource,
        contract: &'a SchemaContract,
        store: &'a dyn ArtifactStore,
        config: &'a PipelineConfig,
        events: EventLog,
    ) -> Self {
        Self {
            source,
            contract,
            store,
            config,
            events,
        }
    }

    /// Execute one linear pass. Early exits are reported through
    /// [`RunOutcome`]; contract violations and storage failures abort with
    /// an error (no partial registration, no partial promotion).
    ///
    /// # Errors
    ///
    /// Returns error on schema/constraint violations or storage failure.
    pub fn run(&mut self) -> Result<RunOutcome> {
        tracing::info!("retraining pipeline started");
        self.events.record("pipeline_started", serde_json::json!({}));

        // Step 1: Ingestion
        let rows_pulled = self.source.pull()?;
        if rows_pulled == 0 {
            tracing::info!("pipeline exiting: no new data");
            return Ok(RunOutcome::NoNewData);
        }

        // Step 2: Validation
        let batch = self.source.buffer()?;
        if !validate(&batch, self.contract, &self.events)? {
            tracing::info!("pipeline exiting: validation skipped");
            return Ok(RunOutcome::ValidationSkipped);
        }

        // Step 3: Preprocessing
        let split = split_features(&batch, self.contract, &self.events)?;
        if split.is_empty() {
            tracing::info!("pipeline exiting: no data after preprocessing");
            return Ok(RunOutcome::NothingToTrain);
        }

        // Step 4: Training
        let Some(trained) = train(&split, &self.events)? else {
            tracing::info!("pipeline exiting: training skipped");
            return Ok(RunOutcome::TrainingSkipped);
        };

        // Step 5: Evaluation
        let metrics = evaluate(
            Some(&trained.model),
            &trained.x_test,
            &trained.y_test,
            &self.events,
        );
        if metrics.is_empty() {
            tracing::info!("pipeline exiting: evaluation skipped");
            return Ok(RunOutcome::EvaluationSkipped);
        }

        // Step 6: Register experiment
        let model_bytes = trained.model.to_bytes()?;
        let registry = Registry::new(self.store, &self.events);
        let experiment = registry.register(Some(&model_bytes), &metrics)?;

        // Step 7: Promotion
        let engine = PromotionEngine::new(self.store, &self.events);
        let promoted = engine.promote(experiment.as_ref(), &metrics)?;

        // Step 8: Clear buffer if configured
        if promoted && self.config.clear_buffer_on_promotion {
            self.source.clear_buffer()?;
            tracing::info!("buffer cleared after promotion");
            self.events.record("buffer_cleared", serde_json::json!({}));
        }

        tracing::info!(promoted, "retraining pipeline completed");
        self.events.record(
            "pipeline_completed",
            serde_json::json!({"promoted": promoted}),
        );

        Ok(RunOutcome::Completed { promoted })
    }
}
