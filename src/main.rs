//! `retrain` binary - one pipeline pass over a file-backed workspace
//!
//! Workspace layout (rooted at the first CLI argument, default `.`):
//!
//! ```text
//! <root>/config/schema.json      # schema contract
//! <root>/config/pipeline.json    # pipeline config
//! <root>/data/lakehouse.jsonl    # source rows
//! <root>/data/buffer.jsonl       # transient batch buffer
//! <root>/data/pointer.txt        # ingestion cursor
//! <root>/models/                 # artifact store root
//! <root>/logs/events.jsonl       # structured event log
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use entrenar_pipeline::events::{EventLog, JsonlSink};
use entrenar_pipeline::ingest::LakehouseSource;
use entrenar_pipeline::pipeline::{Pipeline, PipelineConfig, RunOutcome};
use entrenar_pipeline::schema::SchemaContract;
use entrenar_pipeline::store::FsStore;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let root = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("."), PathBuf::from);

    let contract = SchemaContract::from_path(root.join("config/schema.json"))
        .context("loading schema contract")?;
    let config = PipelineConfig::from_path(root.join("config/pipeline.json"))
        .context("loading pipeline config")?;

    std::fs::create_dir_all(root.join("logs")).context("creating logs directory")?;
    let events = EventLog::new(Arc::new(JsonlSink::new(root.join("logs/events.jsonl"))));

    let store = FsStore::open(root.join("models")).context("opening artifact store")?;
    let mut source = LakehouseSource::new(
        root.join("data"),
        config.micro_batch_size,
        events.clone(),
    );

    let mut pipeline = Pipeline::new(&mut source, &contract, &store, &config, events);
    let outcome = pipeline.run().context("pipeline run failed")?;

    match outcome {
        RunOutcome::NoNewData => println!("no new data; nothing to do"),
        RunOutcome::ValidationSkipped => println!("validation skipped: empty buffer"),
        RunOutcome::NothingToTrain => println!("no data after preprocessing"),
        RunOutcome::TrainingSkipped => println!("too few rows to train"),
        RunOutcome::EvaluationSkipped => println!("evaluation skipped"),
        RunOutcome::Completed { promoted } => {
            if promoted {
                println!("model promoted to current");
            } else {
                println!("model registered but not promoted (no improvement)");
            }
        }
    }

    Ok(())
}
