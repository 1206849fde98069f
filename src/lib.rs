//! # entrenar-pipeline: Micro-Batch Retraining Pipeline
//!
//! A small retraining pipeline: pull a micro-batch of tabular rows from a
//! data source, validate them against a schema contract, split
//! features/target, retrain a regression model, evaluate it, register the
//! experiment artifact, and promote the new model to "current" only when it
//! strictly improves the held RMSE.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Poka-Yoke safety**: the validation gate fails loudly before any
//!   training side effect; version allocation is race-free by construction
//! - **Jidoka**: promotion is a pure decision over (candidate, current)
//!   RMSE - equal never promotes
//! - **Muda elimination**: fail-fast orchestration, no retries, no
//!   compensation logic
//!
//! ## Example Usage
//!
//! ```rust
//! use entrenar_pipeline::events::EventLog;
//! use entrenar_pipeline::ingest::MemorySource;
//! use entrenar_pipeline::pipeline::{Pipeline, PipelineConfig};
//! use entrenar_pipeline::schema::SchemaContract;
//! use entrenar_pipeline::store::MemoryStore;
//! use std::collections::HashMap;
//!
//! # fn main() -> entrenar_pipeline::Result<()> {
//! let contract = SchemaContract::new(
//!     vec!["size".to_string()],
//!     "price",
//!     HashMap::new(),
//!     HashMap::new(),
//! )?;
//! let config = PipelineConfig { micro_batch_size: 100, clear_buffer_on_promotion: false };
//! let store = MemoryStore::new();
//! let mut source = MemorySource::new(vec![], 100);
//!
//! let mut pipeline = Pipeline::new(&mut source, &contract, &store, &config, EventLog::null());
//! let outcome = pipeline.run()?;
//! assert!(!outcome.promoted()); // no data, no promotion
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod batch;
pub mod error;
pub mod events;
pub mod ingest;
pub mod pipeline;
pub mod prepare;
pub mod registry;
pub mod schema;
pub mod serving;
pub mod store;
pub mod train;
pub mod validate;

pub use error::{Error, Result};
