//! Artifact store - durable home for experiment and promoted artifacts
//!
//! The store keeps two spaces:
//! - **experiments**: immutable (model bytes, metrics JSON) pairs addressed
//!   by experiment identifier, written by the registry and never mutated.
//! - **promoted**: numbered versions plus the single mutable "current
//!   version" slot, written only through [`ArtifactStore::publish_version`].
//!
//! Metrics travel through the store as raw JSON bytes so a registry write
//! followed by a promotion read round-trips byte-identically.
//!
//! `publish_version` is the atomic "allocate next version and publish"
//! operation: two racing publishers can never end up sharing a version
//! number (Poka-Yoke against the read-max-then-write race).

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use crate::Result;

/// Durable key → (model bytes, metrics JSON) storage.
pub trait ArtifactStore: Send + Sync {
    /// Persist an experiment's model and metrics together as one immutable
    /// unit: both are stored or neither.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure or if the identifier already exists
    /// (experiment records are never overwritten).
    fn put_experiment(&self, id: &str, model: &[u8], metrics_json: &[u8]) -> Result<()>;

    /// Load an experiment's (model bytes, metrics JSON) pair.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn experiment(&self, id: &str) -> Result<Option<(Vec<u8>, Vec<u8>)>>;

    /// Check whether an experiment identifier is already taken.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn experiment_exists(&self, id: &str) -> Result<bool>;

    /// Allocate the next version number (max existing + 1) and publish the
    /// model + metrics pair under it, atomically.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn publish_version(&self, model: &[u8], metrics_json: &[u8]) -> Result<u32>;

    /// Load a promoted version's model bytes.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn version_model(&self, version: u32) -> Result<Option<Vec<u8>>>;

    /// Load a promoted version's metrics JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn version_metrics(&self, version: u32) -> Result<Option<Vec<u8>>>;

    /// All promoted version numbers, ascending.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn versions(&self) -> Result<Vec<u32>>;

    /// The current version slot, `None` until the first promotion.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure.
    fn current_version(&self) -> Result<Option<u32>>;

    /// Atomically repoint the current version slot.
    ///
    /// # Errors
    ///
    /// Returns error on storage failure or if the version does not exist
    /// (the pointer must never dangle).
    fn set_current(&self, version: u32) -> Result<()>;
}
