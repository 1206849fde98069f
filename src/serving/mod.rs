//! Serving - the active model handle
//!
//! Holds the currently promoted model behind an explicitly owned,
//! atomically-swappable reference cell. A reload builds a fresh
//! [`ActiveModel`] from the store first and swaps the `Arc` in a single
//! write, so an in-flight prediction never observes a half-replaced model.
//! Reloads happen only on an explicit request, never by file-watching.

use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::batch::Row;
use crate::schema::SchemaContract;
use crate::store::ArtifactStore;
use crate::train::LinearModel;
use crate::{Error, Result};

/// A fully-loaded promoted model plus its version.
#[derive(Debug)]
pub struct ActiveModel {
    version: u32,
    model: LinearModel,
}

impl ActiveModel {
    /// The promoted version this model was loaded from.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// The loaded model.
    #[must_use]
    pub const fn model(&self) -> &LinearModel {
        &self.model
    }
}

/// Single-row prediction server over the artifact store.
pub struct ModelServer<'a> {
    store: &'a dyn ArtifactStore,
    contract: SchemaContract,
    active: RwLock<Option<Arc<ActiveModel>>>,
}

impl<'a> ModelServer<'a> {
    /// Create a server with no model loaded. Call [`Self::reload`] to pick
    /// up the current pointer.
    #[must_use]
    pub fn new(store: &'a dyn ArtifactStore, contract: SchemaContract) -> Self {
        Self {
            store,
            contract,
            active: RwLock::new(None),
        }
    }

    /// Reload the active model from the store's current pointer.
    ///
    /// Returns the now-active version, or `None` when the pointer is unset
    /// (in which case any previously loaded model is dropped).
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read or the artifact cannot be
    /// deserialized.
    pub fn reload(&self) -> Result<Option<u32>> {
        // Build the replacement fully before touching the cell.
        let fresh = match self.store.current_version()? {
            Some(version) => {
                let bytes = self.store.version_model(version)?.ok_or_else(|| {
                    Error::Storage(format!(
                        "current pointer references missing model for v{version}"
                    ))
                })?;
                let model = LinearModel::from_bytes(&bytes)?;
                Some(Arc::new(ActiveModel { version, model }))
            }
            None => None,
        };

        let version = fresh.as_ref().map(|active| active.version);
        *self.cell_write()? = fresh;

        tracing::info!(?version, "active model reloaded");
        Ok(version)
    }

    /// The currently active model, if any.
    ///
    /// # Errors
    ///
    /// Returns error only if the cell is poisoned.
    pub fn active(&self) -> Result<Option<Arc<ActiveModel>>> {
        Ok(self.cell_read()?.clone())
    }

    /// The currently active version, if any.
    ///
    /// # Errors
    ///
    /// Returns error only if the cell is poisoned.
    pub fn active_version(&self) -> Result<Option<u32>> {
        Ok(self.cell_read()?.as_ref().map(|active| active.version))
    }

    /// Predict a single target value for one feature row.
    ///
    /// Returns `Ok(None)` when no model is available.
    ///
    /// # Errors
    ///
    /// Returns error if the row is missing a feature or carries a
    /// non-numeric value.
    pub fn predict(&self, row: &Row) -> Result<Option<f64>> {
        let Some(active) = self.active()? else {
            return Ok(None);
        };

        let mut features = Vec::with_capacity(self.contract.features().len());
        for col in self.contract.features() {
            let value = row.get(col).and_then(Value::as_f64).ok_or_else(|| {
                Error::SchemaViolation(format!("feature '{col}' is missing or non-numeric"))
            })?;
            features.push(value);
        }

        Ok(Some(active.model.predict(&features)))
    }

    fn cell_read(&self) -> Result<std::sync::RwLockReadGuard<'_, Option<Arc<ActiveModel>>>> {
        self.active
            .read()
            .map_err(|_| Error::Other("active model cell poisoned".to_string()))
    }

    fn cell_write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Option<Arc<ActiveModel>>>> {
        self.active
            .write()
            .map_err(|_| Error::Other("active model cell poisoned".to_string()))
    }
}
