//! Schema contract - declarative column/type/constraint rules
//!
//! The contract governs what a valid batch looks like: an ordered feature
//! list, one target column, per-column declared types, and per-column value
//! constraints (currently: minimum value).
//!
//! Contract-level invariants are checked at construction (Poka-Yoke: a
//! malformed contract never reaches the validator):
//! - features and target are disjoint
//! - every constrained column is also a declared column

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Whole-number semantics (i64/u64, or f64 with zero fraction)
    Int,
    /// Any numeric semantics
    Float,
}

/// Per-column value constraint set. Currently minimum value only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnConstraint {
    /// Inclusive minimum: a value exactly equal to `min` passes.
    pub min: f64,
}

/// Schema contract for incoming row batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawContract")]
pub struct SchemaContract {
    features: Vec<String>,
    target: String,
    dtypes: HashMap<String, ColumnType>,
    constraints: HashMap<String, ColumnConstraint>,
}

/// Wire form of the contract, validated on conversion.
#[derive(Debug, Deserialize)]
struct RawContract {
    features: Vec<String>,
    target: String,
    #[serde(default)]
    dtypes: HashMap<String, ColumnType>,
    #[serde(default)]
    constraints: HashMap<String, ColumnConstraint>,
}

impl TryFrom<RawContract> for SchemaContract {
    type Error = Error;

    fn try_from(raw: RawContract) -> Result<Self> {
        SchemaContract::new(raw.features, raw.target, raw.dtypes, raw.constraints)
    }
}

impl SchemaContract {
    /// Construct a contract, checking contract-level invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContract`] if the target appears in the
    /// feature list or a constrained column is not declared.
    pub fn new(
        features: Vec<String>,
        target: impl Into<String>,
        dtypes: HashMap<String, ColumnType>,
        constraints: HashMap<String, ColumnConstraint>,
    ) -> Result<Self> {
        let target = target.into();

        if features.iter().any(|f| *f == target) {
            return Err(Error::InvalidContract(format!(
                "target column '{target}' also appears in features"
            )));
        }

        for col in constraints.keys() {
            if *col != target && !features.contains(col) {
                return Err(Error::InvalidContract(format!(
                    "constrained column '{col}' is not a declared column"
                )));
            }
        }

        Ok(Self {
            features,
            target,
            dtypes,
            constraints,
        })
    }

    /// Load a contract from a JSON document with keys `features`, `target`,
    /// `dtypes`, `constraints`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or violates the
    /// contract invariants.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Storage(format!(
                "failed to read schema contract {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let contract: Self = serde_json::from_str(&content)?;
        Ok(contract)
    }

    /// Ordered feature column names.
    #[must_use]
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Target column name.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Declared column types.
    #[must_use]
    pub const fn dtypes(&self) -> &HashMap<String, ColumnType> {
        &self.dtypes
    }

    /// Declared column constraints.
    #[must_use]
    pub const fn constraints(&self) -> &HashMap<String, ColumnConstraint> {
        &self.constraints
    }

    /// All required columns: features followed by the target.
    #[must_use]
    pub fn required_columns(&self) -> Vec<&str> {
        self.features
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.target.as_str()))
            .collect()
    }
}
