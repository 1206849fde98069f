//! Schema-driven feature/target split
//!
//! Turns a validated batch into a numeric feature matrix X (one row per
//! batch row, columns in contract feature order) and a target vector y.

use serde_json::Value;

use crate::batch::Batch;
use crate::events::EventLog;
use crate::schema::SchemaContract;
use crate::{Error, Result};

/// Feature matrix and target vector for one training pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSplit {
    /// One row of feature values per batch row, in contract feature order.
    pub x: Vec<Vec<f64>>,
    /// Target value per batch row.
    pub y: Vec<f64>,
}

impl FeatureSplit {
    /// Check if the split carries no rows (preprocessing skipped).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Split a batch into features and target according to the contract.
///
/// An empty batch yields an empty split (skip, not a failure). In the
/// orchestrated path the batch has already passed validation, so missing
/// columns or non-numeric values here indicate a caller bug and fail with
/// [`Error::SchemaViolation`].
///
/// # Errors
///
/// Returns error if a required column is absent or a value is not numeric.
pub fn split_features(
    batch: &Batch,
    contract: &SchemaContract,
    events: &EventLog,
) -> Result<FeatureSplit> {
    if batch.is_empty() {
        tracing::info!("preprocessing skipped: buffer is empty");
        events.record(
            "preprocess_skipped",
            serde_json::json!({"reason": "empty_buffer"}),
        );
        return Ok(FeatureSplit::default());
    }

    let mut split = FeatureSplit {
        x: Vec::with_capacity(batch.num_rows()),
        y: Vec::with_capacity(batch.num_rows()),
    };

    for row in batch.rows() {
        let mut features = Vec::with_capacity(contract.features().len());
        for col in contract.features() {
            features.push(numeric(row.get(col), col)?);
        }
        split.x.push(features);
        split.y.push(numeric(row.get(contract.target()), contract.target())?);
    }

    tracing::info!(rows = batch.num_rows(), "preprocessing completed");
    events.record(
        "preprocess_completed",
        serde_json::json!({"rows_processed": batch.num_rows()}),
    );

    Ok(split)
}

fn numeric(value: Option<&Value>, col: &str) -> Result<f64> {
    value
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::SchemaViolation(format!("column '{col}' is missing or non-numeric")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Row;
    use std::collections::HashMap;

    fn contract() -> SchemaContract {
        SchemaContract::new(
            vec!["size".to_string(), "age".to_string()],
            "price",
            HashMap::new(),
            HashMap::new(),
        )
        .unwrap()
    }

    fn row(size: f64, age: f64, price: f64) -> Row {
        let mut row = Row::new();
        row.insert("size".to_string(), Value::from(size));
        row.insert("age".to_string(), Value::from(age));
        row.insert("price".to_string(), Value::from(price));
        row
    }

    #[test]
    fn test_empty_batch_yields_empty_split() {
        let events = EventLog::null();
        let split = split_features(&Batch::new(), &contract(), &events).unwrap();
        assert!(split.is_empty());
    }

    #[test]
    fn test_split_preserves_feature_order() {
        let events = EventLog::null();
        let batch = Batch::from_rows(vec![row(800.0, 5.0, 120_000.0)]);
        let split = split_features(&batch, &contract(), &events).unwrap();

        assert_eq!(split.x, vec![vec![800.0, 5.0]]);
        assert_eq!(split.y, vec![120_000.0]);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let events = EventLog::null();
        let mut partial = Row::new();
        partial.insert("size".to_string(), Value::from(800.0));
        partial.insert("price".to_string(), Value::from(1.0));
        let batch = Batch::from_rows(vec![partial]);

        let err = split_features(&batch, &contract(), &events).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
        assert!(err.to_string().contains("age"));
    }
}
