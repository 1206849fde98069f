//! Schema Validator - the validation gate in front of retraining
//!
//! Checks an incoming row batch against the schema contract. Fails loudly on
//! contract violations; the single exception is empty input, which returns
//! `Ok(false)` (a skip, not a failure).
//!
//! Checks run in order and short-circuit on the first violation:
//! column presence → nulls → declared types → minimum constraints.

use serde_json::Value;

use crate::batch::Batch;
use crate::events::EventLog;
use crate::schema::{ColumnType, SchemaContract};
use crate::{Error, Result};

/// Validate a batch against the schema contract.
///
/// Returns `Ok(false)` for a zero-row batch (skip), `Ok(true)` when every
/// row passes every check. Emits one structured event per terminal outcome.
///
/// # Errors
///
/// Returns [`Error::SchemaViolation`] for missing columns, null values, or
/// type mismatches, and [`Error::ConstraintViolation`] for values below a
/// declared minimum.
pub fn validate(batch: &Batch, contract: &SchemaContract, events: &EventLog) -> Result<bool> {
    if batch.is_empty() {
        tracing::info!("validation skipped: buffer is empty");
        events.record(
            "validation_skipped",
            serde_json::json!({"reason": "empty_buffer"}),
        );
        return Ok(false);
    }

    let required = contract.required_columns();
    let present = batch.columns();

    // 1. Column presence
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|col| !present.contains(col))
        .collect();
    if !missing.is_empty() {
        tracing::warn!(columns = ?missing, "validation failed: missing columns");
        events.record(
            "validation_failed",
            serde_json::json!({"reason": "missing_columns", "columns": &missing}),
        );
        return Err(Error::SchemaViolation(format!(
            "missing columns: {missing:?}"
        )));
    }

    // 2. Nulls (a key absent from a row counts as null)
    for col in &required {
        let has_null = batch
            .rows()
            .iter()
            .any(|row| matches!(row.get(*col), None | Some(Value::Null)));
        if has_null {
            tracing::warn!(column = col, "validation failed: null values detected");
            events.record(
                "validation_failed",
                serde_json::json!({"reason": "null_values", "column": col}),
            );
            return Err(Error::SchemaViolation(format!(
                "null values detected in column '{col}'"
            )));
        }
    }

    // 3. Declared types
    for (col, expected) in contract.dtypes() {
        if !present.contains(col.as_str()) {
            continue;
        }
        let ok = batch.rows().iter().all(|row| {
            row.get(col)
                .map_or(true, |value| matches_type(value, *expected))
        });
        if !ok {
            tracing::warn!(column = %col, expected = ?expected, "validation failed: type mismatch");
            events.record(
                "validation_failed",
                serde_json::json!({"reason": "type_mismatch", "column": col}),
            );
            return Err(Error::SchemaViolation(format!(
                "column '{col}' does not match declared type {expected:?}"
            )));
        }
    }

    // 4. Minimum constraints (value == min passes)
    for (col, constraint) in contract.constraints() {
        let below_min = batch.rows().iter().any(|row| {
            row.get(col)
                .and_then(Value::as_f64)
                .is_some_and(|v| v < constraint.min)
        });
        if below_min {
            tracing::warn!(column = %col, min = constraint.min, "validation failed: below minimum");
            events.record(
                "validation_failed",
                serde_json::json!({"reason": "min_constraint", "column": col}),
            );
            return Err(Error::ConstraintViolation {
                column: col.clone(),
                minimum: constraint.min,
            });
        }
    }

    tracing::info!(rows = batch.num_rows(), "validation passed");
    events.record(
        "validation_passed",
        serde_json::json!({"rows_validated": batch.num_rows()}),
    );
    Ok(true)
}

/// Whole-number semantics for `Int`, any numeric semantics for `Float`.
fn matches_type(value: &Value, expected: ColumnType) -> bool {
    match expected {
        ColumnType::Int => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
        }
        ColumnType::Float => value.is_number(),
    }
}
