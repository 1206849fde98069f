//! Row batch representation
//!
//! A batch is a bounded set of rows pulled for one pipeline run. Rows are
//! JSON objects (column name → value); the batch column set is the union of
//! row keys, and a key absent from a row counts as null for that row.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::Result;

/// One row: column name → value.
pub type Row = Map<String, Value>;

/// A bounded table of rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    rows: Vec<Row>,
}

impl Batch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a batch from rows.
    #[must_use]
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Parse a batch from JSONL text (one JSON object per non-empty line).
    ///
    /// # Errors
    ///
    /// Returns error if any line is not a JSON object.
    pub fn from_jsonl(text: &str) -> Result<Self> {
        let mut rows = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line)?;
            match value {
                Value::Object(row) => rows.push(row),
                other => {
                    return Err(crate::Error::Storage(format!(
                        "batch line is not a JSON object: {other}"
                    )))
                }
            }
        }
        Ok(Self { rows })
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Check if the batch has zero rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Append a row.
    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Column set of the batch: the union of keys across all rows.
    #[must_use]
    pub fn columns(&self) -> BTreeSet<&str> {
        self.rows
            .iter()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect()
    }
}

impl FromIterator<Row> for Batch {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_empty_batch() {
        let batch = Batch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.num_rows(), 0);
        assert!(batch.columns().is_empty());
    }

    #[test]
    fn test_columns_are_union_of_row_keys() {
        let batch = Batch::from_rows(vec![
            row(&[("a", Value::from(1))]),
            row(&[("b", Value::from(2))]),
        ]);
        let columns: Vec<_> = batch.columns().into_iter().collect();
        assert_eq!(columns, vec!["a", "b"]);
    }

    #[test]
    fn test_from_jsonl_skips_blank_lines() {
        let text = "{\"a\": 1}\n\n{\"a\": 2}\n";
        let batch = Batch::from_jsonl(text).unwrap();
        assert_eq!(batch.num_rows(), 2);
    }

    #[test]
    fn test_from_jsonl_rejects_non_object() {
        let result = Batch::from_jsonl("[1, 2, 3]\n");
        assert!(result.is_err());
    }
}
