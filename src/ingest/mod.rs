//! Batch ingestion - micro-batch pulls from a lakehouse into a buffer
//!
//! A [`BatchSource`] supplies the pipeline with a transient row buffer. The
//! durable [`LakehouseSource`] slices `micro_batch_size` rows from a JSONL
//! lakehouse file at a persisted pointer cursor, appends them to a JSONL
//! buffer, and advances the pointer. [`MemorySource`] mirrors the same
//! semantics in memory for tests.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::batch::{Batch, Row};
use crate::events::EventLog;
use crate::{Error, Result};

/// Supplier of row batches for pipeline runs.
pub trait BatchSource {
    /// Pull the next micro-batch into the buffer. Returns rows pulled
    /// (0 means no new data - a normal early exit, not an error).
    ///
    /// # Errors
    ///
    /// Returns error if the underlying storage cannot be read or written.
    fn pull(&mut self) -> Result<usize>;

    /// The accumulated buffer contents.
    ///
    /// # Errors
    ///
    /// Returns error if the buffer cannot be read.
    fn buffer(&self) -> Result<Batch>;

    /// Drop the transient buffer.
    ///
    /// # Errors
    ///
    /// Returns error if the buffer cannot be removed.
    fn clear_buffer(&mut self) -> Result<()>;
}

/// File-backed source: JSONL lakehouse + pointer cursor + append buffer.
pub struct LakehouseSource {
    lakehouse_path: PathBuf,
    buffer_path: PathBuf,
    pointer_path: PathBuf,
    micro_batch_size: usize,
    events: EventLog,
}

impl LakehouseSource {
    /// Create a source over a data directory holding `lakehouse.jsonl`,
    /// `buffer.jsonl`, and `pointer.txt`.
    #[must_use]
    pub fn new(data_dir: impl AsRef<Path>, micro_batch_size: usize, events: EventLog) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            lakehouse_path: data_dir.join("lakehouse.jsonl"),
            buffer_path: data_dir.join("buffer.jsonl"),
            pointer_path: data_dir.join("pointer.txt"),
            micro_batch_size,
            events,
        }
    }

    fn pointer(&self) -> Result<usize> {
        match fs::read_to_string(&self.pointer_path) {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(0);
                }
                text.parse()
                    .map_err(|_| Error::Storage(format!("malformed pointer: '{text}'")))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    fn lakehouse(&self) -> Result<Batch> {
        let text = fs::read_to_string(&self.lakehouse_path).map_err(|e| {
            Error::Storage(format!(
                "failed to read lakehouse {}: {e}",
                self.lakehouse_path.display()
            ))
        })?;
        Batch::from_jsonl(&text)
    }
}

impl BatchSource for LakehouseSource {
    fn pull(&mut self) -> Result<usize> {
        let pointer = self.pointer()?;
        let lakehouse = self.lakehouse()?;

        if pointer >= lakehouse.num_rows() {
            tracing::info!(pointer, "no new data available in lakehouse");
            self.events
                .record("no_data", serde_json::json!({"pointer": pointer}));
            return Ok(0);
        }

        let end = (pointer + self.micro_batch_size).min(lakehouse.num_rows());
        let slice = &lakehouse.rows()[pointer..end];

        let mut buffer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.buffer_path)?;
        for row in slice {
            let line = serde_json::to_string(row)?;
            writeln!(buffer, "{line}")?;
        }

        fs::write(&self.pointer_path, end.to_string())?;

        let rows_pulled = slice.len();
        tracing::info!(rows_pulled, "ingested rows into buffer");
        self.events.record(
            "data_ingested",
            serde_json::json!({
                "rows_pulled": rows_pulled,
                "pointer_before": pointer,
                "pointer_after": end,
            }),
        );

        Ok(rows_pulled)
    }

    fn buffer(&self) -> Result<Batch> {
        match fs::read_to_string(&self.buffer_path) {
            Ok(text) => Batch::from_jsonl(&text),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Batch::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn clear_buffer(&mut self) -> Result<()> {
        match fs::remove_file(&self.buffer_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory source with the same cursor semantics, for tests.
pub struct MemorySource {
    rows: Vec<Row>,
    pointer: usize,
    buffer: Vec<Row>,
    micro_batch_size: usize,
}

impl MemorySource {
    /// Create a source over an in-memory lakehouse.
    #[must_use]
    pub fn new(rows: Vec<Row>, micro_batch_size: usize) -> Self {
        Self {
            rows,
            pointer: 0,
            buffer: Vec::new(),
            micro_batch_size,
        }
    }
}

impl BatchSource for MemorySource {
    fn pull(&mut self) -> Result<usize> {
        if self.pointer >= self.rows.len() {
            return Ok(0);
        }
        let end = (self.pointer + self.micro_batch_size).min(self.rows.len());
        self.buffer.extend_from_slice(&self.rows[self.pointer..end]);
        let pulled = end - self.pointer;
        self.pointer = end;
        Ok(pulled)
    }

    fn buffer(&self) -> Result<Batch> {
        Ok(Batch::from_rows(self.buffer.clone()))
    }

    fn clear_buffer(&mut self) -> Result<()> {
        self.buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn row(n: i64) -> Row {
        let mut row = Row::new();
        row.insert("n".to_string(), Value::from(n));
        row
    }

    fn write_lakehouse(dir: &Path, rows: usize) {
        let mut text = String::new();
        for i in 0..rows {
            text.push_str(&format!("{{\"n\": {i}}}\n"));
        }
        fs::write(dir.join("lakehouse.jsonl"), text).unwrap();
    }

    #[test]
    fn test_lakehouse_pull_advances_pointer() {
        let dir = tempfile::tempdir().unwrap();
        write_lakehouse(dir.path(), 5);
        let mut source = LakehouseSource::new(dir.path(), 2, EventLog::null());

        assert_eq!(source.pull().unwrap(), 2);
        assert_eq!(source.pull().unwrap(), 2);
        assert_eq!(source.pull().unwrap(), 1);
        assert_eq!(source.pull().unwrap(), 0);

        assert_eq!(source.buffer().unwrap().num_rows(), 5);
    }

    #[test]
    fn test_lakehouse_buffer_accumulates_across_pulls() {
        let dir = tempfile::tempdir().unwrap();
        write_lakehouse(dir.path(), 4);
        let mut source = LakehouseSource::new(dir.path(), 3, EventLog::null());

        source.pull().unwrap();
        assert_eq!(source.buffer().unwrap().num_rows(), 3);
        source.pull().unwrap();
        assert_eq!(source.buffer().unwrap().num_rows(), 4);
    }

    #[test]
    fn test_lakehouse_clear_buffer() {
        let dir = tempfile::tempdir().unwrap();
        write_lakehouse(dir.path(), 2);
        let mut source = LakehouseSource::new(dir.path(), 2, EventLog::null());

        source.pull().unwrap();
        source.clear_buffer().unwrap();
        assert!(source.buffer().unwrap().is_empty());
        // Clearing an already-empty buffer is a no-op.
        source.clear_buffer().unwrap();
    }

    #[test]
    fn test_missing_lakehouse_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = LakehouseSource::new(dir.path(), 2, EventLog::null());
        assert!(matches!(source.pull(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_memory_source_mirrors_cursor_semantics() {
        let mut source = MemorySource::new(vec![row(1), row(2), row(3)], 2);

        assert_eq!(source.pull().unwrap(), 2);
        assert_eq!(source.pull().unwrap(), 1);
        assert_eq!(source.pull().unwrap(), 0);
        assert_eq!(source.buffer().unwrap().num_rows(), 3);

        source.clear_buffer().unwrap();
        assert!(source.buffer().unwrap().is_empty());
    }
}
