//! Best-effort structured event log
//!
//! Every pipeline step emits one structured event per terminal outcome
//! (`validation_passed`, `model_promoted`, ...). Events flow to an
//! [`EventSink`]; the human-readable log goes through `tracing`.
//!
//! Design contract: sink failure must be unobservable to callers. The
//! [`EventLog`] wrapper drops sink errors on the floor (after a `tracing`
//! warning), so logging can never be the cause of a pipeline failure.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// A single structured event record.
///
/// Serialized as one JSON object per line (JSONL) by [`JsonlSink`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    timestamp: DateTime<Utc>,
    event: String,
    data: serde_json::Value,
}

impl Event {
    /// Create a new event with the current timestamp.
    #[must_use]
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            event: event.into(),
            data,
        }
    }

    /// Get the event name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.event
    }

    /// Get the event payload.
    #[must_use]
    pub const fn data(&self) -> &serde_json::Value {
        &self.data
    }

    /// Get the event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Sink accepting structured event records.
pub trait EventSink: Send + Sync {
    /// Append one event to the sink.
    ///
    /// # Errors
    ///
    /// Returns error if the sink cannot accept the event. Callers going
    /// through [`EventLog`] never observe this error.
    fn emit(&self, event: &Event) -> Result<()>;
}

/// Append-only JSONL file sink (one JSON object per line).
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a sink appending to the given file path.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl EventSink for JsonlSink {
    fn emit(&self, event: &Event) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

/// In-memory sink retaining events, for tests and inspection.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    /// Create an empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events emitted so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Names of all events emitted so far, in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &Event) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| crate::Error::Other("event sink poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}

/// Sink that discards everything.
#[derive(Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &Event) -> Result<()> {
        Ok(())
    }
}

/// Result-ignoring wrapper around an [`EventSink`].
///
/// `record` never fails and never panics; a failing sink degrades to a
/// `tracing` warning.
#[derive(Clone)]
pub struct EventLog {
    sink: Arc<dyn EventSink>,
}

impl EventLog {
    /// Wrap a sink in the best-effort logger.
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// An event log that discards all events.
    #[must_use]
    pub fn null() -> Self {
        Self::new(Arc::new(NullSink))
    }

    /// Record one structured event. Best-effort: sink errors are swallowed.
    pub fn record(&self, name: &str, data: serde_json::Value) {
        let event = Event::new(name, data);
        if let Err(err) = self.sink.emit(&event) {
            tracing::warn!(event = name, error = %err, "event sink write failed");
        }
    }
}
