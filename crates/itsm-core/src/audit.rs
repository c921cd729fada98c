//! Append-only trail of link and unlink operations.
//!
//! Sinks are fire-and-forget: [`AuditSink::append`] cannot fail, and a sink
//! that hits an I/O problem logs it and moves on. Nothing in the graph reads
//! the trail back, so a broken sink never changes the outcome of a link
//! operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// One entry in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    /// Operator or system component that made the change.
    pub actor: String,
    /// Short action text, e.g. `"Linked CHG-456"`.
    pub action: String,
    /// Entity the action was recorded against.
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditEntry {
    #[must_use]
    pub fn new(actor: &str, action: impl Into<String>, target_id: &str) -> Self {
        Self {
            at: Utc::now(),
            actor: actor.to_string(),
            action: action.into(),
            target_id: target_id.to_string(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub trait AuditSink {
    fn append(&self, entry: AuditEntry);
}

impl<T: AuditSink + ?Sized> AuditSink for Arc<T> {
    fn append(&self, entry: AuditEntry) {
        (**self).append(entry);
    }
}

impl<T: AuditSink + ?Sized> AuditSink for Box<T> {
    fn append(&self, entry: AuditEntry) {
        (**self).append(entry);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn append(&self, _entry: AuditEntry) {}
}

/// Emits each entry as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn append(&self, entry: AuditEntry) {
        info!(
            actor = %entry.actor,
            target = %entry.target_id,
            details = entry.details.as_deref().unwrap_or(""),
            "audit: {}",
            entry.action
        );
    }
}

/// Bounded in-memory log. The oldest entries are dropped past `capacity`.
#[derive(Debug)]
pub struct MemoryAuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl MemoryAuditLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of the retained entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Entries recorded against one entity, oldest first.
    #[must_use]
    pub fn for_target(&self, target_id: &str) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.target_id == target_id)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, entry: AuditEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct JsonlAuditSink {
    path: PathBuf,
}

impl JsonlAuditSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write_line(&self, entry: &AuditEntry) -> std::io::Result<()> {
        let line = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }

    /// Read back every entry in the file. Malformed lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn read_all(&self) -> std::io::Result<Vec<AuditEntry>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

impl AuditSink for JsonlAuditSink {
    fn append(&self, entry: AuditEntry) {
        if let Err(e) = self.write_line(&entry) {
            warn!(
                path = %self.path.display(),
                action = %entry.action,
                "audit write failed (ignored): {e}"
            );
        }
    }
}

/// Forwards every entry to several sinks.
#[derive(Default)]
pub struct FanoutAuditSink {
    sinks: Vec<Box<dyn AuditSink>>,
}

impl FanoutAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: impl AuditSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AuditSink for FanoutAuditSink {
    fn append(&self, entry: AuditEntry) {
        for sink in &self.sinks {
            sink.append(entry.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_log_is_bounded() {
        let log = MemoryAuditLog::new(2);
        log.append(AuditEntry::new("ops", "Linked CHG-1", "INC-001"));
        log.append(AuditEntry::new("ops", "Linked CHG-2", "INC-001"));
        log.append(AuditEntry::new("ops", "Linked CHG-3", "INC-001"));

        let actions: Vec<String> = log.entries().into_iter().map(|e| e.action).collect();
        assert_eq!(actions, vec!["Linked CHG-2", "Linked CHG-3"]);
    }

    #[test]
    fn memory_log_filters_by_target() {
        let log = MemoryAuditLog::default();
        log.append(AuditEntry::new("ops", "Linked CHG-1", "INC-001"));
        log.append(AuditEntry::new("ops", "Linked KB-1", "INC-002"));
        assert_eq!(log.for_target("INC-002").len(), 1);
    }

    #[test]
    fn jsonl_sink_appends_lines() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlAuditSink::new(dir.path().join("audit.jsonl"));

        sink.append(AuditEntry::new("ops", "Linked CHG-456", "INC-001"));
        sink.append(
            AuditEntry::new("ops", "Unlinked CHG-456", "INC-001").with_details("cleanup"),
        );

        let entries = sink.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].details.as_deref(), Some("cleanup"));
    }

    #[test]
    fn jsonl_sink_swallows_write_failures() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be opened for append.
        let sink = JsonlAuditSink::new(dir.path());
        sink.append(AuditEntry::new("ops", "Linked CHG-456", "INC-001"));
    }

    #[test]
    fn jsonl_read_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlAuditSink::new(dir.path().join("nope.jsonl"));
        assert!(sink.read_all().unwrap().is_empty());
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = Arc::new(MemoryAuditLog::default());
        let b = Arc::new(MemoryAuditLog::default());
        let fanout = FanoutAuditSink::new()
            .with(Arc::clone(&a))
            .with(Arc::clone(&b))
            .with(NullAuditSink);

        fanout.append(AuditEntry::new("ops", "Parent removed", "INC-003"));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(fanout.len(), 3);
    }
}
