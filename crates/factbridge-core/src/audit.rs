//! # Execution Audit Log
//!
//! Optional fact-level activity log for a run. The logger is a plain
//! [`MemoryListener`]: it buffers one record per lifecycle event and, after
//! evaluation completes, serializes the buffer to the configured path as
//! JSON lines.
//!
//! Destination handling at initialization: the parent directory is created
//! up front, and failure to create it is fatal — except the "no parent
//! component, nothing to create" case, which is tolerated silently.

use crate::session::{FactPayload, InsertEvent, MemoryListener, RetractEvent, UpdateEvent};
use crate::types::BridgeError;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One serialized lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Position of the event within the run.
    pub seq: u64,
    /// Event kind: `insert`, `update` or `retract`.
    pub kind: String,
    /// Handle of the affected fact.
    pub fact: u64,
    /// Human-readable payload description.
    pub payload: String,
}

fn describe(payload: &FactPayload) -> String {
    match payload {
        FactPayload::Node(id) => format!("node:{}", id.0),
        FactPayload::Datum(text) => format!("datum:{text}"),
    }
}

/// Buffering audit logger, flushed once per run.
#[derive(Debug)]
pub struct FileAuditLogger {
    path: PathBuf,
    records: Vec<AuditRecord>,
    next_seq: u64,
}

impl FileAuditLogger {
    /// Create a logger targeting `path`, preparing the destination
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] if the parent directory cannot be
    /// created. A path without a parent component has nothing to create and
    /// is accepted as-is.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, BridgeError> {
        let path = path.into();
        Self::prepare(&path)?;
        Ok(Self {
            path,
            records: Vec::new(),
            next_seq: 0,
        })
    }

    /// Create the destination's parent directory. Used to fail fast at
    /// initialization, before any fact is inserted.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] if the directory cannot be created.
    pub fn prepare(path: &Path) -> Result<(), BridgeError> {
        match path.parent() {
            // Nothing to create; the path is a bare file name.
            None => Ok(()),
            Some(parent) if parent.as_os_str().is_empty() => Ok(()),
            Some(parent) => std::fs::create_dir_all(parent).map_err(|e| {
                BridgeError::Io(format!(
                    "cannot create audit log directory '{}': {e}",
                    parent.display()
                ))
            }),
        }
    }

    /// Records buffered so far.
    #[must_use]
    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    /// Serialize the buffered records to the configured path, one JSON
    /// object per line.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Serialization`] or [`BridgeError::Io`].
    pub fn write_to_disk(&self) -> Result<(), BridgeError> {
        let mut out = Vec::new();
        for record in &self.records {
            let line = serde_json::to_string(record)
                .map_err(|e| BridgeError::Serialization(e.to_string()))?;
            out.extend_from_slice(line.as_bytes());
            out.push(b'\n');
        }

        let mut file = std::fs::File::create(&self.path).map_err(|e| {
            BridgeError::Io(format!(
                "cannot create audit log '{}': {e}",
                self.path.display()
            ))
        })?;
        file.write_all(&out)
            .map_err(|e| BridgeError::Io(format!("cannot write audit log: {e}")))
    }

    fn push(&mut self, kind: &str, fact: u64, payload: String) {
        self.records.push(AuditRecord {
            seq: self.next_seq,
            kind: kind.to_string(),
            fact,
            payload,
        });
        self.next_seq = self.next_seq.saturating_add(1);
    }
}

impl MemoryListener for FileAuditLogger {
    fn fact_inserted(&mut self, event: &InsertEvent) {
        self.push("insert", event.handle.0, describe(&event.payload));
    }

    fn fact_updated(&mut self, event: &UpdateEvent) {
        let payload = format!("{} -> {}", describe(&event.old), describe(&event.new));
        self.push("update", event.handle.0, payload);
    }

    fn fact_retracted(&mut self, event: &RetractEvent) {
        self.push("retract", event.handle.0, describe(&event.payload));
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FactId, NodeId};

    #[test]
    fn bare_file_name_needs_no_directory() {
        let logger = FileAuditLogger::create("audit.log");
        assert!(logger.is_ok());
    }

    #[test]
    fn missing_parent_directory_created() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logs").join("audit.log");

        let logger = FileAuditLogger::create(&path).expect("create");
        logger.write_to_disk().expect("write");

        assert!(path.exists());
    }

    #[test]
    fn records_carry_sequence_and_kind() {
        let mut logger = FileAuditLogger::create("audit.log").expect("create");

        logger.fact_inserted(&InsertEvent {
            handle: FactId(0),
            payload: FactPayload::Node(NodeId(3)),
        });
        logger.fact_retracted(&RetractEvent {
            handle: FactId(0),
            payload: FactPayload::Node(NodeId(3)),
        });

        let records = logger.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seq, 0);
        assert_eq!(records[0].kind, "insert");
        assert_eq!(records[0].payload, "node:3");
        assert_eq!(records[1].seq, 1);
        assert_eq!(records[1].kind, "retract");
    }

    #[test]
    fn written_file_is_json_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audit.log");
        let mut logger = FileAuditLogger::create(&path).expect("create");

        logger.fact_inserted(&InsertEvent {
            handle: FactId(1),
            payload: FactPayload::Datum("hello".into()),
        });
        logger.write_to_disk().expect("write");

        let contents = std::fs::read_to_string(&path).expect("read");
        let record: AuditRecord =
            serde_json::from_str(contents.trim()).expect("parse");
        assert_eq!(record.payload, "datum:hello");
    }
}
