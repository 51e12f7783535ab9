//! # Index Synchronizer
//!
//! Mirrors working-memory fact lifecycle events into the document's
//! annotation index, keeping the index equal to the live, node-originated
//! fact set at all times.
//!
//! Attached to a session after loading completes and before rule evaluation
//! starts. Datum facts (values some rule inserted that never came from a
//! node) are ignored with a diagnostic, never an error; once evaluation has
//! begun, nothing here aborts the run.

use crate::document::Document;
use crate::session::{InsertEvent, MemoryListener, RetractEvent, UpdateEvent};
use std::cell::RefCell;
use std::rc::Rc;

/// Observer that keeps the annotation index consistent with working memory.
pub struct IndexSynchronizer {
    doc: Rc<RefCell<Document>>,
}

impl std::fmt::Debug for IndexSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSynchronizer")
            .field("indexed", &self.doc.borrow().index().len())
            .finish()
    }
}

impl IndexSynchronizer {
    /// Create a synchronizer over the shared document.
    #[must_use]
    pub fn new(doc: Rc<RefCell<Document>>) -> Self {
        Self { doc }
    }
}

impl MemoryListener for IndexSynchronizer {
    fn fact_inserted(&mut self, event: &InsertEvent) {
        match event.payload.node() {
            Some(node) => {
                tracing::debug!(?node, "indexing inserted fact");
                self.doc.borrow_mut().index_mut().add(node);
            }
            None => {
                tracing::warn!(handle = ?event.handle, "cannot index non-node fact");
            }
        }
    }

    fn fact_updated(&mut self, event: &UpdateEvent) {
        let Some(old_node) = event.old.node() else {
            tracing::warn!(handle = ?event.handle, "update of non-node fact ignored");
            return;
        };

        // The old entry always leaves the index: whatever the fact became,
        // it is no longer the node-originated payload that was indexed.
        let mut doc = self.doc.borrow_mut();
        doc.index_mut().remove(old_node);

        match event.new.node() {
            Some(new_node) => {
                tracing::debug!(?old_node, ?new_node, "reindexing updated fact");
                doc.index_mut().add(new_node);
            }
            None => {
                tracing::warn!(
                    ?old_node,
                    handle = ?event.handle,
                    "updated fact is no longer node-originated, index entry dropped"
                );
            }
        }
    }

    fn fact_retracted(&mut self, event: &RetractEvent) {
        match event.payload.node() {
            Some(node) => {
                // Absent entries are a legal no-op (e.g. facts retracted
                // before the synchronizer was attached).
                let removed = self.doc.borrow_mut().index_mut().remove(node);
                tracing::debug!(?node, removed, "unindexing retracted fact");
            }
            None => {
                tracing::debug!(handle = ?event.handle, "retract of non-node fact ignored");
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FactPayload;
    use crate::types::{FactId, NodeId, TypeSystem};

    fn setup() -> (Rc<RefCell<Document>>, IndexSynchronizer) {
        let doc = Rc::new(RefCell::new(Document::new(TypeSystem::new())));
        let sync = IndexSynchronizer::new(doc.clone());
        (doc, sync)
    }

    fn insert(sync: &mut IndexSynchronizer, handle: u64, payload: FactPayload) {
        sync.fact_inserted(&InsertEvent {
            handle: FactId(handle),
            payload,
        });
    }

    #[test]
    fn node_insert_indexed() {
        let (doc, mut sync) = setup();
        insert(&mut sync, 0, FactPayload::Node(NodeId(1)));

        assert!(doc.borrow().index().contains(NodeId(1)));
    }

    #[test]
    fn datum_insert_ignored() {
        let (doc, mut sync) = setup();
        insert(&mut sync, 0, FactPayload::Datum("noise".into()));

        assert!(doc.borrow().index().is_empty());
    }

    #[test]
    fn node_update_swaps_entries_atomically() {
        let (doc, mut sync) = setup();
        insert(&mut sync, 0, FactPayload::Node(NodeId(1)));

        sync.fact_updated(&UpdateEvent {
            handle: FactId(0),
            old: FactPayload::Node(NodeId(1)),
            new: FactPayload::Node(NodeId(2)),
        });

        let doc = doc.borrow();
        assert!(!doc.index().contains(NodeId(1)));
        assert!(doc.index().contains(NodeId(2)));
        assert_eq!(doc.index().len(), 1);
    }

    #[test]
    fn update_to_datum_drops_old_entry() {
        let (doc, mut sync) = setup();
        insert(&mut sync, 0, FactPayload::Node(NodeId(1)));

        sync.fact_updated(&UpdateEvent {
            handle: FactId(0),
            old: FactPayload::Node(NodeId(1)),
            new: FactPayload::Datum("demoted".into()),
        });

        assert!(doc.borrow().index().is_empty());
    }

    #[test]
    fn update_of_datum_fact_leaves_index_untouched() {
        let (doc, mut sync) = setup();
        insert(&mut sync, 0, FactPayload::Node(NodeId(1)));

        sync.fact_updated(&UpdateEvent {
            handle: FactId(7),
            old: FactPayload::Datum("a".into()),
            new: FactPayload::Datum("b".into()),
        });

        assert!(doc.borrow().index().contains(NodeId(1)));
        assert_eq!(doc.borrow().index().len(), 1);
    }

    #[test]
    fn retract_removes_entry() {
        let (doc, mut sync) = setup();
        insert(&mut sync, 0, FactPayload::Node(NodeId(1)));

        sync.fact_retracted(&RetractEvent {
            handle: FactId(0),
            payload: FactPayload::Node(NodeId(1)),
        });

        assert!(doc.borrow().index().is_empty());
    }

    #[test]
    fn retract_of_never_indexed_fact_is_noop() {
        let (doc, mut sync) = setup();

        sync.fact_retracted(&RetractEvent {
            handle: FactId(0),
            payload: FactPayload::Node(NodeId(5)),
        });
        sync.fact_retracted(&RetractEvent {
            handle: FactId(1),
            payload: FactPayload::Datum("x".into()),
        });

        assert!(doc.borrow().index().is_empty());
    }
}
