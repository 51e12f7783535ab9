//! # Graph Fact Loader
//!
//! Walks the annotation document from a root node and commits every
//! reachable structured node to working memory as a fact.
//!
//! The walk is depth-first, pre-order (a parent's fact is inserted before
//! its children are visited) and follows feature declaration order.
//! Collection-valued features are traversed element by element, in
//! collection order.
//!
//! Two guards keep the walk finite on shared substructure and cycles:
//! - an explicit visited set keyed by node identity, checked before
//!   descending — a node is walked at most once per loader instance;
//! - the fact-count check: if the store's count did not grow after an
//!   insertion (store-level dedup, pre-populated memory), descent into that
//!   node's children stops. This is normal early termination, not an error.

use crate::document::Document;
use crate::session::{FactPayload, WorkingMemory};
use crate::types::{FieldValue, NodeId};
use std::collections::BTreeSet;

/// Recursive, cycle-safe, duplicate-avoiding fact loader.
///
/// The visited set persists across `load` calls, so loading several roots
/// of the same document through one loader never double-inserts shared
/// substructure.
#[derive(Debug, Default)]
pub struct GraphFactLoader {
    visited: BTreeSet<NodeId>,
}

impl GraphFactLoader {
    /// Create a loader with an empty visited set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes walked so far.
    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Insert every structured node reachable from `root` into the session.
    ///
    /// A `None` root is a no-op, as is a primitive-typed root. Malformed
    /// graphs never raise an error: dangling references are warn-logged and
    /// skipped.
    pub fn load<W: WorkingMemory>(
        &mut self,
        session: &mut W,
        doc: &Document,
        root: Option<NodeId>,
    ) {
        let Some(root) = root else {
            return;
        };
        self.visit(session, doc, root);
    }

    fn visit<W: WorkingMemory>(&mut self, session: &mut W, doc: &Document, id: NodeId) {
        let Some(record) = doc.node(id) else {
            tracing::warn!(?id, "dangling node reference skipped");
            return;
        };

        // Primitive-typed values never become facts.
        if doc.type_system().is_primitive(record.type_id) {
            return;
        }

        // Each node is walked at most once, whatever the store does.
        if !self.visited.insert(id) {
            return;
        }

        tracing::debug!(?id, type_name = doc.type_name(id), "inserting node fact");
        let count_before = session.fact_count();
        session.insert(FactPayload::Node(id));

        // The store deduplicated the insertion: the subtree was already
        // committed, stop descending.
        if session.fact_count() == count_before {
            return;
        }

        for field in &record.fields {
            match field {
                FieldValue::Scalar(_) | FieldValue::Ref(None) => {}
                FieldValue::Ref(Some(child)) => self.visit(session, doc, *child),
                FieldValue::RefList(children) => {
                    for child in children {
                        self.visit(session, doc, *child);
                    }
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
