//! # Annotation Index
//!
//! The document-side lookup structure that mirrors the live, node-originated
//! fact set of a working-memory session.
//!
//! The index maps fact identity (the originating `NodeId`) to an indexed
//! position. Positions are allocated from a monotone counter, so iteration
//! in position order reproduces insertion order deterministically.
//!
//! Ownership rule: while a session is live, the index is mutated only by the
//! [`IndexSynchronizer`](crate::synchronizer::IndexSynchronizer) reacting to
//! fact lifecycle events. It is created fresh per run.

use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fact-identity → indexed-position mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationIndex {
    entries: BTreeMap<NodeId, u64>,
    next_position: u64,
}

impl AnnotationIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the index. Re-adding an already indexed node keeps its
    /// original position (no duplicates).
    pub fn add(&mut self, node: NodeId) {
        if self.entries.contains_key(&node) {
            return;
        }
        self.entries.insert(node, self.next_position);
        self.next_position = self.next_position.saturating_add(1);
    }

    /// Remove a node from the index. Removing an absent node is a no-op;
    /// returns whether an entry was actually removed.
    pub fn remove(&mut self, node: NodeId) -> bool {
        self.entries.remove(&node).is_some()
    }

    /// Whether the node is currently indexed.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.entries.contains_key(&node)
    }

    /// Number of indexed nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All indexed nodes, ordered by indexed position (insertion order).
    #[must_use]
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut ordered: Vec<(u64, NodeId)> =
            self.entries.iter().map(|(&node, &pos)| (pos, node)).collect();
        ordered.sort_unstable();
        ordered.into_iter().map(|(_, node)| node).collect()
    }

    /// Drop all entries and reset the position counter.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_position = 0;
    }
}

// =============================================================================
// TESTS
// =============================================================================
