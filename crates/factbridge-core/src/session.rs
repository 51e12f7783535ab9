//! # Working Memory Session
//!
//! The fact store and its lifecycle-event contract.
//!
//! A fact is either node-originated (`FactPayload::Node`) or an arbitrary
//! rule-inserted datum (`FactPayload::Datum`). The distinction is a tagged
//! payload check, never type inspection; everything downstream (index
//! synchronization, auditing) discriminates on it.
//!
//! Listeners receive events synchronously, in mutation order, on the thread
//! that performed the mutation. The whole model is single-threaded and
//! single-session-per-run, so listeners are shared as
//! `Rc<RefCell<dyn MemoryListener>>`.

use crate::document::Document;
use crate::rules::{CompiledRuleSet, MAX_RULE_FIRINGS, RuleAction};
use crate::types::{FactId, NodeId, ScalarValue};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

// =============================================================================
// FACT PAYLOADS & EVENTS
// =============================================================================

/// What a fact carries: a document node or an opaque datum.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FactPayload {
    /// A fact that originated from a document node.
    Node(NodeId),
    /// An arbitrary value inserted by rule evaluation; never indexed.
    Datum(String),
}

impl FactPayload {
    /// The originating node, if this fact is node-originated.
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            Self::Datum(_) => None,
        }
    }
}

/// A fact entered working memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertEvent {
    /// Handle of the inserted fact.
    pub handle: FactId,
    /// The inserted payload.
    pub payload: FactPayload,
}

/// A live fact was mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEvent {
    /// Handle of the updated fact.
    pub handle: FactId,
    /// Payload before the mutation.
    pub old: FactPayload,
    /// Payload after the mutation.
    pub new: FactPayload,
}

/// A fact left working memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetractEvent {
    /// Handle of the retracted fact.
    pub handle: FactId,
    /// The payload at retraction time.
    pub payload: FactPayload,
}

/// Observer of fact lifecycle events.
///
/// For a single fact, insert always precedes any update or retract; events
/// are delivered synchronously in mutation order.
pub trait MemoryListener {
    /// A fact was inserted.
    fn fact_inserted(&mut self, event: &InsertEvent);
    /// A fact was updated.
    fn fact_updated(&mut self, event: &UpdateEvent);
    /// A fact was retracted.
    fn fact_retracted(&mut self, event: &RetractEvent);
}

/// Shared listener handle.
pub type SharedListener = Rc<RefCell<dyn MemoryListener>>;

// =============================================================================
// WORKING MEMORY CAPABILITY
// =============================================================================

/// The capability a working-memory store exposes to the bridge.
///
/// Any store emitting the three event kinds is pluggable behind this trait;
/// the fact loader and the synchronizer depend on nothing else.
pub trait WorkingMemory {
    /// Insert a payload as a fact and return its handle.
    ///
    /// Inserting a node that already has a live fact returns the existing
    /// handle without growing the fact count and without an event.
    fn insert(&mut self, payload: FactPayload) -> FactId;

    /// Number of live facts.
    fn fact_count(&self) -> usize;

    /// Register a lifecycle-event listener.
    fn add_listener(&mut self, listener: SharedListener);

    /// Evaluate rules to fixpoint (bounded). Returns the number of firings.
    fn fire_all(&mut self) -> usize;

    /// End the session; all facts cease to exist.
    fn dispose(&mut self);
}

// =============================================================================
// RULE SESSION
// =============================================================================

/// The in-crate working-memory store driven by a [`CompiledRuleSet`].
///
/// The session shares the document so that `set` rules can mutate node
/// fields; the document borrow is never held across a listener dispatch.
pub struct RuleSession {
    doc: Rc<RefCell<Document>>,
    rules: CompiledRuleSet,
    facts: BTreeMap<FactId, FactPayload>,
    by_node: BTreeMap<NodeId, FactId>,
    listeners: Vec<SharedListener>,
    next_fact: u64,
    fired: BTreeSet<(usize, FactId)>,
    disposed: bool,
}

impl std::fmt::Debug for RuleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSession")
            .field("facts", &self.facts.len())
            .field("rules", &self.rules.len())
            .field("listeners", &self.listeners.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl RuleSession {
    /// Create a session over a shared document with the given rules.
    #[must_use]
    pub fn new(rules: CompiledRuleSet, doc: Rc<RefCell<Document>>) -> Self {
        Self {
            doc,
            rules,
            facts: BTreeMap::new(),
            by_node: BTreeMap::new(),
            listeners: Vec::new(),
            next_fact: 0,
            fired: BTreeSet::new(),
            disposed: false,
        }
    }

    /// The payload of a live fact.
    #[must_use]
    pub fn fact(&self, handle: FactId) -> Option<&FactPayload> {
        self.facts.get(&handle)
    }

    /// The live fact handle for a node, if one exists.
    #[must_use]
    pub fn fact_of_node(&self, node: NodeId) -> Option<FactId> {
        self.by_node.get(&node).copied()
    }

    /// All live node-originated facts as `(handle, node)` pairs, in handle
    /// order.
    #[must_use]
    pub fn node_facts(&self) -> Vec<(FactId, NodeId)> {
        self.facts
            .iter()
            .filter_map(|(&handle, payload)| payload.node().map(|node| (handle, node)))
            .collect()
    }

    /// Retract a fact. Unknown handles are warn-logged no-ops.
    pub fn retract(&mut self, handle: FactId) {
        if self.disposed {
            tracing::warn!(?handle, "retract on disposed session ignored");
            return;
        }
        let Some(payload) = self.facts.remove(&handle) else {
            tracing::warn!(?handle, "retract of unknown fact ignored");
            return;
        };
        if let Some(node) = payload.node() {
            self.by_node.remove(&node);
        }
        tracing::debug!(?handle, ?payload, "fact retracted");
        let event = RetractEvent { handle, payload };
        for listener in &self.listeners {
            listener.borrow_mut().fact_retracted(&event);
        }
    }

    /// Replace a fact's payload, reporting an update event.
    ///
    /// This is the one operation that can change a fact's origin kind (node
    /// vs datum) mid-lifecycle. An update that would point the fact at a
    /// node already tracked by a different live fact is a recovered
    /// anomaly: warn-logged and skipped, so one node never maps to two
    /// facts.
    pub fn replace_payload(&mut self, handle: FactId, new: FactPayload) {
        if self.disposed {
            tracing::warn!(?handle, "update on disposed session ignored");
            return;
        }
        let Some(slot) = self.facts.get_mut(&handle) else {
            tracing::warn!(?handle, "update of unknown fact ignored");
            return;
        };
        if let Some(node) = new.node() {
            if let Some(&tracked) = self.by_node.get(&node) {
                if tracked != handle {
                    tracing::warn!(
                        ?handle,
                        ?node,
                        ?tracked,
                        "update to a node tracked by another fact ignored"
                    );
                    return;
                }
            }
        }
        let old = slot.clone();
        *slot = new.clone();
        if let Some(node) = old.node() {
            self.by_node.remove(&node);
        }
        if let Some(node) = new.node() {
            self.by_node.insert(node, handle);
        }
        tracing::debug!(?handle, ?old, ?new, "fact updated");
        let event = UpdateEvent { handle, old, new };
        for listener in &self.listeners {
            listener.borrow_mut().fact_updated(&event);
        }
    }

    /// Report an in-place mutation of a node-originated fact.
    fn notify_node_updated(&mut self, handle: FactId, node: NodeId) {
        let payload = FactPayload::Node(node);
        tracing::debug!(?handle, ?node, "node fact mutated in place");
        let event = UpdateEvent {
            handle,
            old: payload.clone(),
            new: payload,
        };
        for listener in &self.listeners {
            listener.borrow_mut().fact_updated(&event);
        }
    }

    /// Fire one rule on one fact. Returns whether it actually fired.
    fn apply_rule(&mut self, rule_idx: usize, handle: FactId, node: NodeId) -> bool {
        let (type_name, action) = {
            let Some(rule) = self.rules.rules().get(rule_idx) else {
                return false;
            };
            (rule.type_name.clone(), rule.action.clone())
        };

        let matches = self
            .doc
            .borrow()
            .type_name(node)
            .is_some_and(|name| name == type_name);
        if !matches {
            return false;
        }

        self.fired.insert((rule_idx, handle));
        match action {
            RuleAction::Retract => self.retract(handle),
            RuleAction::Set { feature, value } => {
                let result =
                    self.doc
                        .borrow_mut()
                        .set_scalar(node, &feature, ScalarValue::Text(value));
                match result {
                    Ok(()) => self.notify_node_updated(handle, node),
                    Err(error) => {
                        // Recovered type mismatch: skip the firing, keep going.
                        tracing::warn!(%error, ?node, feature, "set rule skipped");
                    }
                }
            }
            RuleAction::Derive { datum } => {
                let _ = self.insert(FactPayload::Datum(datum));
            }
        }
        true
    }
}

impl WorkingMemory for RuleSession {
    fn insert(&mut self, payload: FactPayload) -> FactId {
        if self.disposed {
            tracing::warn!("insert on disposed session ignored");
            return FactId(u64::MAX);
        }
        if let Some(node) = payload.node() {
            if let Some(existing) = self.by_node.get(&node) {
                // Store-level dedup: the count stays flat, no event is emitted.
                tracing::debug!(?node, "duplicate node insertion deduplicated");
                return *existing;
            }
        }

        let handle = FactId(self.next_fact);
        self.next_fact = self.next_fact.saturating_add(1);
        if let Some(node) = payload.node() {
            self.by_node.insert(node, handle);
        }
        self.facts.insert(handle, payload.clone());
        tracing::debug!(?handle, ?payload, "fact inserted");

        let event = InsertEvent { handle, payload };
        for listener in &self.listeners {
            listener.borrow_mut().fact_inserted(&event);
        }
        handle
    }

    fn fact_count(&self) -> usize {
        self.facts.len()
    }

    fn add_listener(&mut self, listener: SharedListener) {
        self.listeners.push(listener);
    }

    fn fire_all(&mut self) -> usize {
        if self.disposed {
            tracing::warn!("fire_all on disposed session ignored");
            return 0;
        }
        let mut total = 0usize;
        loop {
            let mut fired_this_pass = 0usize;
            for rule_idx in 0..self.rules.len() {
                for (handle, node) in self.node_facts() {
                    if self.fired.contains(&(rule_idx, handle)) {
                        continue;
                    }
                    if self.apply_rule(rule_idx, handle, node) {
                        fired_this_pass += 1;
                        total += 1;
                        if total >= MAX_RULE_FIRINGS {
                            tracing::warn!(total, "firing bound reached, stopping evaluation");
                            return total;
                        }
                    }
                }
            }
            if fired_this_pass == 0 {
                return total;
            }
        }
    }

    fn dispose(&mut self) {
        tracing::debug!(facts = self.facts.len(), "session disposed");
        self.facts.clear();
        self.by_node.clear();
        self.listeners.clear();
        self.fired.clear();
        self.disposed = true;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureDef, FieldValue, TypeSystem};

    /// Listener that records every event kind in arrival order.
    #[derive(Default)]
    struct RecordingListener {
        log: Vec<String>,
    }

    impl MemoryListener for RecordingListener {
        fn fact_inserted(&mut self, event: &InsertEvent) {
            self.log.push(format!("insert {:?}", event.payload));
        }

        fn fact_updated(&mut self, event: &UpdateEvent) {
            self.log.push(format!("update {:?} -> {:?}", event.old, event.new));
        }

        fn fact_retracted(&mut self, event: &RetractEvent) {
            self.log.push(format!("retract {:?}", event.payload));
        }
    }

    fn shared_doc() -> (Rc<RefCell<Document>>, NodeId, NodeId) {
        let mut ts = TypeSystem::new();
        let token = ts
            .define("Token", vec![FeatureDef::scalar("text")])
            .expect("define");
        let noise = ts
            .define("Noise", vec![FeatureDef::scalar("text")])
            .expect("define");
        let mut doc = Document::new(ts);
        let a = doc
            .create_node(token, vec![FieldValue::Scalar(ScalarValue::Text("a".into()))])
            .expect("create");
        let b = doc
            .create_node(noise, vec![FieldValue::Scalar(ScalarValue::Text("b".into()))])
            .expect("create");
        (Rc::new(RefCell::new(doc)), a, b)
    }

    #[test]
    fn duplicate_node_insert_keeps_count_flat() {
        let (doc, a, _) = shared_doc();
        let mut session = RuleSession::new(CompiledRuleSet::empty(), doc);

        let first = session.insert(FactPayload::Node(a));
        let second = session.insert(FactPayload::Node(a));

        assert_eq!(first, second);
        assert_eq!(session.fact_count(), 1);
    }

    #[test]
    fn datum_inserts_are_never_deduplicated() {
        let (doc, _, _) = shared_doc();
        let mut session = RuleSession::new(CompiledRuleSet::empty(), doc);

        session.insert(FactPayload::Datum("x".into()));
        session.insert(FactPayload::Datum("x".into()));

        assert_eq!(session.fact_count(), 2);
    }

    #[test]
    fn retract_of_unknown_fact_is_noop() {
        let (doc, _, _) = shared_doc();
        let mut session = RuleSession::new(CompiledRuleSet::empty(), doc);

        session.retract(FactId(42));
        assert_eq!(session.fact_count(), 0);
    }

    #[test]
    fn events_arrive_in_mutation_order() {
        let (doc, a, _) = shared_doc();
        let mut session = RuleSession::new(CompiledRuleSet::empty(), doc);
        let recorder = Rc::new(RefCell::new(RecordingListener::default()));
        session.add_listener(recorder.clone());

        let handle = session.insert(FactPayload::Node(a));
        session.replace_payload(handle, FactPayload::Datum("gone".into()));
        session.retract(handle);

        let log = &recorder.borrow().log;
        assert_eq!(log.len(), 3);
        assert!(log[0].starts_with("insert"));
        assert!(log[1].starts_with("update"));
        assert!(log[2].starts_with("retract"));
    }

    #[test]
    fn update_to_node_tracked_by_another_fact_is_recovered() {
        let (doc, a, b) = shared_doc();
        let mut session = RuleSession::new(CompiledRuleSet::empty(), doc);
        let ha = session.insert(FactPayload::Node(a));
        let hb = session.insert(FactPayload::Node(b));
        let recorder = Rc::new(RefCell::new(RecordingListener::default()));
        session.add_listener(recorder.clone());

        session.replace_payload(hb, FactPayload::Node(a));

        // The update is skipped: no event, payloads untouched.
        assert!(recorder.borrow().log.is_empty());
        assert_eq!(session.fact(hb), Some(&FactPayload::Node(b)));
        assert_eq!(session.fact_of_node(a), Some(ha));
        // The other fact's tracking survived the attempt.
        session.retract(hb);
        assert!(session.fact_of_node(b).is_none());
        assert_eq!(session.fact_of_node(a), Some(ha));
    }

    #[test]
    fn update_of_a_node_fact_to_its_own_node_is_allowed() {
        let (doc, a, _) = shared_doc();
        let mut session = RuleSession::new(CompiledRuleSet::empty(), doc);
        let handle = session.insert(FactPayload::Node(a));

        session.replace_payload(handle, FactPayload::Node(a));

        assert_eq!(session.fact_of_node(a), Some(handle));
        assert_eq!(session.fact_count(), 1);
    }

    #[test]
    fn retract_rule_fires_once_per_fact() {
        let (doc, a, b) = shared_doc();
        let rules = CompiledRuleSet::compile("when Noise retract").expect("compile");
        let mut session = RuleSession::new(rules, doc);

        session.insert(FactPayload::Node(a));
        session.insert(FactPayload::Node(b));

        let firings = session.fire_all();
        assert_eq!(firings, 1);
        assert_eq!(session.fact_count(), 1);
        assert!(session.fact_of_node(b).is_none());
        assert!(session.fact_of_node(a).is_some());
    }

    #[test]
    fn set_rule_mutates_document_and_reports_update() {
        let (doc, a, _) = shared_doc();
        let rules = CompiledRuleSet::compile("when Token set text patched").expect("compile");
        let mut session = RuleSession::new(rules, doc.clone());
        let recorder = Rc::new(RefCell::new(RecordingListener::default()));

        session.insert(FactPayload::Node(a));
        session.add_listener(recorder.clone());
        session.fire_all();

        assert_eq!(
            doc.borrow().field(a, "text").expect("field"),
            &FieldValue::Scalar(ScalarValue::Text("patched".into()))
        );
        assert!(recorder.borrow().log.iter().any(|e| e.starts_with("update")));
    }

    #[test]
    fn set_rule_on_missing_feature_is_recovered() {
        let (doc, a, _) = shared_doc();
        let rules = CompiledRuleSet::compile("when Token set absent x").expect("compile");
        let mut session = RuleSession::new(rules, doc);

        session.insert(FactPayload::Node(a));
        let firings = session.fire_all();

        // The rule fires (and is not retried), the mutation is skipped.
        assert_eq!(firings, 1);
        assert_eq!(session.fact_count(), 1);
    }

    #[test]
    fn derive_rule_adds_datum_fact() {
        let (doc, a, _) = shared_doc();
        let rules = CompiledRuleSet::compile("when Token derive token-seen").expect("compile");
        let mut session = RuleSession::new(rules, doc);

        session.insert(FactPayload::Node(a));
        session.fire_all();

        assert_eq!(session.fact_count(), 2);
    }

    #[test]
    fn fire_all_reaches_fixpoint() {
        let (doc, a, b) = shared_doc();
        let rules = CompiledRuleSet::compile("when Noise retract\nwhen Token derive seen")
            .expect("compile");
        let mut session = RuleSession::new(rules, doc);

        session.insert(FactPayload::Node(a));
        session.insert(FactPayload::Node(b));

        let firings = session.fire_all();
        assert_eq!(firings, 2);
        // A second call finds nothing new to fire.
        assert_eq!(session.fire_all(), 0);
    }

    #[test]
    fn firings_stay_within_rule_fact_pairs() {
        let (doc, a, b) = shared_doc();
        let rules = CompiledRuleSet::compile(
            "when Token derive t\nwhen Noise derive n\nwhen Token set text z",
        )
        .expect("compile");
        let mut session = RuleSession::new(rules, doc);
        session.insert(FactPayload::Node(a));
        session.insert(FactPayload::Node(b));

        // Derived facts are never rule targets, so firings cannot exceed
        // rules x node facts.
        let firings = session.fire_all();
        assert_eq!(firings, 3);
        assert!(firings <= 3 * 2);
        assert_eq!(session.fire_all(), 0);
    }

    #[test]
    fn disposed_session_ignores_mutations() {
        let (doc, a, _) = shared_doc();
        let mut session = RuleSession::new(CompiledRuleSet::empty(), doc);

        session.dispose();
        session.insert(FactPayload::Node(a));

        assert_eq!(session.fact_count(), 0);
        assert_eq!(session.fire_all(), 0);
    }
}
