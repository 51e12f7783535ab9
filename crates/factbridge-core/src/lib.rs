//! # factbridge-core
//!
//! The deterministic bridge between a typed annotation document and a rule
//! engine's working memory - THE LOGIC.
//!
//! Two components carry the real design weight:
//!
//! - [`GraphFactLoader`]: a recursive, cycle-safe, duplicate-avoiding walk
//!   that converts a rooted, possibly-cyclic node graph into a flat fact
//!   set committed to working memory.
//! - [`IndexSynchronizer`]: an observer that mirrors every fact lifecycle
//!   event (insert, update, retract) back into the document's annotation
//!   index, so graph and working memory stay consistent after rule
//!   execution.
//!
//! Everything else - rule compilation, the session store, the audit log,
//! the pipeline - is plumbing around that pair.
//!
//! ## Architectural Constraints
//!
//! - Single-threaded, synchronous, single-session-per-run
//! - Deterministic: `BTreeMap`/`BTreeSet` only, no floats, no randomness
//! - No async, no network dependencies (pure Rust)
//! - Setup failures abort before any fact is inserted; per-event anomalies
//!   during evaluation are recovered with diagnostics, never aborts

// =============================================================================
// MODULES
// =============================================================================

pub mod audit;
pub mod document;
pub mod index;
pub mod loader;
pub mod rules;
pub mod runtime;
pub mod session;
pub mod synchronizer;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    BridgeError, FactId, FeatureDef, FieldValue, NodeId, ScalarValue, TypeDef, TypeId, TypeSystem,
};

// =============================================================================
// RE-EXPORTS: Document & Index
// =============================================================================

pub use document::{Document, NodeRecord};
pub use index::AnnotationIndex;

// =============================================================================
// RE-EXPORTS: Working Memory & Bridge
// =============================================================================

pub use audit::{AuditRecord, FileAuditLogger};
pub use loader::GraphFactLoader;
pub use rules::{CompiledRuleSet, MAX_RULE_FIRINGS, Rule, RuleAction};
pub use runtime::{AnnotatorConfig, RunReport, RuntimeAnnotator};
pub use session::{
    FactPayload, InsertEvent, MemoryListener, RetractEvent, RuleSession, SharedListener,
    UpdateEvent, WorkingMemory,
};
pub use synchronizer::IndexSynchronizer;
