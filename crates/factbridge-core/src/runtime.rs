//! # Runtime Annotator
//!
//! The pipeline wiring around the core: compile rules once at
//! initialization, then per run build a session over the shared document,
//! attach the audit logger (if configured), load roots as facts, attach the
//! index synchronizer, fire the rules and report.
//!
//! The audit logger observes the whole session, load-time insertions
//! included; the synchronizer attaches only after loading, once the index
//! has been seeded with the loaded facts.
//!
//! Setup failures abort before any fact is inserted; once evaluation has
//! begun, per-event anomalies are recovered with diagnostics and never
//! abort the run.

use crate::audit::FileAuditLogger;
use crate::document::Document;
use crate::loader::GraphFactLoader;
use crate::rules::CompiledRuleSet;
use crate::session::{RuleSession, WorkingMemory};
use crate::synchronizer::IndexSynchronizer;
use crate::types::{BridgeError, NodeId};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// Configuration for a [`RuntimeAnnotator`].
#[derive(Debug, Clone, Default)]
pub struct AnnotatorConfig {
    /// Path to the rule source file. Compile errors are fatal at setup.
    pub rules: PathBuf,
    /// Optional audit log destination. When set, fact-level activity is
    /// serialized there after evaluation completes.
    pub audit_log: Option<PathBuf>,
}

/// Summary of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Live facts in working memory when evaluation finished.
    pub fact_count: usize,
    /// Total rule firings.
    pub firings: usize,
    /// Entries in the annotation index after synchronization.
    pub indexed: usize,
}

/// Compiled, reusable pipeline: one `initialize`, many `process` calls.
#[derive(Debug)]
pub struct RuntimeAnnotator {
    rules: CompiledRuleSet,
    audit_log: Option<PathBuf>,
}

impl RuntimeAnnotator {
    /// Read and compile the rule file and prepare the audit destination.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Io`] if the rule file cannot be read or the audit
    /// directory cannot be created; [`BridgeError::RuleCompile`] with every
    /// offending line if the source is malformed.
    pub fn initialize(config: AnnotatorConfig) -> Result<Self, BridgeError> {
        let source = std::fs::read_to_string(&config.rules).map_err(|e| {
            BridgeError::Io(format!(
                "cannot read rule file '{}': {e}",
                config.rules.display()
            ))
        })?;
        let rules = CompiledRuleSet::compile(&source)?;
        tracing::info!(rules = rules.len(), path = %config.rules.display(), "rules compiled");

        if let Some(path) = &config.audit_log {
            FileAuditLogger::prepare(path)?;
        }

        Ok(Self {
            rules,
            audit_log: config.audit_log,
        })
    }

    /// Build an annotator from an already compiled rule set (no file I/O,
    /// no audit log).
    #[must_use]
    pub fn with_rules(rules: CompiledRuleSet) -> Self {
        Self {
            rules,
            audit_log: None,
        }
    }

    /// Run the pipeline over the document, starting from the given roots.
    ///
    /// The index is reset first; after the call it mirrors the live,
    /// node-originated fact set. The session is disposed before returning.
    ///
    /// # Errors
    ///
    /// Only audit-log flushing can fail ([`BridgeError::Io`] /
    /// [`BridgeError::Serialization`]); evaluation itself never errors.
    pub fn process(
        &self,
        doc: &Rc<RefCell<Document>>,
        roots: &[NodeId],
    ) -> Result<RunReport, BridgeError> {
        doc.borrow_mut().reset_index();

        let mut session = RuleSession::new(self.rules.clone(), doc.clone());

        // The audit log covers the run's whole fact-level activity, so the
        // logger listens from before the first insertion.
        let audit = match &self.audit_log {
            Some(path) => {
                let logger = Rc::new(RefCell::new(FileAuditLogger::create(path.clone())?));
                session.add_listener(logger.clone());
                Some(logger)
            }
            None => None,
        };

        let mut loader = GraphFactLoader::new();
        for &root in roots {
            loader.load(&mut session, &doc.borrow(), Some(root));
        }
        tracing::info!(
            loaded = session.fact_count(),
            visited = loader.visited_count(),
            "document loaded into working memory"
        );

        // Seed the fresh index with the loaded facts; from here on the
        // synchronizer keeps the two sides consistent event by event.
        {
            let mut doc = doc.borrow_mut();
            let index = doc.index_mut();
            for (_, node) in session.node_facts() {
                index.add(node);
            }
        }

        session.add_listener(Rc::new(RefCell::new(IndexSynchronizer::new(doc.clone()))));

        tracing::info!("firing rules now");
        let firings = session.fire_all();

        let report = RunReport {
            fact_count: session.fact_count(),
            firings,
            indexed: doc.borrow().index().len(),
        };
        tracing::info!(
            facts = report.fact_count,
            firings = report.firings,
            indexed = report.indexed,
            "evaluation finished"
        );

        if let Some(logger) = audit {
            logger.borrow().write_to_disk()?;
        }

        session.dispose();
        Ok(report)
    }
}

// =============================================================================
// TESTS
// =============================================================================
