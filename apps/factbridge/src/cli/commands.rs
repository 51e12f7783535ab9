//! # CLI Command Implementations

use crate::input::{DocumentSpec, InputError};
use factbridge_core::{AnnotatorConfig, BridgeError, CompiledRuleSet, RuntimeAnnotator};
use serde::Serialize;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for document descriptions (50 MB).
///
/// This prevents memory exhaustion from accidental large files.
const MAX_DOCUMENT_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Maximum file size for rule sources (1 MB).
const MAX_RULES_FILE_SIZE: u64 = 1024 * 1024;

/// Application-level error: core, input or I/O.
#[derive(Debug, Error)]
pub enum AppError {
    /// Error from factbridge-core.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Error building the document from its description.
    #[error(transparent)]
    Input(#[from] InputError),

    /// File access error.
    #[error("I/O error: {0}")]
    Io(String),
}

fn read_limited(path: &Path, max_size: u64) -> Result<String, AppError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| AppError::Io(format!("cannot read '{}': {e}", path.display())))?;
    if metadata.len() > max_size {
        return Err(AppError::Io(format!(
            "file '{}' is {} bytes, exceeding the {} byte limit",
            path.display(),
            metadata.len(),
            max_size
        )));
    }
    std::fs::read_to_string(path)
        .map_err(|e| AppError::Io(format!("cannot read '{}': {e}", path.display())))
}

// =============================================================================
// RUN COMMAND
// =============================================================================

#[derive(Debug, Serialize)]
struct RunOutput {
    facts: usize,
    firings: usize,
    indexed: usize,
    index: Vec<u64>,
}

/// Run the full pipeline over a document.
pub fn cmd_run(
    document: &Path,
    rules: &Path,
    audit_log: Option<PathBuf>,
    json_mode: bool,
) -> Result<(), AppError> {
    let source = read_limited(document, MAX_DOCUMENT_FILE_SIZE)?;
    let spec = DocumentSpec::parse(&source)?;
    let (doc, roots) = spec.build()?;
    tracing::info!(
        nodes = doc.node_count(),
        roots = roots.len(),
        "document built"
    );

    let annotator = RuntimeAnnotator::initialize(AnnotatorConfig {
        rules: rules.to_path_buf(),
        audit_log,
    })?;

    let doc = Rc::new(RefCell::new(doc));
    let report = annotator.process(&doc, &roots)?;

    if json_mode {
        let output = RunOutput {
            facts: report.fact_count,
            firings: report.firings,
            indexed: report.indexed,
            index: doc.borrow().index().nodes().iter().map(|n| n.0).collect(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&output)
                .map_err(|e| BridgeError::Serialization(e.to_string()))?
        );
    } else {
        println!("Run finished:");
        println!("  Facts:    {}", report.fact_count);
        println!("  Firings:  {}", report.firings);
        println!("  Indexed:  {}", report.indexed);
    }
    Ok(())
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Compile a rule file, listing every error.
pub fn cmd_check(rules: &Path, json_mode: bool) -> Result<(), AppError> {
    let source = read_limited(rules, MAX_RULES_FILE_SIZE)?;
    match CompiledRuleSet::compile(&source) {
        Ok(compiled) => {
            if json_mode {
                println!("{{\"rules\":{}}}", compiled.len());
            } else {
                println!("OK: {} rule(s)", compiled.len());
            }
            Ok(())
        }
        Err(BridgeError::RuleCompile { details }) => {
            for detail in &details {
                eprintln!("error: {detail}");
            }
            Err(AppError::Bridge(BridgeError::RuleCompile { details }))
        }
        Err(other) => Err(AppError::Bridge(other)),
    }
}
