//! # Rule Representation
//!
//! The host-side representation of a compiled rule set. The rule language
//! itself stays deliberately minimal; what matters to the bridge is that
//! firing a rule set produces the three fact lifecycle events (insert,
//! update, retract) against working memory.
//!
//! ## Source format
//!
//! One rule per line, `#` comments and blank lines ignored:
//!
//! ```text
//! when <TypeName> retract
//! when <TypeName> set <feature> <text...>
//! when <TypeName> derive <text...>
//! ```
//!
//! Compilation collects *every* malformed line into
//! [`BridgeError::RuleCompile`], not just the first one.

use crate::types::BridgeError;
use serde::{Deserialize, Serialize};

/// Upper bound on total rule firings in one `fire_all` call.
///
/// Evaluation runs to fixpoint; this bound is the backstop for stores
/// whose rules can re-enable firings. With the in-crate session every
/// (rule, fact) pair fires at most once and derived facts are never rule
/// targets, so total firings stay at rules x node facts and the bound is
/// not reachable there.
pub const MAX_RULE_FIRINGS: usize = 10_000;

/// What a rule does to the fact it matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleAction {
    /// Retract the matched fact from working memory.
    Retract,
    /// Set a scalar feature on the matched node and report an update.
    Set {
        /// Target feature name.
        feature: String,
        /// New text value.
        value: String,
    },
    /// Insert a fresh datum fact (not node-originated).
    Derive {
        /// The datum payload.
        datum: String,
    },
}

/// One compiled rule: a type-name pattern and an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Name of the node type this rule matches.
    pub type_name: String,
    /// The action fired once per matching fact.
    pub action: RuleAction,
}

/// An ordered, immutable set of compiled rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledRuleSet {
    rules: Vec<Rule>,
}

impl CompiledRuleSet {
    /// An empty rule set (firing it is a no-op).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile rule source text.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::RuleCompile`] listing every malformed line.
    pub fn compile(source: &str) -> Result<Self, BridgeError> {
        let mut rules = Vec::new();
        let mut details = Vec::new();

        for (offset, raw) in source.lines().enumerate() {
            let line_no = offset + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match Self::compile_line(line) {
                Ok(rule) => rules.push(rule),
                Err(message) => details.push(format!("line {line_no}: {message}")),
            }
        }

        if details.is_empty() {
            Ok(Self { rules })
        } else {
            Err(BridgeError::RuleCompile { details })
        }
    }

    fn compile_line(line: &str) -> Result<Rule, String> {
        let mut words = line.split_whitespace();

        match words.next() {
            Some("when") => {}
            Some(other) => return Err(format!("expected 'when', found '{other}'")),
            None => return Err("empty rule".to_string()),
        }

        let type_name = words
            .next()
            .ok_or_else(|| "missing type name after 'when'".to_string())?
            .to_string();

        let verb = words
            .next()
            .ok_or_else(|| format!("missing action for type '{type_name}'"))?;

        let action = match verb {
            "retract" => {
                if words.next().is_some() {
                    return Err("'retract' takes no arguments".to_string());
                }
                RuleAction::Retract
            }
            "set" => {
                let feature = words
                    .next()
                    .ok_or_else(|| "'set' requires a feature name".to_string())?
                    .to_string();
                let value = words.collect::<Vec<_>>().join(" ");
                if value.is_empty() {
                    return Err(format!("'set {feature}' requires a value"));
                }
                RuleAction::Set { feature, value }
            }
            "derive" => {
                let datum = words.collect::<Vec<_>>().join(" ");
                if datum.is_empty() {
                    return Err("'derive' requires a datum".to_string());
                }
                RuleAction::Derive { datum }
            }
            other => return Err(format!("unknown action '{other}'")),
        };

        Ok(Rule { type_name, action })
    }

    /// The compiled rules, in source order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of compiled rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
