//! # Core Type Definitions
//!
//! This module contains all core types for the factbridge deterministic
//! document/working-memory bridge:
//! - Identifiers (`NodeId`, `TypeId`, `FactId`)
//! - Type metadata (`TypeSystem`, `TypeDef`, `FeatureDef`)
//! - Field payloads (`FieldValue`, `ScalarValue`)
//! - Error types (`BridgeError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Allocate identifiers from monotone counters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier for a node in the annotation document.
///
/// Node identity is reference-like: two nodes with equal field values but
/// different ids are distinct nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Unique identifier for a registered node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

/// Handle for a fact living in working memory.
///
/// One node maps to at most one live fact at a time; datum facts get fresh
/// handles on every insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactId(pub u64);

// =============================================================================
// TYPE SYSTEM
// =============================================================================

/// A named feature slot declared by a node type.
///
/// `primitive_range` marks features whose values are opaque scalars; those
/// are never traversed by the fact loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDef {
    /// The feature name, unique within its declaring type.
    pub name: String,
    /// Whether the feature's declared range is a primitive (scalar) type.
    pub primitive_range: bool,
}

impl FeatureDef {
    /// Declare a scalar-valued feature.
    #[must_use]
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primitive_range: true,
        }
    }

    /// Declare a structured feature (node reference or node list).
    #[must_use]
    pub fn reference(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primitive_range: false,
        }
    }
}

/// A registered node type: a name, a primitive flag and an ordered feature
/// list. Feature order is declaration order and drives traversal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    /// The unique type name.
    pub name: String,
    /// Primitive types never become facts and are never traversed.
    pub primitive: bool,
    /// Declared features, in declaration order.
    pub features: Vec<FeatureDef>,
}

/// Registry of node types.
///
/// Types are registered once, before any node is created; duplicate names
/// are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSystem {
    types: Vec<TypeDef>,
    by_name: BTreeMap<String, TypeId>,
}

impl TypeSystem {
    /// Create an empty type system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a primitive (scalar) type.
    pub fn define_primitive(&mut self, name: impl Into<String>) -> Result<TypeId, BridgeError> {
        self.register(TypeDef {
            name: name.into(),
            primitive: true,
            features: Vec::new(),
        })
    }

    /// Register a structured type with the given feature list.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        features: Vec<FeatureDef>,
    ) -> Result<TypeId, BridgeError> {
        self.register(TypeDef {
            name: name.into(),
            primitive: false,
            features,
        })
    }

    fn register(&mut self, def: TypeDef) -> Result<TypeId, BridgeError> {
        if self.by_name.contains_key(&def.name) {
            return Err(BridgeError::DuplicateType(def.name));
        }
        let id = TypeId(self.types.len() as u32);
        self.by_name.insert(def.name.clone(), id);
        self.types.push(def);
        Ok(id)
    }

    /// Look up a type id by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Get the definition of a type.
    #[must_use]
    pub fn get(&self, id: TypeId) -> Option<&TypeDef> {
        self.types.get(id.0 as usize)
    }

    /// Get a type's name.
    #[must_use]
    pub fn name_of(&self, id: TypeId) -> Option<&str> {
        self.get(id).map(|def| def.name.as_str())
    }

    /// Whether the type is primitive. Unknown ids are treated as primitive:
    /// nothing about them is traversable.
    #[must_use]
    pub fn is_primitive(&self, id: TypeId) -> bool {
        self.get(id).is_none_or(|def| def.primitive)
    }

    /// Number of registered types.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

// =============================================================================
// FIELD VALUES
// =============================================================================

/// An opaque primitive value stored in a scalar feature.
///
/// Scalars are never traversed; the bridge carries them through untouched.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScalarValue {
    /// Integer payload.
    Int(i64),
    /// Text payload.
    Text(String),
    /// Boolean payload.
    Flag(bool),
}

/// The stored value of one feature slot on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// An opaque scalar (primitive range).
    Scalar(ScalarValue),
    /// A single, possibly unset node reference.
    Ref(Option<NodeId>),
    /// An ordered collection of node references.
    RefList(Vec<NodeId>),
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error type for all factbridge-core operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The rule source is malformed. `details` enumerates every offending
    /// line, not just the first.
    #[error("rule compilation failed:\n{}", details.join("\n"))]
    RuleCompile {
        /// One entry per malformed line, with line number.
        details: Vec<String>,
    },

    /// An I/O error occurred during setup or audit flushing.
    #[error("I/O error: {0}")]
    Io(String),

    /// A type with this name is already registered.
    #[error("duplicate type name: {0}")]
    DuplicateType(String),

    /// The requested type is not registered.
    #[error("type not found: {0:?}")]
    UnknownType(TypeId),

    /// The requested node does not exist in the document.
    #[error("node not found: {0:?}")]
    UnknownNode(NodeId),

    /// The type declares no feature with this name.
    #[error("type {type_name} has no feature named {feature}")]
    UnknownFeature {
        /// Name of the declaring type.
        type_name: String,
        /// The missing feature name.
        feature: String,
    },

    /// Field values supplied at node creation do not match the declared
    /// feature count.
    #[error("type {type_name} declares {expected} features, got {actual} field values")]
    FieldArity {
        /// Name of the declaring type.
        type_name: String,
        /// Declared feature count.
        expected: usize,
        /// Supplied field count.
        actual: usize,
    },

    /// A scalar operation targeted a structured feature.
    #[error("feature {feature} does not hold a scalar value")]
    NotScalar {
        /// The offending feature name.
        feature: String,
    },

    /// A field value's kind contradicts the feature's declared range:
    /// scalar features take scalar values, structured features take
    /// references.
    #[error("feature {feature} of type {type_name} does not accept this value kind")]
    FieldKind {
        /// Name of the declaring type.
        type_name: String,
        /// The offending feature name.
        feature: String,
    },

    /// A serialization error occurred (audit log records).
    #[error("serialization error: {0}")]
    Serialization(String),
}

// =============================================================================
// TESTS
// =============================================================================
