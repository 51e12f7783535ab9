//! # Document Input Format
//!
//! JSON description of a type system and a node graph, with symbolic node
//! references resolved in a second pass (so cycles and shared substructure
//! are expressible).
//!
//! ```json
//! {
//!   "types": [
//!     { "name": "Token", "features": [
//!       { "name": "text", "primitive": true },
//!       { "name": "next" }
//!     ]}
//!   ],
//!   "nodes": [
//!     { "id": "t1", "type": "Token",
//!       "fields": { "text": { "text": "hello" }, "next": { "ref": "t2" } } },
//!     { "id": "t2", "type": "Token",
//!       "fields": { "text": { "text": "world" } } }
//!   ],
//!   "roots": ["t1"]
//! }
//! ```
//!
//! Omitted fields default to an empty scalar for primitive-ranged features
//! and an unset reference otherwise.

use factbridge_core::{
    BridgeError, Document, FeatureDef, FieldValue, NodeId, ScalarValue, TypeSystem,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors building a document from its JSON description.
#[derive(Debug, Error)]
pub enum InputError {
    /// The JSON itself is malformed.
    #[error("cannot parse document description: {0}")]
    Parse(String),

    /// A node names a type that was never declared.
    #[error("node '{node}' has unknown type '{type_name}'")]
    UnknownTypeName {
        /// Symbolic node id.
        node: String,
        /// The undeclared type name.
        type_name: String,
    },

    /// A field references a node id that does not exist.
    #[error("node '{node}' references unknown node '{target}'")]
    UnknownRef {
        /// Symbolic node id of the referencing node.
        node: String,
        /// The missing target id.
        target: String,
    },

    /// Two nodes share a symbolic id.
    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    /// A root names a node id that does not exist.
    #[error("unknown root '{0}'")]
    UnknownRoot(String),

    /// Document construction failed (arity, unknown feature, ...).
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// One declared feature.
#[derive(Debug, Deserialize)]
pub struct FeatureSpec {
    /// Feature name.
    pub name: String,
    /// Whether the feature's range is primitive (scalar).
    #[serde(default)]
    pub primitive: bool,
}

/// One declared type.
#[derive(Debug, Deserialize)]
pub struct TypeSpec {
    /// Type name.
    pub name: String,
    /// Whether the type itself is primitive.
    #[serde(default)]
    pub primitive: bool,
    /// Declared features, in declaration order.
    #[serde(default)]
    pub features: Vec<FeatureSpec>,
}

/// A field value with symbolic references.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSpec {
    /// Integer scalar.
    Int(i64),
    /// Text scalar.
    Text(String),
    /// Boolean scalar.
    Flag(bool),
    /// Single node reference by symbolic id.
    Ref(String),
    /// Ordered list of node references by symbolic id.
    Refs(Vec<String>),
}

/// One node with symbolic id and fields.
#[derive(Debug, Deserialize)]
pub struct NodeSpec {
    /// Symbolic id, unique within the document description.
    pub id: String,
    /// Name of the node's type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Field values keyed by feature name.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

/// The whole document description.
#[derive(Debug, Deserialize)]
pub struct DocumentSpec {
    /// Declared types.
    pub types: Vec<TypeSpec>,
    /// Declared nodes.
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    /// Symbolic ids of the traversal roots.
    #[serde(default)]
    pub roots: Vec<String>,
}

impl DocumentSpec {
    /// Parse a JSON document description.
    pub fn parse(source: &str) -> Result<Self, InputError> {
        serde_json::from_str(source).map_err(|e| InputError::Parse(e.to_string()))
    }

    /// Build the document and resolve the roots.
    ///
    /// Pass one creates every node with placeholder fields (correct arity);
    /// pass two patches in resolved references, which is what makes cycles
    /// and shared children expressible.
    pub fn build(&self) -> Result<(Document, Vec<NodeId>), InputError> {
        let mut ts = TypeSystem::new();
        for spec in &self.types {
            if spec.primitive {
                ts.define_primitive(spec.name.clone())?;
            } else {
                let features = spec
                    .features
                    .iter()
                    .map(|f| FeatureDef {
                        name: f.name.clone(),
                        primitive_range: f.primitive,
                    })
                    .collect();
                ts.define(spec.name.clone(), features)?;
            }
        }

        let mut doc = Document::new(ts);
        let mut by_name: BTreeMap<String, NodeId> = BTreeMap::new();

        // Pass one: allocate nodes with placeholders.
        for spec in &self.nodes {
            if by_name.contains_key(&spec.id) {
                return Err(InputError::DuplicateNode(spec.id.clone()));
            }
            let type_id = doc.type_system().lookup(&spec.type_name).ok_or_else(|| {
                InputError::UnknownTypeName {
                    node: spec.id.clone(),
                    type_name: spec.type_name.clone(),
                }
            })?;
            let placeholders = doc
                .type_system()
                .get(type_id)
                .map(|def| {
                    def.features
                        .iter()
                        .map(|f| {
                            if f.primitive_range {
                                FieldValue::Scalar(ScalarValue::Text(String::new()))
                            } else {
                                FieldValue::Ref(None)
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();
            let id = doc.create_node(type_id, placeholders)?;
            by_name.insert(spec.id.clone(), id);
        }

        // Pass two: patch real values with resolved references.
        for spec in &self.nodes {
            let id = by_name[&spec.id];
            for (feature, value) in &spec.fields {
                let resolved = self.resolve(&by_name, &spec.id, value)?;
                doc.set_field(id, feature, resolved)?;
            }
        }

        let mut roots = Vec::with_capacity(self.roots.len());
        for root in &self.roots {
            let id = by_name
                .get(root)
                .ok_or_else(|| InputError::UnknownRoot(root.clone()))?;
            roots.push(*id);
        }
        Ok((doc, roots))
    }

    fn resolve(
        &self,
        by_name: &BTreeMap<String, NodeId>,
        node: &str,
        value: &FieldSpec,
    ) -> Result<FieldValue, InputError> {
        let lookup = |target: &str| {
            by_name
                .get(target)
                .copied()
                .ok_or_else(|| InputError::UnknownRef {
                    node: node.to_string(),
                    target: target.to_string(),
                })
        };
        Ok(match value {
            FieldSpec::Int(v) => FieldValue::Scalar(ScalarValue::Int(*v)),
            FieldSpec::Text(v) => FieldValue::Scalar(ScalarValue::Text(v.clone())),
            FieldSpec::Flag(v) => FieldValue::Scalar(ScalarValue::Flag(*v)),
            FieldSpec::Ref(target) => FieldValue::Ref(Some(lookup(target)?)),
            FieldSpec::Refs(targets) => {
                let mut ids = Vec::with_capacity(targets.len());
                for target in targets {
                    ids.push(lookup(target)?);
                }
                FieldValue::RefList(ids)
            }
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
