//! # Annotation Document
//!
//! The caller-owned arena of typed nodes plus the annotation index.
//!
//! Nodes are structured records with declaration-ordered feature slots.
//! Identity is the `NodeId`: the arena may hold shared substructure (two
//! parents referencing the same child) and reference cycles; both are
//! legal and the fact loader tolerates them.
//!
//! All lookups go through `BTreeMap` for deterministic iteration.

use crate::index::AnnotationIndex;
use crate::types::{BridgeError, FeatureDef, FieldValue, NodeId, ScalarValue, TypeId, TypeSystem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One node in the document: a type and its field values, in feature
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// The node's identity.
    pub id: NodeId,
    /// The node's registered type.
    pub type_id: TypeId,
    /// Field values, parallel to the type's feature list.
    pub fields: Vec<FieldValue>,
}

/// The annotation document: a type system, a node arena and the index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    type_system: TypeSystem,
    nodes: BTreeMap<NodeId, NodeRecord>,
    next_node: u64,
    index: AnnotationIndex,
}

impl Document {
    /// Create a document over the given type system.
    #[must_use]
    pub fn new(type_system: TypeSystem) -> Self {
        Self {
            type_system,
            nodes: BTreeMap::new(),
            next_node: 0,
            index: AnnotationIndex::new(),
        }
    }

    /// The document's type system.
    #[must_use]
    pub fn type_system(&self) -> &TypeSystem {
        &self.type_system
    }

    /// Create a node of the given type.
    ///
    /// The supplied fields must match the type's declared feature count and
    /// each value's kind must match its feature's declared range; order is
    /// feature declaration order. Cyclic references are built by creating
    /// nodes first and patching references with
    /// [`set_field`](Self::set_field).
    pub fn create_node(
        &mut self,
        type_id: TypeId,
        fields: Vec<FieldValue>,
    ) -> Result<NodeId, BridgeError> {
        let def = self
            .type_system
            .get(type_id)
            .ok_or(BridgeError::UnknownType(type_id))?;
        if fields.len() != def.features.len() {
            return Err(BridgeError::FieldArity {
                type_name: def.name.clone(),
                expected: def.features.len(),
                actual: fields.len(),
            });
        }
        for (feature, value) in def.features.iter().zip(&fields) {
            if !kind_matches(feature, value) {
                return Err(BridgeError::FieldKind {
                    type_name: def.name.clone(),
                    feature: feature.name.clone(),
                });
            }
        }

        let id = NodeId(self.next_node);
        self.next_node = self.next_node.saturating_add(1);
        self.nodes.insert(id, NodeRecord { id, type_id, fields });
        Ok(id)
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The name of a node's type, if the node exists.
    #[must_use]
    pub fn type_name(&self, id: NodeId) -> Option<&str> {
        let record = self.nodes.get(&id)?;
        self.type_system.name_of(record.type_id)
    }

    /// Get a field value by feature name.
    pub fn field(&self, id: NodeId, feature: &str) -> Result<&FieldValue, BridgeError> {
        let record = self.nodes.get(&id).ok_or(BridgeError::UnknownNode(id))?;
        let def = self
            .type_system
            .get(record.type_id)
            .ok_or(BridgeError::UnknownType(record.type_id))?;
        let slot = def
            .features
            .iter()
            .position(|f| f.name == feature)
            .ok_or_else(|| BridgeError::UnknownFeature {
                type_name: def.name.clone(),
                feature: feature.to_string(),
            })?;
        record
            .fields
            .get(slot)
            .ok_or_else(|| BridgeError::UnknownFeature {
                type_name: def.name.clone(),
                feature: feature.to_string(),
            })
    }

    /// Overwrite a field value by feature name. The new value's kind must
    /// match the feature's declared range.
    ///
    /// This is how cyclic structure is built after node creation.
    pub fn set_field(
        &mut self,
        id: NodeId,
        feature: &str,
        value: FieldValue,
    ) -> Result<(), BridgeError> {
        let record = self.nodes.get(&id).ok_or(BridgeError::UnknownNode(id))?;
        let def = self
            .type_system
            .get(record.type_id)
            .ok_or(BridgeError::UnknownType(record.type_id))?;
        let slot = def
            .features
            .iter()
            .position(|f| f.name == feature)
            .ok_or_else(|| BridgeError::UnknownFeature {
                type_name: def.name.clone(),
                feature: feature.to_string(),
            })?;
        if !kind_matches(&def.features[slot], &value) {
            return Err(BridgeError::FieldKind {
                type_name: def.name.clone(),
                feature: feature.to_string(),
            });
        }
        if let Some(record) = self.nodes.get_mut(&id) {
            if let Some(field) = record.fields.get_mut(slot) {
                *field = value;
            }
        }
        Ok(())
    }

    /// Overwrite a scalar feature. Errors if the feature currently holds a
    /// structured value.
    pub fn set_scalar(
        &mut self,
        id: NodeId,
        feature: &str,
        value: ScalarValue,
    ) -> Result<(), BridgeError> {
        match self.field(id, feature)? {
            FieldValue::Scalar(_) => self.set_field(id, feature, FieldValue::Scalar(value)),
            _ => Err(BridgeError::NotScalar {
                feature: feature.to_string(),
            }),
        }
    }

    /// The annotation index.
    #[must_use]
    pub fn index(&self) -> &AnnotationIndex {
        &self.index
    }

    /// Mutable access to the annotation index.
    ///
    /// While a session is live this is reserved for the index synchronizer.
    pub fn index_mut(&mut self) -> &mut AnnotationIndex {
        &mut self.index
    }

    /// Reset the index for a fresh run.
    pub fn reset_index(&mut self) {
        self.index.clear();
    }
}

/// Scalar features hold scalars; structured features hold references or
/// reference lists.
fn kind_matches(feature: &FeatureDef, value: &FieldValue) -> bool {
    match value {
        FieldValue::Scalar(_) => feature.primitive_range,
        FieldValue::Ref(_) | FieldValue::RefList(_) => !feature.primitive_range,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureDef;

    fn token_doc() -> (Document, TypeId) {
        let mut ts = TypeSystem::new();
        let token = ts
            .define(
                "Token",
                vec![FeatureDef::scalar("text"), FeatureDef::reference("next")],
            )
            .expect("define");
        (Document::new(ts), token)
    }

    #[test]
    fn create_node_validates_arity() {
        let (mut doc, token) = token_doc();

        let result = doc.create_node(token, vec![]);
        assert!(matches!(result, Err(BridgeError::FieldArity { .. })));
    }

    #[test]
    fn create_and_read_fields() {
        let (mut doc, token) = token_doc();
        let id = doc
            .create_node(
                token,
                vec![
                    FieldValue::Scalar(ScalarValue::Text("hello".to_string())),
                    FieldValue::Ref(None),
                ],
            )
            .expect("create");

        assert_eq!(
            doc.field(id, "text").expect("field"),
            &FieldValue::Scalar(ScalarValue::Text("hello".to_string()))
        );
        assert_eq!(doc.type_name(id), Some("Token"));
    }

    #[test]
    fn set_field_builds_cycles() {
        let (mut doc, token) = token_doc();
        let id = doc
            .create_node(
                token,
                vec![
                    FieldValue::Scalar(ScalarValue::Text("loop".to_string())),
                    FieldValue::Ref(None),
                ],
            )
            .expect("create");

        doc.set_field(id, "next", FieldValue::Ref(Some(id)))
            .expect("set");

        assert_eq!(doc.field(id, "next").expect("field"), &FieldValue::Ref(Some(id)));
    }

    #[test]
    fn create_node_rejects_mismatched_field_kind() {
        let (mut doc, token) = token_doc();

        // A reference where the declared range is scalar.
        let result = doc.create_node(
            token,
            vec![FieldValue::Ref(None), FieldValue::Ref(None)],
        );
        assert!(matches!(
            result,
            Err(BridgeError::FieldKind { ref feature, .. }) if feature == "text"
        ));
    }

    #[test]
    fn set_field_rejects_kind_change() {
        let (mut doc, token) = token_doc();
        let id = doc
            .create_node(
                token,
                vec![
                    FieldValue::Scalar(ScalarValue::Text("x".to_string())),
                    FieldValue::Ref(None),
                ],
            )
            .expect("create");

        let scalar_into_reference =
            doc.set_field(id, "next", FieldValue::Scalar(ScalarValue::Int(1)));
        assert!(matches!(
            scalar_into_reference,
            Err(BridgeError::FieldKind { .. })
        ));

        let reference_into_scalar = doc.set_field(id, "text", FieldValue::Ref(Some(id)));
        assert!(matches!(
            reference_into_scalar,
            Err(BridgeError::FieldKind { .. })
        ));

        // A list is a legal kind for a structured feature.
        doc.set_field(id, "next", FieldValue::RefList(vec![id]))
            .expect("set list");
    }

    #[test]
    fn set_scalar_rejects_structured_feature() {
        let (mut doc, token) = token_doc();
        let id = doc
            .create_node(
                token,
                vec![
                    FieldValue::Scalar(ScalarValue::Text("x".to_string())),
                    FieldValue::Ref(None),
                ],
            )
            .expect("create");

        let result = doc.set_scalar(id, "next", ScalarValue::Int(1));
        assert!(matches!(result, Err(BridgeError::NotScalar { .. })));
    }

    #[test]
    fn unknown_feature_reported_with_type_name() {
        let (mut doc, token) = token_doc();
        let id = doc
            .create_node(
                token,
                vec![
                    FieldValue::Scalar(ScalarValue::Text("x".to_string())),
                    FieldValue::Ref(None),
                ],
            )
            .expect("create");

        let result = doc.field(id, "missing");
        assert!(matches!(
            result,
            Err(BridgeError::UnknownFeature { ref type_name, .. }) if type_name == "Token"
        ));
    }

    #[test]
    fn reset_index_clears_entries() {
        let (mut doc, _token) = token_doc();
        doc.index_mut().add(NodeId(0));
        doc.reset_index();

        assert!(doc.index().is_empty());
    }
}
