//! core::descriptor
//!
//! Per-kind entity descriptors.
//!
//! # Architecture
//!
//! The generic repository and updater never learn field semantics. Each
//! entity kind supplies an [`EntityDescriptor`] as configuration: the field
//! policy table (major/minor classification per field, declared explicitly
//! and never inferred), the reference-valued fields with their target kinds
//! and relationship, the owned sub-object lists for FQN propagation and
//! nested reference validation, and the outward relationships removed on
//! soft delete.
//!
//! Kind-specific vocabulary (field names, target kinds) stays inside the
//! descriptor; the engine only asks "what shape is this field and is it
//! major by policy".

use crate::core::types::EntityKind;
use crate::graph::Relationship;

/// Version impact of a change to a field, declared per field per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionImpact {
    /// Changes what the entity fundamentally is; bumps the version by 1.0.
    Major,
    /// Auxiliary metadata; bumps the version by 0.1.
    Minor,
}

impl VersionImpact {
    /// Whether this impact escalates the update to a major version change.
    pub fn is_major(self) -> bool {
        matches!(self, Self::Major)
    }
}

/// The shape of a kind-specific field, selecting its diff primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldShape {
    /// Compared by JSON value equality.
    Scalar,
    /// A pointer to another entity; a change also patches the edge graph.
    Reference {
        /// Kind the reference must resolve to.
        target: EntityKind,
        /// Edge written from this entity to the target.
        relationship: Relationship,
    },
    /// A list of owned sub-objects, diffed by a stable natural key so that
    /// reordering or metadata-only edits never register as add+delete.
    OwnedList {
        /// JSON key identifying an element across versions (usually "name").
        natural_key: &'static str,
    },
}

/// Policy entry for one kind-specific field.
#[derive(Debug, Clone)]
pub struct FieldPolicy {
    /// Field name inside the entity's field map.
    pub name: &'static str,
    /// Explicit major/minor classification.
    pub impact: VersionImpact,
    /// Shape, selecting the diff primitive and any edge side effect.
    pub shape: FieldShape,
}

/// One level of owned sub-objects for FQN propagation and validation.
///
/// Levels nest: an ML feature list owns a feature-source list, for example.
/// A level that declares `external_source_field` names its elements from
/// that reference's FQN instead of the owner hierarchy.
#[derive(Debug, Clone)]
pub struct OwnedListSpec {
    /// Field name of the list inside the entity's field map.
    pub field: &'static str,
    /// JSON key of an element's external source reference, if this level
    /// is reference-sourced.
    pub external_source_field: Option<&'static str>,
    /// Owned lists nested inside each element.
    pub nested: Vec<OwnedListSpec>,
}

impl OwnedListSpec {
    /// A hierarchy-named owned list.
    pub fn owned(field: &'static str) -> Self {
        Self {
            field,
            external_source_field: None,
            nested: vec![],
        }
    }

    /// A reference-sourced owned list: elements carrying `source_field`
    /// are named from that reference's FQN.
    pub fn sourced(field: &'static str, source_field: &'static str) -> Self {
        Self {
            field,
            external_source_field: Some(source_field),
            nested: vec![],
        }
    }

    /// Nest a child level inside each element of this one.
    pub fn with_nested(mut self, nested: OwnedListSpec) -> Self {
        self.nested.push(nested);
        self
    }
}

/// Configuration for one entity kind.
///
/// # Example
///
/// ```
/// use metastore::core::descriptor::{EntityDescriptor, FieldShape, OwnedListSpec, VersionImpact};
/// use metastore::core::types::EntityKind;
/// use metastore::graph::Relationship;
///
/// let descriptor = EntityDescriptor::new(
///     EntityKind::new("mlmodel").unwrap(),
///     EntityKind::new("mlmodel_service").unwrap(),
/// )
/// .field("algorithm", VersionImpact::Major, FieldShape::Scalar)
/// .field(
///     "dashboard",
///     VersionImpact::Minor,
///     FieldShape::Reference {
///         target: EntityKind::new("dashboard").unwrap(),
///         relationship: Relationship::Uses,
///     },
/// )
/// .field(
///     "mlFeatures",
///     VersionImpact::Minor,
///     FieldShape::OwnedList { natural_key: "name" },
/// )
/// .owned(OwnedListSpec::owned("mlFeatures"));
///
/// assert!(descriptor.policy("algorithm").unwrap().impact.is_major());
/// ```
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    /// The kind this descriptor configures.
    pub kind: EntityKind,
    /// The only kind accepted as this entity's parent service.
    pub parent_kind: EntityKind,
    /// Field policy table, in declaration order.
    pub fields: Vec<FieldPolicy>,
    /// Owned sub-object lists for FQN propagation.
    pub owned: Vec<OwnedListSpec>,
    /// Outward relationships removed when the entity is soft-deleted.
    pub lifecycle_relationships: Vec<Relationship>,
}

impl EntityDescriptor {
    /// Create a descriptor with an empty policy table.
    pub fn new(kind: EntityKind, parent_kind: EntityKind) -> Self {
        Self {
            kind,
            parent_kind,
            fields: vec![],
            owned: vec![],
            lifecycle_relationships: vec![],
        }
    }

    /// Declare a field's policy.
    pub fn field(mut self, name: &'static str, impact: VersionImpact, shape: FieldShape) -> Self {
        self.fields.push(FieldPolicy {
            name,
            impact,
            shape,
        });
        self
    }

    /// Declare an owned sub-object list.
    pub fn owned(mut self, spec: OwnedListSpec) -> Self {
        self.owned.push(spec);
        self
    }

    /// Declare an outward relationship removed on soft delete.
    pub fn lifecycle_relationship(mut self, relationship: Relationship) -> Self {
        self.lifecycle_relationships.push(relationship);
        self
    }

    /// Look up a field's policy by name.
    pub fn policy(&self, name: &str) -> Option<&FieldPolicy> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Iterate the reference-shaped fields.
    pub fn reference_fields(
        &self,
    ) -> impl Iterator<Item = (&FieldPolicy, &EntityKind, Relationship)> {
        self.fields.iter().filter_map(|f| match &f.shape {
            FieldShape::Reference {
                target,
                relationship,
            } => Some((f, target, *relationship)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(s: &str) -> EntityKind {
        EntityKind::new(s).unwrap()
    }

    fn sample() -> EntityDescriptor {
        EntityDescriptor::new(kind("mlmodel"), kind("mlmodel_service"))
            .field("algorithm", VersionImpact::Major, FieldShape::Scalar)
            .field(
                "dashboard",
                VersionImpact::Minor,
                FieldShape::Reference {
                    target: kind("dashboard"),
                    relationship: Relationship::Uses,
                },
            )
            .field(
                "mlFeatures",
                VersionImpact::Minor,
                FieldShape::OwnedList {
                    natural_key: "name",
                },
            )
    }

    #[test]
    fn policy_lookup() {
        let d = sample();
        assert!(d.policy("algorithm").unwrap().impact.is_major());
        assert!(!d.policy("dashboard").unwrap().impact.is_major());
        assert!(d.policy("unknown").is_none());
    }

    #[test]
    fn reference_fields_filtered_by_shape() {
        let d = sample();
        let refs: Vec<_> = d.reference_fields().collect();
        assert_eq!(refs.len(), 1);
        let (policy, target, relationship) = &refs[0];
        assert_eq!(policy.name, "dashboard");
        assert_eq!(target.as_str(), "dashboard");
        assert_eq!(*relationship, Relationship::Uses);
    }

    #[test]
    fn nested_owned_specs() {
        let spec = OwnedListSpec::owned("mlFeatures")
            .with_nested(OwnedListSpec::sourced("featureSources", "dataSource"));
        assert_eq!(spec.nested.len(), 1);
        assert_eq!(
            spec.nested[0].external_source_field,
            Some("dataSource")
        );
    }
}
