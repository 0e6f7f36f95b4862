//! core::entity
//!
//! The entity envelope, reference projections, and read policies.
//!
//! # Architecture
//!
//! An [`Entity`] is a typed envelope (identity, naming, version, lifecycle,
//! relationship-bearing attachments) plus an opaque JSON field map holding
//! the kind-specific fields. The generic engine only interprets the field
//! map through an entity descriptor, so many distinct entity kinds share
//! one CRUD layer without per-kind boilerplate.
//!
//! [`EntityReference`] is the lightweight projection used wherever one
//! entity points to another. It is never the owning copy: references are
//! validated at write time and materialized at read time by the resolver.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use super::fqn::Fqn;
use super::types::{EntityId, EntityKind, EntityName, UtcTimestamp, VersionNumber};

/// A lightweight `{id, kind, name, fqn}` projection of an entity.
///
/// # Example
///
/// ```
/// use metastore::core::entity::EntityReference;
/// use metastore::core::types::{EntityId, EntityKind};
///
/// // A stub reference as a client would send it: id and kind only.
/// let stub = EntityReference::stub(
///     EntityId::random(),
///     EntityKind::new("dashboard").unwrap(),
/// );
/// assert!(stub.name.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    pub id: EntityId,
    pub kind: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<EntityName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<Fqn>,
    #[serde(default)]
    pub deleted: bool,
}

impl EntityReference {
    /// A stub reference carrying only identity; the resolver fills the rest.
    pub fn stub(id: EntityId, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            name: None,
            fully_qualified_name: None,
            deleted: false,
        }
    }

    /// Whether two references identify the same entity.
    pub fn same_entity(&self, other: &Self) -> bool {
        self.id == other.id && self.kind == other.kind
    }
}

/// A tag applied to an entity, identified by the tag's FQN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagLabel {
    pub tag_fqn: Fqn,
}

impl TagLabel {
    /// Create a label for the given tag FQN.
    pub fn new(tag_fqn: Fqn) -> Self {
        Self { tag_fqn }
    }
}

/// Soft-delete visibility policy for reads and reference resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Include {
    /// Only live entities (the default).
    #[default]
    NonDeleted,
    /// Only soft-deleted entities.
    Deleted,
    /// Both.
    All,
}

impl Include {
    /// Whether an entity with the given deleted flag is visible.
    pub fn allows(self, deleted: bool) -> bool {
        match self {
            Self::NonDeleted => !deleted,
            Self::Deleted => deleted,
            Self::All => true,
        }
    }
}

/// The set of optional field names a reader wants populated.
///
/// Fields not requested are left unpopulated to avoid unnecessary
/// resolution cost.
///
/// # Example
///
/// ```
/// use metastore::core::entity::FieldSelector;
///
/// let selector = FieldSelector::of(["owner", "tags"]);
/// assert!(selector.contains("owner"));
/// assert!(!selector.contains("followers"));
/// assert!(FieldSelector::all().contains("followers"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldSelector {
    names: HashSet<String>,
    all: bool,
}

impl FieldSelector {
    /// Request no optional fields.
    pub fn none() -> Self {
        Self::default()
    }

    /// Request every optional field.
    pub fn all() -> Self {
        Self {
            names: HashSet::new(),
            all: true,
        }
    }

    /// Request a specific set of optional fields.
    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            all: false,
        }
    }

    /// Whether the given field was requested.
    pub fn contains(&self, name: &str) -> bool {
        self.all || self.names.contains(name)
    }
}

/// A typed, versioned entity document.
///
/// The envelope carries identity, naming, the semantic version, lifecycle
/// state, and the relationship-bearing attachments (service, owner, tags,
/// followers). Everything kind-specific lives in `fields` and is flattened
/// into the JSON document.
///
/// # Example
///
/// ```
/// use metastore::core::entity::Entity;
/// use metastore::core::types::{EntityKind, EntityName};
/// use serde_json::json;
///
/// let entity = Entity::new(
///     EntityKind::new("mlmodel").unwrap(),
///     EntityName::new("forecast").unwrap(),
/// )
/// .with_field("algorithm", json!("xgboost"));
///
/// assert_eq!(entity.version.to_string(), "0.1");
/// assert_eq!(entity.fields["algorithm"], "xgboost");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: EntityName,
    /// Derived from the parent chain; never independently settable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<Fqn>,
    pub version: VersionNumber,
    pub updated_at: UtcTimestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    /// Parent service reference; stored as a CONTAINS edge, not in the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<EntityReference>,
    /// Owner reference; stored as an OWNS edge, not in the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<EntityReference>,
    /// Tag labels; stored in the tag index, not in the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagLabel>>,
    /// Followers; derived from FOLLOWS edges at read time only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers: Option<Vec<EntityReference>>,
    /// Kind-specific fields, interpreted only through the descriptor.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl Entity {
    /// Create a fresh entity at the initial version.
    pub fn new(kind: EntityKind, name: EntityName) -> Self {
        Self {
            id: EntityId::random(),
            kind,
            name,
            fully_qualified_name: None,
            version: VersionNumber::initial(),
            updated_at: UtcTimestamp::now(),
            updated_by: None,
            deleted: false,
            service: None,
            owner: None,
            tags: None,
            followers: None,
            fields: serde_json::Map::new(),
        }
    }

    /// Set the parent service reference.
    pub fn with_service(mut self, service: EntityReference) -> Self {
        self.service = Some(service);
        self
    }

    /// Set the owner reference.
    pub fn with_owner(mut self, owner: EntityReference) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Set the tag labels.
    pub fn with_tags(mut self, tags: Vec<TagLabel>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Set a kind-specific field.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Record who performed the current mutation.
    pub fn with_updated_by(mut self, user: impl Into<String>) -> Self {
        self.updated_by = Some(user.into());
        self
    }

    /// Project this entity to a reference.
    pub fn reference(&self) -> EntityReference {
        EntityReference {
            id: self.id,
            kind: self.kind.clone(),
            name: Some(self.name.clone()),
            fully_qualified_name: self.fully_qualified_name.clone(),
            deleted: self.deleted,
        }
    }

    /// Get a kind-specific field, if present.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Serialize to the JSON document form.
    ///
    /// # Errors
    ///
    /// Returns the underlying serde error on failure.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from the JSON document form.
    ///
    /// # Errors
    ///
    /// Returns the underlying serde error if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
