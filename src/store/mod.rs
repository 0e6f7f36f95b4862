//! store
//!
//! The persistence collaborator boundary.
//!
//! # Architecture
//!
//! The repository core does not own durability. It consumes an
//! [`EntityStore`]: a document store keyed by `(kind, id)` with an
//! optimistic version check, relationship-edge primitives, an append-only
//! version history, and tag application keyed by target FQN. Hosts plug in
//! their own implementation; [`memory::InMemoryStore`] is the reference
//! implementation used by tests and embeddable directly.
//!
//! # Concurrency
//!
//! Implementations must be safe to invoke re-entrantly from multiple
//! threads; the core holds no locks of its own. Conflicting writers against
//! the same entity are serialized by the store's version check, surfacing
//! [`StoreError::Conflict`], which is retryable by the caller. The core
//! never auto-retries.

pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::change::ChangeDescription;
use crate::core::entity::TagLabel;
use crate::core::fqn::Fqn;
use crate::core::types::{EntityId, EntityKind, VersionNumber};
use crate::graph::{Edge, EdgePattern};

pub use memory::InMemoryStore;

/// Errors from the persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document exists for the kind/id.
    #[error("document not found: {kind}/{id}")]
    NotFound { kind: EntityKind, id: EntityId },

    /// The optimistic version check failed - a concurrent writer won.
    ///
    /// Retryable: re-read the entity and reapply the change.
    #[error("version conflict: expected {expected}, found {actual}")]
    Conflict {
        expected: VersionNumber,
        actual: VersionNumber,
    },

    /// A stored document could not be parsed.
    #[error("failed to parse document: {0}")]
    Parse(String),

    /// A value could not be serialized for storage.
    #[error("failed to serialize: {0}")]
    Serialize(String),
}

/// One entry in an entity's append-only version history.
///
/// Keyed by `(entity_id, version)`; holds the document snapshot at that
/// version and the change description that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub version: VersionNumber,
    /// The stored document snapshot (JSON) at this version.
    pub document: String,
    pub change: ChangeDescription,
    pub recorded_by: Option<String>,
}

/// The persistence collaborator consumed by the repository.
///
/// Documents are opaque JSON strings; the store only inspects the envelope
/// far enough to maintain its version check and FQN lookup.
pub trait EntityStore: Send + Sync {
    /// Read a document, `None` if absent.
    fn get_document(&self, kind: &EntityKind, id: EntityId)
        -> Result<Option<String>, StoreError>;

    /// Write a document.
    ///
    /// When `expected_version` is set, the write only succeeds if the
    /// currently stored document carries that version; otherwise
    /// [`StoreError::Conflict`] is returned and nothing is written.
    fn put_document(
        &self,
        kind: &EntityKind,
        id: EntityId,
        document: &str,
        expected_version: Option<VersionNumber>,
    ) -> Result<(), StoreError>;

    /// Delete a document.
    fn delete_document(&self, kind: &EntityKind, id: EntityId) -> Result<(), StoreError>;

    /// Look up an entity id by its fully-qualified name.
    fn find_id_by_name(&self, kind: &EntityKind, fqn: &Fqn) -> Result<Option<EntityId>, StoreError>;

    /// Add an edge with upsert semantics. Returns whether the edge was new.
    fn add_edge(&self, edge: Edge) -> Result<bool, StoreError>;

    /// Delete all edges matching the pattern, returning how many were removed.
    fn delete_edges(&self, pattern: &EdgePattern) -> Result<usize, StoreError>;

    /// Find all edges matching the pattern.
    fn find_edges(&self, pattern: &EdgePattern) -> Result<Vec<Edge>, StoreError>;

    /// Append a version-history record. Re-writing an existing version
    /// replaces that record, so retried writers converge.
    fn put_version(&self, entity: EntityId, record: VersionRecord) -> Result<(), StoreError>;

    /// All history records for an entity, oldest first.
    fn get_versions(&self, entity: EntityId) -> Result<Vec<VersionRecord>, StoreError>;

    /// One history record, `None` if absent.
    fn get_version(
        &self,
        entity: EntityId,
        version: VersionNumber,
    ) -> Result<Option<VersionRecord>, StoreError>;

    /// Drop an entity's entire history (hard delete only).
    fn delete_versions(&self, entity: EntityId) -> Result<(), StoreError>;

    /// Replace the full tag label set for a target FQN.
    fn apply_tags(&self, target: &Fqn, labels: &[TagLabel]) -> Result<(), StoreError>;

    /// Read the tag label set for a target FQN.
    fn get_tags(&self, target: &Fqn) -> Result<Vec<TagLabel>, StoreError>;

    /// Drop all tags for a target FQN.
    fn delete_tags(&self, target: &Fqn) -> Result<(), StoreError>;
}
