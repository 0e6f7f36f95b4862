//! repository
//!
//! Generic CRUD orchestration over the persistence collaborator.
//!
//! # Architecture
//!
//! One [`EntityRepository`] is instantiated per entity kind, configured by
//! an [`EntityDescriptor`] rather than subclassed. Every write follows the
//! same lifecycle:
//!
//! ```text
//! prepare (validate + resolve references + compute FQN)
//!   -> store (persist the stripped document)
//!   -> relate (write relationship edges)
//!   -> version (append the history record)
//! ```
//!
//! Updates run through an [`updater::EntityUpdater`] bound to
//! `(original, updated, operation)` which drives the change recorder and
//! patches the edge graph for reference-valued fields.
//!
//! # Invariants
//!
//! - Validation and reference errors surface during `prepare`, before any
//!   persistence side effect; reference errors are aggregated, not
//!   fail-fast
//! - Relationship-bearing fields (service, owner, tags, reference fields)
//!   are stripped from stored documents and derived from edges on read
//! - `store_relationships` is idempotent; re-running it never duplicates
//!   edges
//!
//! # Modules
//!
//! - [`resolver`] - Typed identifier resolution against the store
//! - [`updater`] - Per-transaction diff + edge patch + version bump

pub mod resolver;
pub mod updater;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::change::ChangeDescription;
use crate::core::descriptor::{EntityDescriptor, OwnedListSpec};
use crate::core::entity::{Entity, EntityReference, FieldSelector, Include};
use crate::core::fqn::{propagate_owned, Fqn, FqnError};
use crate::core::types::{EntityId, EntityKind, UtcTimestamp, VersionNumber};
use crate::graph::{EdgePattern, Relationship};
use crate::store::{EntityStore, StoreError, VersionRecord};

use resolver::{ReferenceResolver, ResolveError};
use updater::EntityUpdater;

pub use updater::Operation;

/// One invalid reference detected during `prepare`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidReference {
    /// The field (or dotted sub-object path) carrying the reference.
    pub field: String,
    pub kind: EntityKind,
    pub id: EntityId,
}

impl std::fmt::Display for InvalidReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "field '{}': {}/{}", self.field, self.kind, self.id)
    }
}

fn format_invalid(refs: &[InvalidReference]) -> String {
    refs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The target entity does not exist (or is excluded by the include policy).
    #[error("entity not found: {kind}/{id}")]
    NotFound { kind: EntityKind, id: EntityId },

    /// An entity with the same fully-qualified name already exists.
    #[error("entity already exists: {fqn}")]
    AlreadyExists { fqn: Fqn },

    /// The referenced parent is not of the kind this repository accepts.
    #[error("invalid service kind '{found}': expected '{expected}'")]
    InvalidServiceKind {
        found: EntityKind,
        expected: EntityKind,
    },

    /// One or more referenced entities do not exist. All invalid
    /// references detected during `prepare` are aggregated here.
    #[error("referenced entities not found: {}", format_invalid(.0))]
    ReferenceNotFound(Vec<InvalidReference>),

    /// A concurrent writer won the optimistic version race. Retryable:
    /// re-read the entity and reapply the change.
    #[error("version conflict: expected {expected}, found {actual}")]
    Conflict {
        expected: VersionNumber,
        actual: VersionNumber,
    },

    /// Malformed input (bad name, missing service, malformed reference).
    #[error("validation failed: {0}")]
    Validation(String),

    /// FQN computation failed.
    #[error(transparent)]
    Fqn(#[from] FqnError),

    /// The persistence collaborator failed.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { expected, actual } => Self::Conflict { expected, actual },
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Store(other),
        }
    }
}

impl From<ResolveError> for RepositoryError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound { kind, id } => Self::NotFound { kind, id },
            ResolveError::Parse { kind, id, message } => {
                Self::Validation(format!("stored entity {kind}/{id} is malformed: {message}"))
            }
            ResolveError::Store(e) => e.into(),
        }
    }
}

/// Whether a delete removes the document or only marks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Mark the soft-delete flag and remove lifecycle-sensitive outward
    /// edges; the document, history, and remaining edges survive.
    Soft,
    /// Remove the document, every edge at either endpoint, tags, and
    /// history.
    Hard,
}

/// Generic entity repository, one instantiation per entity kind.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use metastore::core::descriptor::EntityDescriptor;
/// use metastore::core::types::EntityKind;
/// use metastore::repository::EntityRepository;
/// use metastore::store::InMemoryStore;
///
/// let store = Arc::new(InMemoryStore::new());
/// let descriptor = EntityDescriptor::new(
///     EntityKind::new("mlmodel").unwrap(),
///     EntityKind::new("mlmodel_service").unwrap(),
/// );
/// let repository = EntityRepository::new(store, descriptor);
/// assert_eq!(repository.descriptor().kind.as_str(), "mlmodel");
/// ```
pub struct EntityRepository<S: EntityStore> {
    pub(crate) store: Arc<S>,
    pub(crate) descriptor: EntityDescriptor,
}

impl<S: EntityStore> EntityRepository<S> {
    /// Create a repository for one entity kind over the given store.
    pub fn new(store: Arc<S>, descriptor: EntityDescriptor) -> Self {
        Self { store, descriptor }
    }

    /// The descriptor configuring this repository.
    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    fn resolver(&self) -> ReferenceResolver<'_> {
        ReferenceResolver::new(self.store.as_ref())
    }

    fn required_fqn(entity: &Entity) -> Result<Fqn, RepositoryError> {
        entity
            .fully_qualified_name
            .clone()
            .ok_or_else(|| RepositoryError::Validation("entity has no fully-qualified name".into()))
    }

    // ------------------------------------------------------------------
    // Prepare
    // ------------------------------------------------------------------

    /// Validate an entity and compute its derived naming.
    ///
    /// Resolves the parent service reference (replacing the caller's stub
    /// with the live projection), computes and propagates the FQN, and
    /// validates every reference field and nested external-source
    /// reference. Invalid references are aggregated: the operation fails
    /// once, citing all of them.
    ///
    /// Idempotent; updates re-run it for re-validation.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::Validation`] for a missing service or a
    ///   malformed reference value
    /// - [`RepositoryError::InvalidServiceKind`] for a wrong-kind parent
    /// - [`RepositoryError::ReferenceNotFound`] aggregating every
    ///   unresolvable reference
    pub fn prepare(&self, entity: &mut Entity) -> Result<(), RepositoryError> {
        if entity.kind != self.descriptor.kind {
            return Err(RepositoryError::Validation(format!(
                "entity kind '{}' does not match repository kind '{}'",
                entity.kind, self.descriptor.kind
            )));
        }

        // Parent service: required, kind-checked, then resolved.
        let stub = entity
            .service
            .clone()
            .ok_or_else(|| RepositoryError::Validation("service reference is required".into()))?;
        if stub.kind != self.descriptor.parent_kind {
            return Err(RepositoryError::InvalidServiceKind {
                found: stub.kind,
                expected: self.descriptor.parent_kind.clone(),
            });
        }
        let service = match self.resolver().resolve(&stub.kind, stub.id, Include::NonDeleted) {
            Ok(service) => service,
            Err(ResolveError::NotFound { kind, id }) => {
                return Err(RepositoryError::ReferenceNotFound(vec![InvalidReference {
                    field: "service".into(),
                    kind,
                    id,
                }]))
            }
            Err(other) => return Err(other.into()),
        };

        // FQN: derived from the parent chain, then pushed into owned
        // sub-objects.
        let parent_fqn = match &service.fully_qualified_name {
            Some(fqn) => fqn.clone(),
            None => Fqn::root(
                service
                    .name
                    .as_ref()
                    .map(|n| n.as_str().to_string())
                    .ok_or_else(|| {
                        RepositoryError::Validation("service reference has no name".into())
                    })?,
            )?,
        };
        let fqn = parent_fqn.add(entity.name.as_str())?;
        propagate_owned(&mut entity.fields, &fqn, &self.descriptor.owned)?;
        entity.fully_qualified_name = Some(fqn);
        entity.service = Some(service);

        // Reference validation, aggregated across every invalid entry.
        let mut invalid = Vec::new();

        if let Some(owner) = &entity.owner {
            self.check_reference("owner", owner, &mut invalid)?;
        }

        for (policy, target, _) in self.descriptor.reference_fields() {
            let Some(value) = entity.fields.get(policy.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let reference = parse_reference(policy.name, value)?;
            if reference.kind != *target {
                return Err(RepositoryError::Validation(format!(
                    "field '{}' must reference kind '{}', got '{}'",
                    policy.name, target, reference.kind
                )));
            }
            self.check_reference(policy.name, &reference, &mut invalid)?;
        }

        let mut sources = Vec::new();
        collect_source_references(&entity.fields, &self.descriptor.owned, "", &mut sources)?;
        for (path, reference) in &sources {
            self.check_reference(path, reference, &mut invalid)?;
        }

        if !invalid.is_empty() {
            return Err(RepositoryError::ReferenceNotFound(invalid));
        }
        Ok(())
    }

    fn check_reference(
        &self,
        field: &str,
        reference: &EntityReference,
        invalid: &mut Vec<InvalidReference>,
    ) -> Result<(), RepositoryError> {
        match self
            .resolver()
            .resolve(&reference.kind, reference.id, Include::NonDeleted)
        {
            Ok(_) => Ok(()),
            Err(ResolveError::NotFound { kind, id }) => {
                invalid.push(InvalidReference {
                    field: field.to_string(),
                    kind,
                    id,
                });
                Ok(())
            }
            Err(other) => Err(other.into()),
        }
    }

    // ------------------------------------------------------------------
    // Store
    // ------------------------------------------------------------------

    /// The immutable view of an entity destined for persistence.
    ///
    /// Relationship-bearing fields are derivable from edges and must never
    /// be duplicated into the stored document. The caller's full view is
    /// left untouched; concurrent readers never observe a half-stripped
    /// object.
    pub(crate) fn stored_view(&self, entity: &Entity) -> Entity {
        let mut view = entity.clone();
        view.service = None;
        view.owner = None;
        view.tags = None;
        view.followers = None;
        for (policy, _, _) in self.descriptor.reference_fields() {
            view.fields.remove(policy.name);
        }
        view
    }

    /// Persist an entity's stored view.
    ///
    /// `expected_version` carries the optimistic check on updates.
    pub(crate) fn store_document(
        &self,
        entity: &Entity,
        expected_version: Option<VersionNumber>,
    ) -> Result<String, RepositoryError> {
        let view = self.stored_view(entity);
        let json = view
            .to_json()
            .map_err(|e| RepositoryError::Store(StoreError::Serialize(e.to_string())))?;
        self.store
            .put_document(&entity.kind, entity.id, &json, expected_version)?;
        Ok(json)
    }

    /// Write the entity's relationship edges and tags.
    ///
    /// Idempotent: edges are upserts and tag application replaces the full
    /// set, so re-running with identical input leaves the graph unchanged.
    pub fn store_relationships(&self, entity: &Entity) -> Result<(), RepositoryError> {
        if let Some(service) = &entity.service {
            self.store.add_edge(crate::graph::Edge::new(
                service.id,
                service.kind.clone(),
                entity.id,
                entity.kind.clone(),
                Relationship::Contains,
            ))?;
        }
        if let Some(owner) = &entity.owner {
            self.store.add_edge(crate::graph::Edge::new(
                owner.id,
                owner.kind.clone(),
                entity.id,
                entity.kind.clone(),
                Relationship::Owns,
            ))?;
        }
        for (policy, target, relationship) in self.descriptor.reference_fields() {
            let Some(value) = entity.fields.get(policy.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let reference = parse_reference(policy.name, value)?;
            self.store.add_edge(crate::graph::Edge::new(
                entity.id,
                entity.kind.clone(),
                reference.id,
                target.clone(),
                relationship,
            ))?;
        }
        if let Some(tags) = &entity.tags {
            let fqn = Self::required_fqn(entity)?;
            self.store.apply_tags(&fqn, tags)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Create / update
    // ------------------------------------------------------------------

    /// Create a new entity: prepare, store, relate, version.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::AlreadyExists`] if an entity already holds the
    /// computed FQN, plus any `prepare` failure.
    pub fn create(&self, mut entity: Entity) -> Result<Entity, RepositoryError> {
        self.prepare(&mut entity)?;
        let fqn = Self::required_fqn(&entity)?;
        if self.store.find_id_by_name(&entity.kind, &fqn)?.is_some() {
            return Err(RepositoryError::AlreadyExists { fqn });
        }
        self.persist_new(entity)
    }

    /// Create the entity, or run the PUT-update path when one already
    /// exists under the computed FQN.
    ///
    /// Returns the stored entity and, for updates, the change description.
    pub fn create_or_update(
        &self,
        mut entity: Entity,
    ) -> Result<(Entity, Option<ChangeDescription>), RepositoryError> {
        self.prepare(&mut entity)?;
        let fqn = Self::required_fqn(&entity)?;
        match self.store.find_id_by_name(&entity.kind, &fqn)? {
            None => Ok((self.persist_new(entity)?, None)),
            Some(existing) => {
                let original = self.get(existing, &FieldSelector::all(), Include::All)?;
                entity.id = existing;
                let (stored, change) = self.update_prepared(original, entity, Operation::Put)?;
                Ok((stored, Some(change)))
            }
        }
    }

    fn persist_new(&self, mut entity: Entity) -> Result<Entity, RepositoryError> {
        entity.version = VersionNumber::initial();
        entity.updated_at = UtcTimestamp::now();
        let document = self.store_document(&entity, None)?;
        self.store_relationships(&entity)?;
        self.store.put_version(
            entity.id,
            VersionRecord {
                version: entity.version,
                document,
                change: ChangeDescription::new(entity.version),
                recorded_by: entity.updated_by.clone(),
            },
        )?;
        info!(
            kind = %entity.kind,
            id = %entity.id,
            fqn = %entity.fully_qualified_name.as_ref().map(Fqn::as_str).unwrap_or(""),
            "entity created"
        );
        Ok(entity)
    }

    /// Update an entity against its stored original.
    ///
    /// Re-runs `prepare` on the updated view, then drives the per-kind
    /// diff: change recording, edge patches for reference fields, version
    /// bump, and the history record. A no-op update leaves version,
    /// document, and edges untouched.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::AlreadyExists`] when the recomputed FQN (after a
    /// rename or service move) collides with a different entity.
    pub fn update(
        &self,
        original: Entity,
        mut updated: Entity,
        operation: Operation,
    ) -> Result<(Entity, ChangeDescription), RepositoryError> {
        if operation == Operation::Patch {
            // Patch cannot change identity, naming, or containment.
            updated.name = original.name.clone();
            updated.service = original.service.clone();
            updated.fully_qualified_name = original.fully_qualified_name.clone();
        }
        updated.id = original.id;
        self.prepare(&mut updated)?;
        let fqn = Self::required_fqn(&updated)?;
        if let Some(holder) = self.store.find_id_by_name(&updated.kind, &fqn)? {
            // A rename must not hijack another entity's name-index entry.
            if holder != updated.id {
                return Err(RepositoryError::AlreadyExists { fqn });
            }
        }
        self.update_prepared(original, updated, operation)
    }

    fn update_prepared(
        &self,
        original: Entity,
        updated: Entity,
        operation: Operation,
    ) -> Result<(Entity, ChangeDescription), RepositoryError> {
        EntityUpdater::new(self, original, updated, operation).apply()
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Read an entity, populating only the requested optional fields.
    ///
    /// The service reference is always populated; owner, tags, followers,
    /// and descriptor reference fields are populated only when selected,
    /// to avoid unnecessary resolution cost.
    pub fn get(
        &self,
        id: EntityId,
        selector: &FieldSelector,
        include: Include,
    ) -> Result<Entity, RepositoryError> {
        let kind = self.descriptor.kind.clone();
        let document = self
            .store
            .get_document(&kind, id)?
            .ok_or_else(|| RepositoryError::NotFound {
                kind: kind.clone(),
                id,
            })?;
        let mut entity = Entity::from_json(&document).map_err(|e| {
            RepositoryError::Validation(format!("stored entity {kind}/{id} is malformed: {e}"))
        })?;
        if !include.allows(entity.deleted) {
            return Err(RepositoryError::NotFound { kind, id });
        }

        let resolver = self.resolver();

        // Containment is structural; always materialize it.
        let contains = self
            .store
            .find_edges(&EdgePattern::to_entity(id).relationship(Relationship::Contains))?;
        if let Some(edge) = contains.first() {
            entity.service = Some(resolver.resolve(&edge.from_kind, edge.from_id, Include::All)?);
        }

        if selector.contains("owner") {
            let owns = self
                .store
                .find_edges(&EdgePattern::to_entity(id).relationship(Relationship::Owns))?;
            if let Some(edge) = owns.first() {
                entity.owner =
                    Some(resolver.resolve(&edge.from_kind, edge.from_id, Include::All)?);
            }
        }

        if selector.contains("tags") {
            let fqn = Self::required_fqn(&entity)?;
            entity.tags = Some(self.store.get_tags(&fqn)?);
        }

        if selector.contains("followers") {
            let mut edges = self
                .store
                .find_edges(&EdgePattern::to_entity(id).relationship(Relationship::Follows))?;
            edges.sort_by_key(|e| e.from_id);
            let mut followers = Vec::with_capacity(edges.len());
            for edge in edges {
                followers.push(resolver.resolve(&edge.from_kind, edge.from_id, Include::All)?);
            }
            entity.followers = Some(followers);
        }

        for (policy, target, relationship) in self.descriptor.reference_fields() {
            if !selector.contains(policy.name) {
                continue;
            }
            let edges = self.store.find_edges(
                &EdgePattern::from_entity(id)
                    .relationship(relationship)
                    .to_kind(target.clone()),
            )?;
            if let Some(edge) = edges.first() {
                let reference = resolver.resolve(&edge.to_kind, edge.to_id, Include::All)?;
                let value = serde_json::to_value(&reference)
                    .map_err(|e| RepositoryError::Store(StoreError::Serialize(e.to_string())))?;
                entity.fields.insert(policy.name.to_string(), value);
            }
        }

        Ok(entity)
    }

    /// Read an entity by fully-qualified name.
    pub fn get_by_name(
        &self,
        fqn: &Fqn,
        selector: &FieldSelector,
        include: Include,
    ) -> Result<Entity, RepositoryError> {
        let id = self
            .store
            .find_id_by_name(&self.descriptor.kind, fqn)?
            .ok_or_else(|| RepositoryError::Validation(format!("no entity named '{fqn}'")))?;
        self.get(id, selector, include)
    }

    // ------------------------------------------------------------------
    // Followers
    // ------------------------------------------------------------------

    /// Record that `follower` follows the entity. Idempotent.
    pub fn add_follower(
        &self,
        id: EntityId,
        follower: &EntityReference,
    ) -> Result<(), RepositoryError> {
        // The target must exist and be live.
        self.get(id, &FieldSelector::none(), Include::NonDeleted)?;
        self.resolver()
            .resolve(&follower.kind, follower.id, Include::NonDeleted)
            .map_err(|e| match e {
                ResolveError::NotFound { kind, id } => {
                    RepositoryError::ReferenceNotFound(vec![InvalidReference {
                        field: "follower".into(),
                        kind,
                        id,
                    }])
                }
                other => other.into(),
            })?;
        self.store.add_edge(crate::graph::Edge::new(
            follower.id,
            follower.kind.clone(),
            id,
            self.descriptor.kind.clone(),
            Relationship::Follows,
        ))?;
        Ok(())
    }

    /// Remove a follower edge. Idempotent.
    pub fn delete_follower(
        &self,
        id: EntityId,
        follower_id: EntityId,
    ) -> Result<(), RepositoryError> {
        let mut pattern = EdgePattern::to_entity(id).relationship(Relationship::Follows);
        pattern.from_id = Some(follower_id);
        self.store.delete_edges(&pattern)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete / restore
    // ------------------------------------------------------------------

    /// Delete an entity.
    ///
    /// Soft delete marks the flag and removes only the descriptor's
    /// lifecycle-sensitive outward edges; hard delete removes the
    /// document, every edge at either endpoint, tags, and history.
    pub fn delete(&self, id: EntityId, mode: DeleteMode) -> Result<(), RepositoryError> {
        let entity = self.get(id, &FieldSelector::none(), Include::All)?;
        match mode {
            DeleteMode::Soft => {
                let mut marked = entity;
                let expected = marked.version;
                marked.deleted = true;
                self.store_document(&marked, Some(expected))?;
                for relationship in &self.descriptor.lifecycle_relationships {
                    let removed = self
                        .store
                        .delete_edges(&EdgePattern::from_entity(id).relationship(*relationship))?;
                    debug!(id = %id, relationship = %relationship, removed, "lifecycle edges removed");
                }
                info!(kind = %self.descriptor.kind, id = %id, "entity soft-deleted");
            }
            DeleteMode::Hard => {
                self.store.delete_document(&entity.kind, id)?;
                for pattern in EdgePattern::either_endpoint(id) {
                    self.store.delete_edges(&pattern)?;
                }
                if let Some(fqn) = &entity.fully_qualified_name {
                    self.store.delete_tags(fqn)?;
                }
                self.store.delete_versions(id)?;
                info!(kind = %self.descriptor.kind, id = %id, "entity hard-deleted");
            }
        }
        Ok(())
    }

    /// Clear the soft-delete flag.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Validation`] if the entity is not soft-deleted.
    pub fn restore(&self, id: EntityId) -> Result<Entity, RepositoryError> {
        let mut entity = self.get(id, &FieldSelector::none(), Include::All)?;
        if !entity.deleted {
            return Err(RepositoryError::Validation(format!(
                "entity {}/{} is not deleted",
                entity.kind, id
            )));
        }
        let expected = entity.version;
        entity.deleted = false;
        self.store_document(&entity, Some(expected))?;
        info!(kind = %entity.kind, id = %id, "entity restored");
        Ok(entity)
    }

    // ------------------------------------------------------------------
    // Version history
    // ------------------------------------------------------------------

    /// All history records for an entity, oldest first.
    pub fn list_versions(&self, id: EntityId) -> Result<Vec<VersionRecord>, RepositoryError> {
        Ok(self.store.get_versions(id)?)
    }

    /// One history record.
    pub fn get_version(
        &self,
        id: EntityId,
        version: VersionNumber,
    ) -> Result<VersionRecord, RepositoryError> {
        self.store
            .get_version(id, version)?
            .ok_or_else(|| RepositoryError::NotFound {
                kind: self.descriptor.kind.clone(),
                id,
            })
    }
}

/// Parse a reference-valued JSON field into an [`EntityReference`].
pub(crate) fn parse_reference(
    field: &str,
    value: &Value,
) -> Result<EntityReference, RepositoryError> {
    serde_json::from_value(value.clone()).map_err(|e| {
        RepositoryError::Validation(format!("field '{field}' is not a valid reference: {e}"))
    })
}

/// Collect every nested external-source reference under the owned specs.
fn collect_source_references(
    fields: &serde_json::Map<String, Value>,
    specs: &[OwnedListSpec],
    prefix: &str,
    out: &mut Vec<(String, EntityReference)>,
) -> Result<(), RepositoryError> {
    for spec in specs {
        let path = if prefix.is_empty() {
            spec.field.to_string()
        } else {
            format!("{prefix}.{}", spec.field)
        };
        let Some(Value::Array(items)) = fields.get(spec.field) else {
            continue;
        };
        for item in items {
            let Some(obj) = item.as_object() else {
                continue;
            };
            if let Some(source_field) = spec.external_source_field {
                if let Some(value) = obj.get(source_field) {
                    if !value.is_null() {
                        let source_path = format!("{path}.{source_field}");
                        let reference = parse_reference(&source_path, value)?;
                        out.push((source_path, reference));
                    }
                }
            }
            if !spec.nested.is_empty() {
                collect_source_references(obj, &spec.nested, &path, out)?;
            }
        }
    }
    Ok(())
}
