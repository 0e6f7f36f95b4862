//! repository::updater
//!
//! The per-transaction update driver.
//!
//! # Architecture
//!
//! An [`EntityUpdater`] is bound to one `(original, updated, operation)`
//! triple and lives for one transaction. It walks the descriptor's field
//! policy table, wiring each field through the matching diff primitive of
//! the change recorder, and accumulates edge operations for
//! reference-valued fields. Nothing is persisted until every diff has
//! run; a failure mid-diff leaves the store untouched.
//!
//! # Invariants
//!
//! - A no-op update writes nothing: no document, no version bump, no
//!   edge churn
//! - Replacing a reference rewrites the edge toward the incoming value;
//!   the old edge is removed by pattern first
//! - The document write carries the original version as its optimistic
//!   check, so a concurrent writer surfaces as a conflict, not a lost
//!   update

use serde_json::Value;
use tracing::{debug, info};

use crate::core::change::{entity_reference_match, field_match, ChangeDescription, ChangeRecorder};
use crate::core::descriptor::FieldShape;
use crate::core::entity::{Entity, TagLabel};
use crate::core::types::UtcTimestamp;
use crate::graph::{Edge, EdgePattern, Relationship};
use crate::store::{EntityStore, StoreError, VersionRecord};

use super::{parse_reference, EntityRepository, RepositoryError};

/// The write operation driving an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Full replacement of the caller-settable state.
    Put,
    /// Partial modification; identity, naming, and containment are pinned
    /// to the original.
    Patch,
}

/// A deferred edge mutation, applied only after the document write.
enum EdgeOp {
    Add(Edge),
    DeleteMatching(EdgePattern),
}

/// Drives one update transaction: diff, edge patch, version bump, history.
pub struct EntityUpdater<'a, S: EntityStore> {
    repository: &'a EntityRepository<S>,
    original: Entity,
    updated: Entity,
    operation: Operation,
    recorder: ChangeRecorder,
    edge_ops: Vec<EdgeOp>,
    tags_changed: bool,
}

impl<'a, S: EntityStore> EntityUpdater<'a, S> {
    /// Bind an updater to one transaction.
    ///
    /// `original` must be the stored entity with all optional fields
    /// populated; `updated` must already be prepared.
    pub fn new(
        repository: &'a EntityRepository<S>,
        original: Entity,
        mut updated: Entity,
        operation: Operation,
    ) -> Self {
        // Updates never toggle the lifecycle flag; delete/restore do.
        updated.deleted = original.deleted;
        let recorder = ChangeRecorder::new(original.version);
        Self {
            repository,
            original,
            updated,
            operation,
            recorder,
            edge_ops: Vec::new(),
            tags_changed: false,
        }
    }

    /// Run the transaction.
    ///
    /// Returns the stored entity and the change description. When no field
    /// changed, the original is returned untouched with an empty
    /// description.
    pub fn apply(mut self) -> Result<(Entity, ChangeDescription), RepositoryError> {
        debug!(
            kind = %self.updated.kind,
            id = %self.updated.id,
            operation = ?self.operation,
            "update transaction started"
        );

        self.update_service()?;
        self.update_owner()?;
        self.update_tags()?;
        self.update_fields()?;

        if !self.recorder.has_changes() {
            debug!(id = %self.original.id, "no change recorded; skipping write");
            return Ok((self.original, self.recorder.into_description()));
        }
        self.persist()
    }

    fn update_service(&mut self) -> Result<(), RepositoryError> {
        let old = match &self.original.service {
            Some(service) => Some(to_value(service)?),
            None => None,
        };
        let new = match &self.updated.service {
            Some(service) => Some(to_value(service)?),
            None => None,
        };
        let changed = self.recorder.record_change_with(
            "service",
            old.as_ref(),
            new.as_ref(),
            false,
            entity_reference_match,
        );
        // Moving the entity to another service repoints containment; the
        // edge and the recomputed FQN must move together.
        if changed {
            self.edge_ops.push(EdgeOp::DeleteMatching(
                EdgePattern::to_entity(self.updated.id).relationship(Relationship::Contains),
            ));
            if let Some(service) = &self.updated.service {
                self.edge_ops.push(EdgeOp::Add(Edge::new(
                    service.id,
                    service.kind.clone(),
                    self.updated.id,
                    self.updated.kind.clone(),
                    Relationship::Contains,
                )));
            }
        }
        Ok(())
    }

    fn update_owner(&mut self) -> Result<(), RepositoryError> {
        let old = match &self.original.owner {
            Some(owner) => Some(to_value(owner)?),
            None => None,
        };
        let new = match &self.updated.owner {
            Some(owner) => Some(to_value(owner)?),
            None => None,
        };
        let changed = self.recorder.record_change_with(
            "owner",
            old.as_ref(),
            new.as_ref(),
            false,
            entity_reference_match,
        );
        if changed {
            self.edge_ops.push(EdgeOp::DeleteMatching(
                EdgePattern::to_entity(self.updated.id).relationship(Relationship::Owns),
            ));
            if let Some(owner) = &self.updated.owner {
                self.edge_ops.push(EdgeOp::Add(Edge::new(
                    owner.id,
                    owner.kind.clone(),
                    self.updated.id,
                    self.updated.kind.clone(),
                    Relationship::Owns,
                )));
            }
        }
        Ok(())
    }

    fn update_tags(&mut self) -> Result<(), RepositoryError> {
        // `None` means the caller did not touch tags.
        let Some(new_tags) = &self.updated.tags else {
            return Ok(());
        };
        let old_tags = self.original.tags.clone().unwrap_or_default();

        let old = old_tags.iter().map(to_value).collect::<Result<Vec<_>, _>>()?;
        let new = new_tags.iter().map(to_value).collect::<Result<Vec<_>, _>>()?;
        let (added, deleted) =
            self.recorder
                .record_list_change("tags", &old, &new, field_match("tagFqn"));
        if !added.is_empty() || !deleted.is_empty() {
            self.tags_changed = true;
        }
        Ok(())
    }

    fn update_fields(&mut self) -> Result<(), RepositoryError> {
        let repository = self.repository;
        for policy in &repository.descriptor.fields {
            match &policy.shape {
                FieldShape::Scalar => {
                    self.recorder.record_change(
                        policy.name,
                        self.original.fields.get(policy.name),
                        self.updated.fields.get(policy.name),
                        policy.impact.is_major(),
                    );
                }
                FieldShape::Reference {
                    target,
                    relationship,
                } => {
                    let old = present(self.original.fields.get(policy.name));
                    let new = present(self.updated.fields.get(policy.name));
                    let changed = self.recorder.record_change_with(
                        policy.name,
                        old,
                        new,
                        policy.impact.is_major(),
                        entity_reference_match,
                    );
                    if changed {
                        self.edge_ops.push(EdgeOp::DeleteMatching(
                            EdgePattern::from_entity(self.updated.id)
                                .relationship(*relationship)
                                .to_kind(target.clone()),
                        ));
                        // The new edge must target the incoming value, not
                        // whatever a previous read left in the field map.
                        if let Some(new_value) = new {
                            let reference = parse_reference(policy.name, new_value)?;
                            self.edge_ops.push(EdgeOp::Add(Edge::new(
                                self.updated.id,
                                self.updated.kind.clone(),
                                reference.id,
                                target.clone(),
                                *relationship,
                            )));
                        }
                    }
                }
                FieldShape::OwnedList { natural_key } => {
                    let old = list_values(self.original.fields.get(policy.name));
                    let new = list_values(self.updated.fields.get(policy.name));
                    let (added, deleted) = self.recorder.record_list_change(
                        policy.name,
                        &old,
                        &new,
                        field_match(natural_key),
                    );
                    // List diffs are minor by default; a major-classified
                    // list escalates only when it actually changed.
                    if policy.impact.is_major() && (!added.is_empty() || !deleted.is_empty()) {
                        self.recorder.escalate_to_major();
                    }
                }
            }
        }
        Ok(())
    }

    fn persist(mut self) -> Result<(Entity, ChangeDescription), RepositoryError> {
        let expected = self.original.version;
        self.updated.version = self.recorder.next_version();
        self.updated.updated_at = UtcTimestamp::now();

        let document = self
            .repository
            .store_document(&self.updated, Some(expected))?;

        for op in &self.edge_ops {
            match op {
                EdgeOp::DeleteMatching(pattern) => {
                    let removed = self.repository.store.delete_edges(pattern)?;
                    debug!(id = %self.updated.id, removed, "stale edges removed");
                }
                EdgeOp::Add(edge) => {
                    self.repository.store.add_edge(edge.clone())?;
                }
            }
        }
        // Tags are keyed by FQN, so an FQN move must carry even an
        // untouched label set to the new key.
        let fqn_moved = self.original.fully_qualified_name != self.updated.fully_qualified_name;
        if self.tags_changed || fqn_moved {
            let fqn = EntityRepository::<S>::required_fqn(&self.updated)?;
            let labels: Vec<TagLabel> = if self.tags_changed {
                self.updated.tags.clone().unwrap_or_default()
            } else {
                match &self.original.fully_qualified_name {
                    Some(old_fqn) => self.repository.store.get_tags(old_fqn)?,
                    None => Vec::new(),
                }
            };
            if fqn_moved {
                if let Some(old_fqn) = &self.original.fully_qualified_name {
                    self.repository.store.delete_tags(old_fqn)?;
                }
            }
            self.repository.store.apply_tags(&fqn, &labels)?;
        }

        let change = self.recorder.into_description();
        self.repository.store.put_version(
            self.updated.id,
            VersionRecord {
                version: self.updated.version,
                document,
                change: change.clone(),
                recorded_by: self.updated.updated_by.clone(),
            },
        )?;

        info!(
            kind = %self.updated.kind,
            id = %self.updated.id,
            from = %expected,
            to = %self.updated.version,
            "entity updated"
        );
        Ok((self.updated, change))
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, RepositoryError> {
    serde_json::to_value(value).map_err(|e| RepositoryError::Store(StoreError::Serialize(e.to_string())))
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn list_values(value: Option<&Value>) -> Vec<Value> {
    value
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}
