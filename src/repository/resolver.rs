//! repository::resolver
//!
//! Resolution of typed identifiers to live entity references.
//!
//! # Architecture
//!
//! A reference arriving from a client is a stub: `{kind, id}` and nothing
//! else. The resolver turns it into a full [`EntityReference`] projection
//! by reading the stored document, or fails with `NotFound` when no such
//! entity exists or the include policy excludes it (soft-deleted entities
//! under [`Include::NonDeleted`]). Cross-kind references are validated
//! lazily this way, not by database foreign keys.

use thiserror::Error;

use crate::core::entity::{EntityReference, Include};
use crate::core::types::{EntityId, EntityKind};
use crate::store::{EntityStore, StoreError};

/// Errors from reference resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No visible entity of that kind/id exists.
    #[error("entity not found: {kind}/{id}")]
    NotFound { kind: EntityKind, id: EntityId },

    /// The stored document could not be parsed.
    #[error("failed to parse entity {kind}/{id}: {message}")]
    Parse {
        kind: EntityKind,
        id: EntityId,
        message: String,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves `{kind, id}` stubs against the persistence collaborator.
pub struct ReferenceResolver<'a> {
    store: &'a dyn EntityStore,
}

impl<'a> ReferenceResolver<'a> {
    /// Create a resolver over the given store.
    pub fn new(store: &'a dyn EntityStore) -> Self {
        Self { store }
    }

    /// Resolve a typed identifier to a live entity reference.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::NotFound`] if no entity of that kind/id exists, or
    ///   if the include policy excludes it
    /// - [`ResolveError::Parse`] if the stored document is malformed
    pub fn resolve(
        &self,
        kind: &EntityKind,
        id: EntityId,
        include: Include,
    ) -> Result<EntityReference, ResolveError> {
        let document =
            self.store
                .get_document(kind, id)?
                .ok_or_else(|| ResolveError::NotFound {
                    kind: kind.clone(),
                    id,
                })?;
        let entity = crate::core::entity::Entity::from_json(&document).map_err(|e| {
            ResolveError::Parse {
                kind: kind.clone(),
                id,
                message: e.to_string(),
            }
        })?;
        if !include.allows(entity.deleted) {
            return Err(ResolveError::NotFound {
                kind: kind.clone(),
                id,
            });
        }
        Ok(entity.reference())
    }
}
