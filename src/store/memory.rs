//! store::memory
//!
//! In-memory reference implementation of the persistence collaborator.
//!
//! # Architecture
//!
//! Documents, edges, history, and tags live behind one `RwLock`. The
//! version check parses only a small envelope from each document, the same
//! envelope-first pattern used for version dispatch when parsing stored
//! metadata. Suitable for tests and for embedding where durability is not
//! required.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::Deserialize;

use super::{EntityStore, StoreError, VersionRecord};
use crate::core::entity::TagLabel;
use crate::core::fqn::Fqn;
use crate::core::types::{EntityId, EntityKind, VersionNumber};
use crate::graph::{Edge, EdgeIndex, EdgePattern};

/// The envelope fields the store needs from a document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentEnvelope {
    version: VersionNumber,
    #[serde(default)]
    fully_qualified_name: Option<Fqn>,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    json: String,
    version: VersionNumber,
    fqn: Option<Fqn>,
}

#[derive(Debug, Default)]
struct Inner {
    documents: HashMap<(EntityKind, EntityId), StoredDocument>,
    by_name: HashMap<(EntityKind, Fqn), EntityId>,
    edges: EdgeIndex,
    versions: HashMap<EntityId, BTreeMap<VersionNumber, VersionRecord>>,
    tags: HashMap<Fqn, Vec<TagLabel>>,
}

/// In-memory entity store with interior locking.
///
/// # Example
///
/// ```
/// use metastore::core::types::{EntityId, EntityKind};
/// use metastore::store::{EntityStore, InMemoryStore};
///
/// let store = InMemoryStore::new();
/// let kind = EntityKind::new("mlmodel").unwrap();
/// let id = EntityId::random();
///
/// assert!(store.get_document(&kind, id).unwrap().is_none());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_envelope(document: &str) -> Result<DocumentEnvelope, StoreError> {
        serde_json::from_str(document).map_err(|e| StoreError::Parse(e.to_string()))
    }
}

impl EntityStore for InMemoryStore {
    fn get_document(
        &self,
        kind: &EntityKind,
        id: EntityId,
    ) -> Result<Option<String>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner
            .documents
            .get(&(kind.clone(), id))
            .map(|d| d.json.clone()))
    }

    fn put_document(
        &self,
        kind: &EntityKind,
        id: EntityId,
        document: &str,
        expected_version: Option<VersionNumber>,
    ) -> Result<(), StoreError> {
        let envelope = Self::parse_envelope(document)?;
        let mut inner = self.inner.write().expect("store lock poisoned");
        let key = (kind.clone(), id);

        if let Some(expected) = expected_version {
            let actual = inner
                .documents
                .get(&key)
                .map(|d| d.version)
                .ok_or(StoreError::NotFound {
                    kind: kind.clone(),
                    id,
                })?;
            if actual != expected {
                return Err(StoreError::Conflict { expected, actual });
            }
        }

        // Keep the FQN lookup consistent across renames.
        if let Some(previous) = inner.documents.get(&key) {
            if let Some(old_fqn) = previous.fqn.clone() {
                inner.by_name.remove(&(kind.clone(), old_fqn));
            }
        }
        if let Some(fqn) = envelope.fully_qualified_name.clone() {
            inner.by_name.insert((kind.clone(), fqn), id);
        }

        inner.documents.insert(
            key,
            StoredDocument {
                json: document.to_string(),
                version: envelope.version,
                fqn: envelope.fully_qualified_name,
            },
        );
        Ok(())
    }

    fn delete_document(&self, kind: &EntityKind, id: EntityId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        let removed = inner
            .documents
            .remove(&(kind.clone(), id))
            .ok_or(StoreError::NotFound {
                kind: kind.clone(),
                id,
            })?;
        if let Some(fqn) = removed.fqn {
            inner.by_name.remove(&(kind.clone(), fqn));
        }
        Ok(())
    }

    fn find_id_by_name(
        &self,
        kind: &EntityKind,
        fqn: &Fqn,
    ) -> Result<Option<EntityId>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.by_name.get(&(kind.clone(), fqn.clone())).copied())
    }

    fn add_edge(&self, edge: Edge) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        Ok(inner.edges.add(edge))
    }

    fn delete_edges(&self, pattern: &EdgePattern) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        Ok(inner.edges.remove(pattern))
    }

    fn find_edges(&self, pattern: &EdgePattern) -> Result<Vec<Edge>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.edges.find(pattern))
    }

    fn put_version(&self, entity: EntityId, record: VersionRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner
            .versions
            .entry(entity)
            .or_default()
            .insert(record.version, record);
        Ok(())
    }

    fn get_versions(&self, entity: EntityId) -> Result<Vec<VersionRecord>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner
            .versions
            .get(&entity)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get_version(
        &self,
        entity: EntityId,
        version: VersionNumber,
    ) -> Result<Option<VersionRecord>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner
            .versions
            .get(&entity)
            .and_then(|m| m.get(&version))
            .cloned())
    }

    fn delete_versions(&self, entity: EntityId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.versions.remove(&entity);
        Ok(())
    }

    fn apply_tags(&self, target: &Fqn, labels: &[TagLabel]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        if labels.is_empty() {
            inner.tags.remove(target);
        } else {
            inner.tags.insert(target.clone(), labels.to_vec());
        }
        Ok(())
    }

    fn get_tags(&self, target: &Fqn) -> Result<Vec<TagLabel>, StoreError> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.tags.get(target).cloned().unwrap_or_default())
    }

    fn delete_tags(&self, target: &Fqn) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.tags.remove(target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(s: &str) -> EntityKind {
        EntityKind::new(s).unwrap()
    }

    fn document(version: &str, fqn: Option<&str>) -> String {
        match fqn {
            Some(fqn) => format!(r#"{{"version": "{version}", "fullyQualifiedName": "{fqn}"}}"#),
            None => format!(r#"{{"version": "{version}"}}"#),
        }
    }

    mod documents {
        use super::*;

        #[test]
        fn put_then_get() {
            let store = InMemoryStore::new();
            let k = kind("mlmodel");
            let id = EntityId::random();

            store
                .put_document(&k, id, &document("0.1", None), None)
                .unwrap();
            assert!(store.get_document(&k, id).unwrap().is_some());
        }

        #[test]
        fn get_missing_is_none() {
            let store = InMemoryStore::new();
            assert!(store
                .get_document(&kind("mlmodel"), EntityId::random())
                .unwrap()
                .is_none());
        }

        #[test]
        fn version_check_passes_on_match() {
            let store = InMemoryStore::new();
            let k = kind("mlmodel");
            let id = EntityId::random();

            store
                .put_document(&k, id, &document("0.1", None), None)
                .unwrap();
            store
                .put_document(
                    &k,
                    id,
                    &document("0.2", None),
                    Some(VersionNumber::new(0, 1)),
                )
                .unwrap();
        }

        #[test]
        fn version_check_conflicts_on_mismatch() {
            let store = InMemoryStore::new();
            let k = kind("mlmodel");
            let id = EntityId::random();

            store
                .put_document(&k, id, &document("0.3", None), None)
                .unwrap();
            let err = store
                .put_document(
                    &k,
                    id,
                    &document("0.2", None),
                    Some(VersionNumber::new(0, 1)),
                )
                .unwrap_err();
            assert!(matches!(err, StoreError::Conflict { .. }));
        }

        #[test]
        fn malformed_document_rejected() {
            let store = InMemoryStore::new();
            let err = store
                .put_document(&kind("mlmodel"), EntityId::random(), "not json", None)
                .unwrap_err();
            assert!(matches!(err, StoreError::Parse(_)));
        }

        #[test]
        fn delete_missing_is_not_found() {
            let store = InMemoryStore::new();
            let err = store
                .delete_document(&kind("mlmodel"), EntityId::random())
                .unwrap_err();
            assert!(matches!(err, StoreError::NotFound { .. }));
        }
    }

    mod name_lookup {
        use super::*;

        #[test]
        fn fqn_lookup_follows_renames() {
            let store = InMemoryStore::new();
            let k = kind("mlmodel");
            let id = EntityId::random();
            let old_fqn = Fqn::from_joined("svcA.m1").unwrap();
            let new_fqn = Fqn::from_joined("svcB.m1").unwrap();

            store
                .put_document(&k, id, &document("0.1", Some("svcA.m1")), None)
                .unwrap();
            assert_eq!(store.find_id_by_name(&k, &old_fqn).unwrap(), Some(id));

            store
                .put_document(&k, id, &document("0.2", Some("svcB.m1")), None)
                .unwrap();
            assert_eq!(store.find_id_by_name(&k, &old_fqn).unwrap(), None);
            assert_eq!(store.find_id_by_name(&k, &new_fqn).unwrap(), Some(id));
        }

        #[test]
        fn delete_clears_lookup() {
            let store = InMemoryStore::new();
            let k = kind("mlmodel");
            let id = EntityId::random();
            let fqn = Fqn::from_joined("svc.m1").unwrap();

            store
                .put_document(&k, id, &document("0.1", Some("svc.m1")), None)
                .unwrap();
            store.delete_document(&k, id).unwrap();
            assert_eq!(store.find_id_by_name(&k, &fqn).unwrap(), None);
        }
    }

    mod history {
        use super::*;
        use crate::core::change::ChangeDescription;

        fn record(version: VersionNumber) -> VersionRecord {
            VersionRecord {
                version,
                document: document(&version.to_string(), None),
                change: ChangeDescription::new(VersionNumber::initial()),
                recorded_by: None,
            }
        }

        #[test]
        fn versions_returned_oldest_first() {
            let store = InMemoryStore::new();
            let id = EntityId::random();

            store.put_version(id, record(VersionNumber::new(0, 2))).unwrap();
            store.put_version(id, record(VersionNumber::new(0, 1))).unwrap();
            store.put_version(id, record(VersionNumber::new(1, 2))).unwrap();

            let versions: Vec<String> = store
                .get_versions(id)
                .unwrap()
                .iter()
                .map(|r| r.version.to_string())
                .collect();
            assert_eq!(versions, vec!["0.1", "0.2", "1.2"]);
        }

        #[test]
        fn get_single_version() {
            let store = InMemoryStore::new();
            let id = EntityId::random();
            store.put_version(id, record(VersionNumber::new(0, 1))).unwrap();

            assert!(store
                .get_version(id, VersionNumber::new(0, 1))
                .unwrap()
                .is_some());
            assert!(store
                .get_version(id, VersionNumber::new(0, 2))
                .unwrap()
                .is_none());
        }

        #[test]
        fn rewrite_same_version_replaces() {
            let store = InMemoryStore::new();
            let id = EntityId::random();
            store.put_version(id, record(VersionNumber::new(0, 1))).unwrap();
            store.put_version(id, record(VersionNumber::new(0, 1))).unwrap();
            assert_eq!(store.get_versions(id).unwrap().len(), 1);
        }
    }

    mod tags {
        use super::*;

        #[test]
        fn apply_replaces_full_set() {
            let store = InMemoryStore::new();
            let target = Fqn::from_joined("svc.m1").unwrap();
            let pii = TagLabel::new(Fqn::from_joined("classification.pii").unwrap());
            let tier = TagLabel::new(Fqn::from_joined("tier.gold").unwrap());

            store.apply_tags(&target, &[pii.clone(), tier]).unwrap();
            store.apply_tags(&target, &[pii.clone()]).unwrap();

            assert_eq!(store.get_tags(&target).unwrap(), vec![pii]);
        }

        #[test]
        fn empty_set_clears() {
            let store = InMemoryStore::new();
            let target = Fqn::from_joined("svc.m1").unwrap();
            let pii = TagLabel::new(Fqn::from_joined("classification.pii").unwrap());

            store.apply_tags(&target, &[pii]).unwrap();
            store.apply_tags(&target, &[]).unwrap();
            assert!(store.get_tags(&target).unwrap().is_empty());
        }
    }
}
