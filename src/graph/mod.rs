//! graph
//!
//! Typed directed relationship edges and their in-memory index.
//!
//! # Architecture
//!
//! Cross-entity associations are never embedded as live pointers inside
//! entity documents; they live as edges
//! `(from_id, from_kind) -[relationship]-> (to_id, to_kind)` in a side
//! index keyed for bidirectional lookup. Edges are the sole source of
//! truth for service containment, ownership, usage, and followers.
//!
//! # Invariants
//!
//! - Adding an edge is an upsert: duplicate `(from, to, relationship)`
//!   triples cannot exist
//! - Removal is by pattern, so retried or ordering-scrambled writers
//!   converge on the same edge set

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::core::types::{EntityId, EntityKind};

/// The closed enumeration of relationship kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relationship {
    /// Parent service contains the entity.
    Contains,
    /// The entity uses an associated entity (e.g. a dashboard).
    Uses,
    /// An owner owns the entity.
    Owns,
    /// A user follows the entity.
    Follows,
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Contains => "contains",
            Self::Uses => "uses",
            Self::Owns => "owns",
            Self::Follows => "follows",
        };
        write!(f, "{s}")
    }
}

/// Lookup direction relative to an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Edges leaving the endpoint (`from == endpoint`).
    Outgoing,
    /// Edges arriving at the endpoint (`to == endpoint`).
    Incoming,
}

/// A typed directed edge between two entities.
///
/// # Example
///
/// ```
/// use metastore::core::types::{EntityId, EntityKind};
/// use metastore::graph::{Edge, Relationship};
///
/// let service = EntityId::random();
/// let model = EntityId::random();
/// let edge = Edge::new(
///     service,
///     EntityKind::new("mlmodel_service").unwrap(),
///     model,
///     EntityKind::new("mlmodel").unwrap(),
///     Relationship::Contains,
/// );
/// assert_eq!(edge.relationship, Relationship::Contains);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from_id: EntityId,
    pub from_kind: EntityKind,
    pub to_id: EntityId,
    pub to_kind: EntityKind,
    pub relationship: Relationship,
}

impl Edge {
    /// Create an edge.
    pub fn new(
        from_id: EntityId,
        from_kind: EntityKind,
        to_id: EntityId,
        to_kind: EntityKind,
        relationship: Relationship,
    ) -> Self {
        Self {
            from_id,
            from_kind,
            to_id,
            to_kind,
            relationship,
        }
    }
}

/// A match pattern over edges; `None` components match anything.
///
/// # Example
///
/// ```
/// use metastore::core::types::{EntityId, EntityKind};
/// use metastore::graph::{Edge, EdgePattern, Relationship};
///
/// let model = EntityId::random();
/// let dashboard = EntityId::random();
/// let edge = Edge::new(
///     model,
///     EntityKind::new("mlmodel").unwrap(),
///     dashboard,
///     EntityKind::new("dashboard").unwrap(),
///     Relationship::Uses,
/// );
///
/// // All USES edges leaving the model, regardless of target
/// let pattern = EdgePattern::from_entity(model).relationship(Relationship::Uses);
/// assert!(pattern.matches(&edge));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgePattern {
    pub from_id: Option<EntityId>,
    pub to_id: Option<EntityId>,
    pub from_kind: Option<EntityKind>,
    pub to_kind: Option<EntityKind>,
    pub relationship: Option<Relationship>,
}

impl EdgePattern {
    /// Match any edge.
    pub fn any() -> Self {
        Self::default()
    }

    /// Match edges leaving the given entity.
    pub fn from_entity(id: EntityId) -> Self {
        Self {
            from_id: Some(id),
            ..Self::default()
        }
    }

    /// Match edges arriving at the given entity.
    pub fn to_entity(id: EntityId) -> Self {
        Self {
            to_id: Some(id),
            ..Self::default()
        }
    }

    /// Match edges with the given entity at either endpoint.
    ///
    /// Expressed as two patterns since a single pattern conjoins its
    /// components.
    pub fn either_endpoint(id: EntityId) -> [Self; 2] {
        [Self::from_entity(id), Self::to_entity(id)]
    }

    /// Constrain the relationship kind.
    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationship = Some(relationship);
        self
    }

    /// Constrain the source kind.
    pub fn from_kind(mut self, kind: EntityKind) -> Self {
        self.from_kind = Some(kind);
        self
    }

    /// Constrain the target kind.
    pub fn to_kind(mut self, kind: EntityKind) -> Self {
        self.to_kind = Some(kind);
        self
    }

    /// Whether an edge matches every set component.
    pub fn matches(&self, edge: &Edge) -> bool {
        self.from_id.map_or(true, |id| id == edge.from_id)
            && self.to_id.map_or(true, |id| id == edge.to_id)
            && self
                .from_kind
                .as_ref()
                .map_or(true, |k| *k == edge.from_kind)
            && self.to_kind.as_ref().map_or(true, |k| *k == edge.to_kind)
            && self.relationship.map_or(true, |r| r == edge.relationship)
    }
}

/// Bidirectional edge index with upsert semantics.
///
/// Maintains per-endpoint adjacency so lookups by either endpoint avoid a
/// full scan. This is an in-memory structure; durable stores implement the
/// same contract behind the [`crate::store::EntityStore`] trait.
///
/// # Example
///
/// ```
/// use metastore::core::types::{EntityId, EntityKind};
/// use metastore::graph::{Edge, EdgeIndex, EdgePattern, Relationship};
///
/// let mut index = EdgeIndex::new();
/// let service = EntityId::random();
/// let model = EntityId::random();
/// let edge = Edge::new(
///     service,
///     EntityKind::new("mlmodel_service").unwrap(),
///     model,
///     EntityKind::new("mlmodel").unwrap(),
///     Relationship::Contains,
/// );
///
/// index.add(edge.clone());
/// index.add(edge); // upsert: no duplicate
/// assert_eq!(index.find(&EdgePattern::to_entity(model)).len(), 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct EdgeIndex {
    edges: HashSet<Edge>,
    outgoing: HashMap<EntityId, HashSet<Edge>>,
    incoming: HashMap<EntityId, HashSet<Edge>>,
}

impl EdgeIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge with upsert semantics.
    ///
    /// Returns `true` if the edge was new, `false` if it already existed.
    pub fn add(&mut self, edge: Edge) -> bool {
        if !self.edges.insert(edge.clone()) {
            return false;
        }
        self.outgoing
            .entry(edge.from_id)
            .or_default()
            .insert(edge.clone());
        self.incoming.entry(edge.to_id).or_default().insert(edge);
        true
    }

    /// Remove all edges matching the pattern, returning how many were removed.
    pub fn remove(&mut self, pattern: &EdgePattern) -> usize {
        let matched: Vec<Edge> = self.find(pattern);
        for edge in &matched {
            self.edges.remove(edge);
            if let Some(set) = self.outgoing.get_mut(&edge.from_id) {
                set.remove(edge);
                if set.is_empty() {
                    self.outgoing.remove(&edge.from_id);
                }
            }
            if let Some(set) = self.incoming.get_mut(&edge.to_id) {
                set.remove(edge);
                if set.is_empty() {
                    self.incoming.remove(&edge.to_id);
                }
            }
        }
        matched.len()
    }

    /// Find all edges matching the pattern.
    ///
    /// Uses the endpoint adjacency when the pattern pins an endpoint.
    pub fn find(&self, pattern: &EdgePattern) -> Vec<Edge> {
        let candidates: Box<dyn Iterator<Item = &Edge>> = match (pattern.from_id, pattern.to_id) {
            (Some(from), _) => match self.outgoing.get(&from) {
                Some(set) => Box::new(set.iter()),
                None => Box::new(std::iter::empty()),
            },
            (None, Some(to)) => match self.incoming.get(&to) {
                Some(set) => Box::new(set.iter()),
                None => Box::new(std::iter::empty()),
            },
            (None, None) => Box::new(self.edges.iter()),
        };
        candidates
            .filter(|e| pattern.matches(e))
            .cloned()
            .collect()
    }

    /// Find edges touching an endpoint in the given direction.
    pub fn find_for(
        &self,
        endpoint: EntityId,
        direction: Direction,
        relationship: Relationship,
    ) -> Vec<Edge> {
        let pattern = match direction {
            Direction::Outgoing => EdgePattern::from_entity(endpoint),
            Direction::Incoming => EdgePattern::to_entity(endpoint),
        }
        .relationship(relationship);
        self.find(&pattern)
    }

    /// Total number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the index holds no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
