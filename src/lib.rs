//! Metastore - a generic entity-relationship repository with semantic versioning
//!
//! Metastore stores typed, mutable, richly-interconnected records ("entities")
//! as JSON documents plus a separate graph of typed directed edges
//! ("relationships"), and computes, on every update, which fields changed,
//! whether the change is major or minor, and how the relationship graph must
//! be patched to stay consistent.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`core`] - Domain types, FQN builder, change recorder, entity descriptors
//! - [`graph`] - Relationship edges, patterns, and the bidirectional edge index
//! - [`store`] - The persistence collaborator trait and an in-memory implementation
//! - [`repository`] - Generic CRUD orchestration, reference resolution, updaters
//!
//! # Correctness Invariants
//!
//! Metastore maintains the following invariants:
//!
//! 1. Validation and reference errors surface before any persistence side effect
//! 2. Relationship-bearing fields are never duplicated into stored documents
//! 3. Edge writes are idempotent upserts; retried writers converge
//! 4. Version numbers are monotonic and bump exactly per the field policy table

pub mod core;
pub mod graph;
pub mod repository;
pub mod store;
