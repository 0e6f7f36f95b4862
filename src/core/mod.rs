//! core
//!
//! Core domain types for the entity repository.
//!
//! # Modules
//!
//! - [`types`] - Strong types: EntityId, EntityKind, EntityName, VersionNumber
//! - [`fqn`] - Fully-qualified names and propagation into owned sub-objects
//! - [`entity`] - Entity envelope, references, tags, read policies
//! - [`change`] - Field-level diffing and change descriptions
//! - [`descriptor`] - Per-kind field policy tables and shapes
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Version policy is declared per field, never inferred
//! - The generic engine interprets kind-specific fields only through descriptors

pub mod change;
pub mod descriptor;
pub mod entity;
pub mod fqn;
pub mod types;
