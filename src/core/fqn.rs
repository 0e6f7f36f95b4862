//! core::fqn
//!
//! Fully-qualified names and their propagation into owned sub-objects.
//!
//! # Architecture
//!
//! An FQN is a dotted path through an entity's containment chain, e.g.
//! `service.model` for an entity or `service.model.feature` for an owned
//! sub-object. FQNs are always derived, never independently settable:
//! the repository computes them during `prepare` and [`propagate_owned`]
//! pushes them down into owned sub-object lists.
//!
//! # Invariants
//!
//! - Local names never contain the separator; [`Fqn::add`] rejects them
//! - A sub-object that carries an external source reference is named from
//!   that reference's FQN, not from its owner's hierarchy
//!
//! # Example
//!
//! ```
//! use metastore::core::fqn::Fqn;
//!
//! let service = Fqn::root("mlflow").unwrap();
//! let model = service.add("forecast").unwrap();
//! assert_eq!(model.as_str(), "mlflow.forecast");
//!
//! // Separator in a local name is rejected
//! assert!(model.add("bad.name").is_err());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::descriptor::OwnedListSpec;

/// The FQN path separator.
pub const SEPARATOR: char = '.';

/// JSON key for a sub-object's local name.
const KEY_NAME: &str = "name";

/// JSON key for a sub-object's fully-qualified name.
const KEY_FQN: &str = "fullyQualifiedName";

/// Errors from FQN construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FqnError {
    #[error("invalid name '{0}': must be non-empty and must not contain '{SEPARATOR}'")]
    InvalidName(String),
}

/// A fully-qualified, separator-joined hierarchical name.
///
/// # Example
///
/// ```
/// use metastore::core::fqn::Fqn;
///
/// let fqn = Fqn::root("svc").unwrap().add("model").unwrap();
/// assert_eq!(fqn.as_str(), "svc.model");
/// assert_eq!(fqn.local_name(), "model");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fqn(String);

impl Fqn {
    /// Create a root FQN from a single local name.
    ///
    /// # Errors
    ///
    /// Returns `FqnError::InvalidName` if the name is empty or contains
    /// the separator.
    pub fn root(name: impl AsRef<str>) -> Result<Self, FqnError> {
        let name = name.as_ref();
        validate_local(name)?;
        Ok(Self(name.to_string()))
    }

    /// Extend this FQN with a child's local name.
    ///
    /// # Errors
    ///
    /// Returns `FqnError::InvalidName` if the local name is empty or
    /// contains the separator.
    pub fn add(&self, local: impl AsRef<str>) -> Result<Self, FqnError> {
        let local = local.as_ref();
        validate_local(local)?;
        Ok(Self(format!("{}{SEPARATOR}{local}", self.0)))
    }

    /// Reconstruct an FQN from an already-joined string.
    ///
    /// Used when reading FQNs back from stored documents; each component
    /// must still be non-empty.
    ///
    /// # Errors
    ///
    /// Returns `FqnError::InvalidName` if the string is empty or has an
    /// empty component.
    pub fn from_joined(joined: impl Into<String>) -> Result<Self, FqnError> {
        let joined = joined.into();
        if joined.is_empty() || joined.split(SEPARATOR).any(str::is_empty) {
            return Err(FqnError::InvalidName(joined));
        }
        Ok(Self(joined))
    }

    /// The trailing (local) component.
    pub fn local_name(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or(&self.0)
    }

    /// Get the FQN as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fqn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_local(name: &str) -> Result<(), FqnError> {
    if name.is_empty() || name.contains(SEPARATOR) {
        return Err(FqnError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Recompute FQNs for every owned sub-object under `fields`.
///
/// Walks each [`OwnedListSpec`] level: elements are JSON objects carrying a
/// `name`; their `fullyQualifiedName` is rewritten to `owner.name`, then
/// nested levels recurse with the element's new FQN as owner.
///
/// Naming override: when a level declares an external source field and an
/// element carries that reference with an FQN, the element is named from the
/// reference (`sourceFqn.name`). Elements at such a level without a source
/// value keep their bare local name. Downstream name-based lookups depend on
/// this override; hierarchy-naming such elements would silently resolve to
/// the wrong object.
///
/// Elements without a `name` key are left untouched.
///
/// # Errors
///
/// Returns `FqnError::InvalidName` if any sub-object name contains the
/// separator.
pub fn propagate_owned(
    fields: &mut serde_json::Map<String, Value>,
    owner: &Fqn,
    specs: &[OwnedListSpec],
) -> Result<(), FqnError> {
    for spec in specs {
        let Some(Value::Array(items)) = fields.get_mut(spec.field) else {
            continue;
        };
        for item in items.iter_mut() {
            propagate_item(item, owner, spec)?;
        }
    }
    Ok(())
}

fn propagate_item(item: &mut Value, owner: &Fqn, spec: &OwnedListSpec) -> Result<(), FqnError> {
    let Some(obj) = item.as_object_mut() else {
        return Ok(());
    };
    let Some(name) = obj.get(KEY_NAME).and_then(Value::as_str).map(String::from) else {
        return Ok(());
    };

    let fqn = match spec.external_source_field {
        Some(source_field) => {
            let source_fqn = obj
                .get(source_field)
                .and_then(|source| source.get(KEY_FQN))
                .and_then(Value::as_str);
            match source_fqn {
                Some(source_fqn) => Fqn::from_joined(source_fqn)?.add(&name)?,
                None => Fqn::root(&name)?,
            }
        }
        None => owner.add(&name)?,
    };

    obj.insert(KEY_FQN.to_string(), Value::String(fqn.as_str().to_string()));

    if !spec.nested.is_empty() {
        // Nested lists live inside this element's own object.
        let nested_owner = fqn;
        for nested in &spec.nested {
            let Some(Value::Array(children)) = obj.get_mut(nested.field) else {
                continue;
            };
            for child in children.iter_mut() {
                propagate_item(child, &nested_owner, nested)?;
            }
        }
    }
    Ok(())
}
