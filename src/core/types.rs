//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`EntityId`] - Stable unique entity identifier (UUID)
//! - [`EntityKind`] - Declared category of record (e.g. "mlmodel")
//! - [`EntityName`] - Validated entity name, unique within its parent scope
//! - [`VersionNumber`] - Semantic version with major/minor components
//! - [`UtcTimestamp`] - RFC3339 timestamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use metastore::core::types::{EntityKind, EntityName, VersionNumber};
//!
//! // Valid constructions
//! let kind = EntityKind::new("mlmodel").unwrap();
//! let name = EntityName::new("sales_forecast").unwrap();
//! assert_eq!(VersionNumber::initial().to_string(), "0.1");
//!
//! // Invalid constructions fail at creation time
//! assert!(EntityKind::new("Ml Model").is_err());
//! assert!(EntityName::new("bad.name").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid entity kind: {0}")]
    InvalidKind(String),

    #[error("invalid entity name: {0}")]
    InvalidName(String),

    #[error("invalid version number: {0}")]
    InvalidVersion(String),
}

/// A stable unique entity identifier.
///
/// # Example
///
/// ```
/// use metastore::core::types::EntityId;
///
/// let id = EntityId::random();
/// let same = EntityId::parse(&id.to_string()).unwrap();
/// assert_eq!(id, same);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Generate a fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier from its canonical string form.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidName` if the string is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidName(format!("not a valid entity id: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A declared category of record.
///
/// Kinds are lowercase identifiers: ASCII lowercase alphanumerics plus
/// `_` and `-`. The kind names the document collection an entity lives in
/// and scopes relationship edges.
///
/// # Example
///
/// ```
/// use metastore::core::types::EntityKind;
///
/// let kind = EntityKind::new("mlmodel").unwrap();
/// assert_eq!(kind.as_str(), "mlmodel");
///
/// assert!(EntityKind::new("").is_err());
/// assert!(EntityKind::new("MlModel").is_err());
/// assert!(EntityKind::new("ml model").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityKind(String);

impl EntityKind {
    /// Create a new validated entity kind.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidKind` if the kind is empty or contains
    /// anything other than lowercase alphanumerics, `_`, or `-`.
    pub fn new(kind: impl Into<String>) -> Result<Self, TypeError> {
        let kind = kind.into();
        Self::validate(&kind)?;
        Ok(Self(kind))
    }

    fn validate(kind: &str) -> Result<(), TypeError> {
        if kind.is_empty() {
            return Err(TypeError::InvalidKind("kind cannot be empty".into()));
        }
        for c in kind.chars() {
            let ok = c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-';
            if !ok {
                return Err(TypeError::InvalidKind(format!(
                    "kind cannot contain '{c}'"
                )));
            }
        }
        Ok(())
    }

    /// Get the kind as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityKind {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.0
    }
}

impl AsRef<str> for EntityKind {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated entity name.
///
/// Names are unique within their parent scope and become the trailing
/// component of the entity's fully-qualified name, so they must not
/// contain the FQN separator (`.`):
/// - Cannot be empty
/// - Cannot contain `.` (reserved as the FQN separator)
/// - Cannot contain ASCII control characters
/// - Cannot exceed 256 characters
///
/// # Example
///
/// ```
/// use metastore::core::types::EntityName;
///
/// let name = EntityName::new("sales_forecast").unwrap();
/// assert_eq!(name.as_str(), "sales_forecast");
///
/// assert!(EntityName::new("").is_err());
/// assert!(EntityName::new("has.dot").is_err());
/// assert!(EntityName::new("has\ttab").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityName(String);

impl EntityName {
    /// Maximum name length in characters.
    const MAX_LEN: usize = 256;

    /// Create a new validated entity name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidName` if the name violates the naming rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidName("name cannot be empty".into()));
        }
        if name.chars().count() > Self::MAX_LEN {
            return Err(TypeError::InvalidName(format!(
                "name cannot exceed {} characters",
                Self::MAX_LEN
            )));
        }
        if name.contains('.') {
            return Err(TypeError::InvalidName(
                "name cannot contain '.' (reserved as the FQN separator)".into(),
            ));
        }
        for c in name.chars() {
            if c.is_ascii_control() {
                return Err(TypeError::InvalidName(
                    "name cannot contain control characters".into(),
                ));
            }
        }
        Ok(())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<EntityName> for String {
    fn from(name: EntityName) -> Self {
        name.0
    }
}

impl AsRef<str> for EntityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A semantic version number with major and minor components.
///
/// Versions start at `0.1`. A minor change adds `0.1`, a major change adds
/// `1.0` with the minor component preserved (`0.2` becomes `1.2`). Keeping
/// the components separate makes the arithmetic exact and the ordering total,
/// which a floating-point representation would not guarantee.
///
/// # Example
///
/// ```
/// use metastore::core::types::VersionNumber;
///
/// let v = VersionNumber::initial();
/// assert_eq!(v.to_string(), "0.1");
/// assert_eq!(v.next_minor().to_string(), "0.2");
/// assert_eq!(v.next_minor().next_major().to_string(), "1.2");
/// assert!(v.next_minor() > v);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct VersionNumber {
    major: u32,
    minor: u32,
}

impl VersionNumber {
    /// The initial version assigned at entity creation.
    pub fn initial() -> Self {
        Self { major: 0, minor: 1 }
    }

    /// Create a version from explicit components.
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse a version from its `major.minor` string form.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidVersion` if the string is not two
    /// dot-separated non-negative integers.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| TypeError::InvalidVersion(format!("expected major.minor, got '{s}'")))?;
        let major = major
            .parse()
            .map_err(|_| TypeError::InvalidVersion(format!("invalid major component in '{s}'")))?;
        let minor = minor
            .parse()
            .map_err(|_| TypeError::InvalidVersion(format!("invalid minor component in '{s}'")))?;
        Ok(Self { major, minor })
    }

    /// The version after a minor (backward-compatible) change.
    pub fn next_minor(&self) -> Self {
        Self {
            major: self.major,
            minor: self.minor + 1,
        }
    }

    /// The version after a major (breaking) change.
    ///
    /// The minor component is preserved, matching decimal addition of 1.0.
    pub fn next_major(&self) -> Self {
        Self {
            major: self.major + 1,
            minor: self.minor,
        }
    }

    /// Major component.
    pub fn major(&self) -> u32 {
        self.major
    }

    /// Minor component.
    pub fn minor(&self) -> u32 {
        self.minor
    }
}

impl TryFrom<String> for VersionNumber {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<VersionNumber> for String {
    fn from(v: VersionNumber) -> Self {
        v.to_string()
    }
}

impl std::fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A UTC timestamp in RFC3339 format.
///
/// # Example
///
/// ```
/// use metastore::core::types::UtcTimestamp;
///
/// let now = UtcTimestamp::now();
/// assert!(now.to_string().contains('T'));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// Create a timestamp from a chrono DateTime.
    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self(dt)
    }

    /// Get the underlying datetime.
    pub fn as_datetime(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod entity_id {
        use super::*;

        #[test]
        fn random_ids_are_unique() {
            assert_ne!(EntityId::random(), EntityId::random());
        }

        #[test]
        fn parse_roundtrip() {
            let id = EntityId::random();
            let parsed = EntityId::parse(&id.to_string()).unwrap();
            assert_eq!(id, parsed);
        }

        #[test]
        fn parse_rejects_garbage() {
            assert!(EntityId::parse("not-a-uuid").is_err());
            assert!(EntityId::parse("").is_err());
        }

        #[test]
        fn serde_roundtrip() {
            let id = EntityId::random();
            let json = serde_json::to_string(&id).unwrap();
            let parsed: EntityId = serde_json::from_str(&json).unwrap();
            assert_eq!(id, parsed);
        }
    }

    mod entity_kind {
        use super::*;

        #[test]
        fn valid_kinds() {
            assert!(EntityKind::new("mlmodel").is_ok());
            assert!(EntityKind::new("mlmodel_service").is_ok());
            assert!(EntityKind::new("dashboard-v2").is_ok());
            assert!(EntityKind::new("table3").is_ok());
        }

        #[test]
        fn empty_kind_rejected() {
            assert!(EntityKind::new("").is_err());
        }

        #[test]
        fn uppercase_rejected() {
            assert!(EntityKind::new("MlModel").is_err());
        }

        #[test]
        fn whitespace_rejected() {
            assert!(EntityKind::new("ml model").is_err());
        }

        #[test]
        fn dot_rejected() {
            assert!(EntityKind::new("ml.model").is_err());
        }

        #[test]
        fn serde_roundtrip() {
            let kind = EntityKind::new("mlmodel").unwrap();
            let json = serde_json::to_string(&kind).unwrap();
            let parsed: EntityKind = serde_json::from_str(&json).unwrap();
            assert_eq!(kind, parsed);
        }
    }

    mod entity_name {
        use super::*;

        #[test]
        fn valid_names() {
            assert!(EntityName::new("sales_forecast").is_ok());
            assert!(EntityName::new("Sales Forecast v2").is_ok());
            assert!(EntityName::new("customer-churn").is_ok());
        }

        #[test]
        fn empty_name_rejected() {
            assert!(EntityName::new("").is_err());
        }

        #[test]
        fn separator_rejected() {
            assert!(EntityName::new("svc.model").is_err());
        }

        #[test]
        fn control_chars_rejected() {
            assert!(EntityName::new("has\ttab").is_err());
            assert!(EntityName::new("has\nnewline").is_err());
        }

        #[test]
        fn overlong_name_rejected() {
            let name = "a".repeat(257);
            assert!(EntityName::new(name).is_err());
        }

        #[test]
        fn serde_roundtrip() {
            let name = EntityName::new("sales_forecast").unwrap();
            let json = serde_json::to_string(&name).unwrap();
            let parsed: EntityName = serde_json::from_str(&json).unwrap();
            assert_eq!(name, parsed);
        }
    }

    mod version_number {
        use super::*;

        #[test]
        fn initial_is_zero_one() {
            let v = VersionNumber::initial();
            assert_eq!(v.major(), 0);
            assert_eq!(v.minor(), 1);
            assert_eq!(v.to_string(), "0.1");
        }

        #[test]
        fn minor_bump_adds_tenth() {
            let v = VersionNumber::initial().next_minor();
            assert_eq!(v.to_string(), "0.2");
        }

        #[test]
        fn major_bump_preserves_minor() {
            let v = VersionNumber::new(0, 2).next_major();
            assert_eq!(v.to_string(), "1.2");
        }

        #[test]
        fn ordering_is_total() {
            assert!(VersionNumber::new(0, 2) > VersionNumber::new(0, 1));
            assert!(VersionNumber::new(1, 0) > VersionNumber::new(0, 9));
            assert!(VersionNumber::new(1, 2) > VersionNumber::new(1, 1));
        }

        #[test]
        fn parse_roundtrip() {
            let v = VersionNumber::new(2, 7);
            assert_eq!(VersionNumber::parse(&v.to_string()).unwrap(), v);
        }

        #[test]
        fn parse_rejects_garbage() {
            assert!(VersionNumber::parse("").is_err());
            assert!(VersionNumber::parse("1").is_err());
            assert!(VersionNumber::parse("a.b").is_err());
            assert!(VersionNumber::parse("-1.0").is_err());
        }

        #[test]
        fn serde_roundtrip() {
            let v = VersionNumber::new(1, 3);
            let json = serde_json::to_string(&v).unwrap();
            assert_eq!(json, "\"1.3\"");
            let parsed: VersionNumber = serde_json::from_str(&json).unwrap();
            assert_eq!(v, parsed);
        }
    }

    mod utc_timestamp {
        use super::*;

        #[test]
        fn now_works() {
            let ts = UtcTimestamp::now();
            assert!(ts.to_string().contains('T'));
        }

        #[test]
        fn serde_roundtrip() {
            let ts = UtcTimestamp::now();
            let json = serde_json::to_string(&ts).unwrap();
            let parsed: UtcTimestamp = serde_json::from_str(&json).unwrap();
            assert_eq!(ts, parsed);
        }
    }
}
