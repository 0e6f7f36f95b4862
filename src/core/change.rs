//! core::change
//!
//! Field-level diffing and the change description it accumulates.
//!
//! # Architecture
//!
//! One update transaction owns one [`ChangeRecorder`]. Every kind-specific
//! field is wired through exactly one of two diff primitives:
//!
//! - [`ChangeRecorder::record_change`] - scalar comparison by JSON value
//!   equality, with an explicit major/minor classification
//! - [`ChangeRecorder::record_list_change`] - list partition by a domain
//!   matcher (natural key or reference identity), always minor unless the
//!   caller escalates
//!
//! The recorder tracks the document-level diff only. Edge mutation for
//! reference-valued fields is a side effect driven by the updater, never
//! by the recorder.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::VersionNumber;

/// One changed field inside a change description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

/// The structured record of one update transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDescription {
    pub fields_added: Vec<FieldChange>,
    pub fields_updated: Vec<FieldChange>,
    pub fields_deleted: Vec<FieldChange>,
    pub previous_version: VersionNumber,
}

impl ChangeDescription {
    /// An empty description against the given previous version.
    pub fn new(previous_version: VersionNumber) -> Self {
        Self {
            fields_added: vec![],
            fields_updated: vec![],
            fields_deleted: vec![],
            previous_version,
        }
    }

    /// Whether no change was recorded.
    pub fn is_empty(&self) -> bool {
        self.fields_added.is_empty()
            && self.fields_updated.is_empty()
            && self.fields_deleted.is_empty()
    }
}

/// Accumulates field diffs and the major-change flag for one update.
///
/// # Example
///
/// ```
/// use metastore::core::change::ChangeRecorder;
/// use metastore::core::types::VersionNumber;
/// use serde_json::json;
///
/// let mut recorder = ChangeRecorder::new(VersionNumber::initial());
/// let old = json!("xgboost");
/// let new = json!("lightgbm");
///
/// assert!(recorder.record_change("algorithm", Some(&old), Some(&new), true));
/// assert!(recorder.is_major());
/// assert_eq!(recorder.next_version().to_string(), "1.1");
/// ```
#[derive(Debug)]
pub struct ChangeRecorder {
    description: ChangeDescription,
    major: bool,
}

impl ChangeRecorder {
    /// Start recording against the given previous version.
    pub fn new(previous_version: VersionNumber) -> Self {
        Self {
            description: ChangeDescription::new(previous_version),
            major: false,
        }
    }

    /// Record a scalar field change.
    ///
    /// Compares by JSON value equality. `None -> Some` records an added
    /// field, `Some -> None` a deleted field, and differing `Some -> Some`
    /// an updated field. When a change is recorded and `is_major` is set,
    /// the whole transaction escalates to a major version change.
    ///
    /// Returns whether a change was recorded.
    pub fn record_change(
        &mut self,
        name: &str,
        old: Option<&Value>,
        new: Option<&Value>,
        is_major: bool,
    ) -> bool {
        let changed = match (old, new) {
            (None, None) => false,
            (None, Some(new)) => {
                self.description.fields_added.push(FieldChange {
                    name: name.to_string(),
                    old_value: None,
                    new_value: Some(new.clone()),
                });
                true
            }
            (Some(old), None) => {
                self.description.fields_deleted.push(FieldChange {
                    name: name.to_string(),
                    old_value: Some(old.clone()),
                    new_value: None,
                });
                true
            }
            (Some(old), Some(new)) => {
                if old == new {
                    false
                } else {
                    self.description.fields_updated.push(FieldChange {
                        name: name.to_string(),
                        old_value: Some(old.clone()),
                        new_value: Some(new.clone()),
                    });
                    true
                }
            }
        };
        if changed && is_major {
            self.major = true;
        }
        changed
    }

    /// Record a scalar field change compared by a domain matcher.
    ///
    /// Like [`Self::record_change`], but equality of two present values is
    /// decided by `matcher` instead of JSON value equality. Used for
    /// reference-valued fields, where two projections of the same entity
    /// may differ in display metadata but must not count as a change.
    pub fn record_change_with<M>(
        &mut self,
        name: &str,
        old: Option<&Value>,
        new: Option<&Value>,
        is_major: bool,
        matcher: M,
    ) -> bool
    where
        M: Fn(&Value, &Value) -> bool,
    {
        if let (Some(old_value), Some(new_value)) = (old, new) {
            if matcher(old_value, new_value) {
                return false;
            }
        }
        self.record_change(name, old, new, is_major)
    }

    /// Record a list field change, partitioned by a domain matcher.
    ///
    /// Elements matched in both lists are unchanged and ignored, elements
    /// only in `new` are added, elements only in `old` are deleted.
    /// Non-empty partitions are appended to the change description. List
    /// changes are always minor; call [`Self::escalate_to_major`] to
    /// escalate explicitly.
    ///
    /// Returns the (added, deleted) partitions.
    pub fn record_list_change<M>(
        &mut self,
        name: &str,
        old: &[Value],
        new: &[Value],
        matcher: M,
    ) -> (Vec<Value>, Vec<Value>)
    where
        M: Fn(&Value, &Value) -> bool,
    {
        let added: Vec<Value> = new
            .iter()
            .filter(|n| !old.iter().any(|o| matcher(o, n)))
            .cloned()
            .collect();
        let deleted: Vec<Value> = old
            .iter()
            .filter(|o| !new.iter().any(|n| matcher(o, n)))
            .cloned()
            .collect();

        if !added.is_empty() {
            self.description.fields_added.push(FieldChange {
                name: name.to_string(),
                old_value: None,
                new_value: Some(Value::Array(added.clone())),
            });
        }
        if !deleted.is_empty() {
            self.description.fields_deleted.push(FieldChange {
                name: name.to_string(),
                old_value: Some(Value::Array(deleted.clone())),
                new_value: None,
            });
        }
        (added, deleted)
    }

    /// Escalate the transaction to a major version change.
    pub fn escalate_to_major(&mut self) {
        self.major = true;
    }

    /// Whether any recorded change was major-classified.
    pub fn is_major(&self) -> bool {
        self.major
    }

    /// Whether any change was recorded at all.
    pub fn has_changes(&self) -> bool {
        !self.description.is_empty()
    }

    /// The version the entity moves to: `+1.0` if major, `+0.1` if any
    /// change, unchanged otherwise.
    pub fn next_version(&self) -> VersionNumber {
        let previous = self.description.previous_version;
        if !self.has_changes() {
            previous
        } else if self.major {
            previous.next_major()
        } else {
            previous.next_minor()
        }
    }

    /// Finish recording and take the change description.
    pub fn into_description(self) -> ChangeDescription {
        self.description
    }
}

/// Matcher comparing JSON objects by one key (a stable natural key).
///
/// # Example
///
/// ```
/// use metastore::core::change::field_match;
/// use serde_json::json;
///
/// let matcher = field_match("name");
/// assert!(matcher(
///     &json!({"name": "a", "dataType": "numerical"}),
///     &json!({"name": "a", "dataType": "categorical"}),
/// ));
/// assert!(!matcher(&json!({"name": "a"}), &json!({"name": "b"})));
/// ```
pub fn field_match(key: &str) -> impl Fn(&Value, &Value) -> bool + '_ {
    move |a, b| match (a.get(key), b.get(key)) {
        (Some(ka), Some(kb)) => ka == kb,
        _ => false,
    }
}

/// Matcher comparing entity references by identity (`id` + `kind`).
pub fn entity_reference_match(a: &Value, b: &Value) -> bool {
    a.get("id").is_some() && a.get("id") == b.get("id") && a.get("kind") == b.get("kind")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> ChangeRecorder {
        ChangeRecorder::new(VersionNumber::initial())
    }

    mod scalar {
        use super::*;

        #[test]
        fn equal_values_record_nothing() {
            let mut r = recorder();
            let v = json!("xgboost");
            assert!(!r.record_change("algorithm", Some(&v), Some(&v), true));
            assert!(!r.has_changes());
            assert!(!r.is_major());
            assert_eq!(r.next_version(), VersionNumber::initial());
        }

        #[test]
        fn updated_value_recorded() {
            let mut r = recorder();
            let old = json!("xgboost");
            let new = json!("lightgbm");
            assert!(r.record_change("algorithm", Some(&old), Some(&new), false));
            let d = r.into_description();
            assert_eq!(d.fields_updated.len(), 1);
            assert_eq!(d.fields_updated[0].name, "algorithm");
            assert_eq!(d.fields_updated[0].old_value, Some(old));
            assert_eq!(d.fields_updated[0].new_value, Some(new));
        }

        #[test]
        fn added_and_deleted_partitions() {
            let mut r = recorder();
            let v = json!("s3://bucket");
            r.record_change("mlStore", None, Some(&v), false);
            r.record_change("server", Some(&v), None, false);
            let d = r.into_description();
            assert_eq!(d.fields_added.len(), 1);
            assert_eq!(d.fields_deleted.len(), 1);
        }

        #[test]
        fn major_flag_only_set_on_actual_change() {
            let mut r = recorder();
            let v = json!("same");
            r.record_change("algorithm", Some(&v), Some(&v), true);
            assert!(!r.is_major());

            let new = json!("different");
            r.record_change("algorithm", Some(&v), Some(&new), true);
            assert!(r.is_major());
        }

        #[test]
        fn both_absent_is_noop() {
            let mut r = recorder();
            assert!(!r.record_change("algorithm", None, None, true));
            assert!(!r.has_changes());
        }

        #[test]
        fn matcher_equality_suppresses_metadata_noise() {
            let mut r = recorder();
            // Same entity, different display name after re-resolution
            let old = json!({"id": "x", "kind": "dashboard", "name": "sales"});
            let new = json!({"id": "x", "kind": "dashboard", "name": "sales-renamed"});
            assert!(!r.record_change_with(
                "dashboard",
                Some(&old),
                Some(&new),
                false,
                entity_reference_match,
            ));
            assert!(!r.has_changes());

            let other = json!({"id": "y", "kind": "dashboard"});
            assert!(r.record_change_with(
                "dashboard",
                Some(&old),
                Some(&other),
                false,
                entity_reference_match,
            ));
        }
    }

    mod list {
        use super::*;

        #[test]
        fn natural_key_ignores_metadata_edits() {
            let mut r = recorder();
            let old = vec![json!({"name": "a", "dataType": "numerical"})];
            let new = vec![
                json!({"name": "a", "dataType": "categorical"}),
                json!({"name": "b", "dataType": "numerical"}),
            ];

            let (added, deleted) = r.record_list_change("mlFeatures", &old, &new, field_match("name"));

            // "a" changed type but kept its key: not reported as deleted+added
            assert_eq!(added.len(), 1);
            assert_eq!(added[0]["name"], "b");
            assert!(deleted.is_empty());
        }

        #[test]
        fn reorder_records_nothing() {
            let mut r = recorder();
            let old = vec![json!({"name": "a"}), json!({"name": "b"})];
            let new = vec![json!({"name": "b"}), json!({"name": "a"})];

            let (added, deleted) = r.record_list_change("mlFeatures", &old, &new, field_match("name"));
            assert!(added.is_empty());
            assert!(deleted.is_empty());
            assert!(!r.has_changes());
        }

        #[test]
        fn list_changes_are_minor() {
            let mut r = recorder();
            let old = vec![json!({"name": "a"})];
            let new: Vec<Value> = vec![];
            r.record_list_change("mlFeatures", &old, &new, field_match("name"));
            assert!(r.has_changes());
            assert!(!r.is_major());
            assert_eq!(r.next_version().to_string(), "0.2");
        }

        #[test]
        fn explicit_escalation() {
            let mut r = recorder();
            let old = vec![json!({"name": "a"})];
            r.record_list_change("mlFeatures", &old, &[], field_match("name"));
            r.escalate_to_major();
            assert_eq!(r.next_version().to_string(), "1.1");
        }
    }

    mod versioning {
        use super::*;

        #[test]
        fn minor_bump() {
            let mut r = recorder();
            let old = json!(1);
            let new = json!(2);
            r.record_change("retention", Some(&old), Some(&new), false);
            assert_eq!(r.next_version().to_string(), "0.2");
        }

        #[test]
        fn major_bump() {
            let mut r = recorder();
            let old = json!(1);
            let new = json!(2);
            r.record_change("algorithm", Some(&old), Some(&new), true);
            assert_eq!(r.next_version().to_string(), "1.1");
        }

        #[test]
        fn no_change_keeps_version() {
            let r = recorder();
            assert_eq!(r.next_version(), VersionNumber::initial());
        }
    }

    mod matchers {
        use super::*;

        #[test]
        fn entity_reference_match_compares_identity() {
            let a = json!({"id": "x", "kind": "dashboard", "name": "sales"});
            let b = json!({"id": "x", "kind": "dashboard", "name": "renamed"});
            let c = json!({"id": "y", "kind": "dashboard"});
            assert!(entity_reference_match(&a, &b));
            assert!(!entity_reference_match(&a, &c));
        }

        #[test]
        fn entity_reference_match_rejects_missing_ids() {
            let a = json!({"kind": "dashboard"});
            let b = json!({"kind": "dashboard"});
            assert!(!entity_reference_match(&a, &b));
        }

        #[test]
        fn field_match_missing_key_never_matches() {
            let matcher = field_match("name");
            assert!(!matcher(&json!({}), &json!({})));
        }
    }

    #[test]
    fn change_description_serde_roundtrip() {
        let mut r = recorder();
        let old = json!("a");
        let new = json!("b");
        r.record_change("algorithm", Some(&old), Some(&new), true);
        let d = r.into_description();

        let json = serde_json::to_string(&d).unwrap();
        let parsed: ChangeDescription = serde_json::from_str(&json).unwrap();
        assert_eq!(d, parsed);
    }
}
