//! Default policy table.
//!
//! The table maps each resource kind to the field values a builder starts
//! from. It is data, not code: the built-in table is the JSON document in
//! `policy/defaults.json`, compiled into the crate and parsed once on first
//! use. Changing a default is an edit to that file, reviewable as a diff.

use crate::error::{ComposeError, ComposeResult};
use crate::schema::schema_for;
use indexmap::IndexMap;
use keystone_core::{FieldValue, Fingerprint, PolicyVersion, ResourceKind};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Major version of the field schema this crate implements
pub const SCHEMA_MAJOR: u64 = 1;

const BUILTIN_JSON: &str = include_str!("../policy/defaults.json");

static BUILTIN: Lazy<PolicyTable> = Lazy::new(|| {
    PolicyTable::from_json(BUILTIN_JSON).expect("built-in policy table must validate")
});

/// Default field values for one kind
pub type DefaultPolicy = IndexMap<String, FieldValue>;

/// Versioned table of per-kind defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyTable {
    version: PolicyVersion,
    kinds: IndexMap<ResourceKind, DefaultPolicy>,
}

impl PolicyTable {
    /// The built-in table, shared process-wide
    #[must_use]
    pub fn builtin() -> &'static PolicyTable {
        &BUILTIN
    }

    /// Parse and validate a table from JSON
    ///
    /// # Errors
    ///
    /// Returns `InvalidPolicy` if the document does not parse, was written
    /// for another schema major version, names a field a kind does not
    /// declare, or holds a value of the wrong shape
    pub fn from_json(json: &str) -> ComposeResult<Self> {
        let table: PolicyTable =
            serde_json::from_str(json).map_err(|e| ComposeError::InvalidPolicy {
                reason: e.to_string(),
            })?;
        table.validate()?;
        debug!(
            version = %table.version,
            kinds = table.kinds.len(),
            "loaded policy table"
        );
        Ok(table)
    }

    /// Validate every default against its kind's schema
    ///
    /// A table may leave a required field without a default; builders
    /// started from it must then set that field before binding.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPolicy` describing the first violation
    pub fn validate(&self) -> ComposeResult<()> {
        if !self.version.is_compatible_with(SCHEMA_MAJOR) {
            return Err(ComposeError::InvalidPolicy {
                reason: format!(
                    "version {} is not compatible with schema major {}",
                    self.version, SCHEMA_MAJOR
                ),
            });
        }

        for (kind, defaults) in &self.kinds {
            let schema = schema_for(*kind);
            for (field, value) in defaults {
                let field_schema = schema.field(field).ok_or_else(|| ComposeError::InvalidPolicy {
                    reason: format!("{} has no field {}", kind, field),
                })?;
                if !value.references().is_empty() {
                    return Err(ComposeError::InvalidPolicy {
                        reason: format!("default for {}.{} may not hold a reference", kind, field),
                    });
                }
                field_schema
                    .ty
                    .check(value)
                    .map_err(|reason| ComposeError::InvalidPolicy {
                        reason: format!("default for {}.{}: {}", kind, field, reason),
                    })?;
            }

            let missing = self.missing_required(*kind);
            if !missing.is_empty() {
                warn!(%kind, ?missing, "policy table leaves required fields without defaults");
            }
        }

        Ok(())
    }

    /// Table version
    #[must_use]
    pub const fn version(&self) -> PolicyVersion {
        self.version
    }

    /// Defaults registered for `kind`
    ///
    /// # Errors
    ///
    /// Returns `UnknownKind` if the table has no entry for `kind`
    pub fn defaults_for(&self, kind: ResourceKind) -> ComposeResult<&DefaultPolicy> {
        self.kinds.get(&kind).ok_or_else(|| ComposeError::UnknownKind {
            kind: kind.tag().to_string(),
        })
    }

    /// Whether `kind` is registered
    #[must_use]
    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.kinds.contains_key(&kind)
    }

    /// Registered kinds, in table order
    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.kinds.keys().copied()
    }

    /// Required fields of `kind` this table gives no default for
    #[must_use]
    pub fn missing_required(&self, kind: ResourceKind) -> Vec<&'static str> {
        let defaults = self.kinds.get(&kind);
        schema_for(kind)
            .required_fields()
            .filter(|f| defaults.is_none_or(|d| !d.contains_key(f.name)))
            .map(|f| f.name)
            .collect()
    }

    /// Fingerprint of the table's canonical JSON
    ///
    /// # Errors
    ///
    /// Returns error if the table cannot be encoded
    pub fn fingerprint(&self) -> ComposeResult<Fingerprint> {
        Ok(Fingerprint::of_json(self)?)
    }
}

/// Defaults for `kind` from the built-in table
///
/// # Errors
///
/// Returns `UnknownKind` if the built-in table has no entry for `kind`
pub fn defaults_for(kind: ResourceKind) -> ComposeResult<&'static DefaultPolicy> {
    PolicyTable::builtin().defaults_for(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_loads() {
        let table = PolicyTable::builtin();
        assert_eq!(table.version(), PolicyVersion::new(1, 0, 0));
        for kind in ResourceKind::ALL {
            assert!(table.contains(kind), "no defaults for {}", kind);
        }
    }

    #[test]
    fn test_builtin_covers_required_fields() {
        let table = PolicyTable::builtin();
        for kind in ResourceKind::ALL {
            assert!(
                table.missing_required(kind).is_empty(),
                "{} is missing {:?}",
                kind,
                table.missing_required(kind)
            );
        }
    }

    #[test]
    fn test_function_defaults() {
        let defaults = defaults_for(ResourceKind::Function).unwrap();
        assert_eq!(defaults["memory_size"], FieldValue::Int(512));
        assert_eq!(defaults["timeout"], FieldValue::Int(30));
        assert_eq!(defaults["reserved_concurrency"], FieldValue::Int(10));
        assert_eq!(defaults["dead_letter_queue"], FieldValue::Bool(true));
    }

    #[test]
    fn test_unknown_kind_in_partial_table() {
        let table = PolicyTable::from_json(
            r#"{"version": "1.0.0", "kinds": {"queue": {"visibility_timeout": 45}}}"#,
        )
        .unwrap();
        assert!(table.defaults_for(ResourceKind::Queue).is_ok());
        let err = table.defaults_for(ResourceKind::Bucket).unwrap_err();
        assert!(matches!(err, ComposeError::UnknownKind { ref kind } if kind == "bucket"));
        assert_eq!(
            table.missing_required(ResourceKind::Queue),
            vec!["retention_period", "encryption", "fifo"]
        );
    }

    #[test]
    fn test_rejects_unknown_field() {
        let result = PolicyTable::from_json(
            r#"{"version": "1.0.0", "kinds": {"queue": {"color": "blue"}}}"#,
        );
        assert!(matches!(result, Err(ComposeError::InvalidPolicy { .. })));
    }

    #[test]
    fn test_rejects_wrong_type() {
        let result = PolicyTable::from_json(
            r#"{"version": "1.0.0", "kinds": {"function": {"memory_size": "large"}}}"#,
        );
        assert!(matches!(result, Err(ComposeError::InvalidPolicy { .. })));
    }

    #[test]
    fn test_rejects_reference_default() {
        let result = PolicyTable::from_json(
            r#"{"version": "1.0.0", "kinds": {"function": {"role": {"ref": {"target": "R", "attribute": "arn"}}}}}"#,
        );
        assert!(matches!(result, Err(ComposeError::InvalidPolicy { .. })));
    }

    #[test]
    fn test_rejects_unknown_kind_and_major() {
        let result = PolicyTable::from_json(r#"{"version": "1.0.0", "kinds": {"cluster": {}}}"#);
        assert!(matches!(result, Err(ComposeError::InvalidPolicy { .. })));

        let result = PolicyTable::from_json(r#"{"version": "2.0.0", "kinds": {}}"#);
        assert!(matches!(result, Err(ComposeError::InvalidPolicy { .. })));
    }

    #[test]
    fn test_fingerprint_tracks_data() {
        let a = PolicyTable::from_json(
            r#"{"version": "1.0.0", "kinds": {"queue": {"visibility_timeout": 45}}}"#,
        )
        .unwrap();
        let b = PolicyTable::from_json(
            r#"{"version": "1.0.0", "kinds": {"queue": {"visibility_timeout": 60}}}"#,
        )
        .unwrap();
        assert_eq!(a.fingerprint().unwrap(), a.clone().fingerprint().unwrap());
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }
}
