//! Spec validation against the kind schema.
//!
//! Runs at bind time, after the defaults have been merged, and stops at the
//! first violation so the error names exactly one field.

use crate::error::{ComposeError, ComposeResult};
use crate::schema::schema_for;
use crate::spec::ResourceSpec;

/// Validator for finished specs
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    /// Create a new validator
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validate one spec (children are validated when they bind)
    ///
    /// Required fields are checked first, in schema order; then every
    /// present field is checked against its declared shape, in field order.
    ///
    /// # Errors
    ///
    /// Returns `IncompleteSpec`, `UnknownField` or `InvalidField` for the
    /// first offending field
    pub fn validate(&self, spec: &ResourceSpec) -> ComposeResult<()> {
        let schema = schema_for(spec.kind());

        if let Some(missing) = schema
            .required_fields()
            .find(|f| spec.field(f.name).is_none())
        {
            return Err(ComposeError::IncompleteSpec {
                kind: spec.kind(),
                name: spec.name().clone(),
                field: missing.name.to_string(),
            });
        }

        for (field, value) in spec.fields() {
            let field_schema = schema.field(field).ok_or_else(|| ComposeError::UnknownField {
                kind: spec.kind(),
                name: spec.name().clone(),
                field: field.clone(),
            })?;
            field_schema
                .ty
                .check(value)
                .map_err(|reason| ComposeError::InvalidField {
                    name: spec.name().clone(),
                    field: field.clone(),
                    reason,
                })?;
        }

        for child in spec.children() {
            if !schema.accepts_child(child.kind()) {
                return Err(ComposeError::KindMismatch {
                    parent: spec.name().clone(),
                    parent_kind: spec.kind(),
                    child: child.name().clone(),
                    child_kind: child.kind(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use keystone_core::ResourceKind;

    #[test]
    fn test_defaults_alone_validate() {
        let validator = Validator::new();
        for kind in ResourceKind::ALL {
            let mut b = Builder::start(kind, "Probe").unwrap();
            let spec = b.finish();
            assert!(validator.validate(&spec).is_ok(), "{} defaults invalid", kind);
        }
    }

    #[test]
    fn test_missing_required_field() {
        let mut b = Builder::start(ResourceKind::Function, "Worker").unwrap();
        b.unset("timeout").unwrap();
        let err = Validator::new().validate(&b.finish()).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::IncompleteSpec { ref field, .. } if field == "timeout"
        ));
    }

    #[test]
    fn test_first_missing_in_schema_order() {
        let mut b = Builder::start(ResourceKind::Function, "Worker").unwrap();
        b.unset("timeout").unwrap().unset("runtime").unwrap();
        let err = Validator::new().validate(&b.finish()).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::IncompleteSpec { ref field, .. } if field == "runtime"
        ));
    }

    #[test]
    fn test_wrong_shape() {
        let mut b = Builder::start(ResourceKind::Function, "Worker").unwrap();
        b.set("memory_size", "huge").unwrap();
        let err = Validator::new().validate(&b.finish()).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::InvalidField { ref field, .. } if field == "memory_size"
        ));
    }

    #[test]
    fn test_out_of_range() {
        let mut b = Builder::start(ResourceKind::Function, "Worker").unwrap();
        b.set("timeout", 3_600u32).unwrap();
        assert!(Validator::new().validate(&b.finish()).is_err());
    }
}
