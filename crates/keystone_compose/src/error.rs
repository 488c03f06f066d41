//! Composition errors.
//!
//! Every variant is fatal for the stack being composed: the engine never
//! retries, renames or rolls back.

use keystone_core::{CoreError, LogicalName, ResourceKind};

/// Composition result type
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Boxed failure reported by a synthesizer
pub type SynthError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Composition error
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// No defaults registered for a kind
    #[error("Unknown resource kind: {kind}")]
    UnknownKind {
        /// Kind tag as given
        kind: String,
    },

    /// Logical name failed validation
    #[error("Invalid logical name {name:?}: {reason}")]
    InvalidName {
        /// Rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Mutation attempted on a finished builder
    #[error("Cannot {operation} on {kind} {name}: builder is already finished")]
    FrozenBuilder {
        /// Builder kind
        kind: ResourceKind,
        /// Builder name
        name: LogicalName,
        /// Attempted operation
        operation: &'static str,
    },

    /// Child of a kind the parent does not accept
    #[error("{parent_kind} {parent} cannot contain {child_kind} {child}")]
    KindMismatch {
        /// Parent name
        parent: LogicalName,
        /// Parent kind
        parent_kind: ResourceKind,
        /// Child name
        child: LogicalName,
        /// Child kind
        child_kind: ResourceKind,
    },

    /// Required field missing after default-merge
    #[error("{kind} {name} is missing required field {field}")]
    IncompleteSpec {
        /// Resource kind
        kind: ResourceKind,
        /// Resource name
        name: LogicalName,
        /// Missing field
        field: String,
    },

    /// Field not declared by the kind's schema
    #[error("{kind} {name} has no field {field}")]
    UnknownField {
        /// Resource kind
        kind: ResourceKind,
        /// Resource name
        name: LogicalName,
        /// Undeclared field
        field: String,
    },

    /// Field value does not fit the field's schema
    #[error("Invalid value for {name}.{field}: {reason}")]
    InvalidField {
        /// Resource name
        name: LogicalName,
        /// Offending field
        field: String,
        /// What is wrong with the value
        reason: String,
    },

    /// Logical name already bound in this scope
    #[error("Duplicate logical name {name} in {scope}")]
    DuplicateName {
        /// Stack or app the name collides in
        scope: String,
        /// Colliding name
        name: String,
    },

    /// Reference to a name that is not bound (yet)
    #[error("{name}.{field} references {target}, which is not bound in stack {stack}")]
    UnresolvedReference {
        /// Stack being composed
        stack: String,
        /// Declaring resource
        name: LogicalName,
        /// Field holding the reference
        field: String,
        /// Referenced name, `stack/name` for another stack's handle
        target: String,
    },

    /// Stack already finalized
    #[error("Stack {stack} is closed")]
    ClosedContext {
        /// Stack name
        stack: String,
    },

    /// Stack abandoned after an earlier composition error
    #[error("Stack {stack} was aborted: {cause}")]
    Aborted {
        /// Stack name
        stack: String,
        /// Message of the first error
        cause: String,
    },

    /// Policy table failed validation
    #[error("Invalid policy table: {reason}")]
    InvalidPolicy {
        /// First violation found
        reason: String,
    },

    /// Stack manifest failed to parse
    #[error("Invalid manifest: {reason}")]
    InvalidManifest {
        /// Parser message
        reason: String,
    },

    /// Failure reported by the synthesizer
    #[error("Synthesis failed for {name}: {source}")]
    Synthesis {
        /// Construct path or stack name
        name: String,
        /// Synthesizer's error
        #[source]
        source: SynthError,
    },

    /// Other core error
    #[error(transparent)]
    Core(CoreError),
}

impl ComposeError {
    /// Short tag naming the error kind
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownKind { .. } => "unknown-kind",
            Self::InvalidName { .. } => "invalid-name",
            Self::FrozenBuilder { .. } => "frozen-builder",
            Self::KindMismatch { .. } => "kind-mismatch",
            Self::IncompleteSpec { .. } => "incomplete-spec",
            Self::UnknownField { .. } => "unknown-field",
            Self::InvalidField { .. } => "invalid-field",
            Self::DuplicateName { .. } => "duplicate-name",
            Self::UnresolvedReference { .. } => "unresolved-reference",
            Self::ClosedContext { .. } => "closed-context",
            Self::Aborted { .. } => "aborted",
            Self::InvalidPolicy { .. } => "invalid-policy",
            Self::InvalidManifest { .. } => "invalid-manifest",
            Self::Synthesis { .. } => "synthesis",
            Self::Core(_) => "core",
        }
    }
}

impl From<CoreError> for ComposeError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidName { name, reason } => Self::InvalidName { name, reason },
            CoreError::UnknownKind { kind } => Self::UnknownKind { kind },
            other => Self::Core(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> LogicalName {
        LogicalName::new(s).unwrap()
    }

    #[test]
    fn test_error_display_names_field() {
        let err = ComposeError::IncompleteSpec {
            kind: ResourceKind::Queue,
            name: name("Orders"),
            field: "visibility_timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "queue Orders is missing required field visibility_timeout"
        );
        assert_eq!(err.kind(), "incomplete-spec");
    }

    #[test]
    fn test_unresolved_reference_display() {
        let err = ComposeError::UnresolvedReference {
            stack: "Shop".to_string(),
            name: name("Worker"),
            field: "environment".to_string(),
            target: "OrdersTable".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("Worker.environment"));
        assert!(s.contains("OrdersTable"));
    }

    #[test]
    fn test_from_core_error() {
        let err = ComposeError::from(CoreError::UnknownKind {
            kind: "cluster".to_string(),
        });
        assert!(matches!(err, ComposeError::UnknownKind { .. }));

        let err = ComposeError::from(CoreError::InvalidVersion {
            reason: "bad".to_string(),
        });
        assert!(matches!(err, ComposeError::Core(_)));
    }

    #[test]
    fn test_synthesis_error_keeps_source() {
        use std::error::Error as _;

        let err = ComposeError::Synthesis {
            name: "Alerts".to_string(),
            source: "no endpoint".into(),
        };
        assert_eq!(err.source().map(|s| s.to_string()), Some("no endpoint".to_string()));
    }
}
