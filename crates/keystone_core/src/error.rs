//! Core error types for KEYSTONE.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid logical name
    InvalidName {
        /// Rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Resource kind tag is not known
    UnknownKind {
        /// Tag as given
        kind: String,
    },

    /// Attribute tag is not known
    UnknownAttribute {
        /// Tag as given
        attribute: String,
    },

    /// Invalid policy version
    InvalidVersion {
        /// Parse failure
        reason: String,
    },

    /// Invalid encoding
    InvalidEncoding {
        /// Decoder message
        reason: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName { name, reason } => {
                write!(f, "Invalid logical name {:?}: {}", name, reason)
            }
            Self::UnknownKind { kind } => write!(f, "Unknown resource kind: {}", kind),
            Self::UnknownAttribute { attribute } => write!(f, "Unknown attribute: {}", attribute),
            Self::InvalidVersion { reason } => write!(f, "Invalid version: {}", reason),
            Self::InvalidEncoding { reason } => write!(f, "Invalid encoding: {}", reason),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidEncoding {
            reason: err.to_string(),
        }
    }
}
