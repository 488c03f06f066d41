//! Identifiers for declared resources.
//!
//! A [`LogicalName`] is what callers write; a [`HandleId`] is what the
//! binder hands back once the name has been bound inside a stack.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Scope path separator. Logical names may not contain it.
pub const SCOPE_SEPARATOR: char = '/';

/// Logical name of a resource, unique within one stack
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalName(String);

impl LogicalName {
    /// Create a validated logical name
    ///
    /// # Errors
    ///
    /// Returns error if the name is empty, padded with whitespace, or
    /// contains the scope separator
    pub fn new(name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("must not be empty")
        } else if name.trim() != name {
            Some("must not start or end with whitespace")
        } else if name.contains(SCOPE_SEPARATOR) {
            Some("must not contain '/'")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(CoreError::InvalidName {
                name,
                reason: reason.to_string(),
            }),
            None => Ok(Self(name)),
        }
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LogicalName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LogicalName {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for LogicalName {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LogicalName> for String {
    fn from(name: LogicalName) -> Self {
        name.0
    }
}

impl AsRef<str> for LogicalName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for LogicalName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Handle identifier - identifies one binding inside one stack
///
/// Derived from the stack and logical name, so re-composing the same stack
/// yields the same ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(Uuid);

impl HandleId {
    /// Derive the id for `name` bound inside `stack`
    #[must_use]
    pub fn derive(stack: &str, name: &LogicalName) -> Self {
        let stack_ns = Uuid::new_v5(&Uuid::NAMESPACE_OID, stack.as_bytes());
        Self(Uuid::new_v5(&stack_ns, name.as_str().as_bytes()))
    }

    /// Get as UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hdl_{}", self.0)
    }
}
