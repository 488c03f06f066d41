//! Version of a default policy table.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic version of a policy table
///
/// Serialized as `"major.minor.patch"`. Tables with the same major version
/// share a field schema; a minor or patch bump only changes default values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PolicyVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl PolicyVersion {
    /// Create a new version
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse from string
    ///
    /// # Errors
    ///
    /// Returns error if format is invalid
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(CoreError::InvalidVersion {
                reason: format!("expected major.minor.patch, got {:?}", s),
            });
        }

        let component = |part: &str| {
            part.parse::<u64>().map_err(|_| CoreError::InvalidVersion {
                reason: format!("invalid component {:?} in {:?}", part, s),
            })
        };

        Ok(Self {
            major: component(parts[0])?,
            minor: component(parts[1])?,
            patch: component(parts[2])?,
        })
    }

    /// Whether a table at this version can be read by code built for `schema_major`
    #[must_use]
    pub const fn is_compatible_with(&self, schema_major: u64) -> bool {
        self.major == schema_major
    }
}

impl fmt::Display for PolicyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for PolicyVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PolicyVersion {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PolicyVersion> for String {
    fn from(version: PolicyVersion) -> Self {
        version.to_string()
    }
}
