//! Resource kinds and the attributes a bound resource exposes.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a declared resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Serverless function
    Function,
    /// Message queue
    Queue,
    /// Pub/sub topic
    Topic,
    /// Topic subscription (child of a topic)
    Subscription,
    /// Key-value table
    Table,
    /// Secondary index (child of a table)
    TableIndex,
    /// Object storage bucket
    Bucket,
    /// Bucket lifecycle rule (child of a bucket)
    LifecycleRule,
    /// IAM-style role
    Role,
    /// Policy statement (child of a role)
    PolicyStatement,
    /// Virtual network
    Vpc,
    /// Workflow state machine
    StateMachine,
}

impl ResourceKind {
    /// Every kind, in declaration order
    pub const ALL: [ResourceKind; 12] = [
        Self::Function,
        Self::Queue,
        Self::Topic,
        Self::Subscription,
        Self::Table,
        Self::TableIndex,
        Self::Bucket,
        Self::LifecycleRule,
        Self::Role,
        Self::PolicyStatement,
        Self::Vpc,
        Self::StateMachine,
    ];

    /// Snake-case tag used in policy files and manifests
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Queue => "queue",
            Self::Topic => "topic",
            Self::Subscription => "subscription",
            Self::Table => "table",
            Self::TableIndex => "table_index",
            Self::Bucket => "bucket",
            Self::LifecycleRule => "lifecycle_rule",
            Self::Role => "role",
            Self::PolicyStatement => "policy_statement",
            Self::Vpc => "vpc",
            Self::StateMachine => "state_machine",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.tag() == s)
            .ok_or_else(|| CoreError::UnknownKind {
                kind: s.to_string(),
            })
    }
}

/// Attribute of a bound resource that later resources may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// Provider resource identifier (ARN-like)
    Arn,
    /// Physical name
    Name,
    /// Endpoint URL
    Url,
    /// Opaque physical id
    Id,
    /// Change stream identifier
    StreamArn,
}

impl Attribute {
    /// Snake-case tag
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Arn => "arn",
            Self::Name => "name",
            Self::Url => "url",
            Self::Id => "id",
            Self::StreamArn => "stream_arn",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Attribute {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arn" => Ok(Self::Arn),
            "name" => Ok(Self::Name),
            "url" => Ok(Self::Url),
            "id" => Ok(Self::Id),
            "stream_arn" => Ok(Self::StreamArn),
            other => Err(CoreError::UnknownAttribute {
                attribute: other.to_string(),
            }),
        }
    }
}
