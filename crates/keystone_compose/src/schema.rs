//! Per-kind field schemas.
//!
//! A schema is the binder's contract for one [`ResourceKind`]: which fields
//! exist, what shape their values take, which must be present after the
//! defaults are merged, which child kinds the resource may contain, the
//! order children bind in, and which attributes later resources may
//! reference. Default *values* are data and live in the policy table.

use keystone_core::{Attribute, FieldValue, ResourceKind};
use std::fmt;

/// Shape of a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Any string
    Str,
    /// One of a fixed set of strings
    OneOf(&'static [&'static str]),
    /// Integer within an inclusive range
    Int {
        /// Smallest accepted value
        min: i64,
        /// Largest accepted value
        max: i64,
    },
    /// Boolean
    Bool,
    /// Reference to a resource of one of the listed kinds (empty: any kind)
    Ref(&'static [ResourceKind]),
    /// Literal string or reference (empty: any kind)
    StrOrRef(&'static [ResourceKind]),
    /// Multi-valued field; `add` appends one item
    List(&'static FieldType),
    /// String-keyed map; `insert` adds or overwrites one entry
    Map(&'static FieldType),
}

impl FieldType {
    /// Check the shape of `value`
    ///
    /// References are only checked for shape here; whether the target is
    /// bound and of an accepted kind is decided when it is resolved.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason on mismatch
    pub fn check(&self, value: &FieldValue) -> Result<(), String> {
        match (self, value) {
            (Self::Str, FieldValue::Str(_)) => Ok(()),
            (Self::OneOf(allowed), FieldValue::Str(s)) => {
                if allowed.contains(&s.as_str()) {
                    Ok(())
                } else {
                    Err(format!("{:?} is not one of {:?}", s, allowed))
                }
            }
            (Self::Int { min, max }, FieldValue::Int(i)) => {
                if (*min..=*max).contains(i) {
                    Ok(())
                } else {
                    Err(format!("{} is outside {}..={}", i, min, max))
                }
            }
            (Self::Bool, FieldValue::Bool(_)) => Ok(()),
            (Self::Ref(_), FieldValue::Ref(_)) => Ok(()),
            (Self::StrOrRef(_), FieldValue::Str(_) | FieldValue::Ref(_)) => Ok(()),
            (Self::List(item), FieldValue::List(items)) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, v)| item.check(v).map_err(|e| format!("item {}: {}", i, e))),
            (Self::Map(entry), FieldValue::Map(entries)) => entries
                .iter()
                .try_for_each(|(k, v)| entry.check(v).map_err(|e| format!("entry {:?}: {}", k, e))),
            (expected, actual) => Err(format!(
                "expected {}, got {}",
                expected,
                actual.type_name()
            )),
        }
    }

    /// Kinds a reference in this field may point at
    ///
    /// `None` if the field cannot hold references; an empty slice accepts any kind.
    #[must_use]
    pub fn reference_targets(&self) -> Option<&'static [ResourceKind]> {
        match self {
            Self::Ref(kinds) | Self::StrOrRef(kinds) => Some(kinds),
            Self::List(inner) | Self::Map(inner) => inner.reference_targets(),
            Self::Str | Self::OneOf(_) | Self::Int { .. } | Self::Bool => None,
        }
    }

    /// Whether `add` applies
    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Whether `insert` applies
    #[must_use]
    pub const fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str => write!(f, "string"),
            Self::OneOf(allowed) => write!(f, "one of {}", allowed.join("|")),
            Self::Int { min, max } => write!(f, "integer {}..={}", min, max),
            Self::Bool => write!(f, "boolean"),
            Self::Ref(kinds) => write!(f, "reference{}", kind_list(kinds)),
            Self::StrOrRef(kinds) => write!(f, "string or reference{}", kind_list(kinds)),
            Self::List(inner) => write!(f, "list of {}", inner),
            Self::Map(inner) => write!(f, "map of {}", inner),
        }
    }
}

fn kind_list(kinds: &[ResourceKind]) -> String {
    if kinds.is_empty() {
        String::new()
    } else {
        let tags: Vec<&str> = kinds.iter().map(ResourceKind::tag).collect();
        format!(" to {}", tags.join("|"))
    }
}

/// One field of a kind's schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    /// Field name
    pub name: &'static str,
    /// Value shape
    pub ty: FieldType,
    /// Must be present after default-merge
    pub required: bool,
}

impl FieldSchema {
    const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }

    const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }
}

/// When children bind relative to their parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOrder {
    /// Parent is created first; children are created inside it
    ParentFirst,
    /// Children are created first; the parent may reference them
    ChildrenFirst,
}

/// Schema of one resource kind
#[derive(Debug)]
pub struct KindSchema {
    /// Kind described
    pub kind: ResourceKind,
    /// Declared fields, in rendering order
    pub fields: &'static [FieldSchema],
    /// Child kinds this kind accepts
    pub children: &'static [ResourceKind],
    /// Child binding order
    pub child_order: ChildOrder,
    /// Attributes other resources may reference
    pub attributes: &'static [Attribute],
}

impl KindSchema {
    /// Look up a field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Required fields, in schema order
    pub fn required_fields(&self) -> impl Iterator<Item = &'static FieldSchema> {
        self.fields.iter().filter(|f| f.required)
    }

    /// Whether `child` may be nested inside this kind
    #[must_use]
    pub fn accepts_child(&self, child: ResourceKind) -> bool {
        self.children.contains(&child)
    }

    /// Whether this kind exposes `attribute`
    #[must_use]
    pub fn exposes(&self, attribute: Attribute) -> bool {
        self.attributes.contains(&attribute)
    }

    /// Whether this kind carries a `tags` map
    #[must_use]
    pub fn is_taggable(&self) -> bool {
        self.field(TAGS).is_some()
    }
}

/// Name of the tag map field shared by taggable kinds
pub const TAGS: &str = "tags";

const TAG_MAP: FieldType = FieldType::Map(&FieldType::Str);
const REMOVAL_POLICY: FieldType = FieldType::OneOf(&["retain", "destroy", "snapshot"]);

static FUNCTION: KindSchema = KindSchema {
    kind: ResourceKind::Function,
    fields: &[
        FieldSchema::required("runtime", FieldType::Str),
        FieldSchema::required("handler", FieldType::Str),
        FieldSchema::required("code", FieldType::Str),
        FieldSchema::required("memory_size", FieldType::Int { min: 128, max: 10_240 }),
        FieldSchema::required("timeout", FieldType::Int { min: 1, max: 900 }),
        FieldSchema::required("reserved_concurrency", FieldType::Int { min: 0, max: 1_000 }),
        FieldSchema::required("dead_letter_queue", FieldType::Bool),
        FieldSchema::required("tracing", FieldType::OneOf(&["Active", "PassThrough"])),
        FieldSchema::required("log_retention_days", FieldType::Int { min: 1, max: 3_653 }),
        FieldSchema::optional("description", FieldType::Str),
        FieldSchema::optional("environment", FieldType::Map(&FieldType::StrOrRef(&[]))),
        FieldSchema::optional("layers", FieldType::List(&FieldType::StrOrRef(&[]))),
        FieldSchema::optional("role", FieldType::Ref(&[ResourceKind::Role])),
        FieldSchema::optional("vpc", FieldType::Ref(&[ResourceKind::Vpc])),
        FieldSchema::optional(TAGS, TAG_MAP),
    ],
    children: &[],
    child_order: ChildOrder::ParentFirst,
    attributes: &[Attribute::Arn, Attribute::Name],
};

static QUEUE: KindSchema = KindSchema {
    kind: ResourceKind::Queue,
    fields: &[
        FieldSchema::required("visibility_timeout", FieldType::Int { min: 0, max: 43_200 }),
        FieldSchema::required("retention_period", FieldType::Int { min: 60, max: 1_209_600 }),
        FieldSchema::required(
            "encryption",
            FieldType::OneOf(&["kms-managed", "queue-managed", "unencrypted"]),
        ),
        FieldSchema::required("fifo", FieldType::Bool),
        FieldSchema::optional("dead_letter_target", FieldType::Ref(&[ResourceKind::Queue])),
        FieldSchema::optional("max_receive_count", FieldType::Int { min: 1, max: 1_000 }),
        FieldSchema::optional(TAGS, TAG_MAP),
    ],
    children: &[],
    child_order: ChildOrder::ParentFirst,
    attributes: &[Attribute::Arn, Attribute::Url, Attribute::Name],
};

static TOPIC: KindSchema = KindSchema {
    kind: ResourceKind::Topic,
    fields: &[
        FieldSchema::optional("display_name", FieldType::Str),
        FieldSchema::required("fifo", FieldType::Bool),
        FieldSchema::required("encryption", FieldType::OneOf(&["kms-managed", "unencrypted"])),
        FieldSchema::optional(TAGS, TAG_MAP),
    ],
    children: &[ResourceKind::Subscription],
    child_order: ChildOrder::ParentFirst,
    attributes: &[Attribute::Arn, Attribute::Name],
};

static SUBSCRIPTION: KindSchema = KindSchema {
    kind: ResourceKind::Subscription,
    fields: &[
        FieldSchema::required(
            "protocol",
            FieldType::OneOf(&["queue", "function", "https", "email"]),
        ),
        FieldSchema::optional(
            "endpoint",
            FieldType::StrOrRef(&[ResourceKind::Queue, ResourceKind::Function]),
        ),
        FieldSchema::required("raw_message_delivery", FieldType::Bool),
        FieldSchema::optional("filter_policy", FieldType::Map(&FieldType::List(&FieldType::Str))),
        FieldSchema::optional("dead_letter_target", FieldType::Ref(&[ResourceKind::Queue])),
    ],
    children: &[],
    child_order: ChildOrder::ParentFirst,
    attributes: &[Attribute::Id],
};

static TABLE: KindSchema = KindSchema {
    kind: ResourceKind::Table,
    fields: &[
        FieldSchema::required("partition_key", FieldType::Str),
        FieldSchema::optional("sort_key", FieldType::Str),
        FieldSchema::required("billing_mode", FieldType::OneOf(&["on-demand", "provisioned"])),
        FieldSchema::required("point_in_time_recovery", FieldType::Bool),
        FieldSchema::required("removal_policy", REMOVAL_POLICY),
        FieldSchema::optional(
            "stream",
            FieldType::OneOf(&["keys-only", "new-image", "old-image", "new-and-old-images"]),
        ),
        FieldSchema::optional("ttl_attribute", FieldType::Str),
        FieldSchema::optional(TAGS, TAG_MAP),
    ],
    children: &[ResourceKind::TableIndex],
    child_order: ChildOrder::ParentFirst,
    attributes: &[Attribute::Arn, Attribute::Name, Attribute::StreamArn],
};

static TABLE_INDEX: KindSchema = KindSchema {
    kind: ResourceKind::TableIndex,
    fields: &[
        FieldSchema::required("partition_key", FieldType::Str),
        FieldSchema::optional("sort_key", FieldType::Str),
        FieldSchema::required("projection", FieldType::OneOf(&["all", "keys-only"])),
    ],
    children: &[],
    child_order: ChildOrder::ParentFirst,
    attributes: &[Attribute::Name],
};

static BUCKET: KindSchema = KindSchema {
    kind: ResourceKind::Bucket,
    fields: &[
        FieldSchema::required("versioned", FieldType::Bool),
        FieldSchema::required("block_public_access", FieldType::Bool),
        FieldSchema::required(
            "encryption",
            FieldType::OneOf(&["bucket-managed", "kms-managed", "unencrypted"]),
        ),
        FieldSchema::required("enforce_ssl", FieldType::Bool),
        FieldSchema::required("removal_policy", REMOVAL_POLICY),
        FieldSchema::optional("cors_origins", FieldType::List(&FieldType::Str)),
        FieldSchema::optional(TAGS, TAG_MAP),
    ],
    children: &[ResourceKind::LifecycleRule],
    child_order: ChildOrder::ChildrenFirst,
    attributes: &[Attribute::Arn, Attribute::Name, Attribute::Url],
};

static LIFECYCLE_RULE: KindSchema = KindSchema {
    kind: ResourceKind::LifecycleRule,
    fields: &[
        FieldSchema::required("enabled", FieldType::Bool),
        FieldSchema::optional("prefix", FieldType::Str),
        FieldSchema::optional("expiration_days", FieldType::Int { min: 1, max: 36_500 }),
        FieldSchema::optional("transition_days", FieldType::Int { min: 0, max: 36_500 }),
        FieldSchema::optional(
            "transition_storage_class",
            FieldType::OneOf(&["infrequent-access", "archive", "deep-archive"]),
        ),
        FieldSchema::required(
            "abort_incomplete_upload_days",
            FieldType::Int { min: 1, max: 365 },
        ),
    ],
    children: &[],
    child_order: ChildOrder::ParentFirst,
    attributes: &[Attribute::Id],
};

static ROLE: KindSchema = KindSchema {
    kind: ResourceKind::Role,
    fields: &[
        FieldSchema::required("assumed_by", FieldType::Str),
        FieldSchema::optional("managed_policies", FieldType::List(&FieldType::Str)),
        FieldSchema::required(
            "max_session_duration",
            FieldType::Int { min: 3_600, max: 43_200 },
        ),
        FieldSchema::optional("description", FieldType::Str),
        FieldSchema::optional(TAGS, TAG_MAP),
    ],
    children: &[ResourceKind::PolicyStatement],
    child_order: ChildOrder::ChildrenFirst,
    attributes: &[Attribute::Arn, Attribute::Name],
};

static POLICY_STATEMENT: KindSchema = KindSchema {
    kind: ResourceKind::PolicyStatement,
    fields: &[
        FieldSchema::required("effect", FieldType::OneOf(&["Allow", "Deny"])),
        FieldSchema::optional("actions", FieldType::List(&FieldType::Str)),
        FieldSchema::optional("resources", FieldType::List(&FieldType::StrOrRef(&[]))),
    ],
    children: &[],
    child_order: ChildOrder::ParentFirst,
    attributes: &[Attribute::Id],
};

static VPC: KindSchema = KindSchema {
    kind: ResourceKind::Vpc,
    fields: &[
        FieldSchema::required("cidr", FieldType::Str),
        FieldSchema::required("max_azs", FieldType::Int { min: 1, max: 6 }),
        FieldSchema::required("nat_gateways", FieldType::Int { min: 0, max: 6 }),
        FieldSchema::required("flow_logs", FieldType::Bool),
        FieldSchema::optional(TAGS, TAG_MAP),
    ],
    children: &[],
    child_order: ChildOrder::ParentFirst,
    attributes: &[Attribute::Id],
};

static STATE_MACHINE: KindSchema = KindSchema {
    kind: ResourceKind::StateMachine,
    fields: &[
        FieldSchema::required("workflow_type", FieldType::OneOf(&["standard", "express"])),
        FieldSchema::required("timeout", FieldType::Int { min: 1, max: 31_536_000 }),
        FieldSchema::required("tracing", FieldType::Bool),
        FieldSchema::required("logging", FieldType::OneOf(&["all", "error", "fatal", "off"])),
        FieldSchema::optional("definition", FieldType::Str),
        FieldSchema::optional("role", FieldType::Ref(&[ResourceKind::Role])),
        FieldSchema::optional(TAGS, TAG_MAP),
    ],
    children: &[],
    child_order: ChildOrder::ParentFirst,
    attributes: &[Attribute::Arn, Attribute::Name],
};

/// Schema for `kind`
#[must_use]
pub fn schema_for(kind: ResourceKind) -> &'static KindSchema {
    match kind {
        ResourceKind::Function => &FUNCTION,
        ResourceKind::Queue => &QUEUE,
        ResourceKind::Topic => &TOPIC,
        ResourceKind::Subscription => &SUBSCRIPTION,
        ResourceKind::Table => &TABLE,
        ResourceKind::TableIndex => &TABLE_INDEX,
        ResourceKind::Bucket => &BUCKET,
        ResourceKind::LifecycleRule => &LIFECYCLE_RULE,
        ResourceKind::Role => &ROLE,
        ResourceKind::PolicyStatement => &POLICY_STATEMENT,
        ResourceKind::Vpc => &VPC,
        ResourceKind::StateMachine => &STATE_MACHINE,
    }
}
