//! Field values, references between resources, and their resolved form.
//!
//! A [`FieldValue`] is what a builder holds. Values that point at another
//! resource are [`Reference`] tokens: they name a logical resource and one
//! of its attributes, and stay unresolved until the binder looks the target
//! up in the stack. The binder turns each [`FieldValue`] into a
//! [`ResolvedValue`], where every reference carries the bound handle.

use crate::id::{HandleId, LogicalName};
use crate::kind::{Attribute, ResourceKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to an attribute of another resource in the same stack
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Logical name of the referenced resource
    pub target: LogicalName,
    /// Referenced attribute
    pub attribute: Attribute,
    /// Stack the reference was taken from, when it came from a bound handle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl Reference {
    /// Create a reference resolved against whichever stack binds it
    #[must_use]
    pub fn new(target: LogicalName, attribute: Attribute) -> Self {
        Self {
            target,
            attribute,
            stack: None,
        }
    }

    /// Create a reference that only resolves inside `stack`
    #[must_use]
    pub fn within(stack: impl Into<String>, target: LogicalName, attribute: Attribute) -> Self {
        Self {
            target,
            attribute,
            stack: Some(stack.into()),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.attribute)
    }
}

/// A configuration value held by a builder
///
/// In JSON, scalars, arrays and objects map onto the obvious variants;
/// a reference is written as `{"ref": {"target": "Orders", "attribute": "arn"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FieldRepr", into = "FieldRepr")]
pub enum FieldValue {
    /// String value
    Str(String),
    /// Integer value
    Int(i64),
    /// Boolean value
    Bool(bool),
    /// Ordered list of values
    List(Vec<FieldValue>),
    /// Ordered string-keyed map
    Map(IndexMap<String, FieldValue>),
    /// Reference to another resource
    Ref(Reference),
}

impl FieldValue {
    /// Short name of the value's shape, for diagnostics
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "integer",
            Self::Bool(_) => "boolean",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Ref(_) => "reference",
        }
    }

    /// All references contained in this value, depth first
    #[must_use]
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Self::Ref(r) => out.push(r),
            Self::List(items) => items.iter().for_each(|v| v.collect_references(out)),
            Self::Map(entries) => entries.values().for_each(|v| v.collect_references(out)),
            Self::Str(_) | Self::Int(_) | Self::Bool(_) => {}
        }
    }

    /// Resolve every reference with `resolve`, keeping the structure
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `resolve`
    pub fn resolve<E, F>(&self, resolve: &mut F) -> Result<ResolvedValue, E>
    where
        F: FnMut(&Reference) -> Result<ResolvedReference, E>,
    {
        Ok(match self {
            Self::Str(s) => ResolvedValue::Str(s.clone()),
            Self::Int(i) => ResolvedValue::Int(*i),
            Self::Bool(b) => ResolvedValue::Bool(*b),
            Self::List(items) => ResolvedValue::List(
                items
                    .iter()
                    .map(|v| v.resolve(resolve))
                    .collect::<Result<Vec<_>, E>>()?,
            ),
            Self::Map(entries) => {
                let mut resolved = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    resolved.insert(key.clone(), value.resolve(resolve)?);
                }
                ResolvedValue::Map(resolved)
            }
            Self::Ref(r) => ResolvedValue::Ref(resolve(r)?),
        })
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Reference> for FieldValue {
    fn from(value: Reference) -> Self {
        Self::Ref(value)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum FieldRepr {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<FieldValue>),
    Ref(RefRepr),
    Map(IndexMap<String, FieldValue>),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RefRepr {
    #[serde(rename = "ref")]
    reference: Reference,
}

impl From<FieldRepr> for FieldValue {
    fn from(repr: FieldRepr) -> Self {
        match repr {
            FieldRepr::Bool(b) => Self::Bool(b),
            FieldRepr::Int(i) => Self::Int(i),
            FieldRepr::Str(s) => Self::Str(s),
            FieldRepr::List(items) => Self::List(items),
            FieldRepr::Ref(r) => Self::Ref(r.reference),
            FieldRepr::Map(entries) => Self::Map(entries),
        }
    }
}

impl From<FieldValue> for FieldRepr {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Bool(b) => Self::Bool(b),
            FieldValue::Int(i) => Self::Int(i),
            FieldValue::Str(s) => Self::Str(s),
            FieldValue::List(items) => Self::List(items),
            FieldValue::Ref(reference) => Self::Ref(RefRepr { reference }),
            FieldValue::Map(entries) => Self::Map(entries),
        }
    }
}

/// A reference after binding: the target's handle and kind are known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolvedReference {
    /// Logical name of the referenced resource
    pub target: LogicalName,
    /// Referenced attribute
    pub attribute: Attribute,
    /// Handle of the bound target
    pub handle: HandleId,
    /// Kind of the bound target
    pub kind: ResourceKind,
}

/// A field value with every reference resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolvedValue {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// String value
    Str(String),
    /// Ordered list of values
    List(Vec<ResolvedValue>),
    /// Resolved reference
    Ref(ResolvedReference),
    /// Ordered string-keyed map
    Map(IndexMap<String, ResolvedValue>),
}

impl ResolvedValue {
    /// All resolved references contained in this value
    #[must_use]
    pub fn references(&self) -> Vec<&ResolvedReference> {
        match self {
            Self::Ref(r) => vec![r],
            Self::List(items) => items.iter().flat_map(Self::references).collect(),
            Self::Map(entries) => entries.values().flat_map(Self::references).collect(),
            Self::Str(_) | Self::Int(_) | Self::Bool(_) => Vec::new(),
        }
    }

    /// Get as string slice, if this is a string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as integer, if this is an integer
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}
