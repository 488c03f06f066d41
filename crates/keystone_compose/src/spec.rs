//! Finished resource specifications.

use crate::error::ComposeResult;
use indexmap::IndexMap;
use keystone_core::{FieldValue, LogicalName, Reference, ResourceKind};
use serde::{Deserialize, Serialize};

/// Immutable description of one resource before it is bound
///
/// Produced by [`Builder::finish`](crate::Builder::finish). Children are
/// nested specs collected with `add_child`, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    kind: ResourceKind,
    name: LogicalName,
    fields: IndexMap<String, FieldValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<ResourceSpec>,
}

impl ResourceSpec {
    pub(crate) fn new(
        kind: ResourceKind,
        name: LogicalName,
        fields: IndexMap<String, FieldValue>,
        children: Vec<ResourceSpec>,
    ) -> Self {
        Self {
            kind,
            name,
            fields,
            children,
        }
    }

    /// Resource kind
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Logical name
    #[must_use]
    pub const fn name(&self) -> &LogicalName {
        &self.name
    }

    /// Merged field map
    #[must_use]
    pub const fn fields(&self) -> &IndexMap<String, FieldValue> {
        &self.fields
    }

    /// Value of one field
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Nested specs, in declaration order
    #[must_use]
    pub fn children(&self) -> &[ResourceSpec] {
        &self.children
    }

    /// References held by this spec's own fields, with the field they sit in
    #[must_use]
    pub fn references(&self) -> Vec<(&str, &Reference)> {
        self.fields
            .iter()
            .flat_map(|(field, value)| {
                value
                    .references()
                    .into_iter()
                    .map(move |r| (field.as_str(), r))
            })
            .collect()
    }

    /// This spec and every descendant, parents before children
    #[must_use]
    pub fn walk(&self) -> Vec<&ResourceSpec> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

/// Anything that can be finished into a [`ResourceSpec`]
///
/// Implemented by specs themselves, generic and typed builders, and
/// `ComposeResult`s of those, so a declaration can return whichever it has.
pub trait IntoSpec {
    /// Finish into a spec
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while building
    fn into_spec(self) -> ComposeResult<ResourceSpec>;
}

impl IntoSpec for ResourceSpec {
    fn into_spec(self) -> ComposeResult<ResourceSpec> {
        Ok(self)
    }
}

impl<T: IntoSpec> IntoSpec for ComposeResult<T> {
    fn into_spec(self) -> ComposeResult<ResourceSpec> {
        self.and_then(IntoSpec::into_spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::Attribute;

    fn name(s: &str) -> LogicalName {
        LogicalName::new(s).unwrap()
    }

    fn leaf(kind: ResourceKind, n: &str) -> ResourceSpec {
        ResourceSpec::new(kind, name(n), IndexMap::new(), Vec::new())
    }

    #[test]
    fn test_references_carry_field() {
        let mut fields = IndexMap::new();
        fields.insert(
            "dead_letter_target".to_string(),
            FieldValue::Ref(Reference::new(name("OrdersDlq"), Attribute::Arn)),
        );
        fields.insert("fifo".to_string(), FieldValue::Bool(false));
        let spec = ResourceSpec::new(ResourceKind::Queue, name("Orders"), fields, Vec::new());

        let refs = spec.references();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].0, "dead_letter_target");
        assert_eq!(refs[0].1.target.as_str(), "OrdersDlq");
    }

    #[test]
    fn test_walk_order() {
        let topic = ResourceSpec::new(
            ResourceKind::Topic,
            name("Alerts"),
            IndexMap::new(),
            vec![
                leaf(ResourceKind::Subscription, "ToQueue"),
                leaf(ResourceKind::Subscription, "ToMail"),
            ],
        );

        let names: Vec<&str> = topic.walk().iter().map(|s| s.name().as_str()).collect();
        assert_eq!(names, vec!["Alerts", "ToQueue", "ToMail"]);
    }

    #[test]
    fn test_into_spec_result() {
        let ok: ComposeResult<ResourceSpec> = Ok(leaf(ResourceKind::Vpc, "Net"));
        assert_eq!(ok.into_spec().unwrap().name().as_str(), "Net");
    }
}
