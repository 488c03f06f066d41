//! Handles to bound resources.

use crate::synth::ConstructHandle;
use keystone_core::{Attribute, FieldValue, HandleId, LogicalName, Reference, ResourceKind};
use serde::Serialize;

/// Reference to a resource bound into a stack
///
/// Returned by `declare`. A handle never changes once bound; later
/// declarations read it to build references with [`BoundHandle::reference`]
/// or one of the attribute shortcuts. References taken from a handle only
/// resolve inside the stack that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundHandle {
    id: HandleId,
    stack: String,
    name: LogicalName,
    kind: ResourceKind,
    path: String,
    construct: ConstructHandle,
}

impl BoundHandle {
    pub(crate) fn new(
        stack: &str,
        name: LogicalName,
        kind: ResourceKind,
        path: String,
        construct: ConstructHandle,
    ) -> Self {
        Self {
            id: HandleId::derive(stack, &name),
            stack: stack.to_string(),
            name,
            kind,
            path,
            construct,
        }
    }

    /// Handle id
    #[must_use]
    pub const fn id(&self) -> HandleId {
        self.id
    }

    /// Stack this handle belongs to
    #[must_use]
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Logical name
    #[must_use]
    pub const fn name(&self) -> &LogicalName {
        &self.name
    }

    /// Resource kind
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Construct path, e.g. `Shop/Alerts/ToQueue`
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Handle returned by the synthesizer
    #[must_use]
    pub const fn construct(&self) -> &ConstructHandle {
        &self.construct
    }

    /// Reference to one attribute of this resource
    #[must_use]
    pub fn reference(&self, attribute: Attribute) -> Reference {
        Reference::within(self.stack.clone(), self.name.clone(), attribute)
    }

    /// Field value referencing this resource's ARN
    #[must_use]
    pub fn arn(&self) -> FieldValue {
        self.reference(Attribute::Arn).into()
    }

    /// Field value referencing this resource's physical name
    #[must_use]
    pub fn physical_name(&self) -> FieldValue {
        self.reference(Attribute::Name).into()
    }

    /// Field value referencing this resource's URL
    #[must_use]
    pub fn url(&self) -> FieldValue {
        self.reference(Attribute::Url).into()
    }

    /// Field value referencing this resource's physical id
    #[must_use]
    pub fn physical_id(&self) -> FieldValue {
        self.reference(Attribute::Id).into()
    }

    /// Field value referencing this resource's change stream
    #[must_use]
    pub fn stream_arn(&self) -> FieldValue {
        self.reference(Attribute::StreamArn).into()
    }
}
