//! Contract with the synthesizer that materializes bound resources.

use crate::error::SynthError;
use crate::graph::SynthesizableGraph;
use indexmap::IndexMap;
use keystone_core::{LogicalName, ResolvedValue, ResourceKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field map with every reference resolved
pub type ResolvedFields = IndexMap<String, ResolvedValue>;

/// Construct scope: the path of the stack and enclosing resources
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    path: String,
}

impl Scope {
    /// Scope of a stack's top-level resources
    #[must_use]
    pub fn root(stack: &str) -> Self {
        Self {
            path: stack.to_string(),
        }
    }

    /// Scope nested under `name`
    #[must_use]
    pub fn child(&self, name: &LogicalName) -> Self {
        Self {
            path: format!("{}/{}", self.path, name),
        }
    }

    /// Path of this scope, segments joined by `/`
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path a resource called `name` gets inside this scope
    #[must_use]
    pub fn path_of(&self, name: &LogicalName) -> String {
        format!("{}/{}", self.path, name)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Opaque handle a synthesizer returns for a created construct
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstructHandle(String);

impl ConstructHandle {
    /// Create a handle
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConstructHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Materializes bound resources and the finished stack
///
/// The engine calls `create` once per resource, in binding order, and
/// `finalize` once when the stack closes. Errors from either are wrapped
/// in `ComposeError::Synthesis` and never retried.
pub trait Synthesizer {
    /// Deployable output of a finished stack
    type Artifact;

    /// Create the construct for one resource inside `scope`
    ///
    /// # Errors
    ///
    /// Returns error if the construct cannot be created
    fn create(
        &mut self,
        scope: &Scope,
        name: &LogicalName,
        kind: ResourceKind,
        fields: &ResolvedFields,
    ) -> Result<ConstructHandle, SynthError>;

    /// Turn the closed graph into the deployable artifact
    ///
    /// # Errors
    ///
    /// Returns error if the artifact cannot be produced
    fn finalize(&mut self, graph: &SynthesizableGraph) -> Result<Self::Artifact, SynthError>;
}

impl<S: Synthesizer + ?Sized> Synthesizer for &mut S {
    type Artifact = S::Artifact;

    fn create(
        &mut self,
        scope: &Scope,
        name: &LogicalName,
        kind: ResourceKind,
        fields: &ResolvedFields,
    ) -> Result<ConstructHandle, SynthError> {
        (**self).create(scope, name, kind, fields)
    }

    fn finalize(&mut self, graph: &SynthesizableGraph) -> Result<Self::Artifact, SynthError> {
        (**self).finalize(graph)
    }
}
