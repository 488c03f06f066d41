//! Stacks: the unit of composition.
//!
//! A [`Stack`] owns one [`StackContext`] (the bound names and their
//! handles) and the synthesizer that materializes them. Declarations run
//! one at a time and each sees every earlier binding. The first failed
//! declaration aborts the stack; `finalize` closes it and produces the
//! synthesizer's artifact.

use crate::binder::Binder;
use crate::error::{ComposeError, ComposeResult};
use crate::graph::{GraphNode, SynthesizableGraph};
use crate::handle::BoundHandle;
use crate::policy::PolicyTable;
use crate::spec::IntoSpec;
use crate::synth::{ResolvedFields, Synthesizer};
use indexmap::IndexMap;
use keystone_core::{LogicalName, PolicyVersion};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Stack-level settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    /// Stack name, also the root of every construct path
    pub name: String,
    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Target account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Target region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Refuse deletion of the deployed stack
    pub termination_protection: bool,
    /// Tags applied to every taggable resource; resource tags win
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub tags: IndexMap<String, String>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            name: "KeystoneStack".to_string(),
            description: None,
            account: None,
            region: None,
            termination_protection: true,
            tags: IndexMap::new(),
        }
    }
}

impl StackConfig {
    /// Default settings under another name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set target account
    #[must_use]
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Set target region
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set termination protection
    #[must_use]
    pub const fn with_termination_protection(mut self, enabled: bool) -> Self {
        self.termination_protection = enabled;
        self
    }

    /// Add a stack tag
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Lifecycle state of a stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackState {
    /// Accepting declarations
    Open,
    /// Finalized; no further declarations
    Closed,
    /// A declaration failed; the stack produces no artifact
    Aborted {
        /// Message of the error that aborted the stack
        cause: String,
    },
}

#[derive(Debug, Clone)]
struct Binding {
    handle: BoundHandle,
    fields: ResolvedFields,
    parent: Option<LogicalName>,
}

/// Naming scope of one stack: bound names and their handles
#[derive(Debug, Clone)]
pub struct StackContext {
    config: StackConfig,
    policy_version: PolicyVersion,
    state: StackState,
    bindings: IndexMap<LogicalName, Binding>,
}

impl StackContext {
    /// Open a context composed with the built-in policy table
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the stack name is not a valid logical name
    pub fn new(config: StackConfig) -> ComposeResult<Self> {
        Self::with_policy_version(config, PolicyTable::builtin().version())
    }

    /// Open a context recording `policy_version` in its graph
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the stack name is not a valid logical name
    pub fn with_policy_version(
        config: StackConfig,
        policy_version: PolicyVersion,
    ) -> ComposeResult<Self> {
        LogicalName::new(config.name.as_str())?;
        Ok(Self {
            config,
            policy_version,
            state: StackState::Open,
            bindings: IndexMap::new(),
        })
    }

    /// Stack name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Stack settings
    #[must_use]
    pub const fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> &StackState {
        &self.state
    }

    /// Whether declarations are still accepted
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.state, StackState::Open)
    }

    /// Handle bound to `name`, if any
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&BoundHandle> {
        self.bindings.get(name).map(|b| &b.handle)
    }

    /// Whether `name` is bound
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Resolved fields of the resource bound to `name`
    #[must_use]
    pub fn resolved_fields(&self, name: &str) -> Option<&ResolvedFields> {
        self.bindings.get(name).map(|b| &b.fields)
    }

    /// Bound handles in binding order
    pub fn handles(&self) -> impl Iterator<Item = &BoundHandle> {
        self.bindings.values().map(|b| &b.handle)
    }

    /// Number of bound resources
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing is bound
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Fail unless the context is open
    ///
    /// # Errors
    ///
    /// Returns `ClosedContext` or `Aborted`
    pub fn ensure_open(&self) -> ComposeResult<()> {
        match &self.state {
            StackState::Open => Ok(()),
            StackState::Closed => Err(ComposeError::ClosedContext {
                stack: self.config.name.clone(),
            }),
            StackState::Aborted { cause } => Err(ComposeError::Aborted {
                stack: self.config.name.clone(),
                cause: cause.clone(),
            }),
        }
    }

    pub(crate) fn register(
        &mut self,
        handle: BoundHandle,
        fields: ResolvedFields,
        parent: Option<LogicalName>,
    ) -> ComposeResult<()> {
        self.ensure_open()?;
        let name = handle.name().clone();
        if self.bindings.contains_key(&name) {
            return Err(ComposeError::DuplicateName {
                scope: format!("stack {}", self.config.name),
                name: name.to_string(),
            });
        }
        self.bindings.insert(
            name,
            Binding {
                handle,
                fields,
                parent,
            },
        );
        Ok(())
    }

    pub(crate) fn abort(&mut self, cause: &ComposeError) {
        if self.is_open() {
            warn!(stack = %self.config.name, error = %cause, "stack aborted");
            self.state = StackState::Aborted {
                cause: cause.to_string(),
            };
        }
    }

    /// Close the context and return its graph
    ///
    /// # Errors
    ///
    /// Returns `ClosedContext` on a second call, `Aborted` if a
    /// declaration failed
    pub fn finalize(&mut self) -> ComposeResult<SynthesizableGraph> {
        self.ensure_open()?;

        let mut graph = SynthesizableGraph::new(self.config.clone(), self.policy_version);
        for (name, binding) in &self.bindings {
            graph.add_node(GraphNode {
                name: name.clone(),
                handle: binding.handle.id(),
                kind: binding.handle.kind(),
                path: binding.handle.path().to_string(),
                construct: binding.handle.construct().clone(),
                parent: binding.parent.clone(),
                fields: binding.fields.clone(),
            })?;
        }
        graph.validate()?;

        self.state = StackState::Closed;
        Ok(graph)
    }
}

/// Graph and artifact of a finalized stack
#[derive(Debug, Clone)]
pub struct Synthesized<A> {
    /// Bound resources and their references
    pub graph: SynthesizableGraph,
    /// Synthesizer output
    pub artifact: A,
}

/// One stack under composition
#[derive(Debug)]
pub struct Stack<S: Synthesizer> {
    context: StackContext,
    synth: S,
}

impl<S: Synthesizer> Stack<S> {
    /// Open a stack composed with the built-in policy table
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the stack name is not a valid logical name
    pub fn new(config: StackConfig, synth: S) -> ComposeResult<Self> {
        Ok(Self {
            context: StackContext::new(config)?,
            synth,
        })
    }

    /// Open a stack whose graph records `table`'s version
    ///
    /// Builders pick their table themselves; this only stamps the graph.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the stack name is not a valid logical name
    pub fn with_policy(config: StackConfig, table: &PolicyTable, synth: S) -> ComposeResult<Self> {
        Ok(Self {
            context: StackContext::with_policy_version(config, table.version())?,
            synth,
        })
    }

    /// Stack name
    #[must_use]
    pub fn name(&self) -> &str {
        self.context.name()
    }

    /// The stack's naming scope
    #[must_use]
    pub const fn context(&self) -> &StackContext {
        &self.context
    }

    /// The synthesizer
    #[must_use]
    pub const fn synthesizer(&self) -> &S {
        &self.synth
    }

    /// Run one declaration and bind its result
    ///
    /// `declare` sees the context with every earlier binding, so it can
    /// look up handles and reference them. Whatever it returns is finished
    /// and bound, children included. Any error aborts the stack.
    ///
    /// # Errors
    ///
    /// Returns `ClosedContext`/`Aborted` if the stack no longer accepts
    /// declarations, otherwise the builder or binder error
    pub fn declare<F, B>(&mut self, declare: F) -> ComposeResult<BoundHandle>
    where
        F: FnOnce(&StackContext) -> B,
        B: IntoSpec,
    {
        self.context.ensure_open()?;

        let result = declare(&self.context)
            .into_spec()
            .and_then(|spec| Binder::new(&mut self.synth).bind(&mut self.context, &spec));

        if let Err(err) = &result {
            self.context.abort(err);
        }
        result
    }

    /// Bind an already built resource
    ///
    /// # Errors
    ///
    /// As [`Stack::declare`]
    pub fn add(&mut self, resource: impl IntoSpec) -> ComposeResult<BoundHandle> {
        self.declare(|_| resource)
    }

    /// Close the stack and synthesize it
    ///
    /// # Errors
    ///
    /// Returns `ClosedContext` on a second call, `Aborted` if a declaration
    /// failed, `Synthesis` if the synthesizer rejects the graph
    pub fn finalize(&mut self) -> ComposeResult<Synthesized<S::Artifact>> {
        let graph = self.context.finalize()?;
        let artifact = self
            .synth
            .finalize(&graph)
            .map_err(|source| ComposeError::Synthesis {
                name: graph.stack.name.clone(),
                source,
            })?;

        info!(
            stack = %graph.stack.name,
            resources = graph.node_count(),
            edges = graph.edge_count(),
            policy = %graph.policy_version,
            "stack synthesized"
        );
        Ok(Synthesized { graph, artifact })
    }

    /// Consume the stack, returning its synthesizer
    pub fn into_synthesizer(self) -> S {
        self.synth
    }
}
