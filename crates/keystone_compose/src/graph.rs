//! Synthesizable graph of a closed stack.
//!
//! Nodes are kept in binding order. Every edge runs from a dependency to
//! the resource whose field references it, and since a reference can only
//! name something already bound, every edge points backwards in that order.

use crate::error::{ComposeError, ComposeResult};
use crate::stack::StackConfig;
use crate::synth::{ConstructHandle, ResolvedFields};
use indexmap::{IndexMap, IndexSet};
use keystone_core::{Attribute, Fingerprint, HandleId, LogicalName, PolicyVersion, ResourceKind};
use serde::{Deserialize, Serialize};

/// Bound resources of one stack and the references between them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizableGraph {
    /// Stack settings
    pub stack: StackConfig,
    /// Version of the policy table the stack was composed with
    pub policy_version: PolicyVersion,
    /// Nodes in binding order
    pub nodes: IndexMap<LogicalName, GraphNode>,
    /// Reference edges, in binding order of the dependent
    pub edges: Vec<Edge>,
}

impl SynthesizableGraph {
    /// Create an empty graph
    #[must_use]
    pub fn new(stack: StackConfig, policy_version: PolicyVersion) -> Self {
        Self {
            stack,
            policy_version,
            nodes: IndexMap::new(),
            edges: Vec::new(),
        }
    }

    /// Append a node and one edge per reference in its fields
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if the name is already present
    pub fn add_node(&mut self, node: GraphNode) -> ComposeResult<()> {
        if self.nodes.contains_key(&node.name) {
            return Err(ComposeError::DuplicateName {
                scope: format!("stack {}", self.stack.name),
                name: node.name.to_string(),
            });
        }

        for (field, value) in &node.fields {
            for r in value.references() {
                self.edges.push(Edge {
                    from: r.target.clone(),
                    to: node.name.clone(),
                    field: field.clone(),
                    attribute: r.attribute,
                });
            }
        }

        self.nodes.insert(node.name.clone(), node);
        Ok(())
    }

    /// Validate the graph structure
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if an edge or parent link names a node
    /// that is missing or bound later than its dependent
    pub fn validate(&self) -> ComposeResult<()> {
        for edge in &self.edges {
            self.check_earlier(&edge.to, &edge.from, &edge.field)?;
        }

        for node in self.nodes.values() {
            if let Some(parent) = &node.parent {
                if !self.nodes.contains_key(parent) {
                    return Err(self.unresolved(&node.name, "parent", parent));
                }
            }
        }

        Ok(())
    }

    fn check_earlier(
        &self,
        dependent: &LogicalName,
        dependency: &LogicalName,
        field: &str,
    ) -> ComposeResult<()> {
        let to = self.nodes.get_index_of(dependent);
        let from = self.nodes.get_index_of(dependency);
        match (from, to) {
            (Some(from), Some(to)) if from < to => Ok(()),
            _ => Err(self.unresolved(dependent, field, dependency)),
        }
    }

    fn unresolved(&self, name: &LogicalName, field: &str, target: &LogicalName) -> ComposeError {
        ComposeError::UnresolvedReference {
            stack: self.stack.name.clone(),
            name: name.clone(),
            field: field.to_string(),
            target: target.to_string(),
        }
    }

    /// Get node by logical name
    #[must_use]
    pub fn get_node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.get(name)
    }

    /// Resources `name` references, each listed once
    #[must_use]
    pub fn dependencies(&self, name: &str) -> Vec<&LogicalName> {
        let deps: IndexSet<&LogicalName> = self
            .edges
            .iter()
            .filter(|e| e.to.as_str() == name)
            .map(|e| &e.from)
            .collect();
        deps.into_iter().collect()
    }

    /// Resources referencing `name`, each listed once
    #[must_use]
    pub fn dependents(&self, name: &str) -> Vec<&LogicalName> {
        let deps: IndexSet<&LogicalName> = self
            .edges
            .iter()
            .filter(|e| e.from.as_str() == name)
            .map(|e| &e.to)
            .collect();
        deps.into_iter().collect()
    }

    /// Nested resources declared under `name`
    #[must_use]
    pub fn children(&self, name: &str) -> Vec<&GraphNode> {
        self.nodes
            .values()
            .filter(|n| n.parent.as_ref().is_some_and(|p| p.as_str() == name))
            .collect()
    }

    /// Top-level resources
    #[must_use]
    pub fn roots(&self) -> Vec<&GraphNode> {
        self.nodes.values().filter(|n| n.parent.is_none()).collect()
    }

    /// Get total node count
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get total edge count
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Check if graph is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Content hash of the whole graph
    ///
    /// # Errors
    ///
    /// Returns error if the graph cannot be encoded
    pub fn fingerprint(&self) -> ComposeResult<Fingerprint> {
        Ok(Fingerprint::of_json(self)?)
    }
}

/// One bound resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Logical name
    pub name: LogicalName,
    /// Handle id
    pub handle: HandleId,
    /// Resource kind
    pub kind: ResourceKind,
    /// Construct path
    pub path: String,
    /// Handle returned by the synthesizer
    pub construct: ConstructHandle,
    /// Enclosing resource, for nested declarations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<LogicalName>,
    /// Fields with references resolved
    pub fields: ResolvedFields,
}

/// Reference edge: `to` reads `attribute` of `from` in `field`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Referenced resource
    pub from: LogicalName,
    /// Referencing resource
    pub to: LogicalName,
    /// Field holding the reference
    pub field: String,
    /// Referenced attribute
    pub attribute: Attribute,
}
