//! JSON stack manifests.
//!
//! A manifest is a stack declared as data:
//!
//! ```json
//! {
//!   "stack": { "name": "Shop", "tags": { "team": "orders" } },
//!   "resources": [
//!     { "kind": "table", "name": "OrdersTable", "set": { "sort_key": "sk" } },
//!     {
//!       "kind": "function",
//!       "name": "Worker",
//!       "insert": {
//!         "environment": {
//!           "TABLE": { "ref": { "target": "OrdersTable", "attribute": "name" } }
//!         }
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! Each declaration is replayed through the builder in a fixed order
//! (`unset`, `set`, `add`, `insert`, then `children`) and declared into the
//! stack in file order, so references only reach resources listed earlier.

use crate::builder::Builder;
use crate::error::{ComposeError, ComposeResult};
use crate::policy::PolicyTable;
use crate::stack::{Stack, StackConfig, Synthesized};
use crate::synth::Synthesizer;
use indexmap::IndexMap;
use keystone_core::FieldValue;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One declared resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDecl {
    /// Kind tag, e.g. `"queue"`
    pub kind: String,
    /// Logical name
    pub name: String,
    /// Fields to remove, defaults included
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unset: Vec<String>,
    /// Fields to overwrite
    #[serde(default, alias = "fields", skip_serializing_if = "IndexMap::is_empty")]
    pub set: IndexMap<String, FieldValue>,
    /// Items appended to list fields
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub add: IndexMap<String, Vec<FieldValue>>,
    /// Entries added to map fields
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub insert: IndexMap<String, IndexMap<String, FieldValue>>,
    /// Nested resources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ResourceDecl>,
}

impl ResourceDecl {
    /// Replay this declaration into a builder started from `table`
    ///
    /// # Errors
    ///
    /// Returns the first builder error
    pub fn to_builder(&self, table: &PolicyTable) -> ComposeResult<Builder> {
        let mut builder = Builder::start_tagged(table, &self.kind, &self.name)?;

        for key in &self.unset {
            builder.unset(key)?;
        }
        for (key, value) in &self.set {
            builder.set(key, value.clone())?;
        }
        for (key, items) in &self.add {
            for item in items {
                builder.add(key, item.clone())?;
            }
        }
        for (key, entries) in &self.insert {
            for (entry, value) in entries {
                builder.insert(key, entry, value.clone())?;
            }
        }
        for child in &self.children {
            builder.add_child(child.to_builder(table))?;
        }

        Ok(builder)
    }
}

/// A stack declared as data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Stack settings
    #[serde(default)]
    pub stack: StackConfig,
    /// Top-level resources, in declaration order
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
}

impl Manifest {
    /// Parse a manifest from JSON
    ///
    /// # Errors
    ///
    /// Returns `InvalidManifest` if the document does not parse
    pub fn from_json(json: &str) -> ComposeResult<Self> {
        serde_json::from_str(json).map_err(|e| ComposeError::InvalidManifest {
            reason: e.to_string(),
        })
    }

    /// Number of declarations, nested ones included
    #[must_use]
    pub fn declaration_count(&self) -> usize {
        fn count(decls: &[ResourceDecl]) -> usize {
            decls.iter().map(|d| 1 + count(&d.children)).sum()
        }
        count(&self.resources)
    }

    /// Declare every resource into a fresh stack and finalize it
    ///
    /// # Errors
    ///
    /// Returns the first composition or synthesis error
    pub fn compose<S: Synthesizer>(
        &self,
        table: &PolicyTable,
        synth: S,
    ) -> ComposeResult<Synthesized<S::Artifact>> {
        let mut stack = Stack::with_policy(self.stack.clone(), table, synth)?;
        for decl in &self.resources {
            stack.declare(|_| decl.to_builder(table))?;
        }
        debug!(
            stack = %stack.name(),
            declarations = self.declaration_count(),
            "manifest replayed"
        );
        stack.finalize()
    }
}
