//! Provider-neutral JSON template synthesizer.
//!
//! [`TemplateSynthesizer`] is the reference [`Synthesizer`]: it renders
//! each bound resource into a template entry keyed by logical name and,
//! on finalize, stamps the stack settings, stack tags, policy version and
//! graph fingerprint. References are kept symbolic as
//! `{"ref": {"target": ..., "attribute": ...}}` so a deploy tool can map
//! them onto its own intrinsic functions.

use crate::error::SynthError;
use crate::graph::SynthesizableGraph;
use crate::schema::{schema_for, TAGS};
use crate::synth::{ConstructHandle, ResolvedFields, Scope, Synthesizer};
use indexmap::{IndexMap, IndexSet};
use keystone_core::{Fingerprint, HandleId, LogicalName, PolicyVersion, ResolvedValue, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

/// Template format identifier
pub const TEMPLATE_FORMAT: &str = "keystone-template/1";

/// Template synthesis error
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Subscription without a delivery endpoint
    #[error("subscription {path} has no endpoint")]
    MissingEndpoint {
        /// Construct path
        path: String,
    },

    /// Two constructs with the same path
    #[error("construct {path} already exists")]
    DuplicatePath {
        /// Construct path
        path: String,
    },

    /// Graph node this synthesizer never created
    #[error("construct {path} was not created by this synthesizer")]
    UnknownConstruct {
        /// Construct path
        path: String,
    },
}

/// Stack header of a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateStack {
    /// Stack name
    pub name: String,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Target account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Target region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Termination protection
    pub termination_protection: bool,
}

/// One rendered resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateResource {
    /// Resource kind
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    /// Construct path
    pub path: String,
    /// Handle id
    pub handle: HandleId,
    /// Enclosing resource, for nested declarations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<LogicalName>,
    /// Logical names this resource references, each once
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<LogicalName>,
    /// Rendered fields
    pub properties: IndexMap<String, Value>,
}

/// Deployable template of one stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Format identifier
    pub format: String,
    /// Stack header
    pub stack: TemplateStack,
    /// Policy table version the stack was composed with
    pub policy_version: PolicyVersion,
    /// Fingerprint of the synthesizable graph
    pub fingerprint: Fingerprint,
    /// Resources keyed by logical name, in binding order
    pub resources: IndexMap<LogicalName, TemplateResource>,
}

impl Template {
    /// Resource bound as `name`
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&TemplateResource> {
        self.resources.get(name)
    }

    /// Pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Synthesizer producing a [`Template`]
///
/// Constructs are tracked by path until finalize re-keys them by name.
#[derive(Debug, Default)]
pub struct TemplateSynthesizer {
    resources: IndexMap<String, TemplateResource>,
}

impl TemplateSynthesizer {
    /// Create an empty synthesizer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of constructs created so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether nothing was created yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl Synthesizer for TemplateSynthesizer {
    type Artifact = Template;

    fn create(
        &mut self,
        scope: &Scope,
        name: &LogicalName,
        kind: ResourceKind,
        fields: &ResolvedFields,
    ) -> Result<ConstructHandle, SynthError> {
        let path = scope.path_of(name);
        if self.resources.contains_key(&path) {
            return Err(TemplateError::DuplicatePath { path }.into());
        }
        if kind == ResourceKind::Subscription && !fields.contains_key("endpoint") {
            return Err(TemplateError::MissingEndpoint { path }.into());
        }

        let mut depends_on = IndexSet::new();
        for value in fields.values() {
            depends_on.extend(value.references().into_iter().map(|r| r.target.clone()));
        }

        let properties = fields
            .iter()
            .map(|(key, value)| (key.clone(), render(value)))
            .collect();

        debug!(path = %path, kind = %kind, "rendered construct");
        self.resources.insert(
            path.clone(),
            TemplateResource {
                kind,
                path: path.clone(),
                handle: HandleId::derive(stack_of(scope), name),
                parent: None,
                depends_on: depends_on.into_iter().collect(),
                properties,
            },
        );
        Ok(ConstructHandle::new(path))
    }

    fn finalize(&mut self, graph: &SynthesizableGraph) -> Result<Template, SynthError> {
        let mut resources = IndexMap::with_capacity(graph.node_count());

        for node in graph.nodes.values() {
            let path = node.construct.as_str();
            let mut resource = self
                .resources
                .shift_remove(path)
                .ok_or_else(|| TemplateError::UnknownConstruct {
                    path: path.to_string(),
                })?;

            resource.parent = node.parent.clone();

            if schema_for(node.kind).is_taggable() {
                apply_stack_tags(&mut resource.properties, &graph.stack.tags);
            }
            resources.insert(node.name.clone(), resource);
        }

        Ok(Template {
            format: TEMPLATE_FORMAT.to_string(),
            stack: TemplateStack {
                name: graph.stack.name.clone(),
                description: graph.stack.description.clone(),
                account: graph.stack.account.clone(),
                region: graph.stack.region.clone(),
                termination_protection: graph.stack.termination_protection,
            },
            policy_version: graph.policy_version,
            fingerprint: graph.fingerprint()?,
            resources,
        })
    }
}

fn stack_of(scope: &Scope) -> &str {
    scope.path().split('/').next().unwrap_or_default()
}

/// Stack tags first, resource tags overriding them
fn apply_stack_tags(properties: &mut IndexMap<String, Value>, stack_tags: &IndexMap<String, String>) {
    if stack_tags.is_empty() {
        return;
    }

    let mut merged: serde_json::Map<String, Value> = stack_tags
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    if let Some(Value::Object(own)) = properties.get(TAGS) {
        for (k, v) in own {
            merged.insert(k.clone(), v.clone());
        }
    }
    properties.insert(TAGS.to_string(), Value::Object(merged));
}

fn render(value: &ResolvedValue) -> Value {
    match value {
        ResolvedValue::Bool(b) => Value::Bool(*b),
        ResolvedValue::Int(i) => Value::from(*i),
        ResolvedValue::Str(s) => Value::String(s.clone()),
        ResolvedValue::List(items) => Value::Array(items.iter().map(render).collect()),
        ResolvedValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), render(v)))
                .collect(),
        ),
        ResolvedValue::Ref(r) => json!({
            "ref": {
                "target": r.target.as_str(),
                "attribute": r.attribute.tag(),
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::stack::{Stack, StackConfig};

    #[test]
    fn test_renders_resources_in_order() {
        let mut stack = Stack::new(StackConfig::new("Shop"), TemplateSynthesizer::new()).unwrap();
        let table = stack.add(Builder::start(ResourceKind::Table, "Orders")).unwrap();
        stack
            .declare(|_| {
                let mut b = Builder::start(ResourceKind::Function, "Worker")?;
                b.insert("environment", "TABLE", table.physical_name())?;
                Ok::<_, crate::ComposeError>(b)
            })
            .unwrap();

        let template = stack.finalize().unwrap().artifact;
        let names: Vec<&str> = template.resources.keys().map(LogicalName::as_str).collect();
        assert_eq!(names, vec!["Orders", "Worker"]);

        let worker = template.resource("Worker").unwrap();
        assert_eq!(worker.path, "Shop/Worker");
        assert_eq!(worker.depends_on, vec![LogicalName::new("Orders").unwrap()]);
        assert_eq!(
            worker.properties["environment"]["TABLE"]["ref"]["attribute"],
            "name"
        );
        assert_eq!(worker.properties["memory_size"], 512);
    }

    #[test]
    fn test_subscription_without_endpoint_fails() {
        let mut stack = Stack::new(StackConfig::new("Shop"), TemplateSynthesizer::new()).unwrap();
        let err = stack
            .declare(|_| {
                let mut topic = Builder::start(ResourceKind::Topic, "Alerts")?;
                topic.add_child(Builder::start(ResourceKind::Subscription, "ToNowhere"))?;
                Ok::<_, crate::ComposeError>(topic)
            })
            .unwrap_err();

        assert!(matches!(
            err,
            crate::ComposeError::Synthesis { ref name, .. } if name == "Shop/Alerts/ToNowhere"
        ));
    }

    #[test]
    fn test_stack_tags_yield_to_resource_tags() {
        let config = StackConfig::new("Shop")
            .with_tag("team", "platform")
            .with_tag("env", "prod");
        let mut stack = Stack::new(config, TemplateSynthesizer::new()).unwrap();
        stack
            .declare(|_| {
                let mut q = Builder::start(ResourceKind::Queue, "Orders")?;
                q.insert("tags", "team", "orders")?;
                Ok::<_, crate::ComposeError>(q)
            })
            .unwrap();
        let mut index_parent = Builder::start(ResourceKind::Table, "Carts").unwrap();
        index_parent
            .add_child(Builder::start(ResourceKind::TableIndex, "ByUser"))
            .unwrap();
        stack.add(index_parent).unwrap();

        let template = stack.finalize().unwrap().artifact;
        let tags = &template.resource("Orders").unwrap().properties["tags"];
        assert_eq!(tags["team"], "orders");
        assert_eq!(tags["env"], "prod");

        let index = template.resource("ByUser").unwrap();
        assert!(!index.properties.contains_key("tags"));
        assert_eq!(index.path, "Shop/Carts/ByUser");
        assert_eq!(index.parent, Some(LogicalName::new("Carts").unwrap()));
    }

    #[test]
    fn test_template_header() {
        let config = StackConfig::new("Shop").with_region("eu-west-1");
        let mut stack = Stack::new(config, TemplateSynthesizer::new()).unwrap();
        let out = stack.finalize().unwrap();

        assert_eq!(out.artifact.format, TEMPLATE_FORMAT);
        assert_eq!(out.artifact.stack.region.as_deref(), Some("eu-west-1"));
        assert_eq!(out.artifact.fingerprint, out.graph.fingerprint().unwrap());
        assert!(out.artifact.to_json_pretty().unwrap().contains("\"Shop\""));
    }
}
