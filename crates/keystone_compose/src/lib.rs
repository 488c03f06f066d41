//! KEYSTONE Composition Engine
//!
//! Declarative resource composition: builders start from a versioned
//! default policy table, callers override one field at a time, and a
//! stack binds each finished spec under a unique logical name, resolving
//! references to earlier resources before handing it to a synthesizer.
//!
//! Flow: policy table → builders → stack → binder → synthesizer.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod app;
pub mod binder;
pub mod builder;
pub mod error;
pub mod graph;
pub mod handle;
pub mod kinds;
pub mod manifest;
pub mod policy;
pub mod schema;
pub mod spec;
pub mod stack;
pub mod synth;
pub mod template;
pub mod validate;

pub use app::App;
pub use binder::Binder;
pub use builder::Builder;
pub use error::{ComposeError, ComposeResult, SynthError};
pub use graph::{Edge, GraphNode, SynthesizableGraph};
pub use handle::BoundHandle;
pub use kinds::{
    BucketBuilder, FunctionBuilder, LifecycleRuleBuilder, PolicyStatementBuilder, QueueBuilder,
    RoleBuilder, StateMachineBuilder, SubscriptionBuilder, TableBuilder, TableIndexBuilder,
    TopicBuilder, VpcBuilder,
};
pub use manifest::{Manifest, ResourceDecl};
pub use policy::{defaults_for, DefaultPolicy, PolicyTable};
pub use schema::{schema_for, ChildOrder, FieldSchema, FieldType, KindSchema};
pub use spec::{IntoSpec, ResourceSpec};
pub use stack::{Stack, StackConfig, StackContext, StackState, Synthesized};
pub use synth::{ConstructHandle, ResolvedFields, Scope, Synthesizer};
pub use template::{Template, TemplateError, TemplateResource, TemplateSynthesizer};
pub use validate::Validator;

pub use keystone_core::{Attribute, FieldValue, LogicalName, Reference, ResourceKind};
