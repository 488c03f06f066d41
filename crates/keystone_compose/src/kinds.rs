//! Typed builders, one per resource kind.
//!
//! Each wraps the generic [`Builder`] with chaining setters named after the
//! kind's fields. A failing step is remembered and every later step is
//! skipped, so the first error surfaces from `build` (or from `declare`,
//! which accepts any typed builder directly).
//!
//! ```ignore
//! let table = stack.add(TableBuilder::new("OrdersTable").sort_key("sk"))?;
//! stack.declare(|_| {
//!     FunctionBuilder::new("OrderProcessor")
//!         .memory_size(1024)
//!         .env("TABLE_NAME", table.physical_name())
//! })?;
//! ```

use crate::builder::Builder;
use crate::error::ComposeResult;
use crate::policy::PolicyTable;
use crate::schema::TAGS;
use crate::spec::{IntoSpec, ResourceSpec};
use keystone_core::{FieldValue, ResourceKind};

macro_rules! typed_builder {
    (@taggable) => {
        /// Add or overwrite one resource tag
        pub fn tag(self, key: &str, value: &str) -> Self {
            self.insert(TAGS, key, value)
        }
    };
    ($(#[$meta:meta])* $name:ident => $kind:ident $(, $taggable:ident)?) => {
        $(#[$meta])*
        #[derive(Debug)]
        #[must_use]
        pub struct $name {
            inner: ComposeResult<Builder>,
        }

        impl $name {
            /// Kind this builder produces
            pub const KIND: ResourceKind = ResourceKind::$kind;

            /// Start from the built-in defaults
            pub fn new(name: &str) -> Self {
                Self {
                    inner: Builder::start(Self::KIND, name),
                }
            }

            /// Start from the defaults in `table`
            pub fn with_policy(table: &PolicyTable, name: &str) -> Self {
                Self {
                    inner: Builder::start_with(table, Self::KIND, name),
                }
            }

            /// Overwrite any field by name
            pub fn set(self, key: &str, value: impl Into<FieldValue>) -> Self {
                self.apply(|b| b.set(key, value))
            }

            /// Remove a field, including its default
            pub fn unset(self, key: &str) -> Self {
                self.apply(|b| b.unset(key))
            }

            #[allow(dead_code)]
            fn add(self, key: &str, item: impl Into<FieldValue>) -> Self {
                self.apply(|b| b.add(key, item))
            }

            #[allow(dead_code)]
            fn insert(self, key: &str, entry: &str, value: impl Into<FieldValue>) -> Self {
                self.apply(|b| b.insert(key, entry, value))
            }

            #[allow(dead_code)]
            fn child(self, child: impl IntoSpec) -> Self {
                self.apply(|b| b.add_child(child))
            }

            fn apply<F>(mut self, op: F) -> Self
            where
                F: FnOnce(&mut Builder) -> ComposeResult<&mut Builder>,
            {
                let result = match &mut self.inner {
                    Ok(builder) => op(builder).map(|_| ()),
                    Err(_) => Ok(()),
                };
                if let Err(err) = result {
                    self.inner = Err(err);
                }
                self
            }

            /// Finish into a spec
            ///
            /// # Errors
            ///
            /// Returns the first error recorded while building
            pub fn build(self) -> ComposeResult<ResourceSpec> {
                self.inner.map(|mut b| b.finish())
            }

            /// Unwrap into the generic builder
            ///
            /// # Errors
            ///
            /// Returns the first error recorded while building
            pub fn into_builder(self) -> ComposeResult<Builder> {
                self.inner
            }

            $(
                typed_builder!(@$taggable);
            )?
        }

        impl IntoSpec for $name {
            fn into_spec(self) -> ComposeResult<ResourceSpec> {
                self.build()
            }
        }
    };
}

macro_rules! setters {
    ($($(#[$meta:meta])* $method:ident($field:literal: $ty:ty);)*) => {
        $(
            $(#[$meta])*
            pub fn $method(self, value: $ty) -> Self {
                self.set($field, value)
            }
        )*
    };
}

typed_builder!(
    /// Serverless function
    FunctionBuilder => Function, taggable
);

impl FunctionBuilder {
    setters! {
        /// Runtime identifier
        runtime("runtime": &str);
        /// Entry point
        handler("handler": &str);
        /// Code location
        code("code": &str);
        /// Memory in MB
        memory_size("memory_size": u32);
        /// Timeout in seconds
        timeout("timeout": u32);
        /// Reserved concurrent executions
        reserved_concurrency("reserved_concurrency": u32);
        /// Whether failed async invocations go to a dead-letter queue
        dead_letter_queue("dead_letter_queue": bool);
        /// `Active` or `PassThrough`
        tracing("tracing": &str);
        /// Log retention in days
        log_retention_days("log_retention_days": u32);
        /// Description
        description("description": &str);
        /// Execution role, as a reference to a role
        role("role": FieldValue);
        /// Network placement, as a reference to a VPC
        vpc("vpc": FieldValue);
    }

    /// Add or overwrite one environment variable
    pub fn env(self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.insert("environment", key, value)
    }

    /// Append one layer
    pub fn layer(self, layer: impl Into<FieldValue>) -> Self {
        self.add("layers", layer)
    }
}

typed_builder!(
    /// Message queue
    QueueBuilder => Queue, taggable
);

impl QueueBuilder {
    setters! {
        /// Visibility timeout in seconds
        visibility_timeout("visibility_timeout": u32);
        /// Retention in seconds
        retention_period("retention_period": u32);
        /// `kms-managed`, `queue-managed` or `unencrypted`
        encryption("encryption": &str);
        /// First-in-first-out delivery
        fifo("fifo": bool);
        /// Dead-letter queue, as a reference to a queue
        dead_letter_target("dead_letter_target": FieldValue);
        /// Receives before a message moves to the dead-letter queue
        max_receive_count("max_receive_count": u32);
    }
}

typed_builder!(
    /// Pub/sub topic
    TopicBuilder => Topic, taggable
);

impl TopicBuilder {
    setters! {
        /// Display name
        display_name("display_name": &str);
        /// First-in-first-out delivery
        fifo("fifo": bool);
        /// `kms-managed` or `unencrypted`
        encryption("encryption": &str);
    }

    /// Nest a subscription
    pub fn subscription(self, subscription: impl IntoSpec) -> Self {
        self.child(subscription)
    }
}

typed_builder!(
    /// Subscription to a topic, declared as a topic child
    SubscriptionBuilder => Subscription
);

impl SubscriptionBuilder {
    setters! {
        /// `queue`, `function`, `https` or `email`
        protocol("protocol": &str);
        /// Deliver without the envelope
        raw_message_delivery("raw_message_delivery": bool);
        /// Undeliverable messages, as a reference to a queue
        dead_letter_target("dead_letter_target": FieldValue);
    }

    /// Delivery endpoint: an address or a reference to a queue or function
    pub fn endpoint(self, endpoint: impl Into<FieldValue>) -> Self {
        self.set("endpoint", endpoint)
    }

    /// Accept only messages whose `attribute` is one of `values`
    pub fn filter(self, attribute: &str, values: Vec<&str>) -> Self {
        self.insert("filter_policy", attribute, values)
    }
}

typed_builder!(
    /// Key-value table
    TableBuilder => Table, taggable
);

impl TableBuilder {
    setters! {
        /// Partition key attribute
        partition_key("partition_key": &str);
        /// Sort key attribute
        sort_key("sort_key": &str);
        /// `on-demand` or `provisioned`
        billing_mode("billing_mode": &str);
        /// Continuous backups
        point_in_time_recovery("point_in_time_recovery": bool);
        /// `retain`, `destroy` or `snapshot`
        removal_policy("removal_policy": &str);
        /// Change stream view
        stream("stream": &str);
        /// Expiry attribute
        ttl_attribute("ttl_attribute": &str);
    }

    /// Nest a secondary index
    pub fn index(self, index: impl IntoSpec) -> Self {
        self.child(index)
    }
}

typed_builder!(
    /// Secondary index, declared as a table child
    TableIndexBuilder => TableIndex
);

impl TableIndexBuilder {
    setters! {
        /// Partition key attribute
        partition_key("partition_key": &str);
        /// Sort key attribute
        sort_key("sort_key": &str);
        /// `all` or `keys-only`
        projection("projection": &str);
    }
}

typed_builder!(
    /// Object storage bucket
    BucketBuilder => Bucket, taggable
);

impl BucketBuilder {
    setters! {
        /// Keep object versions
        versioned("versioned": bool);
        /// Block every form of public access
        block_public_access("block_public_access": bool);
        /// `bucket-managed`, `kms-managed` or `unencrypted`
        encryption("encryption": &str);
        /// Reject plain HTTP requests
        enforce_ssl("enforce_ssl": bool);
        /// `retain`, `destroy` or `snapshot`
        removal_policy("removal_policy": &str);
    }

    /// Append one allowed CORS origin
    pub fn cors_origin(self, origin: &str) -> Self {
        self.add("cors_origins", origin)
    }

    /// Nest a lifecycle rule
    pub fn lifecycle_rule(self, rule: impl IntoSpec) -> Self {
        self.child(rule)
    }
}

typed_builder!(
    /// Bucket lifecycle rule, declared as a bucket child
    LifecycleRuleBuilder => LifecycleRule
);

impl LifecycleRuleBuilder {
    setters! {
        /// Rule is active
        enabled("enabled": bool);
        /// Key prefix the rule applies to
        prefix("prefix": &str);
        /// Delete objects after this many days
        expiration_days("expiration_days": u32);
        /// Transition objects after this many days
        transition_days("transition_days": u32);
        /// Target storage class of the transition
        transition_storage_class("transition_storage_class": &str);
        /// Abort incomplete multipart uploads after this many days
        abort_incomplete_upload_days("abort_incomplete_upload_days": u32);
    }
}

typed_builder!(
    /// Access role
    RoleBuilder => Role, taggable
);

impl RoleBuilder {
    setters! {
        /// Principal allowed to assume the role
        assumed_by("assumed_by": &str);
        /// Maximum session duration in seconds
        max_session_duration("max_session_duration": u32);
        /// Description
        description("description": &str);
    }

    /// Attach one managed policy
    pub fn managed_policy(self, policy: &str) -> Self {
        self.add("managed_policies", policy)
    }

    /// Nest an inline policy statement
    pub fn statement(self, statement: impl IntoSpec) -> Self {
        self.child(statement)
    }
}

typed_builder!(
    /// Inline policy statement, declared as a role child
    PolicyStatementBuilder => PolicyStatement
);

impl PolicyStatementBuilder {
    /// Grant the listed actions
    pub fn allow(self) -> Self {
        self.set("effect", "Allow")
    }

    /// Deny the listed actions
    pub fn deny(self) -> Self {
        self.set("effect", "Deny")
    }

    /// Append one action
    pub fn action(self, action: &str) -> Self {
        self.add("actions", action)
    }

    /// Append one resource: a pattern or a reference
    pub fn resource(self, resource: impl Into<FieldValue>) -> Self {
        self.add("resources", resource)
    }
}

typed_builder!(
    /// Virtual network
    VpcBuilder => Vpc, taggable
);

impl VpcBuilder {
    setters! {
        /// Address range
        cidr("cidr": &str);
        /// Availability zones to span
        max_azs("max_azs": u32);
        /// NAT gateways
        nat_gateways("nat_gateways": u32);
        /// Capture flow logs
        flow_logs("flow_logs": bool);
    }
}

typed_builder!(
    /// Workflow state machine
    StateMachineBuilder => StateMachine, taggable
);

impl StateMachineBuilder {
    setters! {
        /// `standard` or `express`
        workflow_type("workflow_type": &str);
        /// Execution timeout in seconds
        timeout("timeout": u32);
        /// Trace executions
        tracing("tracing": bool);
        /// `all`, `error`, `fatal` or `off`
        logging("logging": &str);
        /// Workflow definition document
        definition("definition": &str);
        /// Execution role, as a reference to a role
        role("role": FieldValue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComposeError;

    #[test]
    fn test_typed_builder_starts_from_defaults() {
        let spec = QueueBuilder::new("Orders").build().unwrap();
        assert_eq!(spec.kind(), ResourceKind::Queue);
        assert_eq!(spec.field("visibility_timeout"), Some(&FieldValue::Int(30)));
    }

    #[test]
    fn test_setters_override() {
        let spec = FunctionBuilder::new("Worker")
            .memory_size(1024)
            .timeout(60)
            .env("STAGE", "prod")
            .tag("team", "orders")
            .build()
            .unwrap();

        assert_eq!(spec.field("memory_size"), Some(&FieldValue::Int(1024)));
        assert_eq!(spec.field("timeout"), Some(&FieldValue::Int(60)));
        assert!(matches!(spec.field("environment"), Some(FieldValue::Map(m)) if m.len() == 1));
        assert!(matches!(spec.field("tags"), Some(FieldValue::Map(_))));
    }

    #[test]
    fn test_first_error_is_kept() {
        let err = FunctionBuilder::new("Worker")
            .set("memory", 1024u32)
            .set("nonsense", true)
            .build()
            .unwrap_err();
        assert!(matches!(err, ComposeError::UnknownField { ref field, .. } if field == "memory"));
    }

    #[test]
    fn test_invalid_name_surfaces_on_build() {
        let err = QueueBuilder::new("").visibility_timeout(60).build().unwrap_err();
        assert!(matches!(err, ComposeError::InvalidName { .. }));
    }

    #[test]
    fn test_children_through_typed_builders() {
        let spec = BucketBuilder::new("Assets")
            .cors_origin("https://example.com")
            .lifecycle_rule(LifecycleRuleBuilder::new("Expire").expiration_days(30))
            .build()
            .unwrap();
        assert_eq!(spec.children().len(), 1);
        assert_eq!(spec.children()[0].kind(), ResourceKind::LifecycleRule);
    }

    #[test]
    fn test_list_setters_accumulate() {
        let spec = PolicyStatementBuilder::new("ReadOrders")
            .allow()
            .action("table:GetItem")
            .action("table:Query")
            .build()
            .unwrap();
        assert_eq!(
            spec.field("actions"),
            Some(&FieldValue::from(vec!["table:GetItem", "table:Query"]))
        );
    }

    #[test]
    fn test_wrong_child_kind() {
        let err = TopicBuilder::new("Alerts")
            .subscription(QueueBuilder::new("Orders"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ComposeError::KindMismatch { .. }));
    }
}
