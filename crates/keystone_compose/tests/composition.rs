//! End-to-end composition of stacks.

use keystone_compose::{
    App, Attribute, Binder, BoundHandle, Builder, BucketBuilder, ComposeError, FieldValue,
    FunctionBuilder, LifecycleRuleBuilder, LogicalName, PolicyStatementBuilder, QueueBuilder,
    Reference, ResourceKind, RoleBuilder, Stack, StackConfig, StackContext, StackState,
    SubscriptionBuilder, SynthesizableGraph, Synthesizer, TableBuilder, TableIndexBuilder,
    TemplateSynthesizer, TopicBuilder,
};
use keystone_compose::{ConstructHandle, ResolvedFields, Scope, SynthError};

fn shop() -> Stack<TemplateSynthesizer> {
    Stack::new(StackConfig::new("Shop"), TemplateSynthesizer::new()).unwrap()
}

#[test]
fn test_queue_defaults_without_overrides() {
    let mut b = Builder::start(ResourceKind::Queue, "Orders").unwrap();
    let spec = b.finish();
    assert_eq!(spec.field("visibility_timeout"), Some(&FieldValue::Int(30)));
}

#[test]
fn test_last_override_wins() {
    let mut b = Builder::start(ResourceKind::Queue, "Orders").unwrap();
    b.set("visibility_timeout", 30u32)
        .unwrap()
        .set("visibility_timeout", 60u32)
        .unwrap();
    assert_eq!(b.finish().field("visibility_timeout"), Some(&FieldValue::Int(60)));
}

#[test]
fn test_same_name_declared_twice() {
    let mut stack = shop();
    stack.add(QueueBuilder::new("Orders")).unwrap();

    let err = stack.add(TableBuilder::new("Orders")).unwrap_err();
    assert!(matches!(err, ComposeError::DuplicateName { ref name, .. } if name == "Orders"));
}

#[test]
fn test_reference_to_later_declaration() {
    let mut stack = shop();
    let err = stack
        .declare(|_| {
            FunctionBuilder::new("OrderProcessor").env(
                "TABLE_NAME",
                Reference::new(LogicalName::new("OrdersTable").unwrap(), Attribute::Name),
            )
        })
        .unwrap_err();
    assert!(matches!(
        err,
        ComposeError::UnresolvedReference { ref target, ref field, .. }
            if target == "OrdersTable" && field == "environment"
    ));

    // the stack is aborted, so declaring the table now changes nothing
    let err = stack.add(TableBuilder::new("OrdersTable")).unwrap_err();
    assert!(matches!(err, ComposeError::Aborted { .. }));
}

#[test]
fn test_declare_after_finalize() {
    let mut stack = shop();
    stack.add(QueueBuilder::new("Orders")).unwrap();
    stack.finalize().unwrap();

    let err = stack.add(QueueBuilder::new("Jobs")).unwrap_err();
    assert!(matches!(err, ComposeError::ClosedContext { .. }));
    assert!(matches!(stack.finalize(), Err(ComposeError::ClosedContext { .. })));
}

#[test]
fn test_order_processing_stack() {
    let mut stack = shop();
    let table = stack
        .add(
            TableBuilder::new("OrdersTable")
                .sort_key("sk")
                .stream("new-image")
                .index(TableIndexBuilder::new("ByCustomer").partition_key("customer")),
        )
        .unwrap();
    let dlq = stack.add(QueueBuilder::new("OrdersDlq")).unwrap();
    let queue = stack
        .declare(|_| {
            QueueBuilder::new("OrdersQueue")
                .visibility_timeout(180)
                .dead_letter_target(dlq.arn())
                .max_receive_count(3)
        })
        .unwrap();
    let role = stack
        .declare(|_| {
            RoleBuilder::new("ProcessorRole").statement(
                PolicyStatementBuilder::new("TableAccess")
                    .allow()
                    .action("table:PutItem")
                    .resource(table.arn()),
            )
        })
        .unwrap();
    stack
        .declare(|ctx| {
            let table = ctx.lookup("OrdersTable").expect("table is bound");
            FunctionBuilder::new("OrderProcessor")
                .memory_size(1024)
                .timeout(60)
                .role(role.arn())
                .env("TABLE_NAME", table.physical_name())
                .env("QUEUE_URL", queue.url())
        })
        .unwrap();
    stack
        .add(
            TopicBuilder::new("OrderEvents").subscription(
                SubscriptionBuilder::new("ToQueue")
                    .endpoint(queue.arn())
                    .filter("type", vec!["created", "cancelled"]),
            ),
        )
        .unwrap();

    let out = stack.finalize().unwrap();
    let names: Vec<&str> = out.graph.nodes.keys().map(LogicalName::as_str).collect();
    assert_eq!(
        names,
        vec![
            "OrdersTable",
            "ByCustomer",
            "OrdersDlq",
            "OrdersQueue",
            "TableAccess",
            "ProcessorRole",
            "OrderProcessor",
            "OrderEvents",
            "ToQueue",
        ]
    );

    let processor = out.artifact.resource("OrderProcessor").unwrap();
    let deps: Vec<&str> = processor.depends_on.iter().map(LogicalName::as_str).collect();
    assert_eq!(deps, vec!["ProcessorRole", "OrdersTable", "OrdersQueue"]);
    assert_eq!(processor.properties["memory_size"], 1024);
    assert_eq!(processor.properties["log_retention_days"], 90);

    let sub = out.artifact.resource("ToQueue").unwrap();
    assert_eq!(sub.path, "Shop/OrderEvents/ToQueue");
    assert_eq!(
        out.graph.dependents("OrdersQueue"),
        vec![
            &LogicalName::new("OrderProcessor").unwrap(),
            &LogicalName::new("ToQueue").unwrap()
        ]
    );
}

#[test]
fn test_children_first_kinds_bind_children_before_parent() {
    let mut stack = shop();
    stack
        .add(
            BucketBuilder::new("Assets")
                .lifecycle_rule(LifecycleRuleBuilder::new("ExpireTmp").prefix("tmp/").expiration_days(7)),
        )
        .unwrap();
    let role = stack
        .add(
            RoleBuilder::new("Reader")
                .description("reads assets")
                .statement(PolicyStatementBuilder::new("ReadAssets").action("bucket:GetObject"))
                .tag("owner", "assets"),
        )
        .unwrap();
    assert_eq!(role.path(), "Shop/Reader");
    assert_eq!(
        stack.context().lookup("ReadAssets").map(|h| h.path()),
        Some("Shop/Reader/ReadAssets")
    );

    let out = stack.finalize().unwrap();
    let order: Vec<&str> = out.graph.nodes.keys().map(LogicalName::as_str).collect();
    assert_eq!(order, vec!["ExpireTmp", "Assets", "ReadAssets", "Reader"]);
    assert_eq!(out.graph.children("Reader").len(), 1);
    assert_eq!(out.graph.roots().len(), 2);
}

#[test]
fn test_handles_do_not_cross_stacks() {
    let mut billing =
        Stack::new(StackConfig::new("Billing"), TemplateSynthesizer::new()).unwrap();
    let ledger = billing.add(TableBuilder::new("Ledger")).unwrap();

    let mut stack = shop();
    stack.add(TableBuilder::new("Ledger")).unwrap();
    let err = stack
        .declare(|_| FunctionBuilder::new("Worker").env("LEDGER", ledger.physical_name()))
        .unwrap_err();
    assert!(matches!(
        err,
        ComposeError::UnresolvedReference { ref target, .. } if target == "Billing/Ledger"
    ));
}

#[test]
fn test_subscription_needs_endpoint() {
    let mut stack = shop();
    let err = stack
        .add(TopicBuilder::new("Alerts").subscription(SubscriptionBuilder::new("Nowhere")))
        .unwrap_err();
    assert!(matches!(err, ComposeError::Synthesis { .. }));
    assert!(matches!(stack.context().state(), StackState::Aborted { .. }));
    assert!(matches!(stack.finalize(), Err(ComposeError::Aborted { .. })));
}

#[test]
fn test_incomplete_spec_after_unset() {
    let mut stack = shop();
    let err = stack
        .add(FunctionBuilder::new("Worker").unset("handler"))
        .unwrap_err();
    assert!(matches!(
        err,
        ComposeError::IncompleteSpec { kind: ResourceKind::Function, ref field, .. } if field == "handler"
    ));
}

#[test]
fn test_invalid_field_value() {
    let mut stack = shop();
    let err = stack
        .add(FunctionBuilder::new("Worker").tracing("Sometimes"))
        .unwrap_err();
    assert!(matches!(err, ComposeError::InvalidField { ref field, .. } if field == "tracing"));
}

#[test]
fn test_app_keeps_stacks_apart() {
    let mut app = App::new();
    app.stack(
        StackConfig::new("Shop").with_tag("env", "prod"),
        TemplateSynthesizer::new(),
        |s| {
            s.add(QueueBuilder::new("Orders"))?;
            Ok(())
        },
    )
    .unwrap();
    app.stack(StackConfig::new("Billing"), TemplateSynthesizer::new(), |s| {
        s.add(QueueBuilder::new("Orders"))?;
        Ok(())
    })
    .unwrap();

    let artifacts: Vec<(&str, usize)> = app
        .artifacts()
        .map(|(name, t)| (name, t.resources.len()))
        .collect();
    assert_eq!(artifacts, vec![("Shop", 1), ("Billing", 1)]);

    let shop = app.get("Shop").unwrap();
    assert_eq!(shop.artifact.resource("Orders").unwrap().properties["tags"]["env"], "prod");
    assert!(!app.get("Billing").unwrap().artifact.resource("Orders").unwrap().properties.contains_key("tags"));
}

/// Synthesizer that only records create calls
#[derive(Default)]
struct Trace {
    calls: Vec<(String, ResourceKind)>,
}

impl Synthesizer for Trace {
    type Artifact = usize;

    fn create(
        &mut self,
        scope: &Scope,
        name: &LogicalName,
        kind: ResourceKind,
        _fields: &ResolvedFields,
    ) -> Result<ConstructHandle, SynthError> {
        self.calls.push((scope.path_of(name), kind));
        Ok(ConstructHandle::new(format!("trace-{}", self.calls.len())))
    }

    fn finalize(&mut self, graph: &SynthesizableGraph) -> Result<usize, SynthError> {
        Ok(graph.node_count())
    }
}

#[test]
fn test_binder_with_borrowed_synthesizer() {
    let mut trace = Trace::default();
    let mut ctx = StackContext::new(StackConfig::new("Shop")).unwrap();

    let spec = TopicBuilder::new("Alerts")
        .subscription(SubscriptionBuilder::new("Mail").protocol("email").endpoint("ops@example.com"))
        .build()
        .unwrap();
    let handle: BoundHandle = Binder::new(&mut trace).bind(&mut ctx, &spec).unwrap();

    assert_eq!(handle.construct(), &ConstructHandle::new("trace-1"));
    assert_eq!(
        trace.calls,
        vec![
            ("Shop/Alerts".to_string(), ResourceKind::Topic),
            ("Shop/Alerts/Mail".to_string(), ResourceKind::Subscription),
        ]
    );

    let graph = ctx.finalize().unwrap();
    assert_eq!(graph.node_count(), 2);
    assert!(matches!(ctx.finalize(), Err(ComposeError::ClosedContext { .. })));
}

#[test]
fn test_stack_over_mutable_reference() {
    let mut trace = Trace::default();
    {
        let mut stack = Stack::new(StackConfig::new("Shop"), &mut trace).unwrap();
        stack.add(QueueBuilder::new("Orders")).unwrap();
        assert_eq!(stack.finalize().unwrap().artifact, 1);
    }
    assert_eq!(trace.calls.len(), 1);
}

#[test]
fn test_literal_endpoint_needs_no_binding() {
    let mut stack = shop();
    stack
        .add(
            TopicBuilder::new("Alerts").subscription(
                SubscriptionBuilder::new("Hook")
                    .protocol("https")
                    .endpoint(FieldValue::from("https://hooks.example.com/alerts")),
            ),
        )
        .unwrap();
    let out = stack.finalize().unwrap();
    assert_eq!(out.graph.edge_count(), 0);
}

#[test]
fn test_invalid_index_rejected_before_any_create() {
    let mut trace = Trace::default();
    {
        let mut stack = Stack::new(StackConfig::new("Shop"), &mut trace).unwrap();
        let err = stack
            .add(
                TableBuilder::new("Orders")
                    .index(TableIndexBuilder::new("ByCustomer").projection("bogus")),
            )
            .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidField { ref field, .. } if field == "projection"));
        assert!(stack.context().is_empty());
        assert!(matches!(stack.finalize(), Err(ComposeError::Aborted { .. })));
    }
    assert!(trace.calls.is_empty());
}
