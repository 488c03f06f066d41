//! Binding finished specs into a stack.
//!
//! Before anything is created the whole spec tree is checked: schema
//! validation of every node (required fields, field shapes, child kinds)
//! and name uniqueness. Then, for every resource in the tree:
//!
//! 1. reference resolution against the stack's existing bindings
//! 2. `Synthesizer::create`
//! 3. registration of the handle in the stack context
//!
//! Children bind after their parent unless the parent's kind binds
//! children first, in which case the parent's references are resolved
//! only once its children are bound and may point at them.
//!
//! A failed bind aborts the context, so a half-bound tree can never be
//! finalized.

use crate::error::{ComposeError, ComposeResult};
use crate::handle::BoundHandle;
use crate::schema::{schema_for, ChildOrder};
use crate::spec::ResourceSpec;
use crate::stack::StackContext;
use crate::synth::{ResolvedFields, Scope, Synthesizer};
use crate::validate::Validator;
use indexmap::IndexSet;
use keystone_core::{LogicalName, Reference, ResolvedReference, ResourceKind};
use tracing::debug;

/// Binds specs into a stack context through a synthesizer
pub struct Binder<'s, S: Synthesizer + ?Sized> {
    synth: &'s mut S,
    validator: Validator,
}

impl<'s, S: Synthesizer + ?Sized> Binder<'s, S> {
    /// Create a binder driving `synth`
    pub fn new(synth: &'s mut S) -> Self {
        Self {
            synth,
            validator: Validator::new(),
        }
    }

    /// Bind `spec` and its children into `ctx`
    ///
    /// Returns the handle of the top-level resource.
    ///
    /// # Errors
    ///
    /// Returns `ClosedContext`/`Aborted` if `ctx` is not open, a validation
    /// error, `DuplicateName`, `UnresolvedReference`, `InvalidField` for a
    /// reference to the wrong kind or attribute, or `Synthesis`. Any error
    /// after the open check aborts `ctx`.
    pub fn bind(&mut self, ctx: &mut StackContext, spec: &ResourceSpec) -> ComposeResult<BoundHandle> {
        ctx.ensure_open()?;
        let result = self.bind_tree(ctx, spec);
        if let Err(err) = &result {
            ctx.abort(err);
        }
        result
    }

    fn bind_tree(&mut self, ctx: &mut StackContext, spec: &ResourceSpec) -> ComposeResult<BoundHandle> {
        for node in spec.walk() {
            self.validator.validate(node)?;
        }
        check_names(ctx, spec)?;

        let scope = Scope::root(ctx.name());
        self.bind_node(ctx, spec, &scope, None)
    }

    fn bind_node(
        &mut self,
        ctx: &mut StackContext,
        spec: &ResourceSpec,
        scope: &Scope,
        parent: Option<&LogicalName>,
    ) -> ComposeResult<BoundHandle> {
        let child_scope = scope.child(spec.name());

        match schema_for(spec.kind()).child_order {
            ChildOrder::ParentFirst => {
                let handle = self.create(ctx, spec, scope, parent)?;
                self.bind_children(ctx, spec, &child_scope)?;
                Ok(handle)
            }
            ChildOrder::ChildrenFirst => {
                self.bind_children(ctx, spec, &child_scope)?;
                self.create(ctx, spec, scope, parent)
            }
        }
    }

    fn bind_children(
        &mut self,
        ctx: &mut StackContext,
        spec: &ResourceSpec,
        scope: &Scope,
    ) -> ComposeResult<()> {
        for child in spec.children() {
            self.bind_node(ctx, child, scope, Some(spec.name()))?;
        }
        Ok(())
    }

    fn create(
        &mut self,
        ctx: &mut StackContext,
        spec: &ResourceSpec,
        scope: &Scope,
        parent: Option<&LogicalName>,
    ) -> ComposeResult<BoundHandle> {
        let fields = resolve_fields(ctx, spec)?;
        let path = scope.path_of(spec.name());

        let construct = self
            .synth
            .create(scope, spec.name(), spec.kind(), &fields)
            .map_err(|source| ComposeError::Synthesis {
                name: path.clone(),
                source,
            })?;

        let handle = BoundHandle::new(
            ctx.name(),
            spec.name().clone(),
            spec.kind(),
            path,
            construct,
        );
        ctx.register(handle.clone(), fields, parent.cloned())?;

        debug!(
            stack = %ctx.name(),
            name = %spec.name(),
            kind = %spec.kind(),
            path = %handle.path(),
            "bound resource"
        );
        Ok(handle)
    }
}

/// Reject names already bound in `ctx` or repeated inside the tree
fn check_names(ctx: &StackContext, spec: &ResourceSpec) -> ComposeResult<()> {
    let mut seen = IndexSet::new();
    for node in spec.walk() {
        let name = node.name().as_str();
        if ctx.contains(name) || !seen.insert(name) {
            return Err(ComposeError::DuplicateName {
                scope: format!("stack {}", ctx.name()),
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

fn resolve_fields(ctx: &StackContext, spec: &ResourceSpec) -> ComposeResult<ResolvedFields> {
    let schema = schema_for(spec.kind());
    let mut resolved = ResolvedFields::with_capacity(spec.fields().len());

    for (field, value) in spec.fields() {
        let targets = schema
            .field(field)
            .and_then(|f| f.ty.reference_targets())
            .unwrap_or(&[]);
        let value = value.resolve(&mut |r: &Reference| resolve_reference(ctx, spec, field, targets, r))?;
        resolved.insert(field.clone(), value);
    }

    Ok(resolved)
}

fn resolve_reference(
    ctx: &StackContext,
    spec: &ResourceSpec,
    field: &str,
    targets: &[ResourceKind],
    reference: &Reference,
) -> ComposeResult<ResolvedReference> {
    let unresolved = |target: String| ComposeError::UnresolvedReference {
        stack: ctx.name().to_string(),
        name: spec.name().clone(),
        field: field.to_string(),
        target,
    };

    if let Some(stack) = &reference.stack {
        if stack != ctx.name() {
            return Err(unresolved(format!("{}/{}", stack, reference.target)));
        }
    }

    let handle = ctx
        .lookup(reference.target.as_str())
        .ok_or_else(|| unresolved(reference.target.to_string()))?;

    let invalid = |reason: String| ComposeError::InvalidField {
        name: spec.name().clone(),
        field: field.to_string(),
        reason,
    };

    if !targets.is_empty() && !targets.contains(&handle.kind()) {
        let accepted: Vec<&str> = targets.iter().map(ResourceKind::tag).collect();
        return Err(invalid(format!(
            "{} is a {}, expected {}",
            reference.target,
            handle.kind(),
            accepted.join("|")
        )));
    }

    if !schema_for(handle.kind()).exposes(reference.attribute) {
        return Err(invalid(format!(
            "{} {} has no attribute {}",
            handle.kind(),
            reference.target,
            reference.attribute
        )));
    }

    Ok(ResolvedReference {
        target: reference.target.clone(),
        attribute: reference.attribute,
        handle: handle.id(),
        kind: handle.kind(),
    })
}
