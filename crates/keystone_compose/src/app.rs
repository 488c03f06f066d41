//! Applications: several independently composed stacks.

use crate::error::{ComposeError, ComposeResult};
use crate::stack::{Stack, StackConfig, Synthesized};
use crate::synth::Synthesizer;
use indexmap::IndexMap;
use tracing::debug;

/// Ordered set of finalized stacks sharing one artifact type
///
/// Each stack gets its own context and synthesizer; nothing bound in one
/// is visible to another.
#[derive(Debug, Clone)]
pub struct App<A> {
    stacks: IndexMap<String, Synthesized<A>>,
}

impl<A> Default for App<A> {
    fn default() -> Self {
        Self {
            stacks: IndexMap::new(),
        }
    }
}

impl<A> App<A> {
    /// Create an empty app
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compose, finalize and keep one stack
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if a stack with the same name exists, or the
    /// first error raised while composing or finalizing it
    pub fn stack<S, F>(
        &mut self,
        config: StackConfig,
        synth: S,
        compose: F,
    ) -> ComposeResult<&Synthesized<A>>
    where
        S: Synthesizer<Artifact = A>,
        F: FnOnce(&mut Stack<S>) -> ComposeResult<()>,
    {
        if self.stacks.contains_key(&config.name) {
            return Err(ComposeError::DuplicateName {
                scope: "app".to_string(),
                name: config.name,
            });
        }

        let mut stack = Stack::new(config, synth)?;
        compose(&mut stack)?;
        let synthesized = stack.finalize()?;

        let name = synthesized.graph.stack.name.clone();
        debug!(stack = %name, total = self.stacks.len() + 1, "stack added to app");
        Ok(self.stacks.entry(name).or_insert(synthesized))
    }

    /// Finalized stack by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Synthesized<A>> {
        self.stacks.get(name)
    }

    /// Stack names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stacks.keys().map(String::as_str)
    }

    /// Artifacts in insertion order
    pub fn artifacts(&self) -> impl Iterator<Item = (&str, &A)> {
        self.stacks
            .iter()
            .map(|(name, s)| (name.as_str(), &s.artifact))
    }

    /// Number of stacks
    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    /// Whether no stack was added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Consume the app, returning every finalized stack
    #[must_use]
    pub fn into_stacks(self) -> IndexMap<String, Synthesized<A>> {
        self.stacks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::template::TemplateSynthesizer;
    use keystone_core::ResourceKind;

    #[test]
    fn test_stacks_in_insertion_order() {
        let mut app = App::new();
        app.stack(StackConfig::new("Shop"), TemplateSynthesizer::new(), |s| {
            s.add(Builder::start(ResourceKind::Queue, "Orders"))?;
            Ok(())
        })
        .unwrap();
        app.stack(StackConfig::new("Billing"), TemplateSynthesizer::new(), |s| {
            s.add(Builder::start(ResourceKind::Queue, "Orders"))?;
            Ok(())
        })
        .unwrap();

        assert_eq!(app.names().collect::<Vec<_>>(), vec!["Shop", "Billing"]);
        let shop = app.get("Shop").unwrap();
        let billing = app.get("Billing").unwrap();
        assert_ne!(
            shop.artifact.resource("Orders").unwrap().handle,
            billing.artifact.resource("Orders").unwrap().handle
        );
    }

    #[test]
    fn test_duplicate_stack_name() {
        let mut app = App::new();
        app.stack(StackConfig::new("Shop"), TemplateSynthesizer::new(), |_| Ok(()))
            .unwrap();
        let err = app
            .stack(StackConfig::new("Shop"), TemplateSynthesizer::new(), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, ComposeError::DuplicateName { ref scope, .. } if scope == "app"));
        assert_eq!(app.len(), 1);
    }

    #[test]
    fn test_failed_stack_not_kept() {
        let mut app = App::new();
        let err = app
            .stack(StackConfig::new("Shop"), TemplateSynthesizer::new(), |s| {
                s.add(Builder::start(ResourceKind::Queue, "Orders"))?;
                s.add(Builder::start(ResourceKind::Queue, "Orders"))?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, ComposeError::DuplicateName { .. }));
        assert!(app.is_empty());
    }
}
