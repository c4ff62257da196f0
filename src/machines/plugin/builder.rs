//! Fluent builder for plugin state machines.

use super::{AfterTrackFn, BuildError, EntitiesFn, FilterFn, PluginHook, PluginStateMachine};
use crate::event::{Event, SelfDescribingJson};
use std::sync::Arc;

/// Builder for [`PluginStateMachine`].
///
/// Each hook takes its schemas and a closure. `None` schemas subscribe the
/// hook to every event.
pub struct PluginBuilder {
    plugin: PluginStateMachine,
}

impl PluginBuilder {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            plugin: PluginStateMachine::new(identifier),
        }
    }

    /// Entities to attach to matching events.
    pub fn entities<F>(mut self, schemas: Option<Vec<String>>, f: F) -> Self
    where
        F: Fn(&Event) -> Vec<SelfDescribingJson> + Send + Sync + 'static,
    {
        let callback: Arc<EntitiesFn> = Arc::new(f);
        self.plugin = self.plugin.with_entities(PluginHook::new(schemas, callback));
        self
    }

    /// Callback run on a background worker after a matching event is tracked.
    pub fn after_track<F>(mut self, schemas: Option<Vec<String>>, f: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let callback: Arc<AfterTrackFn> = Arc::new(f);
        self.plugin = self.plugin.with_after_track(PluginHook::new(schemas, callback));
        self
    }

    /// Predicate deciding whether a matching event is kept.
    pub fn filter<F>(mut self, schemas: Option<Vec<String>>, f: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        let callback: Arc<FilterFn> = Arc::new(f);
        self.plugin = self.plugin.with_filter(PluginHook::new(schemas, callback));
        self
    }

    /// Build the plugin.
    /// Returns an error if the identifier is empty or no hook was added.
    pub fn build(self) -> Result<PluginStateMachine, BuildError> {
        if self.plugin.identifier_str().is_empty() {
            return Err(BuildError::MissingIdentifier);
        }
        if !self.plugin.has_hooks() {
            return Err(BuildError::NoCapabilities {
                identifier: self.plugin.identifier_str().to_string(),
            });
        }
        Ok(self.plugin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StateMachine;
    use crate::event::Payload;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn builder_validates_identifier() {
        let result = PluginBuilder::new("").filter(None, |_: &Event| true).build();

        assert_eq!(result.unwrap_err(), BuildError::MissingIdentifier);
    }

    #[test]
    fn builder_requires_a_hook() {
        let result = PluginBuilder::new("nothing").build();

        assert!(matches!(result, Err(BuildError::NoCapabilities { identifier }) if identifier == "nothing"));
    }

    #[test]
    fn fluent_api_builds_plugin() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let plugin = PluginStateMachine::builder("counter")
            .after_track(Some(vec!["se".to_string()]), move |_: &Event| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        assert_eq!(plugin.subscribed_schemas_for_after_track(), vec!["se"]);
        plugin.after_track(&Event::primitive("se", Payload::new()));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
