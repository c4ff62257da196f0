//! State machines assembled from closures.
//!
//! A plugin has no state of its own. It can add entities, observe tracked
//! events and filter them out, each behind its own schema subscription.

mod builder;
mod error;

pub use builder::PluginBuilder;
pub use error::BuildError;

use crate::core::{State, StateMachine, WILDCARD_SCHEMA};
use crate::event::{Event, SelfDescribingJson};
use std::fmt;
use std::sync::Arc;

pub type EntitiesFn = dyn Fn(&Event) -> Vec<SelfDescribingJson> + Send + Sync;
pub type AfterTrackFn = dyn Fn(&Event) + Send + Sync;
pub type FilterFn = dyn Fn(&Event) -> bool + Send + Sync;

/// A closure with the schemas it is subscribed to.
///
/// Without explicit schemas the hook runs for every event.
pub struct PluginHook<F: ?Sized> {
    schemas: Vec<String>,
    callback: Arc<F>,
}

impl<F: ?Sized> PluginHook<F> {
    pub fn new(schemas: Option<Vec<String>>, callback: Arc<F>) -> Self {
        Self {
            schemas: schemas.unwrap_or_else(|| vec![WILDCARD_SCHEMA.to_string()]),
            callback,
        }
    }

    pub fn schemas(&self) -> &[String] {
        &self.schemas
    }
}

impl<F: ?Sized> Clone for PluginHook<F> {
    fn clone(&self) -> Self {
        Self {
            schemas: self.schemas.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<F: ?Sized> fmt::Debug for PluginHook<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHook")
            .field("schemas", &self.schemas)
            .finish_non_exhaustive()
    }
}

/// Stateless machine built from optional entities, after-track and filter
/// hooks.
///
/// Every plugin has the same concrete type, so registering a second plugin
/// under an identifier that is already taken by a plugin keeps the first
/// one. Remove it first to swap it out.
///
/// # Example
///
/// ```rust
/// use contextflow::event::{Event, Payload, SelfDescribingJson};
/// use contextflow::machines::PluginStateMachine;
/// use serde_json::json;
///
/// let plugin = PluginStateMachine::builder("app-version")
///     .entities(None, |_event: &Event| {
///         vec![SelfDescribingJson::new("iglu:com.acme/version/jsonschema/1-0-0", json!({ "v": "2.1" }))]
///     })
///     .filter(Some(vec!["se".to_string()]), |event: &Event| event.payload().contains_key("category"))
///     .build()
///     .unwrap();
///
/// assert_eq!(plugin.identifier_str(), "app-version");
/// ```
#[derive(Clone, Debug)]
pub struct PluginStateMachine {
    identifier: String,
    entities: Option<PluginHook<EntitiesFn>>,
    after_track: Option<PluginHook<AfterTrackFn>>,
    filter: Option<PluginHook<FilterFn>>,
}

impl PluginStateMachine {
    /// A plugin without hooks; add them with the `with_*` methods.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            entities: None,
            after_track: None,
            filter: None,
        }
    }

    pub fn builder(identifier: impl Into<String>) -> PluginBuilder {
        PluginBuilder::new(identifier)
    }

    pub fn with_entities(mut self, hook: PluginHook<EntitiesFn>) -> Self {
        self.entities = Some(hook);
        self
    }

    pub fn with_after_track(mut self, hook: PluginHook<AfterTrackFn>) -> Self {
        self.after_track = Some(hook);
        self
    }

    pub fn with_filter(mut self, hook: PluginHook<FilterFn>) -> Self {
        self.filter = Some(hook);
        self
    }

    pub fn identifier_str(&self) -> &str {
        &self.identifier
    }

    pub(crate) fn has_hooks(&self) -> bool {
        self.entities.is_some() || self.after_track.is_some() || self.filter.is_some()
    }
}

fn schemas_of<F: ?Sized>(hook: &Option<PluginHook<F>>) -> Vec<String> {
    hook.as_ref().map(|h| h.schemas.clone()).unwrap_or_default()
}

impl StateMachine for PluginStateMachine {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn subscribed_schemas_for_entities_generation(&self) -> Vec<String> {
        schemas_of(&self.entities)
    }

    fn subscribed_schemas_for_after_track(&self) -> Vec<String> {
        schemas_of(&self.after_track)
    }

    fn subscribed_schemas_for_filtering(&self) -> Vec<String> {
        schemas_of(&self.filter)
    }

    fn entities(&self, event: &Event, _state: Option<&dyn State>) -> Option<Vec<SelfDescribingJson>> {
        self.entities.as_ref().map(|hook| (hook.callback)(event))
    }

    fn after_track(&self, event: &Event) {
        if let Some(hook) = &self.after_track {
            (hook.callback)(event);
        }
    }

    fn filter(&self, event: &Event, _state: Option<&dyn State>) -> Option<bool> {
        self.filter.as_ref().map(|hook| (hook.callback)(event))
    }
}
