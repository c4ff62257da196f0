//! The engine: a state manager driven by its own serial executor.
//!
//! Each call to [`Engine::track`] runs the whole enrichment pipeline for one
//! event on the executor thread:
//!
//! 1. advance the state of machines subscribed to transitions
//! 2. attach the resulting tracker state snapshot to the event
//! 3. ask filtering machines whether to keep the event
//! 4. add generated entities
//! 5. add payload values
//! 6. hand the event to after-track machines on the background queue
//!
//! Events are processed strictly in submission order.

use crate::config::{ConfigError, EngineConfig};
use crate::core::{State, StateMachine};
use crate::event::Event;
use crate::executor::{BackgroundQueue, ExecutorError, SerialExecutor};
use crate::machines::{
    BuildError, DeepLinkStateMachine, ImmersiveSpaceStateMachine, LifecycleStateMachine,
    PluginBuilder, ScreenStateMachine,
};
use crate::manager::StateManager;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Enriches tracked events with the context of registered state machines.
///
/// # Example
///
/// ```rust
/// use contextflow::config::EngineConfig;
/// use contextflow::engine::Engine;
/// use contextflow::event::{Background, Event, Payload, SelfDescribing};
///
/// let engine = Engine::new(EngineConfig::default()).unwrap();
/// engine.track(Background { index: 1 }.into_event()).unwrap();
///
/// let event = engine.track(Event::primitive("se", Payload::new())).unwrap().unwrap();
/// let lifecycle = event
///     .entities()
///     .iter()
///     .find(|e| e.schema.contains("application_lifecycle"))
///     .unwrap();
/// assert_eq!(lifecycle.data["isVisible"], false);
/// ```
#[derive(Clone)]
pub struct Engine {
    executor: SerialExecutor<StateManager>,
    config: EngineConfig,
}

impl Engine {
    /// Start the executor and background queue and register the built-in
    /// machines enabled in `config`.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let background = BackgroundQueue::spawn(
            &format!("{}-background", config.executor_thread_name),
            config.background_workers,
        )?;
        let mut manager = StateManager::new(background);
        for machine in builtin_machines(&config) {
            manager.add_or_replace_state_machine(machine);
        }

        let executor = SerialExecutor::spawn(config.executor_thread_name.clone(), manager)?;
        debug!(executor = executor.name(), "engine started");
        Ok(Self { executor, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The executor that owns the state manager.
    ///
    /// Work submitted here is ordered with tracked events.
    pub fn executor(&self) -> &SerialExecutor<StateManager> {
        &self.executor
    }

    /// Register `machine` behind every event already submitted.
    ///
    /// See [`StateManager::add_or_replace_state_machine`] for how an
    /// identifier that is already taken is handled.
    pub fn add_or_replace_state_machine<M: StateMachine>(&self, machine: M) -> Result<(), EngineError> {
        self.add_or_replace_shared_state_machine(Arc::new(machine))
    }

    /// Same as [`add_or_replace_state_machine`](Self::add_or_replace_state_machine),
    /// for a machine already behind an `Arc`.
    pub fn add_or_replace_shared_state_machine(
        &self,
        machine: Arc<dyn StateMachine>,
    ) -> Result<(), EngineError> {
        self.executor
            .run_async(move |manager| manager.add_or_replace_state_machine(machine))?;
        Ok(())
    }

    /// Build the plugin described by `builder` and register it.
    pub fn add_plugin(&self, builder: PluginBuilder) -> Result<(), EngineError> {
        let plugin = builder.build()?;
        debug!(plugin = plugin.identifier_str(), "registering plugin");
        self.add_or_replace_state_machine(plugin)
    }

    /// Remove the machine registered under `identifier` along with its state.
    ///
    /// Blocks until earlier work has run. Returns whether a machine was
    /// registered.
    pub fn remove_state_machine(&self, identifier: &str) -> Result<bool, EngineError> {
        let identifier = identifier.to_string();
        Ok(self
            .executor
            .run_and_wait(move |manager| manager.remove_state_machine(&identifier))?)
    }

    /// Current state of the machine registered under `identifier`.
    pub fn state(&self, identifier: &str) -> Result<Option<Arc<dyn State>>, EngineError> {
        let identifier = identifier.to_string();
        Ok(self
            .executor
            .run_and_wait(move |manager| manager.state(&identifier))?)
    }

    /// Run the pipeline for `event` and wait for the result.
    ///
    /// Returns `None` when a filtering machine rejected the event. Rejected
    /// payload values and panicking machines are logged, not returned: the
    /// event is still delivered with every contribution that did apply.
    pub fn track(&self, event: Event) -> Result<Option<Event>, EngineError> {
        Ok(self.executor.run_and_wait(move |manager| process(manager, event))?)
    }

    /// Run the pipeline for `event` without waiting; `on_done` receives the
    /// enriched event (or `None` if filtered out) on the executor thread.
    pub fn track_async<F>(&self, event: Event, on_done: F) -> Result<(), EngineError>
    where
        F: FnOnce(Option<Event>) + Send + 'static,
    {
        self.executor
            .run_async(move |manager| on_done(process(manager, event)))?;
        Ok(())
    }
}

fn builtin_machines(config: &EngineConfig) -> Vec<Arc<dyn StateMachine>> {
    let mut machines: Vec<Arc<dyn StateMachine>> = Vec::new();
    if config.lifecycle_context {
        machines.push(Arc::new(LifecycleStateMachine::new()));
    }
    if config.screen_context {
        machines.push(Arc::new(ScreenStateMachine::new()));
    }
    if config.deep_link_context {
        machines.push(Arc::new(DeepLinkStateMachine::new()));
    }
    if config.immersive_space_context {
        machines.push(Arc::new(ImmersiveSpaceStateMachine::new()));
    }
    machines
}

fn process(manager: &mut StateManager, mut event: Event) -> Option<Event> {
    let snapshot = manager.tracker_state(&event);
    event.attach_state(snapshot);

    if !manager.filter(&event) {
        return None;
    }

    let entities = manager.entities(&event);
    event.add_entities(entities);
    let payload_complete = manager.add_payload_values(&mut event);
    manager.after_track(&event);

    trace!(
        event = event.routing_key(),
        entities = event.entities().len(),
        payload_complete,
        "event processed"
    );
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{schemas, Foreground, Payload, SelfDescribing, SelfDescribingJson};
    use crate::machines::PluginStateMachine;
    use serde_json::json;
    use std::sync::mpsc;
    use std::time::Duration;

    fn bare_engine() -> Engine {
        let config = EngineConfig::builder()
            .executor_thread_name("engine-test")
            .without_builtin_contexts()
            .build()
            .unwrap();
        Engine::new(config).unwrap()
    }

    #[test]
    fn builtin_machines_follow_config() {
        let all = builtin_machines(&EngineConfig::default());
        let ids: Vec<&str> = all.iter().map(|m| m.identifier()).collect();
        assert_eq!(
            ids,
            vec![
                LifecycleStateMachine::IDENTIFIER,
                ScreenStateMachine::IDENTIFIER,
                DeepLinkStateMachine::IDENTIFIER,
                ImmersiveSpaceStateMachine::IDENTIFIER,
            ]
        );

        let none = builtin_machines(&EngineConfig::builder().without_builtin_contexts().build().unwrap());
        assert!(none.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            background_workers: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(Engine::new(config), Err(EngineError::Config(_))));
    }

    #[test]
    fn bare_engine_passes_events_through() {
        let engine = bare_engine();
        let event = engine.track(Event::primitive("se", Payload::new())).unwrap().unwrap();

        assert!(event.entities().is_empty());
        assert!(event.state().is_empty());
    }

    #[test]
    fn registration_is_ordered_with_tracking() {
        let engine = bare_engine();
        engine.add_or_replace_state_machine(LifecycleStateMachine::new()).unwrap();

        let event = engine.track(Foreground { index: 3 }.into_event()).unwrap().unwrap();
        assert_eq!(event.entities().len(), 1);
        assert_eq!(event.entities()[0].schema, schemas::LIFECYCLE_ENTITY);
        assert!(engine.state(LifecycleStateMachine::IDENTIFIER).unwrap().is_some());
    }

    #[test]
    fn track_async_delivers_enriched_event() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let (tx, rx) = mpsc::channel();

        engine
            .track_async(Event::primitive("se", Payload::new()), move |event| {
                let _ = tx.send(event.map(|e| e.entities().len()));
            })
            .unwrap();

        let entities = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(entities, Some(1));
    }

    #[test]
    fn add_plugin_reports_build_errors() {
        let engine = bare_engine();

        let empty = PluginStateMachine::builder("empty");
        assert!(matches!(
            engine.add_plugin(empty),
            Err(EngineError::Build(BuildError::NoCapabilities { .. }))
        ));

        let tagger = PluginStateMachine::builder("tagger").entities(None, |_: &Event| {
            vec![SelfDescribingJson::new("iglu:com.acme/tag/jsonschema/1-0-0", json!({}))]
        });
        engine.add_plugin(tagger).unwrap();
        let event = engine.track(Event::primitive("se", Payload::new())).unwrap().unwrap();
        assert_eq!(event.entities().len(), 1);
    }

    #[test]
    fn shared_machine_can_be_registered() {
        let engine = bare_engine();
        let machine: Arc<dyn StateMachine> = Arc::new(LifecycleStateMachine::new());

        engine.add_or_replace_shared_state_machine(Arc::clone(&machine)).unwrap();

        let event = engine.track(Foreground { index: 1 }.into_event()).unwrap().unwrap();
        assert_eq!(event.entities()[0].schema, schemas::LIFECYCLE_ENTITY);
        // The engine holds references to this same machine.
        assert!(Arc::strong_count(&machine) > 1);
    }
}
