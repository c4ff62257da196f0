//! The state manager: machine registry, routing and tracker state.
//!
//! The manager is owned by the serial executor. Every operation here runs on
//! that thread, in event submission order, so transitions for a machine are
//! chained in exactly the order events were tracked.

mod routing;

use crate::core::{Capability, State, StateMachine, TrackerState, TrackerStateSnapshot};
use crate::event::{Event, PayloadError, SelfDescribingJson};
use crate::executor::BackgroundQueue;
use routing::RoutingTables;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use tracing::{debug, error, warn};

/// Dispatches events to registered state machines.
///
/// Contributions are gathered from machines subscribed to the event's schema
/// (or name, for primitive events) first, then from machines subscribed to
/// the wildcard; within each group machines answer in registration order.
pub struct StateManager {
    /// Concrete machine type per registered identifier.
    registrations: HashMap<String, TypeId>,
    routing: RoutingTables,
    tracker_state: TrackerState,
    background: BackgroundQueue,
}

impl StateManager {
    /// Create an empty manager that runs after-track callbacks on `background`.
    pub fn new(background: BackgroundQueue) -> Self {
        Self {
            registrations: HashMap::new(),
            routing: RoutingTables::default(),
            tracker_state: TrackerState::new(),
            background,
        }
    }

    /// Register `machine`, replacing any machine with the same identifier.
    ///
    /// Registering a machine of the same concrete type under an identifier
    /// that is already registered does nothing; the existing machine and its
    /// state are kept. A machine of another type replaces the old one and
    /// starts without state.
    pub fn add_or_replace_state_machine(&mut self, machine: Arc<dyn StateMachine>) {
        let identifier = machine.identifier().to_string();
        let machine_type = machine.machine_type();

        if let Some(existing) = self.registrations.get(&identifier) {
            if *existing == machine_type {
                debug!(machine = %identifier, "state machine already registered");
                return;
            }
            debug!(machine = %identifier, "replacing state machine");
            self.remove_state_machine(&identifier);
        }

        self.routing.insert(&machine);
        self.registrations.insert(identifier.clone(), machine_type);
        debug!(machine = %identifier, "state machine registered");
    }

    /// Deregister the machine under `identifier` and drop its state.
    ///
    /// Returns `false` when no such machine is registered.
    pub fn remove_state_machine(&mut self, identifier: &str) -> bool {
        if self.registrations.remove(identifier).is_none() {
            return false;
        }
        self.tracker_state.remove_state(identifier);
        self.routing.remove(identifier);
        debug!(machine = identifier, "state machine removed");
        true
    }

    pub fn is_registered(&self, identifier: &str) -> bool {
        self.registrations.contains_key(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.registrations.keys().map(String::as_str)
    }

    /// Current state stored for `identifier`.
    pub fn state(&self, identifier: &str) -> Option<Arc<dyn State>> {
        self.tracker_state.state_future(identifier)?.compute()
    }

    /// Advance the state of every machine subscribed to transitions on the
    /// event's schema and return a snapshot of all states.
    ///
    /// Primitive events never transition; they get a snapshot of the states
    /// as they stand.
    pub fn tracker_state(&mut self, event: &Event) -> TrackerStateSnapshot {
        if let Some(schema) = event.schema() {
            // A machine listed under both the schema and the wildcard still
            // transitions once per event.
            let mut seen = HashSet::new();
            let machines: Vec<Arc<dyn StateMachine>> = self
                .routing
                .matching(Capability::Transition, schema)
                .filter(|machine| seen.insert(machine.identifier().to_string()))
                .cloned()
                .collect();

            if !machines.is_empty() {
                let event = Arc::new(event.clone());
                for machine in machines {
                    // Resolving now keeps every chain at most one future long.
                    self.tracker_state.advance(machine, Arc::clone(&event)).compute();
                }
            }
        }
        self.tracker_state.snapshot()
    }

    /// Whether the event should be kept.
    ///
    /// Every subscribed machine that does not abstain must accept the event;
    /// the first rejection decides.
    pub fn filter(&self, event: &Event) -> bool {
        for machine in self.routing.matching(Capability::Filter, event.routing_key()) {
            let state = event.state().state(machine.identifier());
            let verdict = machine
                .guarded(Capability::Filter, || machine.filter(event, state.as_deref()))
                .flatten();
            if verdict == Some(false) {
                debug!(
                    machine = machine.identifier(),
                    event = event.routing_key(),
                    "event rejected by filter"
                );
                return false;
            }
        }
        true
    }

    /// Entities generated for the event by all subscribed machines.
    pub fn entities(&self, event: &Event) -> Vec<SelfDescribingJson> {
        self.routing
            .matching(Capability::Entities, event.routing_key())
            .filter_map(|machine| {
                let state = event.state().state(machine.identifier());
                machine
                    .guarded(Capability::Entities, || machine.entities(event, state.as_deref()))
                    .flatten()
            })
            .flatten()
            .collect()
    }

    /// Add every subscribed machine's payload values to the event.
    ///
    /// All machines contribute even when an earlier contribution was
    /// rejected. Returns `true` only if no value was rejected.
    pub fn add_payload_values(&self, event: &mut Event) -> bool {
        let Some(schema) = event.schema() else {
            return true;
        };

        let contributions: Vec<(String, _)> = self
            .routing
            .matching(Capability::PayloadUpdate, schema)
            .filter_map(|machine| {
                let state = event.state().state(machine.identifier());
                machine
                    .guarded(Capability::PayloadUpdate, || {
                        machine.payload_values(event, state.as_deref())
                    })
                    .flatten()
                    .map(|values| (machine.identifier().to_string(), values))
            })
            .collect();

        let mut checks: Vec<Validation<(), NonEmptyVec<PayloadError>>> = Vec::new();
        for (identifier, values) in contributions {
            let check = event.add_payload_values(values);
            if let Validation::Failure(errors) = &check {
                for error in errors.iter() {
                    warn!(machine = %identifier, %error, "payload value rejected");
                }
            }
            checks.push(check);
        }

        match Validation::all_vec(checks) {
            Validation::Success(_) => true,
            Validation::Failure(errors) => {
                warn!(failures = errors.len(), event = event.routing_key(), "payload update incomplete");
                false
            }
        }
    }

    /// Notify subscribed machines that the event was tracked.
    ///
    /// Callbacks run on the background queue, one after another for this
    /// event, unordered relative to other events. A panicking callback does
    /// not stop the ones after it.
    pub fn after_track(&self, event: &Event) {
        let machines: Vec<Arc<dyn StateMachine>> = self
            .routing
            .matching(Capability::AfterTrack, event.routing_key())
            .cloned()
            .collect();
        if machines.is_empty() {
            return;
        }

        let event = event.clone();
        let dispatched = self.background.dispatch(move || {
            for machine in machines {
                machine.guarded(Capability::AfterTrack, || machine.after_track(&event));
            }
        });
        if let Err(e) = dispatched {
            error!(error = %e, "after-track callbacks could not be dispatched");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Payload;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[derive(Debug)]
    struct Hits(usize);

    impl State for Hits {
        fn name(&self) -> &str {
            "Hits"
        }
    }

    /// A machine whose every capability is scripted by the test.
    #[derive(Default)]
    struct Scripted {
        id: &'static str,
        transitions: Vec<&'static str>,
        entities: Vec<&'static str>,
        payload: Vec<&'static str>,
        after_track: Vec<&'static str>,
        filters: Vec<&'static str>,
        verdict: Option<bool>,
        values: Payload,
        transition_calls: AtomicUsize,
        after_track_tx: Option<mpsc::Sender<(&'static str, String)>>,
    }

    fn owned(schemas: &[&'static str]) -> Vec<String> {
        schemas.iter().map(|s| s.to_string()).collect()
    }

    impl StateMachine for Scripted {
        fn identifier(&self) -> &str {
            self.id
        }

        fn subscribed_schemas_for_transitions(&self) -> Vec<String> {
            owned(&self.transitions)
        }

        fn subscribed_schemas_for_entities_generation(&self) -> Vec<String> {
            owned(&self.entities)
        }

        fn subscribed_schemas_for_payload_updating(&self) -> Vec<String> {
            owned(&self.payload)
        }

        fn subscribed_schemas_for_after_track(&self) -> Vec<String> {
            owned(&self.after_track)
        }

        fn subscribed_schemas_for_filtering(&self) -> Vec<String> {
            owned(&self.filters)
        }

        fn transition(&self, _event: &Event, state: Option<Arc<dyn State>>) -> Option<Arc<dyn State>> {
            self.transition_calls.fetch_add(1, Ordering::SeqCst);
            let hits = state
                .as_deref()
                .and_then(|s| s.downcast_ref::<Hits>())
                .map_or(0, |h| h.0);
            Some(Arc::new(Hits(hits + 1)))
        }

        fn entities(&self, _event: &Event, state: Option<&dyn State>) -> Option<Vec<SelfDescribingJson>> {
            let hits = state.and_then(|s| s.downcast_ref::<Hits>()).map_or(0, |h| h.0);
            Some(vec![SelfDescribingJson::new(
                format!("iglu:test/{}/jsonschema/1-0-0", self.id),
                json!({ "hits": hits }),
            )])
        }

        fn payload_values(&self, _event: &Event, _state: Option<&dyn State>) -> Option<Payload> {
            Some(self.values.clone())
        }

        fn after_track(&self, event: &Event) {
            if let Some(tx) = &self.after_track_tx {
                let _ = tx.send((self.id, event.routing_key().to_string()));
            }
        }

        fn filter(&self, _event: &Event, _state: Option<&dyn State>) -> Option<bool> {
            self.verdict
        }
    }

    /// Same capabilities as `Scripted`, but a distinct concrete type.
    struct Replacement;

    impl StateMachine for Replacement {
        fn identifier(&self) -> &str {
            "m"
        }
    }

    fn manager() -> StateManager {
        StateManager::new(BackgroundQueue::spawn("test-after-track", 2).unwrap())
    }

    fn process(manager: &mut StateManager, mut event: Event) -> Event {
        let snapshot = manager.tracker_state(&event);
        event.attach_state(snapshot);
        event
    }

    fn sd(schema: &str) -> Event {
        Event::self_describing(schema, Payload::new())
    }

    fn hits(manager: &StateManager, id: &str) -> Option<usize> {
        manager
            .state(id)
            .as_deref()
            .and_then(|s| s.downcast_ref::<Hits>())
            .map(|h| h.0)
    }

    fn values(value: serde_json::Value) -> Payload {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Payload::new(),
        }
    }

    #[test]
    fn transitions_run_for_literal_and_wildcard_subscriptions() {
        let mut manager = manager();
        manager.add_or_replace_state_machine(Arc::new(Scripted {
            id: "literal",
            transitions: vec!["a"],
            ..Default::default()
        }));
        manager.add_or_replace_state_machine(Arc::new(Scripted {
            id: "any",
            transitions: vec!["*"],
            ..Default::default()
        }));

        process(&mut manager, sd("a"));
        process(&mut manager, sd("b"));

        assert_eq!(hits(&manager, "literal"), Some(1));
        assert_eq!(hits(&manager, "any"), Some(2));
    }

    #[test]
    fn machine_listed_twice_transitions_once_per_event() {
        let mut manager = manager();
        manager.add_or_replace_state_machine(Arc::new(Scripted {
            id: "both",
            transitions: vec!["a", "*"],
            ..Default::default()
        }));

        process(&mut manager, sd("a"));

        assert_eq!(hits(&manager, "both"), Some(1));
    }

    #[test]
    fn primitive_events_do_not_transition() {
        let mut manager = manager();
        manager.add_or_replace_state_machine(Arc::new(Scripted {
            id: "any",
            transitions: vec!["*"],
            ..Default::default()
        }));

        let event = process(&mut manager, Event::primitive("se", Payload::new()));

        assert_eq!(hits(&manager, "any"), None);
        assert!(event.state().is_empty());
    }

    #[test]
    fn tracker_state_resolves_futures_immediately() {
        let mut manager = manager();
        let machine = Arc::new(Scripted {
            id: "m",
            transitions: vec!["a"],
            ..Default::default()
        });
        manager.add_or_replace_state_machine(machine.clone());

        let event = process(&mut manager, sd("a"));
        assert_eq!(machine.transition_calls.load(Ordering::SeqCst), 1);

        // Reading again never re-runs the transition.
        event.state().state("m");
        event.state().state("m");
        assert_eq!(machine.transition_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registering_same_type_twice_keeps_first_machine_and_state() {
        let mut manager = manager();
        let first = Arc::new(Scripted {
            id: "m",
            transitions: vec!["a"],
            ..Default::default()
        });
        let second = Arc::new(Scripted {
            id: "m",
            transitions: vec!["a"],
            ..Default::default()
        });
        manager.add_or_replace_state_machine(first.clone());
        process(&mut manager, sd("a"));

        manager.add_or_replace_state_machine(second.clone());
        process(&mut manager, sd("a"));

        assert_eq!(hits(&manager, "m"), Some(2));
        assert_eq!(first.transition_calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.transition_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn replacing_with_other_type_clears_state_and_routes() {
        let mut manager = manager();
        manager.add_or_replace_state_machine(Arc::new(Scripted {
            id: "m",
            transitions: vec!["a"],
            entities: vec!["*"],
            ..Default::default()
        }));
        process(&mut manager, sd("a"));
        assert_eq!(hits(&manager, "m"), Some(1));

        manager.add_or_replace_state_machine(Arc::new(Replacement));

        assert!(manager.is_registered("m"));
        assert!(manager.state("m").is_none());
        let event = process(&mut manager, sd("a"));
        assert!(manager.entities(&event).is_empty());
    }

    #[test]
    fn remove_reports_unknown_identifiers() {
        let mut manager = manager();
        manager.add_or_replace_state_machine(Arc::new(Scripted {
            id: "m",
            transitions: vec!["a"],
            entities: vec!["*"],
            filters: vec!["*"],
            verdict: Some(false),
            ..Default::default()
        }));
        process(&mut manager, sd("a"));

        assert!(manager.remove_state_machine("m"));
        assert!(!manager.remove_state_machine("m"));

        let event = process(&mut manager, sd("a"));
        assert!(manager.state("m").is_none());
        assert!(manager.entities(&event).is_empty());
        assert!(manager.filter(&event));
    }

    #[test]
    fn filter_requires_every_non_abstaining_machine_to_accept() {
        let mut manager = manager();
        for (id, verdict) in [("yes", Some(true)), ("abstain", None), ("no", Some(false))] {
            manager.add_or_replace_state_machine(Arc::new(Scripted {
                id,
                filters: vec!["a"],
                verdict,
                ..Default::default()
            }));
        }

        let event = process(&mut manager, sd("a"));
        assert!(!manager.filter(&event));

        manager.remove_state_machine("no");
        assert!(manager.filter(&event));
    }

    #[test]
    fn filter_routes_primitive_events_by_name() {
        let mut manager = manager();
        manager.add_or_replace_state_machine(Arc::new(Scripted {
            id: "no-structured",
            filters: vec!["se"],
            verdict: Some(false),
            ..Default::default()
        }));

        assert!(!manager.filter(&Event::primitive("se", Payload::new())));
        assert!(manager.filter(&Event::primitive("pv", Payload::new())));
    }

    #[test]
    fn entities_come_from_literal_then_wildcard_machines() {
        let mut manager = manager();
        manager.add_or_replace_state_machine(Arc::new(Scripted {
            id: "wild",
            entities: vec!["*"],
            ..Default::default()
        }));
        manager.add_or_replace_state_machine(Arc::new(Scripted {
            id: "lit",
            transitions: vec!["a"],
            entities: vec!["a"],
            ..Default::default()
        }));

        let event = process(&mut manager, sd("a"));
        let entities = manager.entities(&event);

        let schemas: Vec<&str> = entities.iter().map(|e| e.schema.as_str()).collect();
        assert_eq!(
            schemas,
            vec!["iglu:test/lit/jsonschema/1-0-0", "iglu:test/wild/jsonschema/1-0-0"]
        );
        assert_eq!(entities[0].data["hits"], json!(1));
    }

    #[test]
    fn payload_failures_are_counted_without_short_circuit() {
        let mut manager = manager();
        manager.add_or_replace_state_machine(Arc::new(Scripted {
            id: "clash",
            payload: vec!["a"],
            values: values(json!({ "existing": "overwrite?" })),
            ..Default::default()
        }));
        manager.add_or_replace_state_machine(Arc::new(Scripted {
            id: "fresh",
            payload: vec!["*"],
            values: values(json!({ "added": 1 })),
            ..Default::default()
        }));

        let mut event = process(
            &mut manager,
            Event::self_describing("a", values(json!({ "existing": "kept" }))),
        );

        assert!(!manager.add_payload_values(&mut event));
        assert_eq!(event.payload()["existing"], json!("kept"));
        assert_eq!(event.payload()["added"], json!(1));
    }

    #[test]
    fn payload_values_skip_primitive_events() {
        let mut manager = manager();
        manager.add_or_replace_state_machine(Arc::new(Scripted {
            id: "any",
            payload: vec!["*"],
            values: values(json!({ "added": 1 })),
            ..Default::default()
        }));

        let mut event = Event::primitive("se", Payload::new());
        assert!(manager.add_payload_values(&mut event));
        assert!(event.payload().is_empty());
    }

    #[test]
    fn after_track_runs_off_the_calling_thread_in_subscription_order() {
        let (tx, rx) = mpsc::channel();
        let mut manager = manager();
        manager.add_or_replace_state_machine(Arc::new(Scripted {
            id: "first",
            after_track: vec!["a"],
            after_track_tx: Some(tx.clone()),
            ..Default::default()
        }));
        manager.add_or_replace_state_machine(Arc::new(Scripted {
            id: "second",
            after_track: vec!["*"],
            after_track_tx: Some(tx),
            ..Default::default()
        }));

        let event = process(&mut manager, sd("a"));
        manager.after_track(&event);

        let timeout = Duration::from_secs(2);
        assert_eq!(rx.recv_timeout(timeout).unwrap(), ("first", "a".to_string()));
        assert_eq!(rx.recv_timeout(timeout).unwrap(), ("second", "a".to_string()));
    }

    /// Panics in every capability it subscribes to.
    struct Panicking;

    impl StateMachine for Panicking {
        fn identifier(&self) -> &str {
            "panicking"
        }

        fn subscribed_schemas_for_transitions(&self) -> Vec<String> {
            owned(&["*"])
        }

        fn subscribed_schemas_for_entities_generation(&self) -> Vec<String> {
            owned(&["*"])
        }

        fn subscribed_schemas_for_payload_updating(&self) -> Vec<String> {
            owned(&["*"])
        }

        fn subscribed_schemas_for_after_track(&self) -> Vec<String> {
            owned(&["*"])
        }

        fn subscribed_schemas_for_filtering(&self) -> Vec<String> {
            owned(&["*"])
        }

        fn transition(&self, _event: &Event, _state: Option<Arc<dyn State>>) -> Option<Arc<dyn State>> {
            panic!("transition");
        }

        fn entities(&self, _event: &Event, _state: Option<&dyn State>) -> Option<Vec<SelfDescribingJson>> {
            panic!("entities");
        }

        fn payload_values(&self, _event: &Event, _state: Option<&dyn State>) -> Option<Payload> {
            panic!("payload");
        }

        fn after_track(&self, _event: &Event) {
            panic!("after track");
        }

        fn filter(&self, _event: &Event, _state: Option<&dyn State>) -> Option<bool> {
            panic!("filter");
        }
    }

    #[test]
    fn panicking_machine_contributes_nothing() {
        let (tx, rx) = mpsc::channel();
        let mut manager = manager();
        manager.add_or_replace_state_machine(Arc::new(Panicking));
        manager.add_or_replace_state_machine(Arc::new(Scripted {
            id: "steady",
            transitions: vec!["*"],
            entities: vec!["*"],
            payload: vec!["*"],
            after_track: vec!["*"],
            filters: vec!["*"],
            values: values(json!({ "k": 1 })),
            after_track_tx: Some(tx),
            ..Default::default()
        }));

        let mut event = process(&mut manager, sd("a"));
        assert!(manager.state("panicking").is_none());
        assert_eq!(hits(&manager, "steady"), Some(1));

        assert!(manager.filter(&event));
        let entities = manager.entities(&event);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].schema, "iglu:test/steady/jsonschema/1-0-0");
        assert!(manager.add_payload_values(&mut event));
        assert_eq!(event.payload()["k"], json!(1));

        manager.after_track(&event);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            ("steady", "a".to_string())
        );
    }
}
