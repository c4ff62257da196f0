//! Current state futures of all registered machines.

use super::future::StateFuture;
use super::machine::StateMachine;
use super::state::State;
use crate::event::Event;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps machine identifiers to their latest [`StateFuture`].
///
/// Exactly one future is live per identifier. Advancing an identifier moves
/// its current future into the new one as the `previous` link.
#[derive(Debug, Default)]
pub struct TrackerState {
    futures: HashMap<String, Arc<StateFuture>>,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_future(&self, identifier: &str) -> Option<&Arc<StateFuture>> {
        self.futures.get(identifier)
    }

    /// Chain a new future for `machine` after `event` onto its current one.
    pub fn advance(&mut self, machine: Arc<dyn StateMachine>, event: Arc<Event>) -> Arc<StateFuture> {
        let identifier = machine.identifier().to_string();
        let previous = self.futures.remove(&identifier);
        let future = Arc::new(StateFuture::new(event, previous, machine));
        self.futures.insert(identifier, Arc::clone(&future));
        future
    }

    pub fn set_state_future(&mut self, identifier: impl Into<String>, future: Arc<StateFuture>) {
        self.futures.insert(identifier.into(), future);
    }

    /// Forget the state stored for `identifier`.
    pub fn remove_state(&mut self, identifier: &str) -> Option<Arc<StateFuture>> {
        self.futures.remove(identifier)
    }

    pub fn len(&self) -> usize {
        self.futures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.futures.is_empty()
    }

    /// Point-in-time view of every machine's current future.
    pub fn snapshot(&self) -> TrackerStateSnapshot {
        TrackerStateSnapshot {
            futures: Arc::new(self.futures.clone()),
        }
    }
}

/// Immutable view of the tracker state at the moment an event was processed.
///
/// Cloning is cheap. Reading a state computes its future on first access.
#[derive(Clone, Debug, Default)]
pub struct TrackerStateSnapshot {
    futures: Arc<HashMap<String, Arc<StateFuture>>>,
}

impl TrackerStateSnapshot {
    /// State of the machine registered under `identifier`.
    pub fn state(&self, identifier: &str) -> Option<Arc<dyn State>> {
        self.futures.get(identifier)?.compute()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.futures.contains_key(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.futures.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.futures.is_empty()
    }
}
