//! Lazily computed, self-collapsing machine state.

use super::machine::{Capability, StateMachine};
use super::state::State;
use crate::event::Event;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

enum Slot {
    Pending {
        event: Arc<Event>,
        previous: Option<Arc<StateFuture>>,
        machine: Arc<dyn StateMachine>,
    },
    Computed(Option<Arc<dyn State>>),
}

impl Slot {
    /// Run the pending transition on top of `prior` and memoize it. A slot
    /// that is already computed keeps its value.
    fn resolve(&mut self, prior: Option<Arc<dyn State>>) -> Option<Arc<dyn State>> {
        let state = match std::mem::replace(self, Slot::Computed(None)) {
            Slot::Computed(state) => state,
            Slot::Pending { event, machine, .. } => {
                // A panicking transition leaves the state where it was.
                let next = machine
                    .guarded(Capability::Transition, || machine.transition(&event, prior.clone()))
                    .unwrap_or(prior);
                trace!(
                    machine = machine.identifier(),
                    event = event.routing_key(),
                    state = next.as_ref().map(|s| s.name()),
                    "state transition computed"
                );
                next
            }
        };

        *self = Slot::Computed(state.clone());
        state
    }

    fn take_previous(&mut self) -> Option<Arc<StateFuture>> {
        match std::mem::replace(self, Slot::Computed(None)) {
            Slot::Pending { previous, .. } => previous,
            Slot::Computed(_) => None,
        }
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The state a machine reaches after an event, given the state before it.
///
/// Futures for one identifier form a chain, each owning the one before it.
/// The first `compute` runs the transition (computing the previous future
/// first), memoizes the result and releases the event, the previous future
/// and the machine. Later calls return the memo. A chain therefore never
/// outlives its first evaluation, however long it grew before.
///
/// Resolving and dropping walk the chain in a loop, so chain length is not
/// bounded by the stack.
pub struct StateFuture {
    slot: Mutex<Slot>,
}

impl StateFuture {
    pub fn new(
        event: Arc<Event>,
        previous: Option<Arc<StateFuture>>,
        machine: Arc<dyn StateMachine>,
    ) -> Self {
        Self {
            slot: Mutex::new(Slot::Pending {
                event,
                previous,
                machine,
            }),
        }
    }

    /// A future that is already resolved to `state`.
    pub fn resolved(state: Option<Arc<dyn State>>) -> Self {
        Self {
            slot: Mutex::new(Slot::Computed(state)),
        }
    }

    /// Resolve the state, running the transition at most once.
    pub fn compute(&self) -> Option<Arc<dyn State>> {
        let mut slot = lock(&self.slot);
        let mut next = match &*slot {
            Slot::Computed(state) => return state.clone(),
            Slot::Pending { previous, .. } => previous.clone(),
        };

        // Unresolved ancestors, newest first. Besides our own slot, at most
        // one ancestor is locked at a time and always an older one.
        let mut pending = Vec::new();
        let mut prior = None;
        while let Some(future) = next.take() {
            let ancestor = match &*lock(&future.slot) {
                Slot::Computed(state) => {
                    prior = state.clone();
                    None
                }
                Slot::Pending { previous, .. } => Some(previous.clone()),
            };
            if let Some(previous) = ancestor {
                pending.push(future);
                next = previous;
            }
        }

        for future in pending.iter().rev() {
            prior = lock(&future.slot).resolve(prior);
        }
        slot.resolve(prior)
    }

    pub fn is_computed(&self) -> bool {
        matches!(*lock(&self.slot), Slot::Computed(_))
    }
}

impl Drop for StateFuture {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(PoisonError::into_inner);
        let mut next = slot.take_previous();
        // Unlink owned ancestors one at a time instead of recursively.
        while let Some(future) = next.take() {
            if let Ok(mut future) = Arc::try_unwrap(future) {
                next = future
                    .slot
                    .get_mut()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take_previous();
            }
        }
    }
}

impl fmt::Debug for StateFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*lock(&self.slot) {
            Slot::Pending { machine, .. } => f
                .debug_struct("StateFuture")
                .field("pending", &machine.identifier())
                .finish(),
            Slot::Computed(state) => f
                .debug_struct("StateFuture")
                .field("state", state)
                .finish(),
        }
    }
}
