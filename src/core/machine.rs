//! The state machine contract.

use super::state::{AsAny, State};
use crate::event::{Event, Payload, SelfDescribingJson};
use std::any::TypeId;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// Schema that subscribes a capability to every event.
pub const WILDCARD_SCHEMA: &str = "*";

/// The five independently routed capabilities of a state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Transition,
    Entities,
    PayloadUpdate,
    AfterTrack,
    Filter,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Transition,
        Capability::Entities,
        Capability::PayloadUpdate,
        Capability::AfterTrack,
        Capability::Filter,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Capability::Transition => 0,
            Capability::Entities => 1,
            Capability::PayloadUpdate => 2,
            Capability::AfterTrack => 3,
            Capability::Filter => 4,
        }
    }
}

/// A unit of enrichment behavior, routed by event schema.
///
/// Every capability is gated by its own subscription list: a machine is only
/// asked to `transition` on schemas listed in
/// [`subscribed_schemas_for_transitions`](Self::subscribed_schemas_for_transitions),
/// only asked for `entities` on schemas listed for entity generation, and so
/// on. A list may name literal schemas, or [`WILDCARD_SCHEMA`] for every event.
/// Primitive events are routed by their event name instead of a schema.
///
/// All capabilities default to doing nothing, so a machine only implements
/// what it subscribes to. Capabilities must be pure and non-blocking; they
/// run on the serial executor (except `after_track`).
pub trait StateMachine: AsAny + Send + Sync {
    /// Identifier under which the machine is registered and its state stored.
    fn identifier(&self) -> &str;

    fn subscribed_schemas_for_transitions(&self) -> Vec<String> {
        Vec::new()
    }

    fn subscribed_schemas_for_entities_generation(&self) -> Vec<String> {
        Vec::new()
    }

    fn subscribed_schemas_for_payload_updating(&self) -> Vec<String> {
        Vec::new()
    }

    fn subscribed_schemas_for_after_track(&self) -> Vec<String> {
        Vec::new()
    }

    fn subscribed_schemas_for_filtering(&self) -> Vec<String> {
        Vec::new()
    }

    /// Compute the state after `event` from the state before it.
    ///
    /// Only called for self-describing events. The result replaces the
    /// stored state; `None` leaves the machine without state.
    fn transition(&self, _event: &Event, _state: Option<Arc<dyn State>>) -> Option<Arc<dyn State>> {
        None
    }

    /// Entities to attach to `event`, or `None` for no contribution.
    fn entities(&self, _event: &Event, _state: Option<&dyn State>) -> Option<Vec<SelfDescribingJson>> {
        None
    }

    /// Payload values to add to `event`. Only called for self-describing events.
    fn payload_values(&self, _event: &Event, _state: Option<&dyn State>) -> Option<Payload> {
        None
    }

    /// Notification that `event` was tracked. Runs on a background worker.
    fn after_track(&self, _event: &Event) {}

    /// `Some(false)` drops the event, `Some(true)` keeps it, `None` abstains.
    fn filter(&self, _event: &Event, _state: Option<&dyn State>) -> Option<bool> {
        None
    }
}

impl dyn StateMachine {
    /// Schemas the machine subscribed to for `capability`.
    pub fn subscriptions(&self, capability: Capability) -> Vec<String> {
        match capability {
            Capability::Transition => self.subscribed_schemas_for_transitions(),
            Capability::Entities => self.subscribed_schemas_for_entities_generation(),
            Capability::PayloadUpdate => self.subscribed_schemas_for_payload_updating(),
            Capability::AfterTrack => self.subscribed_schemas_for_after_track(),
            Capability::Filter => self.subscribed_schemas_for_filtering(),
        }
    }

    /// Concrete type of the machine behind the trait object.
    pub fn machine_type(&self) -> TypeId {
        self.as_any().type_id()
    }

    /// Run one capability call. A panic is logged and yields `None`, so the
    /// machine contributes nothing for this event.
    pub(crate) fn guarded<R>(&self, capability: Capability, call: impl FnOnce() -> R) -> Option<R> {
        match panic::catch_unwind(AssertUnwindSafe(call)) {
            Ok(result) => Some(result),
            Err(_) => {
                error!(machine = self.identifier(), ?capability, "state machine panicked");
                None
            }
        }
    }
}
