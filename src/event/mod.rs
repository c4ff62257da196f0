//! Event capability surface read and mutated by the engine.
//!
//! An [`Event`] is identified either by a self-describing schema URI or by a
//! primitive event name. Its payload is a flat JSON map and its entities are
//! self-describing context records. The engine only ever adds to an event:
//! entities are appended and payload values are inserted when their key is
//! still free.

mod error;
pub mod schemas;
mod types;

pub use error::PayloadError;
pub use types::{
    Background, DeepLinkReceived, DismissImmersiveSpace, Foreground, ImmersionStyle,
    OpenImmersiveSpace, ScreenView, SelfDescribing, UpperLimbVisibility,
};

use crate::core::TrackerStateSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use uuid::Uuid;

/// Flat key/value payload of an event.
pub type Payload = serde_json::Map<String, Value>;

/// A self-describing JSON record: a schema URI plus the data it validates.
///
/// Entities attached to events use this shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelfDescribingJson {
    pub schema: String,
    pub data: Value,
}

impl SelfDescribingJson {
    pub fn new(schema: impl Into<String>, data: Value) -> Self {
        Self {
            schema: schema.into(),
            data,
        }
    }
}

/// How an event is identified for routing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventIdentity {
    /// Identified by a versioned schema URI.
    SelfDescribing(String),
    /// Identified by a fixed event name (e.g. `"se"` for structured events).
    Primitive(String),
}

/// An event flowing through the enrichment pipeline.
#[derive(Clone, Debug)]
pub struct Event {
    id: Uuid,
    identity: EventIdentity,
    payload: Payload,
    entities: Vec<SelfDescribingJson>,
    device_created_at: DateTime<Utc>,
    true_timestamp: Option<DateTime<Utc>>,
    state: TrackerStateSnapshot,
}

impl Event {
    fn with_identity(identity: EventIdentity, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            payload,
            entities: Vec::new(),
            device_created_at: Utc::now(),
            true_timestamp: None,
            state: TrackerStateSnapshot::default(),
        }
    }

    /// Create a self-describing event for `schema`.
    pub fn self_describing(schema: impl Into<String>, payload: Payload) -> Self {
        Self::with_identity(EventIdentity::SelfDescribing(schema.into()), payload)
    }

    /// Create a primitive event identified by `name`.
    pub fn primitive(name: impl Into<String>, payload: Payload) -> Self {
        Self::with_identity(EventIdentity::Primitive(name.into()), payload)
    }

    /// Attach an entity at construction time.
    pub fn with_entity(mut self, entity: SelfDescribingJson) -> Self {
        self.entities.push(entity);
        self
    }

    /// Attach several entities at construction time.
    pub fn with_entities(mut self, entities: impl IntoIterator<Item = SelfDescribingJson>) -> Self {
        self.entities.extend(entities);
        self
    }

    /// Set the user-supplied timestamp of when the event actually happened.
    pub fn with_true_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.true_timestamp = Some(timestamp);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> &EventIdentity {
        &self.identity
    }

    /// Schema URI for self-describing events, `None` otherwise.
    pub fn schema(&self) -> Option<&str> {
        match &self.identity {
            EventIdentity::SelfDescribing(schema) => Some(schema),
            EventIdentity::Primitive(_) => None,
        }
    }

    /// Event name for primitive events, `None` otherwise.
    pub fn name(&self) -> Option<&str> {
        match &self.identity {
            EventIdentity::SelfDescribing(_) => None,
            EventIdentity::Primitive(name) => Some(name),
        }
    }

    pub fn is_self_describing(&self) -> bool {
        matches!(self.identity, EventIdentity::SelfDescribing(_))
    }

    /// Key used to look the event up in routing tables: the schema, or the
    /// bare name for primitive events.
    pub fn routing_key(&self) -> &str {
        match &self.identity {
            EventIdentity::SelfDescribing(schema) => schema,
            EventIdentity::Primitive(name) => name,
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn entities(&self) -> &[SelfDescribingJson] {
        &self.entities
    }

    pub fn device_created_at(&self) -> DateTime<Utc> {
        self.device_created_at
    }

    pub fn true_timestamp(&self) -> Option<DateTime<Utc>> {
        self.true_timestamp
    }

    /// Tracker state captured when the event was processed.
    ///
    /// Empty until the state manager has advanced state for this event.
    pub fn state(&self) -> &TrackerStateSnapshot {
        &self.state
    }

    pub(crate) fn attach_state(&mut self, snapshot: TrackerStateSnapshot) {
        self.state = snapshot;
    }

    /// Append generated entities.
    pub fn add_entities(&mut self, entities: impl IntoIterator<Item = SelfDescribingJson>) {
        self.entities.extend(entities);
    }

    /// Insert payload values without overwriting existing keys.
    ///
    /// Every key is attempted. Keys that are empty or already present are
    /// rejected, and all rejections are reported together.
    pub fn add_payload_values(&mut self, values: Payload) -> Validation<(), NonEmptyVec<PayloadError>> {
        let mut checks: Vec<Validation<(), NonEmptyVec<PayloadError>>> = Vec::new();

        for (key, value) in values {
            let check: Validation<(), NonEmptyVec<PayloadError>> = if key.is_empty() {
                Validation::fail(PayloadError::EmptyKey)
            } else if self.payload.contains_key(&key) {
                Validation::fail(PayloadError::KeyAlreadyPresent { key })
            } else {
                self.payload.insert(key, value);
                Validation::success(())
            };
            checks.push(check);
        }

        Validation::all_vec(checks).map(|_| ())
    }
}
