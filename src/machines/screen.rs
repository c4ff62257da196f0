//! Current screen tracking.
//!
//! Every event carries the screen entity of the last screen view, and each
//! screen view gets the previous screen's name, id and type in its payload.

use super::self_describing;
use crate::core::{State, StateMachine, WILDCARD_SCHEMA};
use crate::event::{schemas, Event, Payload, ScreenView, SelfDescribing, SelfDescribingJson};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreviousScreen {
    pub name: String,
    pub id: Uuid,
    pub screen_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScreenState {
    pub name: String,
    pub id: Uuid,
    pub screen_type: Option<String>,
    pub transition_type: Option<String>,
    pub previous: Option<PreviousScreen>,
}

impl State for ScreenState {
    fn name(&self) -> &str {
        "Screen"
    }
}

/// Data of the screen entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScreenEntity {
    pub name: String,
    pub id: Uuid,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub screen_type: Option<String>,
}

impl ScreenEntity {
    pub fn to_json(&self) -> SelfDescribingJson {
        self_describing(schemas::SCREEN_ENTITY, self)
    }
}

#[derive(Debug, Default)]
pub struct ScreenStateMachine;

impl ScreenStateMachine {
    pub const IDENTIFIER: &'static str = "ScreenContext";

    pub fn new() -> Self {
        Self
    }
}

impl StateMachine for ScreenStateMachine {
    fn identifier(&self) -> &str {
        Self::IDENTIFIER
    }

    fn subscribed_schemas_for_transitions(&self) -> Vec<String> {
        vec![schemas::SCREEN_VIEW.to_string()]
    }

    fn subscribed_schemas_for_entities_generation(&self) -> Vec<String> {
        vec![WILDCARD_SCHEMA.to_string()]
    }

    fn subscribed_schemas_for_payload_updating(&self) -> Vec<String> {
        vec![schemas::SCREEN_VIEW.to_string()]
    }

    fn transition(&self, event: &Event, state: Option<Arc<dyn State>>) -> Option<Arc<dyn State>> {
        let Some(view) = ScreenView::from_event(event) else {
            return state;
        };
        let previous = state
            .as_deref()
            .and_then(|s| s.downcast_ref::<ScreenState>())
            .map(|current| PreviousScreen {
                name: current.name.clone(),
                id: current.id,
                screen_type: current.screen_type.clone(),
            });

        Some(Arc::new(ScreenState {
            name: view.name,
            id: view.id,
            screen_type: view.screen_type,
            transition_type: view.transition_type,
            previous,
        }))
    }

    fn entities(&self, _event: &Event, state: Option<&dyn State>) -> Option<Vec<SelfDescribingJson>> {
        let screen = state.and_then(|s| s.downcast_ref::<ScreenState>())?;
        let entity = ScreenEntity {
            name: screen.name.clone(),
            id: screen.id,
            screen_type: screen.screen_type.clone(),
        };
        Some(vec![entity.to_json()])
    }

    fn payload_values(&self, _event: &Event, state: Option<&dyn State>) -> Option<Payload> {
        let previous = state
            .and_then(|s| s.downcast_ref::<ScreenState>())?
            .previous
            .as_ref()?;

        let mut values = Payload::new();
        values.insert("previousName".into(), Value::String(previous.name.clone()));
        values.insert("previousId".into(), Value::String(previous.id.to_string()));
        if let Some(screen_type) = &previous.screen_type {
            values.insert("previousType".into(), Value::String(screen_type.clone()));
        }
        Some(values)
    }
}
