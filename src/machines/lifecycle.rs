//! Application lifecycle (foreground/background) tracking.

use super::self_describing;
use crate::core::{State, StateMachine, WILDCARD_SCHEMA};
use crate::event::{schemas, Background, Event, Foreground, SelfDescribing, SelfDescribingJson};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LifecycleState {
    Foreground { index: i64 },
    Background { index: i64 },
}

impl LifecycleState {
    pub fn is_visible(&self) -> bool {
        matches!(self, Self::Foreground { .. })
    }

    pub fn index(&self) -> i64 {
        match self {
            Self::Foreground { index } | Self::Background { index } => *index,
        }
    }
}

impl State for LifecycleState {
    fn name(&self) -> &str {
        match self {
            Self::Foreground { .. } => "Foreground",
            Self::Background { .. } => "Background",
        }
    }
}

/// Data of the application lifecycle entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEntity {
    pub is_visible: bool,
    pub index: i64,
}

impl LifecycleEntity {
    pub fn to_json(&self) -> SelfDescribingJson {
        self_describing(schemas::LIFECYCLE_ENTITY, self)
    }
}

/// Attaches the application's visibility to every event.
///
/// Before any background or foreground event the app is assumed visible,
/// with index 0.
#[derive(Debug, Default)]
pub struct LifecycleStateMachine;

impl LifecycleStateMachine {
    pub const IDENTIFIER: &'static str = "Lifecycle";

    pub fn new() -> Self {
        Self
    }
}

impl StateMachine for LifecycleStateMachine {
    fn identifier(&self) -> &str {
        Self::IDENTIFIER
    }

    fn subscribed_schemas_for_transitions(&self) -> Vec<String> {
        vec![
            schemas::APPLICATION_BACKGROUND.to_string(),
            schemas::APPLICATION_FOREGROUND.to_string(),
        ]
    }

    fn subscribed_schemas_for_entities_generation(&self) -> Vec<String> {
        vec![WILDCARD_SCHEMA.to_string()]
    }

    fn transition(&self, event: &Event, state: Option<Arc<dyn State>>) -> Option<Arc<dyn State>> {
        if let Some(background) = Background::from_event(event) {
            return Some(Arc::new(LifecycleState::Background {
                index: background.index,
            }));
        }
        if let Some(foreground) = Foreground::from_event(event) {
            return Some(Arc::new(LifecycleState::Foreground {
                index: foreground.index,
            }));
        }
        state
    }

    fn entities(&self, _event: &Event, state: Option<&dyn State>) -> Option<Vec<SelfDescribingJson>> {
        let entity = match state.and_then(|s| s.downcast_ref::<LifecycleState>()) {
            Some(state) => LifecycleEntity {
                is_visible: state.is_visible(),
                index: state.index(),
            },
            None => LifecycleEntity {
                is_visible: true,
                index: 0,
            },
        };
        Some(vec![entity.to_json()])
    }
}
