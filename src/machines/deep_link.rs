//! Attaches the deep link that opened the app to the next event.

use super::self_describing;
use crate::core::{State, StateMachine, WILDCARD_SCHEMA};
use crate::event::{schemas, DeepLinkReceived, Event, SelfDescribing, SelfDescribingJson};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A received deep link, and whether the next event should carry it.
///
/// ```text
///   (none) ──received──▶ DeepLink ──any event──▶ ReadyForOutput ──any event──▶ (none)
///                          ▲                          │
///                          └────────received──────────┘
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeepLinkState {
    pub url: String,
    pub referrer: Option<String>,
    pub ready_for_output: bool,
}

impl State for DeepLinkState {
    fn name(&self) -> &str {
        if self.ready_for_output {
            "ReadyForOutput"
        } else {
            "DeepLink"
        }
    }
}

/// Data of the deep link entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeepLinkEntity {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

impl DeepLinkEntity {
    pub fn to_json(&self) -> SelfDescribingJson {
        self_describing(schemas::DEEP_LINK_ENTITY, self)
    }
}

#[derive(Debug, Default)]
pub struct DeepLinkStateMachine;

impl DeepLinkStateMachine {
    pub const IDENTIFIER: &'static str = "DeepLinkContext";

    pub fn new() -> Self {
        Self
    }
}

impl StateMachine for DeepLinkStateMachine {
    fn identifier(&self) -> &str {
        Self::IDENTIFIER
    }

    fn subscribed_schemas_for_transitions(&self) -> Vec<String> {
        vec![WILDCARD_SCHEMA.to_string()]
    }

    fn subscribed_schemas_for_entities_generation(&self) -> Vec<String> {
        vec![WILDCARD_SCHEMA.to_string()]
    }

    fn transition(&self, event: &Event, state: Option<Arc<dyn State>>) -> Option<Arc<dyn State>> {
        if let Some(received) = DeepLinkReceived::from_event(event) {
            return Some(Arc::new(DeepLinkState {
                url: received.url,
                referrer: received.referrer,
                ready_for_output: false,
            }));
        }

        match state.as_deref().and_then(|s| s.downcast_ref::<DeepLinkState>()) {
            Some(link) if !link.ready_for_output => Some(Arc::new(DeepLinkState {
                ready_for_output: true,
                ..link.clone()
            })),
            _ => None,
        }
    }

    fn entities(&self, _event: &Event, state: Option<&dyn State>) -> Option<Vec<SelfDescribingJson>> {
        let link = state
            .and_then(|s| s.downcast_ref::<DeepLinkState>())
            .filter(|link| link.ready_for_output)?;
        let entity = DeepLinkEntity {
            url: link.url.clone(),
            referrer: link.referrer.clone(),
        };
        Some(vec![entity.to_json()])
    }
}
