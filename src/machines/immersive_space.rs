//! Tracks the immersive space that is currently open.

use super::self_describing;
use crate::core::{State, StateMachine, WILDCARD_SCHEMA};
use crate::event::{
    schemas, DismissImmersiveSpace, Event, ImmersionStyle, OpenImmersiveSpace, SelfDescribing,
    SelfDescribingJson, UpperLimbVisibility,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// The open (or just dismissed) immersive space.
///
/// The state doubles as the entity data, so it serializes with the entity's
/// wire field names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImmersiveSpaceState {
    pub id: String,
    pub view_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immersion_style: Option<ImmersionStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_limb_visibility: Option<UpperLimbVisibility>,
    pub dismissed: bool,
}

impl ImmersiveSpaceState {
    pub(crate) fn opened(open: &OpenImmersiveSpace) -> Self {
        Self {
            id: open.id.clone(),
            view_id: open.view_id,
            immersion_style: open.immersion_style,
            upper_limb_visibility: open.upper_limb_visibility,
            dismissed: false,
        }
    }

    pub fn entity(&self) -> SelfDescribingJson {
        self_describing(schemas::IMMERSIVE_SPACE_ENTITY, self)
    }
}

impl State for ImmersiveSpaceState {
    fn name(&self) -> &str {
        if self.dismissed {
            "Dismissed"
        } else {
            "Open"
        }
    }
}

/// Attaches the immersive space entity to every event while a space is open.
///
/// The open event itself is skipped since it carries the entity already. The
/// dismiss event is the last one to get it.
#[derive(Debug, Default)]
pub struct ImmersiveSpaceStateMachine;

impl ImmersiveSpaceStateMachine {
    pub const IDENTIFIER: &'static str = "ImmersiveSpaceContext";

    pub fn new() -> Self {
        Self
    }
}

impl StateMachine for ImmersiveSpaceStateMachine {
    fn identifier(&self) -> &str {
        Self::IDENTIFIER
    }

    fn subscribed_schemas_for_transitions(&self) -> Vec<String> {
        vec![
            schemas::OPEN_IMMERSIVE_SPACE.to_string(),
            schemas::DISMISS_IMMERSIVE_SPACE.to_string(),
        ]
    }

    fn subscribed_schemas_for_entities_generation(&self) -> Vec<String> {
        vec![WILDCARD_SCHEMA.to_string()]
    }

    fn transition(&self, event: &Event, state: Option<Arc<dyn State>>) -> Option<Arc<dyn State>> {
        let current = state
            .as_deref()
            .and_then(|s| s.downcast_ref::<ImmersiveSpaceState>())
            .filter(|space| !space.dismissed);

        if let Some(open) = OpenImmersiveSpace::from_event(event) {
            if current.is_some_and(|space| space.id == open.id) {
                return state;
            }
            return Some(Arc::new(ImmersiveSpaceState::opened(&open)));
        }

        if let Some(dismiss) = DismissImmersiveSpace::from_event(event) {
            let space = current?;
            if dismiss.id.as_deref().is_some_and(|id| id != space.id) {
                return state;
            }
            return Some(Arc::new(ImmersiveSpaceState {
                dismissed: true,
                ..space.clone()
            }));
        }

        state
    }

    fn entities(&self, event: &Event, state: Option<&dyn State>) -> Option<Vec<SelfDescribingJson>> {
        if event.schema() == Some(schemas::OPEN_IMMERSIVE_SPACE) {
            return None;
        }
        let space = state.and_then(|s| s.downcast_ref::<ImmersiveSpaceState>())?;
        if space.dismissed && event.schema() != Some(schemas::DISMISS_IMMERSIVE_SPACE) {
            return None;
        }
        Some(vec![space.entity()])
    }
}
