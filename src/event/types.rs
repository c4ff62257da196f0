//! Typed views of the self-describing events the built-in machines react to.

use super::{schemas, Event, Payload, SelfDescribingJson};
use crate::machines::immersive_space::ImmersiveSpaceState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A typed event with a fixed schema whose fields live in the payload.
///
/// `into_event` and `from_event` convert through the payload map, so a
/// machine can recover the typed view of any event it is routed.
///
/// # Example
///
/// ```rust
/// use contextflow::event::{DeepLinkReceived, SelfDescribing};
///
/// let event = DeepLinkReceived::new("https://example.com/promo").into_event();
/// let typed = DeepLinkReceived::from_event(&event).unwrap();
/// assert_eq!(typed.url, "https://example.com/promo");
/// ```
pub trait SelfDescribing: Serialize + DeserializeOwned {
    const SCHEMA: &'static str;

    fn payload(&self) -> Payload {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Payload::new(),
        }
    }

    /// Entities the event carries by construction.
    fn entities(&self) -> Vec<SelfDescribingJson> {
        Vec::new()
    }

    fn into_event(self) -> Event
    where
        Self: Sized,
    {
        let entities = self.entities();
        Event::self_describing(Self::SCHEMA, self.payload()).with_entities(entities)
    }

    /// Recover the typed event, or `None` if `event` has another schema or
    /// its payload does not fit.
    fn from_event(event: &Event) -> Option<Self>
    where
        Self: Sized,
    {
        if event.schema() != Some(Self::SCHEMA) {
            return None;
        }
        serde_json::from_value(Value::Object(event.payload().clone())).ok()
    }
}

/// Application moved to the background.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Background {
    #[serde(rename = "backgroundIndex")]
    pub index: i64,
}

impl SelfDescribing for Background {
    const SCHEMA: &'static str = schemas::APPLICATION_BACKGROUND;
}

/// Application returned to the foreground.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Foreground {
    #[serde(rename = "foregroundIndex")]
    pub index: i64,
}

impl SelfDescribing for Foreground {
    const SCHEMA: &'static str = schemas::APPLICATION_FOREGROUND;
}

/// The application was opened through a deep link.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeepLinkReceived {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

impl DeepLinkReceived {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referrer: None,
        }
    }

    pub fn referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }
}

impl SelfDescribing for DeepLinkReceived {
    const SCHEMA: &'static str = schemas::DEEP_LINK_RECEIVED;
}

/// A screen was shown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenView {
    pub name: String,
    pub id: Uuid,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub screen_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_type: Option<String>,
}

impl ScreenView {
    /// Screen view with a freshly generated screen id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Uuid::new_v4(),
            screen_type: None,
            transition_type: None,
        }
    }

    pub fn screen_type(mut self, screen_type: impl Into<String>) -> Self {
        self.screen_type = Some(screen_type.into());
        self
    }

    pub fn transition_type(mut self, transition_type: impl Into<String>) -> Self {
        self.transition_type = Some(transition_type.into());
        self
    }
}

impl SelfDescribing for ScreenView {
    const SCHEMA: &'static str = schemas::SCREEN_VIEW;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImmersionStyle {
    Automatic,
    Full,
    Mixed,
    Progressive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpperLimbVisibility {
    Automatic,
    Visible,
    Hidden,
}

/// An immersive space was opened.
///
/// The event carries the immersive space entity itself; the immersive space
/// machine takes over for the events that follow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenImmersiveSpace {
    pub id: String,
    pub view_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immersion_style: Option<ImmersionStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_limb_visibility: Option<UpperLimbVisibility>,
}

impl OpenImmersiveSpace {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            view_id: Uuid::new_v4(),
            immersion_style: None,
            upper_limb_visibility: None,
        }
    }

    pub fn immersion_style(mut self, style: ImmersionStyle) -> Self {
        self.immersion_style = Some(style);
        self
    }

    pub fn upper_limb_visibility(mut self, visibility: UpperLimbVisibility) -> Self {
        self.upper_limb_visibility = Some(visibility);
        self
    }
}

impl SelfDescribing for OpenImmersiveSpace {
    const SCHEMA: &'static str = schemas::OPEN_IMMERSIVE_SPACE;

    fn entities(&self) -> Vec<SelfDescribingJson> {
        vec![ImmersiveSpaceState::opened(self).entity()]
    }
}

/// The open immersive space was dismissed.
///
/// Without an `id` it dismisses whichever space is open.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DismissImmersiveSpace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl DismissImmersiveSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }
}

impl SelfDescribing for DismissImmersiveSpace {
    const SCHEMA: &'static str = schemas::DISMISS_IMMERSIVE_SPACE;
}
