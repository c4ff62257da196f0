//! Built-in state machines and the closure-based plugin machine.
//!
//! - [`LifecycleStateMachine`]: application foreground/background visibility
//! - [`DeepLinkStateMachine`]: the deep link that opened the app, attached to
//!   the first event after it
//! - [`ScreenStateMachine`]: current screen entity and previous-screen payload
//! - [`ImmersiveSpaceStateMachine`]: the immersive space currently open
//! - [`PluginStateMachine`]: entities, filter and after-track behavior
//!   assembled from closures

pub mod deep_link;
pub mod immersive_space;
pub mod lifecycle;
pub mod plugin;
pub mod screen;

pub use deep_link::{DeepLinkEntity, DeepLinkState, DeepLinkStateMachine};
pub use immersive_space::{ImmersiveSpaceState, ImmersiveSpaceStateMachine};
pub use lifecycle::{LifecycleEntity, LifecycleState, LifecycleStateMachine};
pub use plugin::{BuildError, PluginBuilder, PluginHook, PluginStateMachine};
pub use screen::{ScreenEntity, ScreenState, ScreenStateMachine};

use crate::event::SelfDescribingJson;
use serde::Serialize;

/// Wrap serializable entity data with its schema.
pub(crate) fn self_describing<T: Serialize>(schema: &str, data: &T) -> SelfDescribingJson {
    SelfDescribingJson::new(schema, serde_json::to_value(data).unwrap_or_default())
}
