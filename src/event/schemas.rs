//! Schema URIs of the events and entities the built-in machines understand.

pub const APPLICATION_BACKGROUND: &str =
    "iglu:dev.contextflow.mobile/application_background/jsonschema/1-0-0";
pub const APPLICATION_FOREGROUND: &str =
    "iglu:dev.contextflow.mobile/application_foreground/jsonschema/1-0-0";
pub const DEEP_LINK_RECEIVED: &str =
    "iglu:dev.contextflow.mobile/deep_link_received/jsonschema/1-0-0";
pub const SCREEN_VIEW: &str = "iglu:dev.contextflow.mobile/screen_view/jsonschema/1-0-0";
pub const OPEN_IMMERSIVE_SPACE: &str =
    "iglu:dev.contextflow.spatial/open_immersive_space/jsonschema/1-0-0";
pub const DISMISS_IMMERSIVE_SPACE: &str =
    "iglu:dev.contextflow.spatial/dismiss_immersive_space/jsonschema/1-0-0";

// Entities
pub const LIFECYCLE_ENTITY: &str =
    "iglu:dev.contextflow.mobile/application_lifecycle/jsonschema/1-0-0";
pub const DEEP_LINK_ENTITY: &str = "iglu:dev.contextflow.mobile/deep_link/jsonschema/1-0-0";
pub const SCREEN_ENTITY: &str = "iglu:dev.contextflow.mobile/screen/jsonschema/1-0-0";
pub const IMMERSIVE_SPACE_ENTITY: &str =
    "iglu:dev.contextflow.spatial/immersive_space/jsonschema/1-0-0";
