//! Errors from assembling plugin state machines.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Plugin identifier is empty. Pass a non-empty identifier to the builder")]
    MissingIdentifier,

    #[error("Plugin {identifier} has no hooks. Add .entities(), .after_track() or .filter()")]
    NoCapabilities { identifier: String },
}
