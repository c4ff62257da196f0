//! Payload mutation errors.

use thiserror::Error;

/// Reasons a payload value is rejected by [`Event::add_payload_values`](super::Event::add_payload_values).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PayloadError {
    #[error("Payload key '{key}' is already present and will not be overwritten")]
    KeyAlreadyPresent { key: String },

    #[error("Payload keys must not be empty")]
    EmptyKey,
}
