//! Hub error types.

use crate::role::Role;

/// Errors returned by the router and event handlers.
///
/// None of these close the connection; the inbound loop logs them and keeps
/// reading.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// No handler is registered for the envelope's `type`.
    #[error("there is no such event type: {0}")]
    UnknownEventType(String),

    /// The origin's role has no audience.
    #[error("unknown client role: {0}")]
    UnknownRole(Role),

    /// The envelope payload does not match the event's payload shape.
    #[error("bad payload in request: {0}")]
    BadPayload(#[source] serde_json::Error),

    /// The frame is not a valid envelope.
    #[error("error decoding event: {0}")]
    Decode(#[source] serde_json::Error),

    /// An outbound envelope could not be serialized.
    #[error("failed to encode event: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failure to hand a message to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The receiver was busy on every attempt.
    #[error("failed to send message after {attempts} attempts")]
    Exhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The recipient's outbound loop is gone.
    #[error("delivery queue closed")]
    Closed,
}
