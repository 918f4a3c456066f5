//! Error Types and Failure Signals
//!
//! Defines the error taxonomy for the engine:
//!
//! - `RemoteError` - remote write/read call failures
//! - `ConfirmationFailure` - per-request failure detail delivered to a
//!   confirmation request's fail phase (remote error or finality timeout)
//! - `MutationFailure` - typed signal surfaced to the application when a
//!   collection mutation ultimately fails
//!
//! Finality timeouts and remote rejections both route to exactly one
//! `on_fail` invocation; corrupted-remote-state errors are repaired
//! internally (see [`crate::reconciler`]) and only surface here when the
//! bounded repair also fails.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from remote service calls.
#[derive(Debug, Error, Clone)]
pub enum RemoteError {
    /// Transport-level network failure.
    #[error("network error: {0}")]
    Network(String),

    /// The backend rejected the write.
    #[error("rejected by backend: {0}")]
    Rejected(String),

    /// A referenced entity does not exist on the backend.
    #[error("not found: {0}")]
    NotFound(String),

    /// Response payload could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Create a network error from any displayable cause.
    pub fn network(cause: impl std::fmt::Display) -> Self {
        Self::Network(cause.to_string())
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Failure detail handed to a confirmation request's fail phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationFailure {
    /// The write was accepted but never observed finalized in budget.
    pub timed_out: bool,
    /// Human-readable detail (empty for pure timeouts).
    pub message: String,
}

impl ConfirmationFailure {
    /// Failure caused by the remote call itself.
    pub fn remote(message: impl Into<String>) -> Self {
        Self {
            timed_out: false,
            message: message.into(),
        }
    }

    /// Failure caused by the finality wait expiring.
    pub fn timeout() -> Self {
        Self {
            timed_out: true,
            message: String::new(),
        }
    }
}

/// Category of collection mutation, used in failure signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    Create,
    Edit,
    AddItem,
    RemoveItem,
    Reorder,
    Publish,
    Delete,
}

/// Typed failure signal surfaced to the application layer.
///
/// Delivered over the engine's failure channel; intended for a generic
/// handler that logs, reports, and optionally redirects the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationFailure {
    /// Which mutation failed.
    pub mutation: MutationKind,
    /// Collection the mutation targeted (temp or real id).
    pub collection_id: String,
    /// Original mutation parameters, for reporting.
    pub params: serde_json::Value,
    /// Error detail from the remote call (empty for pure timeouts).
    pub error: String,
    /// The finality wait expired.
    pub timed_out: bool,
}

impl MutationFailure {
    /// Whether the application should redirect the user away after this
    /// failure.
    ///
    /// Item-level failures (add/remove/reorder) leave partially applied
    /// optimistic state that is acceptable to keep showing, so no
    /// redirect is warranted for them.
    pub fn should_redirect(&self) -> bool {
        !matches!(
            self.mutation,
            MutationKind::AddItem | MutationKind::RemoveItem | MutationKind::Reorder
        )
    }
}
