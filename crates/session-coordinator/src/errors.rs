//! Session coordinator error types.
//!
//! Expected failures of moderation calls (missing participant, denied
//! authorization, adapter failure) are reported through these values and an
//! audit entry, never through a panic. Internal details are logged but kept
//! out of [`CoordinatorError::client_message`].

use std::time::Duration;

use thiserror::Error;

/// Session coordinator error type.
///
/// Maps to bounded kind labels (see [`CoordinatorError::kind`]):
/// - `SessionNotFound`: `session_not_found`
/// - `ParticipantNotFound`: `participant_not_found`
/// - `Unauthorized`: `unauthorized`
/// - `AdapterFailure`: `platform_failure`
/// - `JoinTimeout`: `join_timeout`
/// - `InvalidRequest`: `invalid_request`
/// - `Internal`: `internal`
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// No live session with this id.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Target participant is not in the monitored voice channel.
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    /// Acting host lacks the role required for the action.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The voice platform adapter reported failure.
    #[error("Platform call failed: {0}")]
    AdapterFailure(String),

    /// Session start exceeded the configured wait for the voice connection.
    #[error("Timed out after {0:?} waiting for the voice connection")]
    JoinTimeout(Duration),

    /// Malformed identifiers, duplicate host, removing the owner, bad transition.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Actor mailbox failure (channel closed, response dropped).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure reported by the voice platform adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    /// The platform refused the request.
    #[error("rejected: {0}")]
    Rejected(String),

    /// No voice connection is open for the request.
    #[error("not connected to a voice channel")]
    NotConnected,

    /// The platform could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl CoordinatorError {
    /// Returns a stable, bounded label for metrics and presentation mapping.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            CoordinatorError::SessionNotFound(_) => "session_not_found",
            CoordinatorError::ParticipantNotFound(_) => "participant_not_found",
            CoordinatorError::Unauthorized(_) => "unauthorized",
            CoordinatorError::AdapterFailure(_) => "platform_failure",
            CoordinatorError::JoinTimeout(_) => "join_timeout",
            CoordinatorError::InvalidRequest(_) => "invalid_request",
            CoordinatorError::Internal(_) => "internal",
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            CoordinatorError::SessionNotFound(_) => "Session not found".to_string(),
            CoordinatorError::ParticipantNotFound(_) => {
                "Participant is not in the voice channel".to_string()
            }
            CoordinatorError::Unauthorized(_) => {
                "You are not allowed to perform this action".to_string()
            }
            CoordinatorError::AdapterFailure(_) => "The voice platform call failed".to_string(),
            CoordinatorError::JoinTimeout(_) => {
                "Timed out connecting to the voice channel".to_string()
            }
            CoordinatorError::InvalidRequest(msg) => msg.clone(),
            CoordinatorError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

impl From<PlatformError> for CoordinatorError {
    fn from(err: PlatformError) -> Self {
        CoordinatorError::AdapterFailure(err.to_string())
    }
}
