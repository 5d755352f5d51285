//! Message types for actor communication.
//!
//! Requests carry a `tokio::sync::oneshot` sender for the reply.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::errors::CoordinatorError;
use crate::model::{EventPolicy, HostRole, ModerationType, SessionSnapshot};
use crate::platform::{VoiceConnectionId, VoiceEventKind};
use crate::session::CreateSessionRequest;

use super::session::SessionActorHandle;

/// Messages sent to `SessionCoordinatorActor`.
#[derive(Debug)]
pub enum CoordinatorMessage {
    /// Spawn a session actor for a new session.
    CreateSession {
        request: CreateSessionRequest,
        respond_to: oneshot::Sender<Result<SessionSnapshot, CoordinatorError>>,
    },

    /// Look up the actor owning a session.
    ResolveSession {
        session_id: String,
        respond_to: oneshot::Sender<Result<SessionActorHandle, CoordinatorError>>,
    },

    /// Route future voice events on `connection_id` to `session_id`.
    BindConnection {
        session_id: String,
        connection_id: VoiceConnectionId,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    /// Look up the session bound to a voice connection.
    ResolveConnection {
        connection_id: VoiceConnectionId,
        respond_to: oneshot::Sender<Option<SessionActorHandle>>,
    },

    /// Drop an ended session from the live set and stop its actor.
    RemoveSession {
        session_id: String,
        respond_to: oneshot::Sender<()>,
    },

    /// Handles of every live session.
    ListSessions {
        respond_to: oneshot::Sender<Vec<SessionActorHandle>>,
    },

    GetStatus {
        respond_to: oneshot::Sender<CoordinatorStatus>,
    },

    /// End every session, then stop.
    Shutdown {
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },
}

/// Messages sent to a `SessionActor`.
#[derive(Debug)]
pub enum SessionMessage {
    /// Join the voice channel and go live.
    Start {
        respond_to: oneshot::Sender<Result<VoiceConnectionId, CoordinatorError>>,
    },

    /// Move to `Ending` and leave the voice channel.
    End {
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    Moderate {
        request: ModerationRequest,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    TryLock {
        participant_id: String,
        host_id: String,
        respond_to: oneshot::Sender<Result<bool, CoordinatorError>>,
    },

    Unlock {
        participant_id: String,
        host_id: String,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    AddHost {
        requester_id: String,
        user_id: String,
        display_name: String,
        role: HostRole,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    RemoveHost {
        requester_id: String,
        user_id: String,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    SetHostOnline {
        requester_id: String,
        host_id: String,
        online: bool,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    SetPolicy {
        requester_id: String,
        policy: EventPolicy,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    /// Adapter voice event for this session's connection.
    VoiceEvent {
        kind: VoiceEventKind,
        /// Whether the registry changed.
        respond_to: oneshot::Sender<bool>,
    },

    GetSnapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
}

/// A moderation command from one host against one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationRequest {
    pub acting_host_id: String,
    pub acting_host_name: String,
    pub target_id: String,
    pub command: ModerationCommand,
}

/// Adapter primitive a moderation request maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationCommand {
    Mute(bool),
    Deafen(bool),
    Disconnect,
    Move { target_channel_id: String },
}

impl ModerationCommand {
    /// Audit action recorded for this command.
    #[must_use]
    pub const fn action(&self) -> ModerationType {
        match self {
            ModerationCommand::Mute(desired) => ModerationType::mute(*desired),
            ModerationCommand::Deafen(desired) => ModerationType::deafen(*desired),
            ModerationCommand::Disconnect => ModerationType::Disconnect,
            ModerationCommand::Move { .. } => ModerationType::Move,
        }
    }
}

/// Coordinator status for health checks and `status()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    pub coordinator_id: String,
    pub session_count: usize,
    /// Voice connections currently routed to a session.
    pub bound_connections: usize,
    pub is_draining: bool,
    pub mailbox_depth: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_command_maps_to_audit_action() {
        assert_eq!(ModerationCommand::Mute(true).action(), ModerationType::Mute);
        assert_eq!(ModerationCommand::Mute(false).action(), ModerationType::Unmute);
        assert_eq!(ModerationCommand::Deafen(true).action(), ModerationType::Deaf);
        assert_eq!(ModerationCommand::Deafen(false).action(), ModerationType::Undeaf);
        assert_eq!(
            ModerationCommand::Disconnect.action(),
            ModerationType::Disconnect
        );
        assert_eq!(
            ModerationCommand::Move {
                target_channel_id: "c-2".to_string()
            }
            .action(),
            ModerationType::Move
        );
    }
}
