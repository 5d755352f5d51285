//! Data types shared by the coordinator, its actors and the presentation layer.
//!
//! Everything here is a plain value: snapshots handed to observers are copies,
//! never references into actor-owned state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default advisory lock duration.
pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(10);

/// Target name recorded when a moderation target is not in the channel.
pub const UNKNOWN_TARGET_NAME: &str = "Unknown";

/// Role of a host within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostRole {
    /// Created the session. Exactly one per session, never removable.
    Owner,
    CoHost,
    Moderator,
}

impl HostRole {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            HostRole::Owner => "owner",
            HostRole::CoHost => "co_host",
            HostRole::Moderator => "moderator",
        }
    }
}

/// An operator of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub user_id: String,
    pub display_name: String,
    pub role: HostRole,
    pub online: bool,
}

/// The four independent voice-state flags of a channel occupant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceFlags {
    pub server_muted: bool,
    pub server_deafened: bool,
    pub self_muted: bool,
    pub self_deafened: bool,
}

/// Kind of moderation action recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModerationType {
    Mute,
    Unmute,
    Deaf,
    Undeaf,
    Disconnect,
    Move,
}

impl ModerationType {
    /// Returns the action as a string for metric labels and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ModerationType::Mute => "mute",
            ModerationType::Unmute => "unmute",
            ModerationType::Deaf => "deaf",
            ModerationType::Undeaf => "undeaf",
            ModerationType::Disconnect => "disconnect",
            ModerationType::Move => "move",
        }
    }

    /// Mute or Unmute depending on the desired state.
    #[must_use]
    pub const fn mute(desired: bool) -> Self {
        if desired {
            ModerationType::Mute
        } else {
            ModerationType::Unmute
        }
    }

    /// Deaf or Undeaf depending on the desired state.
    #[must_use]
    pub const fn deafen(desired: bool) -> Self {
        if desired {
            ModerationType::Deaf
        } else {
            ModerationType::Undeaf
        }
    }
}

/// One immutable record of an attempted moderation action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub host_id: String,
    pub host_name: String,
    pub action: ModerationType,
    pub target_id: String,
    pub target_name: String,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Per-session moderation policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPolicy {
    /// Server-mute every occupant when the session starts or they join.
    pub auto_mute_on_join: bool,
    /// Server-deafen every occupant when the session starts or they join.
    pub auto_deafen_on_join: bool,
    /// How long a `try_lock` claim lasts.
    pub lock_duration: Duration,
}

impl Default for EventPolicy {
    fn default() -> Self {
        Self {
            auto_mute_on_join: false,
            auto_deafen_on_join: false,
            lock_duration: DEFAULT_LOCK_DURATION,
        }
    }
}

impl EventPolicy {
    /// Policy with the given lock duration and no auto-moderation.
    #[must_use]
    pub fn with_lock_duration(lock_duration: Duration) -> Self {
        Self {
            lock_duration,
            ..Self::default()
        }
    }
}

/// Session lifecycle: `Starting -> Live -> Ending -> (removed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Starting,
    Live,
    Ending,
}

impl SessionStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Starting => "starting",
            SessionStatus::Live => "live",
            SessionStatus::Ending => "ending",
        }
    }
}

/// Participant as seen by observers.
///
/// `locked_by` and `lock_remaining` are only set while the lock is live at
/// the moment the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub user_id: String,
    pub display_name: String,
    pub voice: VoiceFlags,
    pub locked_by: Option<String>,
    pub lock_remaining: Option<Duration>,
}

/// Full copy of one session's state, carried by "session updated" notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub guild_id: String,
    pub guild_name: String,
    pub channel_id: String,
    pub channel_name: String,
    pub status: SessionStatus,
    pub hosts: Vec<Host>,
    pub participants: Vec<ParticipantInfo>,
    pub audit_log: Vec<AuditEntry>,
    pub policy: EventPolicy,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    /// The session's owner.
    #[must_use]
    pub fn owner(&self) -> Option<&Host> {
        self.hosts.iter().find(|h| h.role == HostRole::Owner)
    }

    #[must_use]
    pub fn participant(&self, user_id: &str) -> Option<&ParticipantInfo> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }
}

/// Short listing entry returned by `list_sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub guild_name: String,
    pub channel_name: String,
    pub status: SessionStatus,
    pub host_count: usize,
    pub participant_count: usize,
}

impl From<&SessionSnapshot> for SessionSummary {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            session_id: snapshot.session_id.clone(),
            guild_name: snapshot.guild_name.clone(),
            channel_name: snapshot.channel_name.clone(),
            status: snapshot.status,
            host_count: snapshot.hosts.len(),
            participant_count: snapshot.participants.len(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_moderation_type_from_desired_state() {
        assert_eq!(ModerationType::mute(true), ModerationType::Mute);
        assert_eq!(ModerationType::mute(false), ModerationType::Unmute);
        assert_eq!(ModerationType::deafen(true), ModerationType::Deaf);
        assert_eq!(ModerationType::deafen(false), ModerationType::Undeaf);
    }

    #[test]
    fn test_default_policy_lock_duration() {
        let policy = EventPolicy::default();
        assert_eq!(policy.lock_duration, Duration::from_secs(10));
        assert!(!policy.auto_mute_on_join);
        assert!(!policy.auto_deafen_on_join);
    }

    #[test]
    fn test_snapshot_serializes_status_and_flags() {
        let snapshot = SessionSnapshot {
            session_id: "s-1".to_string(),
            guild_id: "g-1".to_string(),
            guild_name: "Guild".to_string(),
            channel_id: "c-1".to_string(),
            channel_name: "Stage".to_string(),
            status: SessionStatus::Live,
            hosts: vec![],
            participants: vec![ParticipantInfo {
                user_id: "u-1".to_string(),
                display_name: "Alice".to_string(),
                voice: VoiceFlags {
                    server_muted: true,
                    ..VoiceFlags::default()
                },
                locked_by: None,
                lock_remaining: None,
            }],
            audit_log: vec![],
            policy: EventPolicy::default(),
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "Live");
        assert_eq!(json["participants"][0]["voice"]["server_muted"], true);
        assert!(json["started_at"].is_null());
    }
}
