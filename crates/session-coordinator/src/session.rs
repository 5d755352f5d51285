//! `EventSession` aggregate.
//!
//! One session owns its roster, registry, audit log and policy. Everything in
//! this module is synchronous; the owning `SessionActor` is the only caller
//! and performs the adapter I/O around these transitions.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::audit::{AuditLog, AuditRecord};
use crate::errors::CoordinatorError;
use crate::model::{
    AuditEntry, EventPolicy, Host, HostRole, ModerationType, SessionSnapshot, SessionStatus,
};
use crate::platform::{OccupantSnapshot, VoiceConnectionId, VoiceEventKind};
use crate::registry::{LockOutcome, ParticipantRegistry};
use crate::roster::HostRoster;

/// Identifiers and display names needed to create a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSessionRequest {
    pub guild_id: String,
    pub guild_name: String,
    pub channel_id: String,
    pub channel_name: String,
    pub owner_id: String,
    pub owner_name: String,
}

impl CreateSessionRequest {
    /// Reject empty identifiers.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` naming the first empty identifier.
    pub fn validate(&self) -> Result<(), CoordinatorError> {
        for (field, value) in [
            ("guild_id", &self.guild_id),
            ("channel_id", &self.channel_id),
            ("owner_id", &self.owner_id),
        ] {
            if value.trim().is_empty() {
                return Err(CoordinatorError::InvalidRequest(format!(
                    "{field} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// What a voice event did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceEventOutcome {
    /// A participant was added.
    Joined,
    /// A known participant was refreshed by a join event.
    Refreshed,
    /// A participant was removed.
    Left,
    /// A known participant's flags were overwritten.
    StateChanged,
    /// The event referred to nobody we track.
    Ignored,
}

impl VoiceEventOutcome {
    #[must_use]
    pub const fn changed(&self) -> bool {
        !matches!(self, VoiceEventOutcome::Ignored)
    }
}

/// The unit of coordination.
#[derive(Debug)]
pub struct EventSession {
    session_id: String,
    guild_id: String,
    guild_name: String,
    channel_id: String,
    channel_name: String,
    status: SessionStatus,
    roster: HostRoster,
    participants: ParticipantRegistry,
    audit: AuditLog,
    policy: EventPolicy,
    connection: Option<VoiceConnectionId>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl EventSession {
    /// New session in `Starting` with the owner as sole host.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if any identifier is empty.
    pub fn new(
        session_id: String,
        request: CreateSessionRequest,
        policy: EventPolicy,
    ) -> Result<Self, CoordinatorError> {
        request.validate()?;
        Ok(Self {
            session_id,
            roster: HostRoster::with_owner(&request.owner_id, &request.owner_name),
            guild_id: request.guild_id,
            guild_name: request.guild_name,
            channel_id: request.channel_id,
            channel_name: request.channel_name,
            status: SessionStatus::Starting,
            participants: ParticipantRegistry::new(),
            audit: AuditLog::new(),
            policy,
            connection: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn policy(&self) -> &EventPolicy {
        &self.policy
    }

    #[must_use]
    pub fn connection(&self) -> Option<&VoiceConnectionId> {
        self.connection.as_ref()
    }

    #[must_use]
    pub fn hosts(&self) -> &[Host] {
        self.roster.hosts()
    }

    #[must_use]
    pub fn participants(&self) -> &ParticipantRegistry {
        &self.participants
    }

    #[must_use]
    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// `Ending` sessions accept no further mutation.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` once the session is ending.
    pub fn ensure_active(&self) -> Result<(), CoordinatorError> {
        if self.status == SessionStatus::Ending {
            return Err(CoordinatorError::SessionNotFound(self.session_id.clone()));
        }
        Ok(())
    }

    /// `Starting -> Live` once the adapter confirmed the join.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` unless the session is `Starting`.
    pub fn mark_live(
        &mut self,
        connection: VoiceConnectionId,
        occupants: Vec<OccupantSnapshot>,
    ) -> Result<(), CoordinatorError> {
        if self.status != SessionStatus::Starting {
            return Err(CoordinatorError::InvalidRequest(format!(
                "Session is {}, expected starting",
                self.status.as_str()
            )));
        }
        self.participants.load(occupants);
        self.connection = Some(connection);
        self.status = SessionStatus::Live;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `Starting | Live -> Ending`. Returns the connection to leave, if any.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` if the session is already ending.
    pub fn begin_ending(&mut self) -> Result<Option<VoiceConnectionId>, CoordinatorError> {
        self.ensure_active()?;
        self.status = SessionStatus::Ending;
        self.ended_at = Some(Utc::now());
        Ok(self.connection.take())
    }

    /// Replace the policy. Owner only, before start.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the requester is not the owner.
    /// - `InvalidRequest` if the session already started or the lock duration is zero.
    pub fn set_policy(
        &mut self,
        requester_id: &str,
        policy: EventPolicy,
    ) -> Result<(), CoordinatorError> {
        self.ensure_active()?;
        if !crate::authz::can_manage_hosts(self.roster.hosts(), requester_id) {
            return Err(CoordinatorError::Unauthorized(
                "Only the owner can change the policy".to_string(),
            ));
        }
        if self.status != SessionStatus::Starting {
            return Err(CoordinatorError::InvalidRequest(
                "Policy can only change before the session starts".to_string(),
            ));
        }
        if policy.lock_duration.is_zero() {
            return Err(CoordinatorError::InvalidRequest(
                "Lock duration must be greater than zero".to_string(),
            ));
        }
        self.policy = policy;
        Ok(())
    }

    /// # Errors
    ///
    /// See [`HostRoster::add`].
    pub fn add_host(
        &mut self,
        requester_id: &str,
        user_id: &str,
        display_name: &str,
        role: HostRole,
    ) -> Result<(), CoordinatorError> {
        self.ensure_active()?;
        self.roster.add(requester_id, user_id, display_name, role)
    }

    /// # Errors
    ///
    /// See [`HostRoster::remove`].
    pub fn remove_host(&mut self, requester_id: &str, user_id: &str) -> Result<Host, CoordinatorError> {
        self.ensure_active()?;
        self.roster.remove(requester_id, user_id)
    }

    /// Update a host's presence. A host may update its own; the owner may update anyone's.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the requester is neither `host_id` nor the owner.
    /// - `InvalidRequest` if the host is unknown.
    pub fn set_host_online(
        &mut self,
        requester_id: &str,
        host_id: &str,
        online: bool,
    ) -> Result<(), CoordinatorError> {
        self.ensure_active()?;
        let is_owner = crate::authz::can_manage_hosts(self.roster.hosts(), requester_id);
        if requester_id != host_id && !is_owner {
            return Err(CoordinatorError::Unauthorized(
                "Only the host or the owner can change presence".to_string(),
            ));
        }
        if self.roster.set_online(host_id, online) {
            Ok(())
        } else {
            Err(CoordinatorError::InvalidRequest(
                "Host not in session".to_string(),
            ))
        }
    }

    /// Advisory lock using the session's policy duration.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` once ending.
    pub fn try_lock(
        &mut self,
        user_id: &str,
        host_id: &str,
        now: Instant,
    ) -> Result<LockOutcome, CoordinatorError> {
        self.ensure_active()?;
        let duration = self.policy.lock_duration;
        Ok(self.participants.try_lock(user_id, host_id, now, duration))
    }

    /// # Errors
    ///
    /// `SessionNotFound` once ending.
    pub fn unlock(&mut self, user_id: &str, host_id: &str) -> Result<Option<bool>, CoordinatorError> {
        self.ensure_active()?;
        Ok(self.participants.unlock(user_id, host_id))
    }

    /// Append one audit entry and return the stored copy.
    pub fn record_attempt(
        &mut self,
        record: AuditRecord<'_>,
        success: bool,
        error_message: Option<&str>,
    ) -> AuditEntry {
        self.audit.append(record, success, error_message)
    }

    /// Reflect a successful adapter call in the registry.
    ///
    /// Mute/Deaf variants set the server flag; Disconnect and Move remove the
    /// participant from the monitored channel.
    pub fn apply_moderation(&mut self, action: ModerationType, target_id: &str) {
        match action {
            ModerationType::Mute | ModerationType::Unmute => {
                if let Some(p) = self.participants.get_mut(target_id) {
                    p.voice.server_muted = action == ModerationType::Mute;
                }
            }
            ModerationType::Deaf | ModerationType::Undeaf => {
                if let Some(p) = self.participants.get_mut(target_id) {
                    p.voice.server_deafened = action == ModerationType::Deaf;
                }
            }
            ModerationType::Disconnect | ModerationType::Move => {
                self.participants.remove(target_id);
            }
        }
    }

    /// Apply an adapter voice event. Only `Live` sessions track occupants.
    pub fn apply_voice_event(&mut self, kind: VoiceEventKind) -> VoiceEventOutcome {
        if self.status != SessionStatus::Live {
            return VoiceEventOutcome::Ignored;
        }
        match kind {
            VoiceEventKind::UserJoined(occupant) => {
                if self.participants.upsert(occupant) {
                    VoiceEventOutcome::Joined
                } else {
                    VoiceEventOutcome::Refreshed
                }
            }
            VoiceEventKind::UserLeft { user_id } => match self.participants.remove(&user_id) {
                Some(_) => VoiceEventOutcome::Left,
                None => VoiceEventOutcome::Ignored,
            },
            VoiceEventKind::UserStateChanged(occupant) => {
                if self
                    .participants
                    .apply_voice_state(&occupant.user_id, occupant.voice)
                {
                    VoiceEventOutcome::StateChanged
                } else {
                    VoiceEventOutcome::Ignored
                }
            }
        }
    }

    /// Deep copy of the current state with locks evaluated at `now`.
    #[must_use]
    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            guild_id: self.guild_id.clone(),
            guild_name: self.guild_name.clone(),
            channel_id: self.channel_id.clone(),
            channel_name: self.channel_name.clone(),
            status: self.status,
            hosts: self.roster.hosts().to_vec(),
            participants: self.participants.snapshot(now),
            audit_log: self.audit.entries().to_vec(),
            policy: self.policy.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}
