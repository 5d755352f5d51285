//! `SessionActor` - one per session, owns the `EventSession`.
//!
//! Every operation on a session is a message to this actor, so operations on
//! the same session run one at a time, adapter awaits included. A lock check
//! and the action it brackets can never interleave with another host's call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::audit::AuditRecord;
use crate::authz;
use crate::errors::CoordinatorError;
use crate::model::{
    EventPolicy, HostRole, ModerationType, SessionSnapshot, SessionStatus, UNKNOWN_TARGET_NAME,
};
use crate::notify::{NotificationHub, SessionNotification};
use crate::observability::metrics as obs;
use crate::platform::{VoiceConnectionId, VoiceEventKind, VoicePlatform};
use crate::registry::LockOutcome;
use crate::session::{EventSession, VoiceEventOutcome};

use super::messages::{ModerationCommand, ModerationRequest, SessionMessage};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

/// Session actor mailbox size.
const SESSION_CHANNEL_BUFFER: usize = 256;

/// Audit messages for failed attempts.
const MSG_PARTICIPANT_NOT_FOUND: &str = "participant not in voice channel";
const MSG_UNAUTHORIZED: &str = "unauthorized";
const MSG_PLATFORM_FAILURE: &str = "platform call failed";

/// Handle to a `SessionActor`.
#[derive(Debug, Clone)]
pub struct SessionActorHandle {
    sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
    session_id: String,
}

impl SessionActorHandle {
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send a request and wait for the reply.
    ///
    /// The actor only stops once its session has been removed, so a closed
    /// mailbox, or a request dropped unanswered when the actor stopped, is
    /// reported as `SessionNotFound`.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionMessage,
    ) -> Result<T, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| CoordinatorError::SessionNotFound(self.session_id.clone()))?;

        rx.await
            .map_err(|_| CoordinatorError::SessionNotFound(self.session_id.clone()))
    }

    /// Join the voice channel and go live.
    pub async fn start(&self) -> Result<VoiceConnectionId, CoordinatorError> {
        self.request(|respond_to| SessionMessage::Start { respond_to })
            .await?
    }

    pub async fn end(&self) -> Result<(), CoordinatorError> {
        self.request(|respond_to| SessionMessage::End { respond_to })
            .await?
    }

    pub async fn moderate(&self, request: ModerationRequest) -> Result<(), CoordinatorError> {
        self.request(|respond_to| SessionMessage::Moderate {
            request,
            respond_to,
        })
        .await?
    }

    pub async fn try_lock(
        &self,
        participant_id: String,
        host_id: String,
    ) -> Result<bool, CoordinatorError> {
        self.request(|respond_to| SessionMessage::TryLock {
            participant_id,
            host_id,
            respond_to,
        })
        .await?
    }

    pub async fn unlock(
        &self,
        participant_id: String,
        host_id: String,
    ) -> Result<(), CoordinatorError> {
        self.request(|respond_to| SessionMessage::Unlock {
            participant_id,
            host_id,
            respond_to,
        })
        .await?
    }

    pub async fn add_host(
        &self,
        requester_id: String,
        user_id: String,
        display_name: String,
        role: HostRole,
    ) -> Result<(), CoordinatorError> {
        self.request(|respond_to| SessionMessage::AddHost {
            requester_id,
            user_id,
            display_name,
            role,
            respond_to,
        })
        .await?
    }

    pub async fn remove_host(
        &self,
        requester_id: String,
        user_id: String,
    ) -> Result<(), CoordinatorError> {
        self.request(|respond_to| SessionMessage::RemoveHost {
            requester_id,
            user_id,
            respond_to,
        })
        .await?
    }

    pub async fn set_host_online(
        &self,
        requester_id: String,
        host_id: String,
        online: bool,
    ) -> Result<(), CoordinatorError> {
        self.request(|respond_to| SessionMessage::SetHostOnline {
            requester_id,
            host_id,
            online,
            respond_to,
        })
        .await?
    }

    pub async fn set_policy(
        &self,
        requester_id: String,
        policy: EventPolicy,
    ) -> Result<(), CoordinatorError> {
        self.request(|respond_to| SessionMessage::SetPolicy {
            requester_id,
            policy,
            respond_to,
        })
        .await?
    }

    /// Deliver a voice event. Returns whether the registry changed.
    pub async fn voice_event(&self, kind: VoiceEventKind) -> Result<bool, CoordinatorError> {
        self.request(|respond_to| SessionMessage::VoiceEvent { kind, respond_to })
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, CoordinatorError> {
        self.request(|respond_to| SessionMessage::GetSnapshot { respond_to })
            .await
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// Collaborators a session actor needs besides its session.
#[derive(Clone)]
pub struct SessionContext {
    pub platform: Arc<dyn VoicePlatform>,
    pub notifications: NotificationHub,
    pub metrics: Arc<ActorMetrics>,
    pub join_timeout: Duration,
}

/// Actor owning one `EventSession`.
pub struct SessionActor {
    session: EventSession,
    receiver: mpsc::Receiver<SessionMessage>,
    cancel_token: CancellationToken,
    ctx: SessionContext,
    mailbox: MailboxMonitor,
}

impl SessionActor {
    /// Spawn the actor and return its handle and task handle.
    pub fn spawn(
        session: EventSession,
        cancel_token: CancellationToken,
        ctx: SessionContext,
    ) -> (SessionActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_BUFFER);
        let session_id = session.session_id().to_string();

        let actor = Self {
            mailbox: MailboxMonitor::new(ActorType::Session, &session_id),
            session,
            receiver,
            cancel_token: cancel_token.clone(),
            ctx,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = SessionActorHandle {
            sender,
            cancel_token,
            session_id,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "sc.actor.session", fields(session_id = %self.session.session_id()))]
    async fn run(mut self) {
        debug!(
            target: "sc.actor.session",
            session_id = %self.session.session_id(),
            "SessionActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "sc.actor.session",
                        session_id = %self.session.session_id(),
                        "SessionActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                            self.ctx.metrics.record_message_processed();
                        }
                        None => {
                            debug!(
                                target: "sc.actor.session",
                                session_id = %self.session.session_id(),
                                "SessionActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        debug!(
            target: "sc.actor.session",
            session_id = %self.session.session_id(),
            status = self.session.status().as_str(),
            messages_processed = self.mailbox.messages_processed(),
            "SessionActor stopped"
        );
    }

    async fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Start { respond_to } => {
                let result = self.start().await;
                let _ = respond_to.send(result);
            }

            SessionMessage::End { respond_to } => {
                let result = self.end().await;
                let _ = respond_to.send(result);
            }

            SessionMessage::Moderate {
                request,
                respond_to,
            } => {
                let result = self.moderate(request).await;
                let _ = respond_to.send(result);
            }

            SessionMessage::TryLock {
                participant_id,
                host_id,
                respond_to,
            } => {
                let result = self.try_lock(&participant_id, &host_id);
                let _ = respond_to.send(result);
            }

            SessionMessage::Unlock {
                participant_id,
                host_id,
                respond_to,
            } => {
                let result = self.unlock(&participant_id, &host_id);
                let _ = respond_to.send(result);
            }

            SessionMessage::AddHost {
                requester_id,
                user_id,
                display_name,
                role,
                respond_to,
            } => {
                let result = self
                    .session
                    .add_host(&requester_id, &user_id, &display_name, role);
                if result.is_ok() {
                    info!(
                        target: "sc.actor.session",
                        session_id = %self.session.session_id(),
                        host_id = %user_id,
                        role = role.as_str(),
                        "Host added"
                    );
                }
                let _ = respond_to.send(self.publish_on_success(result));
            }

            SessionMessage::RemoveHost {
                requester_id,
                user_id,
                respond_to,
            } => {
                let result = self.session.remove_host(&requester_id, &user_id).map(|_| ());
                if result.is_ok() {
                    info!(
                        target: "sc.actor.session",
                        session_id = %self.session.session_id(),
                        host_id = %user_id,
                        "Host removed"
                    );
                }
                let _ = respond_to.send(self.publish_on_success(result));
            }

            SessionMessage::SetHostOnline {
                requester_id,
                host_id,
                online,
                respond_to,
            } => {
                let result = self
                    .session
                    .set_host_online(&requester_id, &host_id, online);
                let _ = respond_to.send(self.publish_on_success(result));
            }

            SessionMessage::SetPolicy {
                requester_id,
                policy,
                respond_to,
            } => {
                let result = self.session.set_policy(&requester_id, policy);
                let _ = respond_to.send(self.publish_on_success(result));
            }

            SessionMessage::VoiceEvent { kind, respond_to } => {
                let changed = self.voice_event(kind).await;
                let _ = respond_to.send(changed);
            }

            SessionMessage::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot(Instant::now())
    }

    fn publish_update(&self) {
        self.ctx
            .notifications
            .publish(SessionNotification::SessionUpdated(self.snapshot()));
    }

    fn publish_on_success(
        &self,
        result: Result<(), CoordinatorError>,
    ) -> Result<(), CoordinatorError> {
        if result.is_ok() {
            self.publish_update();
        }
        result
    }

    /// `Starting -> Live`.
    #[instrument(skip_all, fields(session_id = %self.session.session_id()))]
    async fn start(&mut self) -> Result<VoiceConnectionId, CoordinatorError> {
        if self.session.status() != SessionStatus::Starting {
            self.session.ensure_active()?;
            return Err(CoordinatorError::InvalidRequest(
                "Session has already started".to_string(),
            ));
        }

        let started = Instant::now();
        let guild_id = self.session.guild_id().to_string();
        let channel_id = self.session.channel_id().to_string();

        let joined = tokio::time::timeout(
            self.ctx.join_timeout,
            self.ctx.platform.join_channel(&guild_id, &channel_id),
        )
        .await;

        let connection = match joined {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                warn!(
                    target: "sc.actor.session",
                    session_id = %self.session.session_id(),
                    error = %e,
                    "Voice join failed, session stays starting"
                );
                obs::record_session_start_failure("platform_failure");
                return Err(e.into());
            }
            Err(_) => {
                warn!(
                    target: "sc.actor.session",
                    session_id = %self.session.session_id(),
                    timeout_secs = self.ctx.join_timeout.as_secs(),
                    "Voice join timed out, session stays starting"
                );
                obs::record_session_start_failure("join_timeout");
                return Err(CoordinatorError::JoinTimeout(self.ctx.join_timeout));
            }
        };

        let occupants = match self
            .ctx
            .platform
            .list_occupants(&guild_id, &channel_id)
            .await
        {
            Ok(occupants) => occupants,
            Err(e) => {
                warn!(
                    target: "sc.actor.session",
                    session_id = %self.session.session_id(),
                    error = %e,
                    "Listing occupants failed, leaving channel"
                );
                if let Err(leave_err) = self.ctx.platform.leave_channel(&connection).await {
                    warn!(
                        target: "sc.actor.session",
                        session_id = %self.session.session_id(),
                        error = %leave_err,
                        "Leaving channel after failed start also failed"
                    );
                }
                obs::record_session_start_failure("platform_failure");
                return Err(e.into());
            }
        };

        self.session.mark_live(connection.clone(), occupants)?;

        let user_ids: Vec<String> = self
            .session
            .participants()
            .iter()
            .map(|p| p.user_id.clone())
            .collect();
        for user_id in &user_ids {
            self.apply_join_policy(user_id).await;
        }

        obs::record_session_start_duration(started.elapsed());
        info!(
            target: "sc.actor.session",
            session_id = %self.session.session_id(),
            connection_id = %connection,
            participants = self.session.participants().len(),
            "Session live"
        );

        self.publish_update();
        Ok(connection)
    }

    /// Best-effort auto mute/deafen of one participant. Failures are logged only.
    async fn apply_join_policy(&mut self, user_id: &str) {
        let policy = self.session.policy().clone();
        let guild_id = self.session.guild_id().to_string();

        if policy.auto_mute_on_join {
            match self.ctx.platform.set_mute(&guild_id, user_id, true).await {
                Ok(()) => self.session.apply_moderation(ModerationType::Mute, user_id),
                Err(e) => warn!(
                    target: "sc.actor.session",
                    session_id = %self.session.session_id(),
                    user_id = %user_id,
                    error = %e,
                    "Auto-mute failed"
                ),
            }
        }

        if policy.auto_deafen_on_join {
            match self.ctx.platform.set_deafen(&guild_id, user_id, true).await {
                Ok(()) => self.session.apply_moderation(ModerationType::Deaf, user_id),
                Err(e) => warn!(
                    target: "sc.actor.session",
                    session_id = %self.session.session_id(),
                    user_id = %user_id,
                    error = %e,
                    "Auto-deafen failed"
                ),
            }
        }
    }

    /// `Starting | Live -> Ending`.
    async fn end(&mut self) -> Result<(), CoordinatorError> {
        let connection = self.session.begin_ending()?;

        if let Some(connection) = connection {
            if let Err(e) = self.ctx.platform.leave_channel(&connection).await {
                warn!(
                    target: "sc.actor.session",
                    session_id = %self.session.session_id(),
                    connection_id = %connection,
                    error = %e,
                    "Leaving voice channel failed"
                );
            }
        }

        info!(
            target: "sc.actor.session",
            session_id = %self.session.session_id(),
            audit_entries = self.session.audit_log().len(),
            "Session ending"
        );

        self.publish_update();
        Ok(())
    }

    /// Resolve target, authorize, call the adapter, audit, mutate, publish.
    ///
    /// Participant existence is checked before authorization, so a denied
    /// host still learns whether the target is in the channel.
    #[instrument(
        skip_all,
        fields(
            session_id = %self.session.session_id(),
            host_id = %request.acting_host_id,
            target_id = %request.target_id,
            action = request.command.action().as_str()
        )
    )]
    async fn moderate(&mut self, request: ModerationRequest) -> Result<(), CoordinatorError> {
        self.session.ensure_active()?;

        let action = request.command.action();

        let Some(target_name) = self
            .session
            .participants()
            .get(&request.target_id)
            .map(|p| p.display_name.clone())
        else {
            self.record_and_publish(&request, UNKNOWN_TARGET_NAME, false, Some(MSG_PARTICIPANT_NOT_FOUND));
            obs::record_moderation_action(action.as_str(), "participant_not_found");
            return Err(CoordinatorError::ParticipantNotFound(request.target_id));
        };

        if !authz::is_authorized(self.session.hosts(), &request.acting_host_id, action) {
            self.record_and_publish(&request, &target_name, false, Some(MSG_UNAUTHORIZED));
            obs::record_moderation_action(action.as_str(), "unauthorized");
            debug!(
                target: "sc.actor.session",
                "Moderation denied"
            );
            return Err(CoordinatorError::Unauthorized(format!(
                "{} is not allowed",
                action.as_str()
            )));
        }

        let guild_id = self.session.guild_id().to_string();
        let platform = &self.ctx.platform;
        let result = match &request.command {
            ModerationCommand::Mute(desired) => {
                platform.set_mute(&guild_id, &request.target_id, *desired).await
            }
            ModerationCommand::Deafen(desired) => {
                platform
                    .set_deafen(&guild_id, &request.target_id, *desired)
                    .await
            }
            ModerationCommand::Disconnect => {
                platform.disconnect(&guild_id, &request.target_id).await
            }
            ModerationCommand::Move { target_channel_id } => {
                platform
                    .move_user(&guild_id, &request.target_id, target_channel_id)
                    .await
            }
        };

        match result {
            Ok(()) => {
                self.session.apply_moderation(action, &request.target_id);
                self.record_and_publish(&request, &target_name, true, None);
                obs::record_moderation_action(action.as_str(), "success");
                self.publish_update();
                debug!(
                    target: "sc.actor.session",
                    "Moderation applied"
                );
                Ok(())
            }
            Err(e) => {
                self.record_and_publish(&request, &target_name, false, Some(MSG_PLATFORM_FAILURE));
                obs::record_moderation_action(action.as_str(), "platform_failure");
                self.publish_update();
                warn!(
                    target: "sc.actor.session",
                    error = %e,
                    "Moderation platform call failed"
                );
                Err(e.into())
            }
        }
    }

    /// Append one audit entry and publish it.
    fn record_and_publish(
        &mut self,
        request: &ModerationRequest,
        target_name: &str,
        success: bool,
        error_message: Option<&str>,
    ) {
        let entry = self.session.record_attempt(
            AuditRecord {
                host_id: &request.acting_host_id,
                host_name: &request.acting_host_name,
                action: request.command.action(),
                target_id: &request.target_id,
                target_name,
            },
            success,
            error_message,
        );
        self.ctx
            .notifications
            .publish(SessionNotification::AuditEntryAdded {
                session_id: self.session.session_id().to_string(),
                entry,
            });
    }

    fn try_lock(&mut self, participant_id: &str, host_id: &str) -> Result<bool, CoordinatorError> {
        match self.session.try_lock(participant_id, host_id, Instant::now())? {
            LockOutcome::Acquired => {
                self.publish_update();
                Ok(true)
            }
            LockOutcome::HeldBy(holder) => {
                obs::record_lock_contention();
                debug!(
                    target: "sc.actor.session",
                    session_id = %self.session.session_id(),
                    participant_id = %participant_id,
                    host_id = %host_id,
                    holder = %holder,
                    "Lock held by another host"
                );
                Ok(false)
            }
            LockOutcome::NotFound => Err(CoordinatorError::ParticipantNotFound(
                participant_id.to_string(),
            )),
        }
    }

    fn unlock(&mut self, participant_id: &str, host_id: &str) -> Result<(), CoordinatorError> {
        match self.session.unlock(participant_id, host_id)? {
            Some(true) => {
                self.publish_update();
                Ok(())
            }
            Some(false) => Ok(()),
            None => Err(CoordinatorError::ParticipantNotFound(
                participant_id.to_string(),
            )),
        }
    }

    async fn voice_event(&mut self, kind: VoiceEventKind) -> bool {
        let user_id = kind.user_id().to_string();
        let event = kind.as_str();
        let outcome = self.session.apply_voice_event(kind);

        if outcome == VoiceEventOutcome::Joined {
            self.apply_join_policy(&user_id).await;
        }

        if outcome.changed() {
            debug!(
                target: "sc.actor.session",
                session_id = %self.session.session_id(),
                user_id = %user_id,
                event,
                "Voice event applied"
            );
            self.publish_update();
            true
        } else {
            debug!(
                target: "sc.actor.session",
                session_id = %self.session.session_id(),
                user_id = %user_id,
                event,
                status = self.session.status().as_str(),
                "Voice event ignored"
            );
            false
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::model::VoiceFlags;
    use crate::platform::mock::MockVoicePlatform;
    use crate::platform::OccupantSnapshot;
    use crate::session::CreateSessionRequest;

    fn occupant(user_id: &str) -> OccupantSnapshot {
        OccupantSnapshot {
            user_id: user_id.to_string(),
            display_name: format!("name-{user_id}"),
            voice: VoiceFlags::default(),
        }
    }

    fn spawn_with(
        platform: Arc<MockVoicePlatform>,
    ) -> (SessionActorHandle, NotificationHub, JoinHandle<()>) {
        let session = EventSession::new(
            "s-1".to_string(),
            CreateSessionRequest {
                guild_id: "g".to_string(),
                guild_name: "Guild".to_string(),
                channel_id: "c".to_string(),
                channel_name: "Stage".to_string(),
                owner_id: "owner".to_string(),
                owner_name: "Olivia".to_string(),
            },
            EventPolicy::default(),
        )
        .unwrap();
        let hub = NotificationHub::new(64);
        let ctx = SessionContext {
            platform,
            notifications: hub.clone(),
            metrics: ActorMetrics::new(),
            join_timeout: Duration::from_secs(15),
        };
        let (handle, task) = SessionActor::spawn(session, CancellationToken::new(), ctx);
        (handle, hub, task)
    }

    fn mute(host: &str, target: &str) -> ModerationRequest {
        ModerationRequest {
            acting_host_id: host.to_string(),
            acting_host_name: host.to_string(),
            target_id: target.to_string(),
            command: ModerationCommand::Mute(true),
        }
    }

    #[tokio::test]
    async fn test_start_loads_participants() {
        let platform = Arc::new(MockVoicePlatform::new().with_occupants(vec![occupant("u1")]));
        let (handle, _hub, _task) = spawn_with(Arc::clone(&platform));

        let connection = handle.start().await.unwrap();
        assert_eq!(connection.as_str(), "mock-conn-1");

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Live);
        assert_eq!(snapshot.participants.len(), 1);

        // Starting twice is rejected.
        assert!(matches!(
            handle.start().await,
            Err(CoordinatorError::InvalidRequest(_))
        ));
        handle.cancel();
    }

    #[tokio::test]
    async fn test_mute_publishes_audit_then_update() {
        let platform = Arc::new(MockVoicePlatform::new().with_occupants(vec![occupant("u1")]));
        let (handle, hub, _task) = spawn_with(platform);
        handle.start().await.unwrap();

        let mut rx = hub.subscribe();
        handle.moderate(mute("owner", "u1")).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            SessionNotification::AuditEntryAdded { ref entry, .. } if entry.success
        ));
        match second {
            SessionNotification::SessionUpdated(snapshot) => {
                assert!(snapshot.participants[0].voice.server_muted);
                assert_eq!(snapshot.audit_log.len(), 1);
            }
            other => panic!("unexpected notification: {other:?}"),
        }
        handle.cancel();
    }

    #[tokio::test]
    async fn test_moderation_after_end_is_session_not_found() {
        let platform = Arc::new(MockVoicePlatform::new().with_occupants(vec![occupant("u1")]));
        let (handle, _hub, _task) = spawn_with(Arc::clone(&platform));
        handle.start().await.unwrap();
        handle.end().await.unwrap();

        assert_eq!(platform.call_count("leave"), 1);
        assert!(matches!(
            handle.moderate(mute("owner", "u1")).await,
            Err(CoordinatorError::SessionNotFound(_))
        ));
        assert!(matches!(
            handle.end().await,
            Err(CoordinatorError::SessionNotFound(_))
        ));
        assert_eq!(platform.moderation_call_count(), 0);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_cancelled_actor_reports_session_not_found() {
        let platform = Arc::new(MockVoicePlatform::new());
        let (handle, _hub, task) = spawn_with(platform);
        handle.cancel();
        task.await.unwrap();

        assert!(matches!(
            handle.snapshot().await,
            Err(CoordinatorError::SessionNotFound(_))
        ));
    }
}
