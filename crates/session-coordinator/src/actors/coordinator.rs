//! `SessionCoordinatorActor` - singleton owner of the live-session map.
//!
//! - Spawns one `SessionActor` per session and supervises it
//! - Keeps the explicit voice connection to session routing table
//! - Owns the root `CancellationToken`
//!
//! [`SessionCoordinatorHandle`] is the public API. It resolves the target
//! session through this actor and then talks to the session actor directly,
//! so calls against different sessions proceed independently while calls
//! against one session are serialized by its actor.
//!
//! # Graceful Shutdown
//!
//! `shutdown()` stops accepting new sessions, ends every live session (which
//! leaves its voice channel), then cancels the root token and waits for the
//! session actors to stop. `cancel()` skips the first two steps.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::CoordinatorError;
use crate::model::{EventPolicy, HostRole, SessionSnapshot, SessionSummary};
use crate::notify::{NotificationHub, SessionNotification};
use crate::platform::{GuildInfo, VoiceChannelInfo, VoiceConnectionId, VoiceEvent, VoicePlatform};
use crate::session::{CreateSessionRequest, EventSession};

use super::messages::{
    CoordinatorMessage, CoordinatorStatus, ModerationCommand, ModerationRequest,
};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use super::session::{SessionActor, SessionActorHandle, SessionContext};

/// Coordinator mailbox size.
const COORDINATOR_CHANNEL_BUFFER: usize = 1000;

/// How long to wait for a removed session actor to stop.
const SESSION_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Public interface of the session coordinator.
#[derive(Clone)]
pub struct SessionCoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
    cancel_token: CancellationToken,
    platform: Arc<dyn VoicePlatform>,
    notifications: NotificationHub,
    metrics: Arc<ActorMetrics>,
}

impl SessionCoordinatorHandle {
    /// Spawn the coordinator actor and return a handle to it.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(config: Config, platform: Arc<dyn VoicePlatform>) -> Self {
        let (sender, receiver) = mpsc::channel(COORDINATOR_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();
        let notifications = NotificationHub::new(config.notification_buffer);
        let metrics = ActorMetrics::new();

        let ctx = SessionContext {
            platform: Arc::clone(&platform),
            notifications: notifications.clone(),
            metrics: Arc::clone(&metrics),
            join_timeout: config.join_timeout(),
        };

        let actor = SessionCoordinatorActor::new(
            config.coordinator_id.clone(),
            config.default_policy(),
            receiver,
            cancel_token.clone(),
            ctx,
        );

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
            platform,
            notifications,
            metrics,
        }
    }

    /// Subscribe to "session updated" and "audit entry added" notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotification> {
        self.notifications.subscribe()
    }

    /// Shared actor counters.
    #[must_use]
    pub fn metrics(&self) -> Arc<ActorMetrics> {
        Arc::clone(&self.metrics)
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> CoordinatorMessage,
    ) -> Result<T, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| CoordinatorError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| CoordinatorError::Internal(format!("response receive failed: {e}")))
    }

    async fn resolve(&self, session_id: &str) -> Result<SessionActorHandle, CoordinatorError> {
        self.call(|respond_to| CoordinatorMessage::ResolveSession {
            session_id: session_id.to_string(),
            respond_to,
        })
        .await?
    }

    /// Create a session in `Starting` with the owner as its only host.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for empty identifiers or while shutting down.
    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<SessionSnapshot, CoordinatorError> {
        self.call(|respond_to| CoordinatorMessage::CreateSession {
            request,
            respond_to,
        })
        .await?
    }

    /// Join the session's voice channel and go live.
    ///
    /// On failure the session stays `Starting` with no participants.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if the session does not exist.
    /// - `InvalidRequest` if the session is not `Starting`.
    /// - `AdapterFailure` if the platform refused the join.
    /// - `JoinTimeout` if the join did not complete in time.
    pub async fn start_session(&self, session_id: &str) -> Result<(), CoordinatorError> {
        let session = self.resolve(session_id).await?;
        let connection_id = session.start().await?;

        self.call(|respond_to| CoordinatorMessage::BindConnection {
            session_id: session_id.to_string(),
            connection_id,
            respond_to,
        })
        .await?
    }

    /// End a session and remove it from the live set. Missing sessions are a no-op.
    ///
    /// # Errors
    ///
    /// `Internal` if the coordinator is gone.
    pub async fn end_session(&self, session_id: &str) -> Result<(), CoordinatorError> {
        let session = match self.resolve(session_id).await {
            Ok(session) => session,
            Err(CoordinatorError::SessionNotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };

        match session.end().await {
            Ok(()) | Err(CoordinatorError::SessionNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        self.call(|respond_to| CoordinatorMessage::RemoveSession {
            session_id: session_id.to_string(),
            respond_to,
        })
        .await
    }

    /// # Errors
    ///
    /// `SessionNotFound` if the session does not exist.
    pub async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, CoordinatorError> {
        self.resolve(session_id).await?.snapshot().await
    }

    /// Summaries of every live session, oldest first.
    ///
    /// # Errors
    ///
    /// `Internal` if the coordinator is gone.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, CoordinatorError> {
        let handles = self
            .call(|respond_to| CoordinatorMessage::ListSessions { respond_to })
            .await?;

        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in handles {
            // Sessions removed since the listing are skipped.
            if let Ok(snapshot) = handle.snapshot().await {
                snapshots.push(snapshot);
            }
        }
        snapshots.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });

        Ok(snapshots.iter().map(SessionSummary::from).collect())
    }

    async fn moderate(
        &self,
        session_id: &str,
        acting_host_id: &str,
        acting_host_name: &str,
        target_id: &str,
        command: ModerationCommand,
    ) -> Result<(), CoordinatorError> {
        self.resolve(session_id)
            .await?
            .moderate(ModerationRequest {
                acting_host_id: acting_host_id.to_string(),
                acting_host_name: acting_host_name.to_string(),
                target_id: target_id.to_string(),
                command,
            })
            .await
    }

    /// Server-mute (`mute = true`) or unmute a participant.
    ///
    /// Every call that reaches the session appends exactly one audit entry.
    ///
    /// # Errors
    ///
    /// `SessionNotFound`, `ParticipantNotFound`, `Unauthorized`, or `AdapterFailure`.
    pub async fn mute_participant(
        &self,
        session_id: &str,
        acting_host_id: &str,
        acting_host_name: &str,
        target_id: &str,
        mute: bool,
    ) -> Result<(), CoordinatorError> {
        self.moderate(
            session_id,
            acting_host_id,
            acting_host_name,
            target_id,
            ModerationCommand::Mute(mute),
        )
        .await
    }

    /// Server-deafen (`deafen = true`) or undeafen a participant.
    ///
    /// # Errors
    ///
    /// Same as [`Self::mute_participant`].
    pub async fn deafen_participant(
        &self,
        session_id: &str,
        acting_host_id: &str,
        acting_host_name: &str,
        target_id: &str,
        deafen: bool,
    ) -> Result<(), CoordinatorError> {
        self.moderate(
            session_id,
            acting_host_id,
            acting_host_name,
            target_id,
            ModerationCommand::Deafen(deafen),
        )
        .await
    }

    /// Remove a participant from voice. On success they leave the registry.
    ///
    /// # Errors
    ///
    /// Same as [`Self::mute_participant`].
    pub async fn disconnect_participant(
        &self,
        session_id: &str,
        acting_host_id: &str,
        acting_host_name: &str,
        target_id: &str,
    ) -> Result<(), CoordinatorError> {
        self.moderate(
            session_id,
            acting_host_id,
            acting_host_name,
            target_id,
            ModerationCommand::Disconnect,
        )
        .await
    }

    /// Move a participant to another channel. Owner and co-hosts only.
    ///
    /// # Errors
    ///
    /// Same as [`Self::mute_participant`].
    pub async fn move_participant(
        &self,
        session_id: &str,
        acting_host_id: &str,
        acting_host_name: &str,
        target_id: &str,
        target_channel_id: &str,
    ) -> Result<(), CoordinatorError> {
        self.moderate(
            session_id,
            acting_host_id,
            acting_host_name,
            target_id,
            ModerationCommand::Move {
                target_channel_id: target_channel_id.to_string(),
            },
        )
        .await
    }

    /// Advisory lock. `Ok(false)` when another host holds an unexpired lock.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` or `ParticipantNotFound`.
    pub async fn try_lock_participant(
        &self,
        session_id: &str,
        participant_id: &str,
        host_id: &str,
    ) -> Result<bool, CoordinatorError> {
        self.resolve(session_id)
            .await?
            .try_lock(participant_id.to_string(), host_id.to_string())
            .await
    }

    /// Release an advisory lock. A caller that is not the holder is a no-op.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` or `ParticipantNotFound`.
    pub async fn unlock_participant(
        &self,
        session_id: &str,
        participant_id: &str,
        host_id: &str,
    ) -> Result<(), CoordinatorError> {
        self.resolve(session_id)
            .await?
            .unlock(participant_id.to_string(), host_id.to_string())
            .await
    }

    /// # Errors
    ///
    /// `SessionNotFound`, `Unauthorized` (requester not owner), or
    /// `InvalidRequest` (duplicate host, second owner).
    pub async fn add_host(
        &self,
        session_id: &str,
        requester_id: &str,
        user_id: &str,
        display_name: &str,
        role: HostRole,
    ) -> Result<(), CoordinatorError> {
        self.resolve(session_id)
            .await?
            .add_host(
                requester_id.to_string(),
                user_id.to_string(),
                display_name.to_string(),
                role,
            )
            .await
    }

    /// # Errors
    ///
    /// `SessionNotFound`, `Unauthorized` (requester not owner), or
    /// `InvalidRequest` (unknown host, removing the owner).
    pub async fn remove_host(
        &self,
        session_id: &str,
        requester_id: &str,
        user_id: &str,
    ) -> Result<(), CoordinatorError> {
        self.resolve(session_id)
            .await?
            .remove_host(requester_id.to_string(), user_id.to_string())
            .await
    }

    /// Hosts update their own presence; the owner may update anyone's.
    ///
    /// # Errors
    ///
    /// `SessionNotFound`, `Unauthorized`, or `InvalidRequest` (unknown host).
    pub async fn set_host_online(
        &self,
        session_id: &str,
        requester_id: &str,
        host_id: &str,
        online: bool,
    ) -> Result<(), CoordinatorError> {
        self.resolve(session_id)
            .await?
            .set_host_online(requester_id.to_string(), host_id.to_string(), online)
            .await
    }

    /// Replace the policy of a session that has not started yet.
    ///
    /// # Errors
    ///
    /// `SessionNotFound`, `Unauthorized`, or `InvalidRequest`.
    pub async fn set_policy(
        &self,
        session_id: &str,
        requester_id: &str,
        policy: EventPolicy,
    ) -> Result<(), CoordinatorError> {
        self.resolve(session_id)
            .await?
            .set_policy(requester_id.to_string(), policy)
            .await
    }

    /// Route one adapter voice event to the session bound to its connection.
    ///
    /// Returns whether a session's registry changed. Events for unknown
    /// connections or sessions that are not live are dropped.
    ///
    /// # Errors
    ///
    /// `Internal` if the coordinator is gone.
    pub async fn handle_voice_event(&self, event: VoiceEvent) -> Result<bool, CoordinatorError> {
        let connection_id = event.connection_id.clone();
        let session = self
            .call(|respond_to| CoordinatorMessage::ResolveConnection {
                connection_id: event.connection_id,
                respond_to,
            })
            .await?;

        let Some(session) = session else {
            debug!(
                target: "sc.actor.coordinator",
                connection_id = %connection_id,
                event = event.kind.as_str(),
                "Voice event for unbound connection dropped"
            );
            return Ok(false);
        };

        match session.voice_event(event.kind).await {
            Ok(changed) => Ok(changed),
            Err(CoordinatorError::SessionNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Pump adapter events into the coordinator until the channel closes or
    /// the coordinator is cancelled.
    #[must_use]
    pub fn spawn_voice_event_listener(
        &self,
        mut events: mpsc::Receiver<VoiceEvent>,
    ) -> JoinHandle<()> {
        let coordinator = self.clone();
        let token = self.cancel_token.child_token();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        if let Err(e) = coordinator.handle_voice_event(event).await {
                            warn!(
                                target: "sc.actor.coordinator",
                                error = %e,
                                "Voice event delivery failed"
                            );
                        }
                    }
                }
            }
            debug!(
                target: "sc.actor.coordinator",
                "Voice event listener stopped"
            );
        })
    }

    /// Guilds visible to the platform account.
    ///
    /// # Errors
    ///
    /// `AdapterFailure` if the platform call fails.
    pub async fn list_guilds(&self) -> Result<Vec<GuildInfo>, CoordinatorError> {
        Ok(self.platform.list_guilds().await?)
    }

    /// Voice channels in a guild.
    ///
    /// # Errors
    ///
    /// `AdapterFailure` if the platform call fails.
    pub async fn list_voice_channels(
        &self,
        guild_id: &str,
    ) -> Result<Vec<VoiceChannelInfo>, CoordinatorError> {
        Ok(self.platform.list_voice_channels(guild_id).await?)
    }

    /// # Errors
    ///
    /// `Internal` if the coordinator is gone.
    pub async fn status(&self) -> Result<CoordinatorStatus, CoordinatorError> {
        self.call(|respond_to| CoordinatorMessage::GetStatus { respond_to })
            .await
    }

    /// End every live session, then stop the actors.
    ///
    /// # Errors
    ///
    /// `Internal` if the coordinator is already gone.
    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        self.call(|respond_to| CoordinatorMessage::Shutdown { respond_to })
            .await?
    }

    /// Cancel the actors without ending sessions (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// A live session as tracked by the coordinator.
struct ManagedSession {
    handle: SessionActorHandle,
    task_handle: JoinHandle<()>,
    created_at: DateTime<Utc>,
}

/// Owns the live-session map and the connection routing table.
pub struct SessionCoordinatorActor {
    coordinator_id: String,
    default_policy: EventPolicy,
    receiver: mpsc::Receiver<CoordinatorMessage>,
    cancel_token: CancellationToken,
    sessions: HashMap<String, ManagedSession>,
    connections: HashMap<VoiceConnectionId, String>,
    accepting_new: bool,
    ctx: SessionContext,
    mailbox: MailboxMonitor,
}

impl SessionCoordinatorActor {
    fn new(
        coordinator_id: String,
        default_policy: EventPolicy,
        receiver: mpsc::Receiver<CoordinatorMessage>,
        cancel_token: CancellationToken,
        ctx: SessionContext,
    ) -> Self {
        let mailbox = MailboxMonitor::new(ActorType::Coordinator, &coordinator_id);

        Self {
            coordinator_id,
            default_policy,
            receiver,
            cancel_token,
            sessions: HashMap::new(),
            connections: HashMap::new(),
            accepting_new: true,
            ctx,
            mailbox,
        }
    }

    #[instrument(skip_all, name = "sc.actor.coordinator", fields(coordinator_id = %self.coordinator_id))]
    async fn run(mut self) {
        info!(
            target: "sc.actor.coordinator",
            coordinator_id = %self.coordinator_id,
            "SessionCoordinatorActor started"
        );

        loop {
            self.check_session_health().await;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "sc.actor.coordinator",
                        coordinator_id = %self.coordinator_id,
                        "SessionCoordinatorActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
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
                            info!(
                                target: "sc.actor.coordinator",
                                coordinator_id = %self.coordinator_id,
                                "SessionCoordinatorActor channel closed, exiting"
                            );
                            self.graceful_shutdown().await;
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "sc.actor.coordinator",
            coordinator_id = %self.coordinator_id,
            messages_processed = self.mailbox.messages_processed(),
            "SessionCoordinatorActor stopped"
        );
    }

    async fn handle_message(&mut self, message: CoordinatorMessage) {
        match message {
            CoordinatorMessage::CreateSession {
                request,
                respond_to,
            } => {
                let result = self.create_session(request);
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::ResolveSession {
                session_id,
                respond_to,
            } => {
                let result = self
                    .sessions
                    .get(&session_id)
                    .map(|managed| managed.handle.clone())
                    .ok_or(CoordinatorError::SessionNotFound(session_id));
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::BindConnection {
                session_id,
                connection_id,
                respond_to,
            } => {
                let result = self.bind_connection(session_id, connection_id);
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::ResolveConnection {
                connection_id,
                respond_to,
            } => {
                let handle = self
                    .connections
                    .get(&connection_id)
                    .and_then(|session_id| self.sessions.get(session_id))
                    .map(|managed| managed.handle.clone());
                let _ = respond_to.send(handle);
            }

            CoordinatorMessage::RemoveSession {
                session_id,
                respond_to,
            } => {
                self.remove_session(&session_id);
                let _ = respond_to.send(());
            }

            CoordinatorMessage::ListSessions { respond_to } => {
                let handles = self
                    .sessions
                    .values()
                    .map(|managed| managed.handle.clone())
                    .collect();
                let _ = respond_to.send(handles);
            }

            CoordinatorMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.get_status());
            }

            CoordinatorMessage::Shutdown { respond_to } => {
                let result = self.initiate_shutdown().await;
                let _ = respond_to.send(result);
            }
        }
    }

    fn create_session(
        &mut self,
        request: CreateSessionRequest,
    ) -> Result<SessionSnapshot, CoordinatorError> {
        if !self.accepting_new {
            return Err(CoordinatorError::InvalidRequest(
                "Coordinator is shutting down".to_string(),
            ));
        }

        let session_id = Uuid::new_v4().to_string();
        let session = EventSession::new(session_id.clone(), request, self.default_policy.clone())?;
        let snapshot = session.snapshot(Instant::now());

        let (handle, task_handle) = SessionActor::spawn(
            session,
            self.cancel_token.child_token(),
            self.ctx.clone(),
        );

        self.sessions.insert(
            session_id.clone(),
            ManagedSession {
                handle,
                task_handle,
                created_at: snapshot.created_at,
            },
        );
        self.ctx.metrics.session_created();

        info!(
            target: "sc.actor.coordinator",
            coordinator_id = %self.coordinator_id,
            session_id = %session_id,
            guild_id = %snapshot.guild_id,
            channel_id = %snapshot.channel_id,
            total_sessions = self.sessions.len(),
            "Session created"
        );

        Ok(snapshot)
    }

    fn bind_connection(
        &mut self,
        session_id: String,
        connection_id: VoiceConnectionId,
    ) -> Result<(), CoordinatorError> {
        if !self.sessions.contains_key(&session_id) {
            return Err(CoordinatorError::SessionNotFound(session_id));
        }

        debug!(
            target: "sc.actor.coordinator",
            coordinator_id = %self.coordinator_id,
            session_id = %session_id,
            connection_id = %connection_id,
            "Voice connection bound"
        );
        self.connections.insert(connection_id, session_id);
        Ok(())
    }

    /// Drop a session and stop its actor without blocking the message loop.
    fn remove_session(&mut self, session_id: &str) {
        let Some(managed) = self.sessions.remove(session_id) else {
            return;
        };

        self.connections.retain(|_, bound| *bound != session_id);
        managed.handle.cancel();

        let session_id_owned = session_id.to_string();
        let coordinator_id = self.coordinator_id.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(SESSION_STOP_TIMEOUT, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "sc.actor.coordinator",
                        coordinator_id = %coordinator_id,
                        session_id = %session_id_owned,
                        "Session actor task completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "sc.actor.coordinator",
                        coordinator_id = %coordinator_id,
                        session_id = %session_id_owned,
                        error = ?e,
                        "Session actor task panicked during removal"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "sc.actor.coordinator",
                        coordinator_id = %coordinator_id,
                        session_id = %session_id_owned,
                        "Session actor task cleanup timed out"
                    );
                }
            }
        });

        self.ctx.metrics.session_removed();

        info!(
            target: "sc.actor.coordinator",
            coordinator_id = %self.coordinator_id,
            session_id = %session_id,
            age_secs = (Utc::now() - managed.created_at).num_seconds(),
            total_sessions = self.sessions.len(),
            "Session removed"
        );
    }

    fn get_status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            coordinator_id: self.coordinator_id.clone(),
            session_count: self.sessions.len(),
            bound_connections: self.connections.len(),
            is_draining: !self.accepting_new,
            // Excludes the status request being handled.
            mailbox_depth: self.mailbox.current_depth().saturating_sub(1),
        }
    }

    /// End every session, then cancel the root token.
    async fn initiate_shutdown(&mut self) -> Result<(), CoordinatorError> {
        info!(
            target: "sc.actor.coordinator",
            coordinator_id = %self.coordinator_id,
            session_count = self.sessions.len(),
            "Initiating graceful shutdown"
        );

        self.accepting_new = false;

        let session_ids: Vec<String> = self.sessions.keys().cloned().collect();
        for session_id in session_ids {
            let Some(handle) = self.sessions.get(&session_id).map(|m| m.handle.clone()) else {
                continue;
            };
            match handle.end().await {
                Ok(()) | Err(CoordinatorError::SessionNotFound(_)) => {}
                Err(e) => {
                    warn!(
                        target: "sc.actor.coordinator",
                        coordinator_id = %self.coordinator_id,
                        session_id = %session_id,
                        error = %e,
                        "Ending session during shutdown failed"
                    );
                }
            }
            self.remove_session(&session_id);
        }

        self.cancel_token.cancel();
        Ok(())
    }

    /// Cancel remaining session actors and wait for them to stop.
    async fn graceful_shutdown(&mut self) {
        self.accepting_new = false;
        self.connections.clear();

        for managed in self.sessions.values() {
            managed.handle.cancel();
        }

        for (session_id, managed) in self.sessions.drain() {
            match tokio::time::timeout(SESSION_STOP_TIMEOUT, managed.task_handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        target: "sc.actor.coordinator",
                        coordinator_id = %self.coordinator_id,
                        session_id = %session_id,
                        error = ?e,
                        "Session actor task panicked during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "sc.actor.coordinator",
                        coordinator_id = %self.coordinator_id,
                        session_id = %session_id,
                        "Session actor shutdown timed out"
                    );
                }
            }
            self.ctx.metrics.session_removed();
        }

        info!(
            target: "sc.actor.coordinator",
            coordinator_id = %self.coordinator_id,
            "Graceful shutdown complete"
        );
    }

    /// Detect session actors that stopped while still in the live set.
    async fn check_session_health(&mut self) {
        let failed: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, managed)| managed.task_handle.is_finished())
            .map(|(session_id, _)| session_id.clone())
            .collect();

        for session_id in failed {
            let Some(managed) = self.sessions.remove(&session_id) else {
                continue;
            };
            self.connections.retain(|_, bound| *bound != session_id);

            match managed.task_handle.await {
                Ok(()) => {
                    warn!(
                        target: "sc.actor.coordinator",
                        coordinator_id = %self.coordinator_id,
                        session_id = %session_id,
                        "Session actor exited while still live"
                    );
                }
                Err(join_error) => {
                    if join_error.is_panic() {
                        error!(
                            target: "sc.actor.coordinator",
                            coordinator_id = %self.coordinator_id,
                            session_id = %session_id,
                            error = ?join_error,
                            "Session actor panicked, session dropped"
                        );
                        self.ctx.metrics.record_panic(ActorType::Session);
                    }
                }
            }

            self.ctx.metrics.session_removed();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::platform::mock::MockVoicePlatform;

    fn request(owner: &str) -> CreateSessionRequest {
        CreateSessionRequest {
            guild_id: "g".to_string(),
            guild_name: "Guild".to_string(),
            channel_id: "c".to_string(),
            channel_name: "Stage".to_string(),
            owner_id: owner.to_string(),
            owner_name: owner.to_string(),
        }
    }

    fn coordinator() -> SessionCoordinatorHandle {
        SessionCoordinatorHandle::new(Config::default(), Arc::new(MockVoicePlatform::new()))
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let handle = coordinator();

        let created = handle.create_session(request("owner")).await.unwrap();
        let fetched = handle.get_session(&created.session_id).await.unwrap();
        assert_eq!(created.session_id, fetched.session_id);
        assert_eq!(fetched.hosts.len(), 1);

        let status = handle.status().await.unwrap();
        assert_eq!(status.session_count, 1);
        assert_eq!(status.coordinator_id, "sc-local");
        assert!(!status.is_draining);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_idle_coordinator_reports_empty_mailbox() {
        let handle = coordinator();
        handle.create_session(request("owner")).await.unwrap();

        let status = handle.status().await.unwrap();
        assert_eq!(status.mailbox_depth, 0);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let handle = coordinator();
        let a = handle.create_session(request("a")).await.unwrap();
        let b = handle.create_session(request("b")).await.unwrap();
        assert_ne!(a.session_id, b.session_id);
        assert_eq!(handle.list_sessions().await.unwrap().len(), 2);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_get_nonexistent_session() {
        let handle = coordinator();
        let result = handle.get_session("nonexistent").await;
        assert!(matches!(result, Err(CoordinatorError::SessionNotFound(_))));
        handle.cancel();
    }

    #[tokio::test]
    async fn test_end_session_is_idempotent() {
        let handle = coordinator();
        let created = handle.create_session(request("owner")).await.unwrap();

        handle.end_session(&created.session_id).await.unwrap();
        handle.end_session(&created.session_id).await.unwrap();
        handle.end_session("never-existed").await.unwrap();

        assert!(matches!(
            handle.get_session(&created.session_id).await,
            Err(CoordinatorError::SessionNotFound(_))
        ));
        handle.cancel();
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_sessions() {
        let handle = coordinator();
        handle.create_session(request("owner")).await.unwrap();

        handle.shutdown().await.unwrap();

        // The actor stops after shutdown; either answer is a refusal.
        let result = handle.create_session(request("late")).await;
        assert!(matches!(
            result,
            Err(CoordinatorError::InvalidRequest(_) | CoordinatorError::Internal(_))
        ));
        assert!(handle.is_cancelled());
    }
}
