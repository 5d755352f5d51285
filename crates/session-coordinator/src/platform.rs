//! Voice platform adapter boundary.
//!
//! The coordinator never talks to a chat platform directly. Everything it
//! needs (joining a channel, enumerating occupants, the moderation primitives)
//! goes through [`VoicePlatform`], and voice-state changes come back as
//! [`VoiceEvent`] values tagged with the connection they belong to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::PlatformError;
use crate::model::VoiceFlags;

/// Opaque handle for one open voice connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceConnectionId(pub String);

impl VoiceConnectionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoiceConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A channel occupant as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupantSnapshot {
    pub user_id: String,
    pub display_name: String,
    pub voice: VoiceFlags,
}

/// A guild the platform account can see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildInfo {
    pub guild_id: String,
    pub name: String,
}

/// A voice channel inside a guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceChannelInfo {
    pub channel_id: String,
    pub name: String,
    pub occupant_count: usize,
}

/// Voice-state change delivered by the platform for an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceEvent {
    pub connection_id: VoiceConnectionId,
    pub kind: VoiceEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEventKind {
    /// Someone entered the monitored channel.
    UserJoined(OccupantSnapshot),
    /// Someone left the monitored channel.
    UserLeft { user_id: String },
    /// Mute/deafen flags or display name changed.
    UserStateChanged(OccupantSnapshot),
}

impl VoiceEventKind {
    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            VoiceEventKind::UserJoined(o) | VoiceEventKind::UserStateChanged(o) => &o.user_id,
            VoiceEventKind::UserLeft { user_id } => user_id,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            VoiceEventKind::UserJoined(_) => "user_joined",
            VoiceEventKind::UserLeft { .. } => "user_left",
            VoiceEventKind::UserStateChanged(_) => "user_state_changed",
        }
    }
}

/// Platform operations the coordinator depends on (enables mocking).
#[async_trait::async_trait]
pub trait VoicePlatform: Send + Sync {
    /// Open a voice connection to a channel.
    async fn join_channel(
        &self,
        guild_id: &str,
        channel_id: &str,
    ) -> Result<VoiceConnectionId, PlatformError>;

    /// Close a voice connection.
    async fn leave_channel(&self, connection_id: &VoiceConnectionId) -> Result<(), PlatformError>;

    /// Current occupants of a channel.
    async fn list_occupants(
        &self,
        guild_id: &str,
        channel_id: &str,
    ) -> Result<Vec<OccupantSnapshot>, PlatformError>;

    async fn set_mute(&self, guild_id: &str, user_id: &str, desired: bool)
        -> Result<(), PlatformError>;

    async fn set_deafen(
        &self,
        guild_id: &str,
        user_id: &str,
        desired: bool,
    ) -> Result<(), PlatformError>;

    /// Remove a user from voice entirely.
    async fn disconnect(&self, guild_id: &str, user_id: &str) -> Result<(), PlatformError>;

    /// Move a user to another voice channel in the same guild.
    async fn move_user(
        &self,
        guild_id: &str,
        user_id: &str,
        target_channel_id: &str,
    ) -> Result<(), PlatformError>;

    async fn list_guilds(&self) -> Result<Vec<GuildInfo>, PlatformError>;

    async fn list_voice_channels(
        &self,
        guild_id: &str,
    ) -> Result<Vec<VoiceChannelInfo>, PlatformError>;
}

/// Mock voice platform for tests.
///
/// Records every call in order and can be configured to fail joins, delay
/// joins, or reject moderation calls aimed at specific users.
pub mod mock {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use std::time::Duration;

    use super::*;

    /// One recorded adapter call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum PlatformCall {
        Join { guild_id: String, channel_id: String },
        Leave { connection_id: VoiceConnectionId },
        ListOccupants { guild_id: String, channel_id: String },
        SetMute { user_id: String, desired: bool },
        SetDeafen { user_id: String, desired: bool },
        Disconnect { user_id: String },
        Move { user_id: String, target_channel_id: String },
        ListGuilds,
        ListVoiceChannels { guild_id: String },
    }

    impl PlatformCall {
        #[must_use]
        pub const fn kind(&self) -> &'static str {
            match self {
                PlatformCall::Join { .. } => "join",
                PlatformCall::Leave { .. } => "leave",
                PlatformCall::ListOccupants { .. } => "list_occupants",
                PlatformCall::SetMute { .. } => "set_mute",
                PlatformCall::SetDeafen { .. } => "set_deafen",
                PlatformCall::Disconnect { .. } => "disconnect",
                PlatformCall::Move { .. } => "move",
                PlatformCall::ListGuilds => "list_guilds",
                PlatformCall::ListVoiceChannels { .. } => "list_voice_channels",
            }
        }
    }

    /// Mock platform. Every channel reports the same configured occupants.
    #[derive(Default)]
    pub struct MockVoicePlatform {
        occupants: Mutex<Vec<OccupantSnapshot>>,
        guilds: Vec<GuildInfo>,
        channels: HashMap<String, Vec<VoiceChannelInfo>>,
        fail_join: bool,
        join_delay: Option<Duration>,
        failing_users: HashSet<String>,
        calls: Mutex<Vec<PlatformCall>>,
        next_connection: AtomicUsize,
        issued: Mutex<Vec<VoiceConnectionId>>,
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    impl MockVoicePlatform {
        /// Empty channel, every call succeeds.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn with_occupants(mut self, occupants: Vec<OccupantSnapshot>) -> Self {
            self.occupants = Mutex::new(occupants);
            self
        }

        /// Make `join_channel` fail with `Unavailable`.
        #[must_use]
        pub fn failing_join(mut self) -> Self {
            self.fail_join = true;
            self
        }

        /// Sleep this long inside `join_channel` before answering.
        #[must_use]
        pub fn with_join_delay(mut self, delay: Duration) -> Self {
            self.join_delay = Some(delay);
            self
        }

        /// Reject every moderation primitive aimed at `user_id`.
        #[must_use]
        pub fn failing_for_user(mut self, user_id: &str) -> Self {
            self.failing_users.insert(user_id.to_string());
            self
        }

        #[must_use]
        pub fn with_guild(mut self, guild: GuildInfo, channels: Vec<VoiceChannelInfo>) -> Self {
            self.channels.insert(guild.guild_id.clone(), channels);
            self.guilds.push(guild);
            self
        }

        /// Replace the reported occupants.
        pub fn set_occupants(&self, occupants: Vec<OccupantSnapshot>) {
            *lock(&self.occupants) = occupants;
        }

        /// All calls made so far, in order.
        #[must_use]
        pub fn calls(&self) -> Vec<PlatformCall> {
            lock(&self.calls).clone()
        }

        /// Number of calls of one kind (see [`PlatformCall::kind`]).
        #[must_use]
        pub fn call_count(&self, kind: &str) -> usize {
            lock(&self.calls).iter().filter(|c| c.kind() == kind).count()
        }

        /// Most recent connection handed out by `join_channel`.
        #[must_use]
        pub fn last_connection(&self) -> Option<VoiceConnectionId> {
            lock(&self.issued).last().cloned()
        }

        /// Number of moderation primitives invoked (mute, deafen, disconnect, move).
        #[must_use]
        pub fn moderation_call_count(&self) -> usize {
            ["set_mute", "set_deafen", "disconnect", "move"]
                .iter()
                .map(|kind| self.call_count(kind))
                .sum()
        }

        fn record(&self, call: PlatformCall) {
            lock(&self.calls).push(call);
        }

        fn moderate(&self, call: PlatformCall, user_id: &str) -> Result<(), PlatformError> {
            self.record(call);
            if self.failing_users.contains(user_id) {
                return Err(PlatformError::Rejected(format!(
                    "mock rejected call for {user_id}"
                )));
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl VoicePlatform for MockVoicePlatform {
        async fn join_channel(
            &self,
            guild_id: &str,
            channel_id: &str,
        ) -> Result<VoiceConnectionId, PlatformError> {
            self.record(PlatformCall::Join {
                guild_id: guild_id.to_string(),
                channel_id: channel_id.to_string(),
            });

            if let Some(delay) = self.join_delay {
                tokio::time::sleep(delay).await;
            }

            if self.fail_join {
                return Err(PlatformError::Unavailable("mock join failure".to_string()));
            }

            let n = self.next_connection.fetch_add(1, Ordering::SeqCst) + 1;
            let connection_id = VoiceConnectionId(format!("mock-conn-{n}"));
            lock(&self.issued).push(connection_id.clone());
            Ok(connection_id)
        }

        async fn leave_channel(
            &self,
            connection_id: &VoiceConnectionId,
        ) -> Result<(), PlatformError> {
            self.record(PlatformCall::Leave {
                connection_id: connection_id.clone(),
            });
            Ok(())
        }

        async fn list_occupants(
            &self,
            guild_id: &str,
            channel_id: &str,
        ) -> Result<Vec<OccupantSnapshot>, PlatformError> {
            self.record(PlatformCall::ListOccupants {
                guild_id: guild_id.to_string(),
                channel_id: channel_id.to_string(),
            });
            Ok(lock(&self.occupants).clone())
        }

        async fn set_mute(
            &self,
            _guild_id: &str,
            user_id: &str,
            desired: bool,
        ) -> Result<(), PlatformError> {
            self.moderate(
                PlatformCall::SetMute {
                    user_id: user_id.to_string(),
                    desired,
                },
                user_id,
            )
        }

        async fn set_deafen(
            &self,
            _guild_id: &str,
            user_id: &str,
            desired: bool,
        ) -> Result<(), PlatformError> {
            self.moderate(
                PlatformCall::SetDeafen {
                    user_id: user_id.to_string(),
                    desired,
                },
                user_id,
            )
        }

        async fn disconnect(&self, _guild_id: &str, user_id: &str) -> Result<(), PlatformError> {
            self.moderate(
                PlatformCall::Disconnect {
                    user_id: user_id.to_string(),
                },
                user_id,
            )
        }

        async fn move_user(
            &self,
            _guild_id: &str,
            user_id: &str,
            target_channel_id: &str,
        ) -> Result<(), PlatformError> {
            self.moderate(
                PlatformCall::Move {
                    user_id: user_id.to_string(),
                    target_channel_id: target_channel_id.to_string(),
                },
                user_id,
            )
        }

        async fn list_guilds(&self) -> Result<Vec<GuildInfo>, PlatformError> {
            self.record(PlatformCall::ListGuilds);
            Ok(self.guilds.clone())
        }

        async fn list_voice_channels(
            &self,
            guild_id: &str,
        ) -> Result<Vec<VoiceChannelInfo>, PlatformError> {
            self.record(PlatformCall::ListVoiceChannels {
                guild_id: guild_id.to_string(),
            });
            self.channels
                .get(guild_id)
                .cloned()
                .ok_or_else(|| PlatformError::Rejected(format!("unknown guild {guild_id}")))
        }
    }

}
