//! Test data builders for occupants and session requests.

use session_coordinator::model::VoiceFlags;
use session_coordinator::platform::OccupantSnapshot;
use session_coordinator::session::CreateSessionRequest;

/// Default guild used by [`TestSessionRequest`].
pub const TEST_GUILD_ID: &str = "guild-1";

/// Default monitored channel used by [`TestSessionRequest`].
pub const TEST_CHANNEL_ID: &str = "stage-1";

/// Channel occupant fixture.
#[derive(Debug, Clone)]
pub struct TestOccupant {
    user_id: String,
    display_name: String,
    voice: VoiceFlags,
}

impl TestOccupant {
    /// Occupant with all voice flags off and a display name derived from the id.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            display_name: format!("User {user_id}"),
            user_id,
            voice: VoiceFlags::default(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    #[must_use]
    pub fn server_muted(mut self) -> Self {
        self.voice.server_muted = true;
        self
    }

    #[must_use]
    pub fn server_deafened(mut self) -> Self {
        self.voice.server_deafened = true;
        self
    }

    #[must_use]
    pub fn self_muted(mut self) -> Self {
        self.voice.self_muted = true;
        self
    }

    #[must_use]
    pub fn build(self) -> OccupantSnapshot {
        OccupantSnapshot {
            user_id: self.user_id,
            display_name: self.display_name,
            voice: self.voice,
        }
    }
}

/// Build plain occupants from a list of ids.
#[must_use]
pub fn occupants(user_ids: &[&str]) -> Vec<OccupantSnapshot> {
    user_ids
        .iter()
        .map(|id| TestOccupant::new(*id).build())
        .collect()
}

/// `CreateSessionRequest` fixture.
#[derive(Debug, Clone)]
pub struct TestSessionRequest {
    request: CreateSessionRequest,
}

impl TestSessionRequest {
    /// Request on the default guild and channel, owned by `owner_id`.
    #[must_use]
    pub fn new(owner_id: impl Into<String>) -> Self {
        let owner_id = owner_id.into();
        Self {
            request: CreateSessionRequest {
                guild_id: TEST_GUILD_ID.to_string(),
                guild_name: "Test Guild".to_string(),
                channel_id: TEST_CHANNEL_ID.to_string(),
                channel_name: "Main Stage".to_string(),
                owner_name: format!("Host {owner_id}"),
                owner_id,
            },
        }
    }

    #[must_use]
    pub fn in_channel(mut self, guild_id: &str, channel_id: &str) -> Self {
        self.request.guild_id = guild_id.to_string();
        self.request.channel_id = channel_id.to_string();
        self
    }

    #[must_use]
    pub fn with_owner_name(mut self, name: impl Into<String>) -> Self {
        self.request.owner_name = name.into();
        self
    }

    #[must_use]
    pub fn build(self) -> CreateSessionRequest {
        self.request
    }
}
