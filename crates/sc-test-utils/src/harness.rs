//! Coordinator test harness.
//!
//! Wires a [`SessionCoordinatorHandle`] to a [`MockVoicePlatform`] and keeps
//! one notification subscription open from the start, so tests can assert
//! on the exact sequence of notifications an operation produced.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};

use session_coordinator::model::SessionSnapshot;
use session_coordinator::notify::SessionNotification;
use session_coordinator::platform::mock::MockVoicePlatform;
use session_coordinator::platform::{VoiceConnectionId, VoicePlatform};
use session_coordinator::{Config, SessionCoordinatorHandle};

use crate::fixtures::TestSessionRequest;

/// How long `next_notification` waits before failing the test.
pub const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(2);

/// A running coordinator backed by a mock platform.
pub struct TestHarness {
    pub coordinator: SessionCoordinatorHandle,
    pub platform: Arc<MockVoicePlatform>,
    notifications: broadcast::Receiver<SessionNotification>,
}

impl TestHarness {
    /// Coordinator with default config. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn new(platform: MockVoicePlatform) -> Self {
        Self::with_config(Config::default(), platform)
    }

    #[must_use]
    pub fn with_config(config: Config, platform: MockVoicePlatform) -> Self {
        let platform = Arc::new(platform);
        let adapter: Arc<dyn VoicePlatform> = Arc::clone(&platform) as Arc<dyn VoicePlatform>;
        let coordinator = SessionCoordinatorHandle::new(config, adapter);
        let notifications = coordinator.subscribe();

        Self {
            coordinator,
            platform,
            notifications,
        }
    }

    /// Create a session owned by `owner_id` on the default channel.
    ///
    /// # Panics
    ///
    /// If the coordinator rejects the request.
    pub async fn create_session(&self, owner_id: &str) -> SessionSnapshot {
        self.coordinator
            .create_session(TestSessionRequest::new(owner_id).build())
            .await
            .expect("create_session should succeed")
    }

    /// Create and start a session, then discard the notifications it produced.
    ///
    /// # Panics
    ///
    /// If creating or starting the session fails.
    pub async fn create_live_session(&mut self, owner_id: &str) -> String {
        let created = self.create_session(owner_id).await;
        self.coordinator
            .start_session(&created.session_id)
            .await
            .expect("start_session should succeed");
        self.drain_notifications();
        created.session_id
    }

    /// Connection handed out by the most recent successful join.
    ///
    /// # Panics
    ///
    /// If no join has succeeded yet.
    #[must_use]
    pub fn last_connection(&self) -> VoiceConnectionId {
        self.platform
            .last_connection()
            .expect("a session should have joined a channel")
    }

    /// Wait for the next notification.
    ///
    /// # Panics
    ///
    /// If nothing arrives within [`NOTIFICATION_TIMEOUT`] or the channel lagged or closed.
    pub async fn next_notification(&mut self) -> SessionNotification {
        tokio::time::timeout(NOTIFICATION_TIMEOUT, self.notifications.recv())
            .await
            .expect("timed out waiting for notification")
            .expect("notification channel failed")
    }

    /// Everything published so far that has not been received yet.
    pub fn drain_notifications(&mut self) -> Vec<SessionNotification> {
        let mut drained = Vec::new();
        loop {
            match self.notifications.try_recv() {
                Ok(notification) => drained.push(notification),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        drained
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.coordinator.cancel();
    }
}
