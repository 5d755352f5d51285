//! Change-notification fan-out.
//!
//! Observers subscribe to a broadcast channel and receive every notification
//! published after they subscribed. Slow observers lag and skip; the
//! coordinator never blocks on them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::{AuditEntry, SessionSnapshot};

/// Notification delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionNotification {
    /// Full copy of a session after a change.
    SessionUpdated(SessionSnapshot),
    /// One newly appended audit entry.
    AuditEntryAdded {
        session_id: String,
        entry: AuditEntry,
    },
}

impl SessionNotification {
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            SessionNotification::SessionUpdated(snapshot) => &snapshot.session_id,
            SessionNotification::AuditEntryAdded { session_id, .. } => session_id,
        }
    }
}

/// Cloneable publisher shared by every session actor.
#[derive(Debug, Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<SessionNotification>,
}

impl NotificationHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotification> {
        self.sender.subscribe()
    }

    /// Publish to current subscribers. Returns how many received it.
    pub fn publish(&self, notification: SessionNotification) -> usize {
        self.sender.send(notification).unwrap_or(0)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::ModerationType;

    fn entry() -> AuditEntry {
        AuditEntry {
            timestamp: Utc::now(),
            host_id: "h".to_string(),
            host_name: "Host".to_string(),
            action: ModerationType::Mute,
            target_id: "u".to_string(),
            target_name: "User".to_string(),
            success: true,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let hub = NotificationHub::new(16);
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();

        let sent = hub.publish(SessionNotification::AuditEntryAdded {
            session_id: "s-1".to_string(),
            entry: entry(),
        });
        assert_eq!(sent, 2);

        let n1 = rx1.recv().await.unwrap();
        let n2 = rx2.recv().await.unwrap();
        assert_eq!(n1, n2);
        assert_eq!(n1.session_id(), "s-1");
    }

    #[test]
    fn test_publish_without_subscribers_is_not_an_error() {
        let hub = NotificationHub::new(4);
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(
            hub.publish(SessionNotification::AuditEntryAdded {
                session_id: "s".to_string(),
                entry: entry(),
            }),
            0
        );
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let json = serde_json::to_value(SessionNotification::AuditEntryAdded {
            session_id: "s".to_string(),
            entry: entry(),
        })
        .unwrap();
        assert_eq!(json.get("type").unwrap(), "AuditEntryAdded");
    }
}
