//! Integration tests for the moderation pipeline.
//!
//! Covers target resolution, authorization, the adapter call, audit entries
//! and the order of notifications each call produces.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

use sc_test_utils::{occupants, TestHarness, TestOccupant};
use session_coordinator::platform::mock::{MockVoicePlatform, PlatformCall};
use session_coordinator::{CoordinatorError, HostRole, ModerationType, SessionNotification};

fn harness_with(user_ids: &[&str]) -> TestHarness {
    TestHarness::new(MockVoicePlatform::new().with_occupants(occupants(user_ids)))
}

// ============================================================================
// Mute / deafen
// ============================================================================

#[tokio::test]
async fn test_mute_then_unmute_round_trip() {
    let mut harness = harness_with(&["alice"]);
    let session_id = harness.create_live_session("owner").await;
    let coordinator = harness.coordinator.clone();

    coordinator
        .mute_participant(&session_id, "owner", "Olivia", "alice", true)
        .await
        .unwrap();
    let snapshot = coordinator.get_session(&session_id).await.unwrap();
    assert!(snapshot.participant("alice").unwrap().voice.server_muted);

    coordinator
        .mute_participant(&session_id, "owner", "Olivia", "alice", false)
        .await
        .unwrap();
    let snapshot = coordinator.get_session(&session_id).await.unwrap();
    assert!(!snapshot.participant("alice").unwrap().voice.server_muted);

    let actions: Vec<ModerationType> = snapshot.audit_log.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![ModerationType::Mute, ModerationType::Unmute]);
    assert!(snapshot.audit_log.iter().all(|e| e.success));

    assert_eq!(
        harness.platform.calls()[2..].to_vec(),
        vec![
            PlatformCall::SetMute {
                user_id: "alice".to_string(),
                desired: true
            },
            PlatformCall::SetMute {
                user_id: "alice".to_string(),
                desired: false
            },
        ]
    );
}

#[tokio::test]
async fn test_deafen_sets_flag_and_keeps_self_flags() {
    let platform = MockVoicePlatform::new()
        .with_occupants(vec![TestOccupant::new("bob").self_muted().build()]);
    let mut harness = TestHarness::new(platform);
    let session_id = harness.create_live_session("owner").await;

    harness
        .coordinator
        .deafen_participant(&session_id, "owner", "Olivia", "bob", true)
        .await
        .unwrap();

    let snapshot = harness.coordinator.get_session(&session_id).await.unwrap();
    let bob = snapshot.participant("bob").unwrap();
    assert!(bob.voice.server_deafened);
    assert!(bob.voice.self_muted);
    assert!(!bob.voice.server_muted);
    assert_eq!(snapshot.audit_log[0].action, ModerationType::Deaf);
}

#[tokio::test]
async fn test_success_publishes_audit_entry_then_update() {
    let mut harness = harness_with(&["alice"]);
    let session_id = harness.create_live_session("owner").await;

    harness
        .coordinator
        .mute_participant(&session_id, "owner", "Olivia", "alice", true)
        .await
        .unwrap();

    match harness.next_notification().await {
        SessionNotification::AuditEntryAdded {
            session_id: id,
            entry,
        } => {
            assert_eq!(id, session_id);
            assert!(entry.success);
            assert_eq!(entry.host_name, "Olivia");
            assert_eq!(entry.target_name, "User alice");
        }
        other => panic!("expected audit entry, got {other:?}"),
    }
    match harness.next_notification().await {
        SessionNotification::SessionUpdated(snapshot) => {
            assert!(snapshot.participant("alice").unwrap().voice.server_muted);
        }
        other => panic!("expected session update, got {other:?}"),
    }
    assert!(harness.drain_notifications().is_empty());
}

// ============================================================================
// Audit log
// ============================================================================

#[tokio::test]
async fn test_every_attempt_appends_exactly_one_audit_entry() {
    let platform = MockVoicePlatform::new()
        .with_occupants(occupants(&["alice", "mallory"]))
        .failing_for_user("mallory");
    let mut harness = TestHarness::new(platform);
    let session_id = harness.create_live_session("owner").await;
    let coordinator = harness.coordinator.clone();

    // Success.
    coordinator
        .mute_participant(&session_id, "owner", "Olivia", "alice", true)
        .await
        .unwrap();
    // Target not in the channel.
    let missing = coordinator
        .mute_participant(&session_id, "owner", "Olivia", "ghost", true)
        .await;
    assert!(matches!(missing, Err(CoordinatorError::ParticipantNotFound(_))));
    // Acting host not in the session.
    let stranger = coordinator
        .mute_participant(&session_id, "stranger", "Sam", "alice", false)
        .await;
    assert!(matches!(stranger, Err(CoordinatorError::Unauthorized(_))));
    // Adapter rejects.
    let rejected = coordinator
        .deafen_participant(&session_id, "owner", "Olivia", "mallory", true)
        .await;
    assert!(matches!(rejected, Err(CoordinatorError::AdapterFailure(_))));

    let snapshot = coordinator.get_session(&session_id).await.unwrap();
    let log = &snapshot.audit_log;
    assert_eq!(log.len(), 4);

    assert!(log[0].success);
    assert_eq!(log[0].error_message, None);

    assert!(!log[1].success);
    assert_eq!(log[1].target_name, "Unknown");
    assert_eq!(
        log[1].error_message.as_deref(),
        Some("participant not in voice channel")
    );

    assert!(!log[2].success);
    assert_eq!(log[2].host_id, "stranger");
    assert!(log[2].error_message.is_some());

    assert!(!log[3].success);
    assert_eq!(log[3].action, ModerationType::Deaf);
    assert!(log[3].error_message.is_some());

    // A failed adapter call leaves the flag unchanged.
    assert!(!snapshot.participant("mallory").unwrap().voice.server_deafened);

    // Timestamps never go backwards.
    assert!(log.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn test_adapter_failure_still_publishes_update() {
    let platform = MockVoicePlatform::new()
        .with_occupants(occupants(&["mallory"]))
        .failing_for_user("mallory");
    let mut harness = TestHarness::new(platform);
    let session_id = harness.create_live_session("owner").await;

    let result = harness
        .coordinator
        .mute_participant(&session_id, "owner", "Olivia", "mallory", true)
        .await;
    assert!(matches!(result, Err(CoordinatorError::AdapterFailure(_))));

    let notifications = harness.drain_notifications();
    assert_eq!(notifications.len(), 2);
    assert!(matches!(
        notifications[0],
        SessionNotification::AuditEntryAdded { ref entry, .. } if !entry.success
    ));
    assert!(matches!(
        notifications[1],
        SessionNotification::SessionUpdated(_)
    ));
}

#[tokio::test]
async fn test_missing_session_is_rejected_without_adapter_call() {
    let harness = harness_with(&["alice"]);

    let result = harness
        .coordinator
        .mute_participant("no-such-session", "owner", "Olivia", "alice", true)
        .await;

    assert!(matches!(result, Err(CoordinatorError::SessionNotFound(_))));
    assert_eq!(harness.platform.moderation_call_count(), 0);
}

// ============================================================================
// Authorization
// ============================================================================

#[tokio::test]
async fn test_moderator_cannot_move_but_can_mute() {
    let mut harness = harness_with(&["alice"]);
    let session_id = harness.create_live_session("owner").await;
    let coordinator = harness.coordinator.clone();

    coordinator
        .add_host(&session_id, "owner", "mod", "Mo", HostRole::Moderator)
        .await
        .unwrap();

    let moved = coordinator
        .move_participant(&session_id, "mod", "Mo", "alice", "lobby")
        .await;
    assert!(matches!(moved, Err(CoordinatorError::Unauthorized(_))));
    assert_eq!(harness.platform.call_count("move"), 0);

    coordinator
        .mute_participant(&session_id, "mod", "Mo", "alice", true)
        .await
        .unwrap();

    let snapshot = coordinator.get_session(&session_id).await.unwrap();
    assert_eq!(snapshot.audit_log.len(), 2);
    assert_eq!(snapshot.audit_log[0].action, ModerationType::Move);
    assert!(!snapshot.audit_log[0].success);
    assert!(snapshot.audit_log[1].success);
    // The denied move did not remove the participant.
    assert!(snapshot.participant("alice").is_some());
}

#[tokio::test]
async fn test_cohost_can_move_participant_out() {
    let mut harness = harness_with(&["alice", "bob"]);
    let session_id = harness.create_live_session("owner").await;
    let coordinator = harness.coordinator.clone();

    coordinator
        .add_host(&session_id, "owner", "co", "Cora", HostRole::CoHost)
        .await
        .unwrap();
    coordinator
        .move_participant(&session_id, "co", "Cora", "alice", "green-room")
        .await
        .unwrap();

    assert!(harness.platform.calls().contains(&PlatformCall::Move {
        user_id: "alice".to_string(),
        target_channel_id: "green-room".to_string(),
    }));
    let snapshot = coordinator.get_session(&session_id).await.unwrap();
    assert!(snapshot.participant("alice").is_none());
    assert!(snapshot.participant("bob").is_some());
}

// ============================================================================
// Disconnect
// ============================================================================

#[tokio::test]
async fn test_disconnect_removes_participant_and_publishes_update() {
    let mut harness = harness_with(&["alice", "bob"]);
    let session_id = harness.create_live_session("owner").await;

    harness
        .coordinator
        .disconnect_participant(&session_id, "owner", "Olivia", "alice")
        .await
        .unwrap();

    let notifications = harness.drain_notifications();
    let update = notifications
        .iter()
        .find_map(|n| match n {
            SessionNotification::SessionUpdated(snapshot) => Some(snapshot),
            SessionNotification::AuditEntryAdded { .. } => None,
        })
        .expect("a session update should be published");
    assert!(update.participant("alice").is_none());
    assert_eq!(update.participants.len(), 1);
    assert_eq!(update.audit_log[0].action, ModerationType::Disconnect);

    // A second disconnect of the same user no longer finds them.
    let again = harness
        .coordinator
        .disconnect_participant(&session_id, "owner", "Olivia", "alice")
        .await;
    assert!(matches!(again, Err(CoordinatorError::ParticipantNotFound(_))));
}
