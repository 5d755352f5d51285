//! Integration tests for advisory participant locks.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use sc_test_utils::{occupants, TestHarness};
use session_coordinator::platform::mock::MockVoicePlatform;
use session_coordinator::{CoordinatorError, HostRole, SessionNotification};

async fn live_harness() -> (TestHarness, String) {
    let mut harness =
        TestHarness::new(MockVoicePlatform::new().with_occupants(occupants(&["p", "q"])));
    let session_id = harness.create_live_session("a").await;
    harness
        .coordinator
        .add_host(&session_id, "a", "b", "Bea", HostRole::CoHost)
        .await
        .unwrap();
    harness.drain_notifications();
    (harness, session_id)
}

#[tokio::test(start_paused = true)]
async fn test_lock_blocks_other_host_until_expiry() {
    let (harness, session_id) = live_harness().await;
    let coordinator = &harness.coordinator;

    assert!(coordinator
        .try_lock_participant(&session_id, "p", "a")
        .await
        .unwrap());

    tokio::time::advance(Duration::from_secs(5)).await;
    assert!(!coordinator
        .try_lock_participant(&session_id, "p", "b")
        .await
        .unwrap());

    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(coordinator
        .try_lock_participant(&session_id, "p", "b")
        .await
        .unwrap());

    let snapshot = coordinator.get_session(&session_id).await.unwrap();
    let p = snapshot.participant("p").unwrap();
    assert_eq!(p.locked_by.as_deref(), Some("b"));
    assert_eq!(p.lock_remaining, Some(Duration::from_secs(10)));
}

#[tokio::test(start_paused = true)]
async fn test_expired_lock_is_hidden_from_snapshots() {
    let (harness, session_id) = live_harness().await;
    let coordinator = &harness.coordinator;

    coordinator
        .try_lock_participant(&session_id, "p", "a")
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(10)).await;

    let snapshot = coordinator.get_session(&session_id).await.unwrap();
    let p = snapshot.participant("p").unwrap();
    assert_eq!(p.locked_by, None);
    assert_eq!(p.lock_remaining, None);
}

#[tokio::test(start_paused = true)]
async fn test_holder_can_refresh_lock() {
    let (harness, session_id) = live_harness().await;
    let coordinator = &harness.coordinator;

    coordinator
        .try_lock_participant(&session_id, "p", "a")
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(8)).await;
    assert!(coordinator
        .try_lock_participant(&session_id, "p", "a")
        .await
        .unwrap());

    // Eight seconds into the refreshed lock, it still holds.
    tokio::time::advance(Duration::from_secs(8)).await;
    assert!(!coordinator
        .try_lock_participant(&session_id, "p", "b")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_unlock_by_non_holder_is_noop() {
    let (mut harness, session_id) = live_harness().await;
    let coordinator = harness.coordinator.clone();

    coordinator
        .try_lock_participant(&session_id, "p", "a")
        .await
        .unwrap();
    harness.drain_notifications();

    coordinator
        .unlock_participant(&session_id, "p", "b")
        .await
        .unwrap();
    assert!(harness.drain_notifications().is_empty());
    assert!(!coordinator
        .try_lock_participant(&session_id, "p", "b")
        .await
        .unwrap());

    coordinator
        .unlock_participant(&session_id, "p", "a")
        .await
        .unwrap();
    assert!(matches!(
        harness.next_notification().await,
        SessionNotification::SessionUpdated(_)
    ));
    assert!(coordinator
        .try_lock_participant(&session_id, "p", "b")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_lock_on_unknown_participant() {
    let (harness, session_id) = live_harness().await;

    assert!(matches!(
        harness
            .coordinator
            .try_lock_participant(&session_id, "ghost", "a")
            .await,
        Err(CoordinatorError::ParticipantNotFound(_))
    ));
    assert!(matches!(
        harness
            .coordinator
            .unlock_participant(&session_id, "ghost", "a")
            .await,
        Err(CoordinatorError::ParticipantNotFound(_))
    ));
}

#[tokio::test]
async fn test_locks_are_advisory_for_moderation() {
    let (harness, session_id) = live_harness().await;
    let coordinator = &harness.coordinator;

    coordinator
        .try_lock_participant(&session_id, "q", "a")
        .await
        .unwrap();

    // Another host may still act on the locked participant.
    coordinator
        .mute_participant(&session_id, "b", "Bea", "q", true)
        .await
        .unwrap();

    let snapshot = coordinator.get_session(&session_id).await.unwrap();
    let q = snapshot.participant("q").unwrap();
    assert!(q.voice.server_muted);
    assert_eq!(q.locked_by.as_deref(), Some("a"));
}

#[tokio::test]
async fn test_leaving_participant_drops_their_lock() {
    let (harness, session_id) = live_harness().await;
    let coordinator = &harness.coordinator;

    coordinator
        .try_lock_participant(&session_id, "p", "a")
        .await
        .unwrap();
    coordinator
        .disconnect_participant(&session_id, "a", "Ada", "p")
        .await
        .unwrap();

    assert!(matches!(
        coordinator.try_lock_participant(&session_id, "p", "b").await,
        Err(CoordinatorError::ParticipantNotFound(_))
    ));
}
