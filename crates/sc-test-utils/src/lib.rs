//! # SC Test Utilities
//!
//! Shared test utilities for the session coordinator.
//!
//! - `fixtures` - Occupant and session request builders
//! - `harness` - `TestHarness` (coordinator + mock platform + notification subscriber)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sc_test_utils::*;
//! use session_coordinator::platform::mock::MockVoicePlatform;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let platform = MockVoicePlatform::new()
//!         .with_occupants(vec![TestOccupant::new("alice").build()]);
//!     let mut harness = TestHarness::new(platform);
//!
//!     let session_id = harness.create_live_session("owner").await;
//!     harness
//!         .coordinator
//!         .mute_participant(&session_id, "owner", "Owner", "alice", true)
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod fixtures;
pub mod harness;

pub use fixtures::*;
pub use harness::*;
