//! Actor hierarchy for the session coordinator.
//!
//! ```text
//! SessionCoordinatorActor (singleton)
//! ├── owns the live-session map and VoiceConnectionId -> session routing
//! └── supervises N SessionActors
//!     └── SessionActor (one per session, owns its EventSession)
//! ```
//!
//! Operations on one session are serialized by its actor, including the
//! adapter call a moderation request makes. Operations on different
//! sessions run concurrently.
//!
//! # Modules
//!
//! - [`coordinator`] - `SessionCoordinatorActor` and the public `SessionCoordinatorHandle`
//! - [`session`] - `SessionActor` per session
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - Mailbox monitoring and actor counters

pub mod coordinator;
pub mod messages;
pub mod metrics;
pub mod session;

pub use coordinator::{SessionCoordinatorActor, SessionCoordinatorHandle};
pub use messages::*;
pub use metrics::{ActorMetrics, ActorType, MailboxLevel, MailboxMonitor};
pub use session::{SessionActor, SessionActorHandle, SessionContext};
