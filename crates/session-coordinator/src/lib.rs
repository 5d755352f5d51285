//! Session Coordinator Library
//!
//! Coordination core for moderating one shared voice channel with several
//! hosts at once:
//!
//! - Tracks who is in the monitored channel and their server mute/deafen state
//! - Advisory per-participant locks so hosts do not act on the same person
//! - Role-based authorization of moderation commands
//! - An append-only audit log of every moderation attempt
//! - Change notifications for any number of front ends
//!
//! The voice platform itself sits behind the [`platform::VoicePlatform`]
//! trait; the library talks to it but never implements a real client.
//!
//! # Architecture
//!
//! ```text
//! SessionCoordinatorActor (singleton)
//! └── supervises N SessionActors
//!     └── SessionActor (one per session, owns its EventSession)
//! ```
//!
//! # Modules
//!
//! - [`actors`] - Coordinator and per-session actors
//! - [`session`] - `EventSession` aggregate and lifecycle rules
//! - [`registry`] - Participants and advisory locks
//! - [`roster`] - Hosts and the single-owner rule
//! - [`authz`] - Role permission table
//! - [`audit`] - Append-only audit log
//! - [`platform`] - Voice platform adapter trait and a mock
//! - [`notify`] - Notification fan-out
//! - [`config`] - Configuration from environment
//! - [`errors`] - Error types
//! - [`observability`] - Tracing setup and metrics

pub mod actors;
pub mod audit;
pub mod authz;
pub mod config;
pub mod errors;
pub mod model;
pub mod notify;
pub mod observability;
pub mod platform;
pub mod registry;
pub mod roster;
pub mod session;

pub use actors::{CoordinatorStatus, SessionCoordinatorHandle};
pub use config::{Config, ConfigError};
pub use errors::{CoordinatorError, PlatformError};
pub use model::{
    AuditEntry, EventPolicy, Host, HostRole, ModerationType, ParticipantInfo, SessionSnapshot,
    SessionStatus, SessionSummary, VoiceFlags,
};
pub use notify::SessionNotification;
pub use platform::{VoiceConnectionId, VoiceEvent, VoiceEventKind, VoicePlatform};
pub use session::CreateSessionRequest;
