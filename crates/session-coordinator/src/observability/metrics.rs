//! Metric recording functions for the session coordinator.
//!
//! All metrics use the `sc_` prefix, `_total` for counters and `_seconds`
//! for duration histograms.
//!
//! # Cardinality
//!
//! Every label is bounded:
//! - `action`: 6 values (`ModerationType`)
//! - `outcome`: 4 values (success, participant_not_found, unauthorized, platform_failure)
//! - `reason`: 2 values (platform_failure, join_timeout)
//! - `actor_type`: 2 values (coordinator, session)

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Set the number of live sessions.
///
/// Metric: `sc_sessions_active`
pub fn set_sessions_active(count: usize) {
    // usize to f64 conversion is safe for realistic session counts
    #[allow(clippy::cast_precision_loss)]
    gauge!("sc_sessions_active").set(count as f64);
}

/// Record one moderation attempt.
///
/// Metric: `sc_moderation_actions_total`
/// Labels: `action`, `outcome`
pub fn record_moderation_action(action: &str, outcome: &str) {
    counter!(
        "sc_moderation_actions_total",
        "action" => action.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record the time from start request to `Live`.
///
/// Metric: `sc_session_start_duration_seconds`
pub fn record_session_start_duration(duration: Duration) {
    histogram!("sc_session_start_duration_seconds").record(duration.as_secs_f64());
}

/// Record a failed session start.
///
/// Metric: `sc_session_start_failures_total`
/// Labels: `reason`
pub fn record_session_start_failure(reason: &str) {
    counter!("sc_session_start_failures_total", "reason" => reason.to_string()).increment(1);
}

/// Record a `try_lock` refused because another host holds the lock.
///
/// Metric: `sc_lock_contention_total`
pub fn record_lock_contention() {
    counter!("sc_lock_contention_total").increment(1);
}

/// Metric: `sc_actor_mailbox_depth`
/// Labels: `actor_type`
pub fn set_actor_mailbox_depth(actor_type: &str, depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("sc_actor_mailbox_depth", "actor_type" => actor_type.to_string()).set(depth as f64);
}

/// Metric: `sc_actor_panics_total`
/// Labels: `actor_type`
pub fn record_actor_panic(actor_type: &str) {
    counter!("sc_actor_panics_total", "actor_type" => actor_type.to_string()).increment(1);
}
