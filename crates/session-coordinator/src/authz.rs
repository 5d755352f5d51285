//! Role-based authorization.
//!
//! Pure functions of `(hosts, acting host id, action)`. The same inputs always
//! produce the same answer; nothing here reads the clock or session status.
//!
//! | Action | Owner | CoHost | Moderator |
//! |--------|-------|--------|-----------|
//! | Mute / Unmute / Deaf / Undeaf | yes | yes | yes |
//! | Disconnect | yes | yes | yes |
//! | Move | yes | yes | no |
//! | Add / remove hosts, change policy | yes | no | no |

use crate::model::{Host, HostRole, ModerationType};

/// Whether `role` may perform `action`.
#[must_use]
pub const fn role_allows(role: HostRole, action: ModerationType) -> bool {
    match action {
        ModerationType::Mute
        | ModerationType::Unmute
        | ModerationType::Deaf
        | ModerationType::Undeaf
        | ModerationType::Disconnect => matches!(
            role,
            HostRole::Owner | HostRole::CoHost | HostRole::Moderator
        ),
        ModerationType::Move => matches!(role, HostRole::Owner | HostRole::CoHost),
    }
}

/// Whether the host `acting_host_id` exists in `hosts` and its role allows `action`.
#[must_use]
pub fn is_authorized(hosts: &[Host], acting_host_id: &str, action: ModerationType) -> bool {
    hosts
        .iter()
        .find(|h| h.user_id == acting_host_id)
        .is_some_and(|h| role_allows(h.role, action))
}

/// Whether `requester_id` may add or remove hosts (and change policy): owners only.
#[must_use]
pub fn can_manage_hosts(hosts: &[Host], requester_id: &str) -> bool {
    hosts
        .iter()
        .find(|h| h.user_id == requester_id)
        .is_some_and(|h| h.role == HostRole::Owner)
}
