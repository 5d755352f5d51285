//! Host roster for one session.
//!
//! The roster is seeded with exactly one `Owner` and keeps that invariant for
//! its whole lifetime: no second owner can be added and the owner can never
//! be removed.

use crate::authz;
use crate::errors::CoordinatorError;
use crate::model::{Host, HostRole};

/// Ordered list of hosts.
#[derive(Debug)]
pub struct HostRoster {
    hosts: Vec<Host>,
}

impl HostRoster {
    /// Roster containing only the owner, marked online.
    #[must_use]
    pub fn with_owner(owner_id: &str, owner_name: &str) -> Self {
        Self {
            hosts: vec![Host {
                user_id: owner_id.to_string(),
                display_name: owner_name.to_string(),
                role: HostRole::Owner,
                online: true,
            }],
        }
    }

    #[must_use]
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.user_id == user_id)
    }

    #[must_use]
    pub fn owner(&self) -> Option<&Host> {
        self.hosts.iter().find(|h| h.role == HostRole::Owner)
    }

    /// Add a host on behalf of `requester_id`.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the requester is not the owner.
    /// - `InvalidRequest` for an empty id, a duplicate id, or a second `Owner`.
    pub fn add(
        &mut self,
        requester_id: &str,
        user_id: &str,
        display_name: &str,
        role: HostRole,
    ) -> Result<(), CoordinatorError> {
        if !authz::can_manage_hosts(&self.hosts, requester_id) {
            return Err(CoordinatorError::Unauthorized(
                "Only the owner can manage hosts".to_string(),
            ));
        }
        if user_id.trim().is_empty() {
            return Err(CoordinatorError::InvalidRequest(
                "Host id must not be empty".to_string(),
            ));
        }
        if role == HostRole::Owner {
            return Err(CoordinatorError::InvalidRequest(
                "A session has exactly one owner".to_string(),
            ));
        }
        if self.get(user_id).is_some() {
            return Err(CoordinatorError::InvalidRequest(
                "Host already in session".to_string(),
            ));
        }

        self.hosts.push(Host {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            role,
            online: true,
        });
        Ok(())
    }

    /// Remove a host on behalf of `requester_id`.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the requester is not the owner.
    /// - `InvalidRequest` if the host does not exist or is the owner.
    pub fn remove(&mut self, requester_id: &str, user_id: &str) -> Result<Host, CoordinatorError> {
        if !authz::can_manage_hosts(&self.hosts, requester_id) {
            return Err(CoordinatorError::Unauthorized(
                "Only the owner can manage hosts".to_string(),
            ));
        }

        let index = self
            .hosts
            .iter()
            .position(|h| h.user_id == user_id)
            .ok_or_else(|| CoordinatorError::InvalidRequest("Host not in session".to_string()))?;

        if self.hosts.get(index).is_some_and(|h| h.role == HostRole::Owner) {
            return Err(CoordinatorError::InvalidRequest(
                "The owner cannot be removed".to_string(),
            ));
        }

        Ok(self.hosts.remove(index))
    }

    /// Update a host's online flag. Returns false if the host is unknown.
    pub fn set_online(&mut self, user_id: &str, online: bool) -> bool {
        match self.hosts.iter_mut().find(|h| h.user_id == user_id) {
            Some(host) => {
                host.online = online;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn owner_count(roster: &HostRoster) -> usize {
        roster
            .hosts()
            .iter()
            .filter(|h| h.role == HostRole::Owner)
            .count()
    }

    #[test]
    fn test_seeded_with_single_owner() {
        let roster = HostRoster::with_owner("owner", "Olivia");
        assert_eq!(roster.hosts().len(), 1);
        assert_eq!(owner_count(&roster), 1);
        assert_eq!(roster.owner().unwrap().user_id, "owner");
        assert!(roster.owner().unwrap().online);
    }

    #[test]
    fn test_owner_adds_and_removes_hosts() {
        let mut roster = HostRoster::with_owner("owner", "Olivia");

        roster.add("owner", "co", "Casey", HostRole::CoHost).unwrap();
        roster.add("owner", "mod", "Morgan", HostRole::Moderator).unwrap();
        assert_eq!(roster.hosts().len(), 3);

        let removed = roster.remove("owner", "mod").unwrap();
        assert_eq!(removed.role, HostRole::Moderator);
        assert_eq!(roster.hosts().len(), 2);
    }

    #[test]
    fn test_non_owner_cannot_manage_hosts() {
        let mut roster = HostRoster::with_owner("owner", "Olivia");
        roster.add("owner", "co", "Casey", HostRole::CoHost).unwrap();

        let result = roster.add("co", "mod", "Morgan", HostRole::Moderator);
        assert!(matches!(result, Err(CoordinatorError::Unauthorized(_))));

        let result = roster.remove("co", "co");
        assert!(matches!(result, Err(CoordinatorError::Unauthorized(_))));
        assert_eq!(roster.hosts().len(), 2);
    }

    #[test]
    fn test_duplicate_and_second_owner_rejected() {
        let mut roster = HostRoster::with_owner("owner", "Olivia");
        roster.add("owner", "co", "Casey", HostRole::CoHost).unwrap();

        let dup = roster.add("owner", "co", "Casey again", HostRole::Moderator);
        assert!(matches!(dup, Err(CoordinatorError::InvalidRequest(_))));

        let second_owner = roster.add("owner", "x", "X", HostRole::Owner);
        assert!(matches!(second_owner, Err(CoordinatorError::InvalidRequest(_))));
        assert_eq!(owner_count(&roster), 1);
    }

    #[test]
    fn test_owner_can_never_be_removed() {
        let mut roster = HostRoster::with_owner("owner", "Olivia");

        let result = roster.remove("owner", "owner");
        assert!(matches!(result, Err(CoordinatorError::InvalidRequest(_))));
        assert_eq!(owner_count(&roster), 1);

        let missing = roster.remove("owner", "ghost");
        assert!(matches!(missing, Err(CoordinatorError::InvalidRequest(_))));
    }

    #[test]
    fn test_set_online() {
        let mut roster = HostRoster::with_owner("owner", "Olivia");
        assert!(roster.set_online("owner", false));
        assert!(!roster.get("owner").unwrap().online);
        assert!(!roster.set_online("ghost", true));
    }
}
