//! Participant registry and the advisory locking protocol.
//!
//! A lock is a cooperative hint between hosts sharing one coordinator: it is
//! never checked by the moderation operations themselves. Expiry is lazy. A
//! lock whose `lock_expiry` has passed is reported unlocked by
//! [`Participant::is_locked`] without any sweep, so every lock decision is a
//! pure function of the `now` passed in.

use std::time::Duration;

use tokio::time::Instant;

use crate::model::{ParticipantInfo, VoiceFlags};
use crate::platform::OccupantSnapshot;

/// A non-host occupant of the monitored voice channel.
#[derive(Debug, Clone)]
pub struct Participant {
    pub user_id: String,
    pub display_name: String,
    pub voice: VoiceFlags,
    /// Host currently claiming this participant.
    pub locked_by: Option<String>,
    /// When the claim lapses.
    pub lock_expiry: Option<Instant>,
}

impl Participant {
    /// Unlocked participant from an adapter snapshot.
    #[must_use]
    pub fn from_occupant(occupant: OccupantSnapshot) -> Self {
        Self {
            user_id: occupant.user_id,
            display_name: occupant.display_name,
            voice: occupant.voice,
            locked_by: None,
            lock_expiry: None,
        }
    }

    /// True iff a holder is set and the expiry is still in the future.
    #[must_use]
    pub fn is_locked(&self, now: Instant) -> bool {
        self.locked_by.is_some() && self.lock_expiry.is_some_and(|expiry| expiry > now)
    }

    /// Holder of the lock if it is live at `now`.
    #[must_use]
    pub fn lock_holder(&self, now: Instant) -> Option<&str> {
        if self.is_locked(now) {
            self.locked_by.as_deref()
        } else {
            None
        }
    }

    #[must_use]
    pub fn to_info(&self, now: Instant) -> ParticipantInfo {
        let locked = self.is_locked(now);
        ParticipantInfo {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            voice: self.voice,
            locked_by: if locked { self.locked_by.clone() } else { None },
            lock_remaining: if locked {
                self.lock_expiry.map(|expiry| expiry.saturating_duration_since(now))
            } else {
                None
            },
        }
    }
}

/// Outcome of [`ParticipantRegistry::try_lock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// Lock taken or refreshed; expiry reset.
    Acquired,
    /// Another host holds an unexpired lock. No state changed.
    HeldBy(String),
    /// No participant with that id.
    NotFound,
}

/// Ordered set of participants for one session, keyed by user id.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: Vec<Participant>,
}

impl ParticipantRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole registry with the channel's current occupants.
    pub fn load(&mut self, occupants: Vec<OccupantSnapshot>) {
        self.participants = occupants
            .into_iter()
            .map(Participant::from_occupant)
            .collect();
    }

    /// Insert a newly joined occupant, or refresh flags and name of a known
    /// one. A refreshed participant keeps its lock.
    ///
    /// Returns true if the participant was new.
    pub fn upsert(&mut self, occupant: OccupantSnapshot) -> bool {
        match self.get_mut(&occupant.user_id) {
            Some(existing) => {
                existing.display_name = occupant.display_name;
                existing.voice = occupant.voice;
                false
            }
            None => {
                self.participants.push(Participant::from_occupant(occupant));
                true
            }
        }
    }

    /// Overwrite the four voice flags of a known participant.
    ///
    /// Returns false if the participant is unknown.
    pub fn apply_voice_state(&mut self, user_id: &str, voice: VoiceFlags) -> bool {
        match self.get_mut(user_id) {
            Some(participant) => {
                participant.voice = voice;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, user_id: &str) -> Option<Participant> {
        let index = self
            .participants
            .iter()
            .position(|p| p.user_id == user_id)?;
        Some(self.participants.remove(index))
    }

    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn get_mut(&mut self, user_id: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.user_id == user_id)
    }

    #[must_use]
    pub fn contains(&self, user_id: &str) -> bool {
        self.get(user_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Claim a participant for `host_id` until `now + duration`.
    ///
    /// Succeeds if the participant is unlocked, its lock has expired, or the
    /// lock is already held by `host_id` (which refreshes the expiry).
    pub fn try_lock(
        &mut self,
        user_id: &str,
        host_id: &str,
        now: Instant,
        duration: Duration,
    ) -> LockOutcome {
        let Some(participant) = self.get_mut(user_id) else {
            return LockOutcome::NotFound;
        };

        if let Some(holder) = participant.lock_holder(now) {
            if holder != host_id {
                return LockOutcome::HeldBy(holder.to_string());
            }
        }

        participant.locked_by = Some(host_id.to_string());
        participant.lock_expiry = Some(now + duration);
        LockOutcome::Acquired
    }

    /// Release a claim. Only the recorded holder may release; anyone else is a no-op.
    ///
    /// Returns `None` if the participant is unknown, otherwise whether the lock was cleared.
    pub fn unlock(&mut self, user_id: &str, host_id: &str) -> Option<bool> {
        let participant = self.get_mut(user_id)?;
        if participant.locked_by.as_deref() != Some(host_id) {
            return Some(false);
        }
        participant.locked_by = None;
        participant.lock_expiry = None;
        Some(true)
    }

    #[must_use]
    pub fn snapshot(&self, now: Instant) -> Vec<ParticipantInfo> {
        self.participants.iter().map(|p| p.to_info(now)).collect()
    }
}
