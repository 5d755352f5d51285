//! Append-only audit log of moderation attempts.
//!
//! Entries are only ever appended; order is chronological append order.
//! Bounded retention, if wanted, is a presentation concern.

use chrono::Utc;

use crate::model::{AuditEntry, ModerationType};

/// Append-only sequence of [`AuditEntry`] values for one session.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

/// Fields of an audit record before it is timestamped.
#[derive(Debug, Clone)]
pub struct AuditRecord<'a> {
    pub host_id: &'a str,
    pub host_name: &'a str,
    pub action: ModerationType,
    pub target_id: &'a str,
    pub target_name: &'a str,
}

impl AuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp and append one entry, returning a copy for publication.
    pub fn append(
        &mut self,
        record: AuditRecord<'_>,
        success: bool,
        error_message: Option<&str>,
    ) -> AuditEntry {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            host_id: record.host_id.to_string(),
            host_name: record.host_name.to_string(),
            action: record.action,
            target_id: record.target_id.to_string(),
            target_name: record.target_name.to_string(),
            success,
            error_message: error_message.map(str::to_string),
        };
        self.entries.push(entry.clone());
        entry
    }

    #[must_use]
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Most recently appended entry.
    #[must_use]
    pub fn latest(&self) -> Option<&AuditEntry> {
        self.entries.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
