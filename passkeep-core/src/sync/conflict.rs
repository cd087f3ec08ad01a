//! Last-Write-Wins conflict resolution.

use crate::record::Record;
use chrono::{DateTime, Utc};

/// Conflict resolution outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Store the incoming record (no stored copy, or incoming is newer).
    AcceptIncoming,
    /// Keep the stored record (incoming is older or equally old).
    KeepExisting,
}

pub struct ConflictResolver;

impl ConflictResolver {
    /// Resolve an incoming write against the stored timestamp for the same id.
    ///
    /// LWW rules:
    /// 1. Nothing stored: accept.
    /// 2. Incoming strictly after stored: accept.
    /// 3. Otherwise keep the stored copy. Ties keep the stored copy.
    pub fn resolve(existing: Option<DateTime<Utc>>, incoming: DateTime<Utc>) -> Resolution {
        match existing {
            None => Resolution::AcceptIncoming,
            Some(existing) if incoming > existing => Resolution::AcceptIncoming,
            Some(_) => Resolution::KeepExisting,
        }
    }

    /// Convenience wrapper over [`ConflictResolver::resolve`] for whole records.
    pub fn resolve_records(existing: Option<&Record>, incoming: &Record) -> Resolution {
        Self::resolve(
            existing.map(Record::last_update_date),
            incoming.last_update_date(),
        )
    }
}
