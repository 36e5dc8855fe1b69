//! Record events.
//!
//! Every resolved remote operation is published to subscribers as a
//! [`RecordEvent`], so a view layer can redraw whatever changed.

use crate::{
    common::Resolution,
    sync::{RecordKind, RequestId, SyncReply, Verdict},
    utils,
};

/// What happened to a record once the remote authority answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum RecordChange {
    /// create or update acknowledged
    Confirmed,
    /// rolled back create, or dropped together with a rolled back unit
    Evicted,
    /// rejected update, the previous value is back
    Reverted,
    /// delete completed
    Removed,
    /// rejected delete, the record is live again
    Restored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordEvent {
    pub kind: RecordKind,
    /// record id
    pub id: String,
    pub change: RecordChange,
    /// request whose reply caused the change
    pub request: RequestId,
    /// rejection reason given by the remote authority
    pub reason: Option<String>,
    /// timestamp in milliseconds
    pub timestamp: i64,
}

impl RecordEvent {
    pub fn new(
        kind: RecordKind,
        id: &str,
        change: RecordChange,
        reply: &SyncReply,
    ) -> Self {
        let reason = match &reply.verdict {
            Verdict::Ack => None,
            Verdict::Reject(reason) => Some(reason.clone()),
        };
        Self {
            kind,
            id: id.to_string(),
            change,
            request: reply.request,
            reason,
            timestamp: utils::time::time_millis(),
        }
    }

    /// Builds the event for a reply's own record, `None` for stale replies.
    pub fn from_resolution<T>(
        reply: &SyncReply,
        resolution: &Resolution<T>,
    ) -> Option<Self> {
        let change = match resolution {
            Resolution::Confirmed(_) => RecordChange::Confirmed,
            Resolution::Evicted(_) => RecordChange::Evicted,
            Resolution::Reverted(_) => RecordChange::Reverted,
            Resolution::Removed(_) => RecordChange::Removed,
            Resolution::Restored(_) => RecordChange::Restored,
            Resolution::Stale => return None,
        };
        Some(Self::new(reply.kind, &reply.record, change, reply))
    }

    /// true when the record no longer exists locally
    pub fn is_gone(&self) -> bool {
        matches!(self.change, RecordChange::Evicted | RecordChange::Removed)
    }
}
