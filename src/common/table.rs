//! Optimistic bookkeeping shared by the unit and edge registries.
//!
//! A [`RecordTable`] keeps the live view of a record kind together with at most
//! one in-flight remote operation per record. Locally deleted records move to a
//! tombstone area until the remote delete resolves, so they can be restored when
//! the remote authority refuses the delete.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    PipecacheError, Result,
    sync::{RecordKind, RequestId, SyncOp},
};

/// Local status of a unit or edge.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordStatus {
    /// Created locally, not yet acknowledged by the remote authority.
    #[default]
    Pending,
    /// Acknowledged by the remote authority.
    Ok,
    /// Reported as failed by the remote authority.
    Error,
}

/// A record that can live in a [`RecordTable`].
pub trait Record: Clone {
    const KIND: RecordKind;

    fn id(&self) -> &str;

    fn set_status(
        &mut self,
        status: RecordStatus,
    );
}

/// The single unresolved remote operation of a record.
#[derive(Debug, Clone)]
pub struct Inflight<T> {
    pub request: RequestId,
    pub op: SyncOp,
    /// value restored when the operation is rejected
    pub previous: Option<T>,
}

/// What happened to a record when its in-flight operation resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    /// create or update acknowledged
    Confirmed(T),
    /// create rejected, the record is gone
    Evicted(T),
    /// update rejected, the previous value is back
    Reverted(T),
    /// delete acknowledged
    Removed(T),
    /// delete rejected, the record is live again
    Restored(T),
    /// nothing to resolve for this id or request
    Stale,
}

#[derive(Debug, Clone)]
struct Entry<T> {
    record: T,
    inflight: Option<Inflight<T>>,
}

#[derive(Debug, Clone)]
pub struct RecordTable<T> {
    live: HashMap<String, Entry<T>>,
    tombstones: HashMap<String, Entry<T>>,
}

impl<T: Record> Default for RecordTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> RecordTable<T> {
    pub fn new() -> Self {
        Self {
            live: HashMap::new(),
            tombstones: HashMap::new(),
        }
    }

    /// get a live record
    pub fn get(
        &self,
        id: &str,
    ) -> Option<&T> {
        self.live.get(id).map(|e| &e.record)
    }

    pub fn contains(
        &self,
        id: &str,
    ) -> bool {
        self.live.contains_key(id)
    }

    /// true while a delete for `id` waits for the remote authority
    pub fn is_deleting(
        &self,
        id: &str,
    ) -> bool {
        self.tombstones.contains_key(id)
    }

    /// true while `id` has an unresolved remote operation
    pub fn is_busy(
        &self,
        id: &str,
    ) -> bool {
        self.inflight(id).is_some()
    }

    pub fn inflight(
        &self,
        id: &str,
    ) -> Option<&Inflight<T>> {
        self.live.get(id).or_else(|| self.tombstones.get(id)).and_then(|e| e.inflight.as_ref())
    }

    /// true when no record has an unresolved remote operation
    pub fn is_settled(&self) -> bool {
        self.tombstones.is_empty() && self.live.values().all(|e| e.inflight.is_none())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.live.values().map(|e| &e.record)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// returns the live record when it can take a new mutation
    pub fn ensure_idle(
        &self,
        id: &str,
    ) -> Result<&T> {
        if self.tombstones.contains_key(id) {
            return Err(PipecacheError::Busy(format!("{} {} is being deleted", T::KIND.as_ref(), id)));
        }
        let entry = self.live.get(id).ok_or(PipecacheError::NotFound(format!("{} {}", T::KIND.as_ref(), id)))?;
        if let Some(inflight) = &entry.inflight {
            return Err(PipecacheError::Busy(format!(
                "{} {} has a pending {} request ({})",
                T::KIND.as_ref(),
                id,
                inflight.op.as_ref(),
                inflight.request
            )));
        }
        Ok(&entry.record)
    }

    fn ensure_new(
        &self,
        id: &str,
    ) -> Result<()> {
        if self.live.contains_key(id) || self.tombstones.contains_key(id) {
            return Err(PipecacheError::Validation(format!("duplicated {} id {}", T::KIND.as_ref(), id)));
        }
        Ok(())
    }

    /// insert a record the remote authority already knows about
    pub fn insert_confirmed(
        &mut self,
        mut record: T,
    ) -> Result<()> {
        self.ensure_new(record.id())?;
        record.set_status(RecordStatus::Ok);
        self.live.insert(
            record.id().to_string(),
            Entry {
                record,
                inflight: None,
            },
        );
        Ok(())
    }

    /// insert an optimistic record whose remote create is `request`
    pub fn insert_pending(
        &mut self,
        mut record: T,
        request: RequestId,
    ) -> Result<()> {
        self.ensure_new(record.id())?;
        record.set_status(RecordStatus::Pending);
        self.live.insert(
            record.id().to_string(),
            Entry {
                record,
                inflight: Some(Inflight {
                    request,
                    op: SyncOp::Create,
                    previous: None,
                }),
            },
        );
        Ok(())
    }

    /// replace an idle record with `record`, remembering the old value until `request` resolves
    pub fn begin_update(
        &mut self,
        record: T,
        request: RequestId,
    ) -> Result<()> {
        self.ensure_idle(record.id())?;
        let entry = self.live.get_mut(record.id()).ok_or(PipecacheError::NotFound(record.id().to_string()))?;
        let previous = std::mem::replace(&mut entry.record, record);
        entry.inflight = Some(Inflight {
            request,
            op: SyncOp::Update,
            previous: Some(previous),
        });
        Ok(())
    }

    /// move an idle record to the tombstones until `request` resolves
    pub fn begin_delete(
        &mut self,
        id: &str,
        request: RequestId,
    ) -> Result<T> {
        self.ensure_idle(id)?;
        let mut entry = self.live.remove(id).ok_or(PipecacheError::NotFound(id.to_string()))?;
        entry.inflight = Some(Inflight {
            request,
            op: SyncOp::Delete,
            previous: None,
        });
        let record = entry.record.clone();
        self.tombstones.insert(id.to_string(), entry);
        Ok(record)
    }

    /// overwrite the status of a live record, `Pending` only comes from an in-flight op
    pub fn set_status(
        &mut self,
        id: &str,
        status: RecordStatus,
    ) -> Result<()> {
        if status == RecordStatus::Pending {
            return Err(PipecacheError::Validation(format!("{} {}: pending is not a remote status", T::KIND.as_ref(), id)));
        }
        let entry = self.live.get_mut(id).ok_or(PipecacheError::NotFound(format!("{} {}", T::KIND.as_ref(), id)))?;
        entry.record.set_status(status);
        Ok(())
    }

    /// drop a record unconditionally, live or tombstoned
    pub fn evict(
        &mut self,
        id: &str,
    ) -> Option<T> {
        self.live.remove(id).or_else(|| self.tombstones.remove(id)).map(|e| e.record)
    }

    /// drop every record, live or tombstoned, matching `pred`
    pub fn evict_where(
        &mut self,
        pred: impl Fn(&T) -> bool,
    ) -> Vec<T> {
        let ids: Vec<String> = self.live.values().chain(self.tombstones.values()).filter(|e| pred(&e.record)).map(|e| e.record.id().to_string()).collect();
        ids.iter().filter_map(|id| self.evict(id)).collect()
    }

    /// resolve the in-flight operation of `id` as acknowledged
    pub fn confirm(
        &mut self,
        id: &str,
    ) -> Resolution<T> {
        match self.inflight(id).map(|i| i.request) {
            Some(request) => self.resolve(id, request, true),
            None => Resolution::Stale,
        }
    }

    /// resolve the in-flight operation of `id` as rejected
    pub fn reject(
        &mut self,
        id: &str,
    ) -> Resolution<T> {
        match self.inflight(id).map(|i| i.request) {
            Some(request) => self.resolve(id, request, false),
            None => Resolution::Stale,
        }
    }

    /// resolve `request` for `id`; replies for any other request are stale
    pub fn resolve(
        &mut self,
        id: &str,
        request: RequestId,
        ack: bool,
    ) -> Resolution<T> {
        let Some((op, pending)) = self.inflight(id).map(|i| (i.op, i.request)) else {
            debug!("{} {}: no pending request, reply {} ignored", T::KIND.as_ref(), id, request);
            return Resolution::Stale;
        };
        if pending != request {
            debug!("{} {}: reply {} does not match pending request {}", T::KIND.as_ref(), id, request, pending);
            return Resolution::Stale;
        }

        let resolution = match (op, ack) {
            (SyncOp::Create, true) => self.live.get_mut(id).map(|entry| {
                entry.inflight = None;
                entry.record.set_status(RecordStatus::Ok);
                Resolution::Confirmed(entry.record.clone())
            }),
            (SyncOp::Create, false) => self.live.remove(id).map(|entry| Resolution::Evicted(entry.record)),
            (SyncOp::Update, _) => self.live.get_mut(id).map(|entry| {
                let previous = entry.inflight.take().and_then(|i| i.previous);
                match previous {
                    Some(previous) if !ack => {
                        entry.record = previous;
                        Resolution::Reverted(entry.record.clone())
                    }
                    _ => Resolution::Confirmed(entry.record.clone()),
                }
            }),
            (SyncOp::Delete, true) => self.tombstones.remove(id).map(|entry| Resolution::Removed(entry.record)),
            (SyncOp::Delete, false) => match self.tombstones.remove(id) {
                Some(mut entry) => {
                    entry.inflight = None;
                    let record = entry.record.clone();
                    self.live.insert(id.to_string(), entry);
                    Some(Resolution::Restored(record))
                }
                None => None,
            },
        };

        resolution.unwrap_or(Resolution::Stale)
    }
}
