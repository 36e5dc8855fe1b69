//! In-memory remote authority.
//!
//! Keeps the accepted copy of every record and answers requests the way a
//! well-behaved server would. Rejections can be scripted with [`RejectRule`]s,
//! which makes it suitable for tests and offline editing.

use std::{collections::HashMap, sync::RwLock};

use async_trait::async_trait;
use globset::{Glob, GlobMatcher};
use serde_json::Value as JsonValue;
use tracing::trace;

use crate::{
    PipecacheError, Result,
    sync::{RecordKind, RemoteAuthority, SyncOp, SyncRequest, Verdict},
};

/// Rejects every request whose record id matches a glob pattern.
///
/// eg. `RejectRule::new("edge-*")?.kind(RecordKind::Edge).op(SyncOp::Create)`
#[derive(Debug, Clone)]
pub struct RejectRule {
    record: GlobMatcher,
    kind: Option<RecordKind>,
    op: Option<SyncOp>,
    reason: String,
}

impl RejectRule {
    pub fn new(pattern: &str) -> Result<Self> {
        let glob = Glob::new(pattern).map_err(|e| PipecacheError::Config(format!("invalid reject pattern {}: {}", pattern, e)))?;
        Ok(Self {
            record: glob.compile_matcher(),
            kind: None,
            op: None,
            reason: "rejected".to_string(),
        })
    }

    /// only match requests for this record kind
    pub fn kind(
        mut self,
        kind: RecordKind,
    ) -> Self {
        self.kind = Some(kind);
        self
    }

    /// only match requests carrying this operation
    pub fn op(
        mut self,
        op: SyncOp,
    ) -> Self {
        self.op = Some(op);
        self
    }

    pub fn reason(
        mut self,
        reason: impl Into<String>,
    ) -> Self {
        self.reason = reason.into();
        self
    }

    fn matches(
        &self,
        request: &SyncRequest,
    ) -> bool {
        self.kind.is_none_or(|k| k == request.kind) && self.op.is_none_or(|o| o == request.op) && self.record.is_match(&request.record)
    }
}

#[derive(Debug, Default)]
pub struct MemRemote {
    records: RwLock<HashMap<(RecordKind, String), JsonValue>>,
    rules: RwLock<Vec<RejectRule>>,
}

impl MemRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// add a rejection rule, rules are checked in insertion order
    pub fn reject(
        &self,
        rule: RejectRule,
    ) {
        self.rules.write().unwrap().push(rule);
    }

    pub fn clear_rules(&self) {
        self.rules.write().unwrap().clear();
    }

    /// store a record the authority already holds, e.g. one a snapshot was built from
    pub fn seed(
        &self,
        kind: RecordKind,
        id: &str,
        value: JsonValue,
    ) {
        self.records.write().unwrap().insert((kind, id.to_string()), value);
    }

    /// the accepted copy of a record
    pub fn record(
        &self,
        kind: RecordKind,
        id: &str,
    ) -> Option<JsonValue> {
        self.records.read().unwrap().get(&(kind, id.to_string())).cloned()
    }

    /// number of accepted records of `kind`
    pub fn count(
        &self,
        kind: RecordKind,
    ) -> usize {
        self.records.read().unwrap().keys().filter(|(k, _)| *k == kind).count()
    }

    fn apply(
        &self,
        request: &SyncRequest,
    ) -> Verdict {
        if let Some(rule) = self.rules.read().unwrap().iter().find(|r| r.matches(request)) {
            return Verdict::Reject(rule.reason.clone());
        }

        let key = (request.kind, request.record.clone());
        let mut records = self.records.write().unwrap();
        match request.op {
            SyncOp::Create if records.contains_key(&key) => Verdict::Reject(format!("{} {} already exists", request.kind.as_ref(), request.record)),
            SyncOp::Update | SyncOp::Delete if !records.contains_key(&key) => {
                Verdict::Reject(format!("{} {} not found", request.kind.as_ref(), request.record))
            }
            SyncOp::Create | SyncOp::Update => {
                records.insert(key, request.payload.clone().unwrap_or(JsonValue::Null));
                Verdict::Ack
            }
            SyncOp::Delete => {
                records.remove(&key);
                Verdict::Ack
            }
        }
    }
}

#[async_trait]
impl RemoteAuthority for MemRemote {
    async fn submit(
        &self,
        request: &SyncRequest,
    ) -> Verdict {
        trace!("mem_remote::submit(#{} {} {} {})", request.id, request.op.as_ref(), request.kind.as_ref(), request.record);
        self.apply(request)
    }
}
