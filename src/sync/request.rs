use serde::{Deserialize, Serialize};

/// Monotonic id of a request dispatched to the remote authority.
pub type RequestId = u64;

/// Kind of record a request refers to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordKind {
    Unit,
    Edge,
    Pipeline,
}

/// Remote operation carried by a request.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncOp {
    Create,
    Update,
    Delete,
}

/// Outcome reported by the remote authority for one request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Ack,
    Reject(String),
}

impl Verdict {
    pub fn is_ack(&self) -> bool {
        matches!(self, Verdict::Ack)
    }
}

/// A mutation submitted to the remote authority.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SyncRequest {
    pub id: RequestId,
    pub kind: RecordKind,
    pub op: SyncOp,
    /// id of the record the operation applies to
    pub record: String,
    /// serialized record, absent for deletes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// dispatch time in milliseconds
    pub timestamp: i64,
}

/// The remote authority's answer to a [`SyncRequest`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SyncReply {
    pub request: RequestId,
    pub kind: RecordKind,
    pub op: SyncOp,
    pub record: String,
    pub verdict: Verdict,
}

impl SyncRequest {
    pub fn ack(&self) -> SyncReply {
        self.reply(Verdict::Ack)
    }

    pub fn reject(
        &self,
        reason: impl Into<String>,
    ) -> SyncReply {
        self.reply(Verdict::Reject(reason.into()))
    }

    pub fn reply(
        &self,
        verdict: Verdict,
    ) -> SyncReply {
        SyncReply {
            request: self.id,
            kind: self.kind,
            op: self.op,
            record: self.record.clone(),
            verdict,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_reply_wire_format() {
        let request = SyncRequest {
            id: 7,
            kind: RecordKind::Edge,
            op: SyncOp::Create,
            record: "e1".to_string(),
            payload: None,
            timestamp: 0,
        };

        let value = serde_json::to_value(request.reject("port busy")).unwrap();
        assert_eq!(
            value,
            json!({
                "request": 7,
                "kind": "edge",
                "op": "create",
                "record": "e1",
                "verdict": { "reject": "port busy" }
            })
        );

        let ack: SyncReply = serde_json::from_value(json!({
            "request": 7,
            "kind": "edge",
            "op": "create",
            "record": "e1",
            "verdict": "ack"
        }))
        .unwrap();
        assert!(ack.verdict.is_ack());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(RecordKind::Pipeline.as_ref(), "pipeline");
        assert_eq!("delete".parse::<SyncOp>().unwrap(), SyncOp::Delete);
    }
}
