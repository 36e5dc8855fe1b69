use serde::{Deserialize, Serialize};

use crate::{
    PipecacheError, Result,
    model::{EdgeModel, PipelineModel, UnitModel},
};

/// Server state used to hydrate a session: every record in it is already confirmed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotModel {
    #[serde(default)]
    pub pipelines: Vec<PipelineModel>,
    #[serde(default)]
    pub units: Vec<UnitModel>,
    #[serde(default)]
    pub edges: Vec<EdgeModel>,
}

impl SnapshotModel {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<SnapshotModel>(s).map_err(|e| PipecacheError::Convert(format!("invalid snapshot: {}", e)))
    }
}
