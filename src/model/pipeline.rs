use serde::{Deserialize, Serialize};

use crate::{
    PipecacheError, Result,
    model::{de_id, de_ids},
    pipeline::PipelineStatus,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineModel {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// unit ids
    #[serde(default, deserialize_with = "de_ids")]
    pub nodes: Vec<String>,
    /// edge ids
    #[serde(default, deserialize_with = "de_ids")]
    pub edges: Vec<String>,
    #[serde(default)]
    pub status: PipelineStatus,
}

impl PipelineModel {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<PipelineModel>(s).map_err(|e| PipecacheError::Convert(format!("invalid pipeline: {}", e)))
    }
}
