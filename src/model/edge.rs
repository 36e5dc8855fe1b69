use serde::{Deserialize, Serialize};

use crate::{common::RecordStatus, model::de_id};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeModel {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub src: String,
    pub src_port: String,
    #[serde(deserialize_with = "de_id")]
    pub dst: String,
    pub dst_port: String,
    #[serde(deserialize_with = "de_id")]
    pub pipeline: String,
    #[serde(default)]
    pub status: RecordStatus,
}
