use serde::{Deserialize, Serialize};

use crate::{
    common::RecordStatus,
    model::de_id,
    unit::Parameter,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitModel {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    /// meta unit id
    #[serde(rename = "type", deserialize_with = "de_id")]
    pub template: String,
    #[serde(default)]
    pub name: String,
    pub top: f64,
    pub left: f64,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// pipeline the unit is created in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
}
