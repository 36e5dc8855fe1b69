use serde::{Deserialize, Serialize};

use crate::{PipecacheError, Result, model::de_id};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaUnitModel {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub in_ports: Vec<String>,
    #[serde(default)]
    pub out_ports: Vec<String>,
}

impl MetaUnitModel {
    pub fn list_from_json(s: &str) -> Result<Vec<Self>> {
        serde_json::from_str::<Vec<MetaUnitModel>>(s).map_err(|e| PipecacheError::Convert(format!("invalid meta units: {}", e)))
    }
}
