//! Wire models exchanged with the remote authority.
//!
//! These mirror the JSON the server serves and accepts. Ids may arrive as
//! numbers or strings and are always kept as strings.

mod edge;
mod metaunit;
mod pipeline;
mod snapshot;
mod unit;

use serde::{Deserialize, Deserializer, de::Error};
use serde_json::Value as JsonValue;

pub use edge::EdgeModel;
pub use metaunit::MetaUnitModel;
pub use pipeline::PipelineModel;
pub use snapshot::SnapshotModel;
pub use unit::UnitModel;

fn id_from_value<E: Error>(value: JsonValue) -> std::result::Result<String, E> {
    match value {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(E::custom(format!("invalid id: {}", other))),
    }
}

pub(crate) fn de_id<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    id_from_value(JsonValue::deserialize(d)?)
}

pub(crate) fn de_ids<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<String>, D::Error> {
    Vec::<JsonValue>::deserialize(d)?.into_iter().map(id_from_value).collect()
}
