//! Edge definitions for connecting unit ports.
//!
//! An edge links an output port of one unit to an input port of another. Ports
//! are never records of their own: an edge only stores the (unit, port name)
//! pair on each side.

use serde::{Deserialize, Serialize};

use crate::{
    common::{Record, RecordStatus},
    model::EdgeModel,
    pipeline::PipelineId,
    sync::RecordKind,
    unit::UnitId,
};

/// Unique identifier for an edge.
pub type EdgeId = String;

/// One end of an edge: a unit and the name of one of its ports.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub unit: UnitId,
    pub port: String,
}

impl PortRef {
    pub fn new(
        unit: &str,
        port: &str,
    ) -> Self {
        Self {
            unit: unit.to_string(),
            port: port.to_string(),
        }
    }
}

/// Directed connection from an output port to an input port.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeInstance {
    /// Unique edge identifier.
    pub id: EdgeId,
    /// Output port the edge starts from.
    pub src: PortRef,
    /// Input port the edge ends at.
    pub dst: PortRef,
    /// Pipeline owning the edge.
    pub pipeline: PipelineId,
    pub status: RecordStatus,
}

impl EdgeInstance {
    /// true when either end sits on `unit`
    pub fn touches(
        &self,
        unit: &str,
    ) -> bool {
        self.src.unit == unit || self.dst.unit == unit
    }

    pub fn to_model(&self) -> EdgeModel {
        EdgeModel {
            id: self.id.clone(),
            src: self.src.unit.clone(),
            src_port: self.src.port.clone(),
            dst: self.dst.unit.clone(),
            dst_port: self.dst.port.clone(),
            pipeline: self.pipeline.clone(),
            status: self.status,
        }
    }
}

impl Record for EdgeInstance {
    const KIND: RecordKind = RecordKind::Edge;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_status(
        &mut self,
        status: RecordStatus,
    ) {
        self.status = status;
    }
}

impl From<EdgeModel> for EdgeInstance {
    fn from(model: EdgeModel) -> Self {
        Self {
            id: model.id,
            src: PortRef {
                unit: model.src,
                port: model.src_port,
            },
            dst: PortRef {
                unit: model.dst,
                port: model.dst_port,
            },
            pipeline: model.pipeline,
            status: model.status,
        }
    }
}
