use serde::{Deserialize, Serialize};

use crate::{
    PipecacheError, Result,
    catalog::MetaUnitId,
    common::{Record, RecordStatus},
    model::UnitModel,
    sync::RecordKind,
    unit::Parameter,
};

/// unit id
pub type UnitId = String;

/// Placement of a unit on the editor canvas.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub top: f64,
    pub left: f64,
}

impl Position {
    pub fn new(
        top: f64,
        left: f64,
    ) -> Self {
        Self {
            top,
            left,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.top.is_finite() || !self.left.is_finite() {
            return Err(PipecacheError::Validation(format!("position ({}, {}) is not finite", self.top, self.left)));
        }
        Ok(())
    }
}

/// A processing unit placed in a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitInstance {
    pub id: UnitId,
    /// template the unit was made from, looked up in the catalog
    pub template: MetaUnitId,
    pub name: String,
    pub position: Position,
    pub status: RecordStatus,
    pub parameters: Vec<Parameter>,
}

impl Record for UnitInstance {
    const KIND: RecordKind = RecordKind::Unit;

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

impl UnitInstance {
    /// Wire form of the unit, `pipeline` is the pipeline it is created in.
    pub fn to_model(
        &self,
        pipeline: Option<&str>,
    ) -> UnitModel {
        UnitModel {
            id: self.id.clone(),
            template: self.template.clone(),
            name: self.name.clone(),
            top: self.position.top,
            left: self.position.left,
            status: self.status,
            parameters: self.parameters.clone(),
            pipeline: pipeline.map(str::to_string),
        }
    }
}

impl From<UnitModel> for UnitInstance {
    fn from(model: UnitModel) -> Self {
        Self {
            id: model.id,
            template: model.template,
            name: model.name,
            position: Position::new(model.top, model.left),
            status: model.status,
            parameters: model.parameters,
        }
    }
}
