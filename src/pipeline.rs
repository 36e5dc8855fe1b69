//! Pipeline aggregate.
//!
//! A pipeline is a named set of unit and edge references. It decides which
//! records belong together but never owns their lifetime: creation and removal go
//! through the unit and edge registries, and the pipeline only records the ids.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    PipecacheError, Result,
    common::Resolution,
    edge::{EdgeId, EdgeInstance, EdgeRegistry, PortRef},
    model::PipelineModel,
    sync::{RecordKind, RequestId, SyncOp, SyncOutbox},
    unit::{Parameter, Position, UnitId, UnitInstance, UnitRegistry, UnitRemoval},
};

/// pipeline id
pub type PipelineId = String;

/// Status reported for a whole pipeline by the remote side.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PipelineStatus {
    #[default]
    Unknown,
    Finished,
    Running,
    Failed,
}

#[derive(Debug, Clone)]
struct PendingRename {
    request: RequestId,
    previous: String,
}

#[derive(Debug, Clone)]
pub struct PipelineAggregate {
    id: PipelineId,
    name: String,
    status: PipelineStatus,
    units: BTreeSet<UnitId>,
    edges: BTreeSet<EdgeId>,
    /// members removed locally whose remote delete has not resolved yet
    pending_removals: HashSet<(RecordKind, String)>,
    rename: Option<PendingRename>,
}

impl PipelineAggregate {
    pub fn new(
        id: &str,
        name: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            status: PipelineStatus::Unknown,
            units: BTreeSet::new(),
            edges: BTreeSet::new(),
            pending_removals: HashSet::new(),
            rename: None,
        }
    }

    pub fn from_model(model: PipelineModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            status: model.status,
            units: model.nodes.into_iter().collect(),
            edges: model.edges.into_iter().collect(),
            pending_removals: HashSet::new(),
            rename: None,
        }
    }

    pub fn to_model(&self) -> PipelineModel {
        PipelineModel {
            id: self.id.clone(),
            name: self.name.clone(),
            nodes: self.units.iter().cloned().collect(),
            edges: self.edges.iter().cloned().collect(),
            status: self.status,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn units(&self) -> impl Iterator<Item = &UnitId> {
        self.units.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &EdgeId> {
        self.edges.iter()
    }

    pub fn contains_unit(
        &self,
        id: &str,
    ) -> bool {
        self.units.contains(id)
    }

    pub fn contains_edge(
        &self,
        id: &str,
    ) -> bool {
        self.edges.contains(id)
    }

    /// Creates a unit through the registry and records it in this pipeline.
    pub fn add_unit(
        &mut self,
        units: &mut UnitRegistry,
        template: &str,
        position: Position,
        parameters: Vec<Parameter>,
    ) -> Result<UnitInstance> {
        trace!("pipeline({})::add_unit({})", self.id, template);
        let unit = units.create_in(Some(self.id.as_str()), template, position, parameters)?;
        self.units.insert(unit.id.clone());
        Ok(unit)
    }

    /// Removes a unit after first disconnecting every edge touching it.
    pub fn remove_unit(
        &mut self,
        units: &mut UnitRegistry,
        edges: &mut EdgeRegistry,
        id: &str,
    ) -> Result<UnitRemoval> {
        trace!("pipeline({})::remove_unit({})", self.id, id);
        if !self.units.contains(id) {
            return Err(PipecacheError::NotFound(format!("unit {} in pipeline {}", id, self.id)));
        }

        let removal = units.delete(id, edges)?;
        for edge in removal.edges.iter() {
            self.note_removed(RecordKind::Edge, &edge.id);
        }
        self.note_removed(RecordKind::Unit, id);
        Ok(removal)
    }

    /// Connects two units of this pipeline.
    pub fn add_edge(
        &mut self,
        units: &UnitRegistry,
        edges: &mut EdgeRegistry,
        src: PortRef,
        dst: PortRef,
    ) -> Result<EdgeInstance> {
        trace!("pipeline({})::add_edge({}.{} -> {}.{})", self.id, src.unit, src.port, dst.unit, dst.port);
        for end in [&src, &dst] {
            if !self.units.contains(&end.unit) {
                return Err(PipecacheError::Validation(format!("unit {} is not part of pipeline {}", end.unit, self.id)));
            }
        }

        let edge = edges.connect(units, src, dst, &self.id)?;
        self.edges.insert(edge.id.clone());
        Ok(edge)
    }

    pub fn remove_edge(
        &mut self,
        edges: &mut EdgeRegistry,
        id: &str,
    ) -> Result<EdgeInstance> {
        trace!("pipeline({})::remove_edge({})", self.id, id);
        if !self.edges.contains(id) {
            return Err(PipecacheError::NotFound(format!("edge {} in pipeline {}", id, self.id)));
        }

        let edge = edges.disconnect(id)?;
        self.note_removed(RecordKind::Edge, id);
        Ok(edge)
    }

    /// Renames the pipeline and dispatches the remote update.
    pub fn rename(
        &mut self,
        outbox: &SyncOutbox,
        name: &str,
    ) -> Result<()> {
        trace!("pipeline({})::rename({})", self.id, name);
        if name.trim().is_empty() {
            return Err(PipecacheError::Validation("pipeline name must not be empty".into()));
        }
        if let Some(pending) = &self.rename {
            return Err(PipecacheError::Busy(format!("pipeline {} has a pending rename ({})", self.id, pending.request)));
        }

        let mut model = self.to_model();
        model.name = name.to_string();
        let payload = serde_json::to_value(&model)?;
        let request = outbox.dispatch(RecordKind::Pipeline, SyncOp::Update, &self.id, Some(payload))?;

        let previous = std::mem::replace(&mut self.name, name.to_string());
        self.rename = Some(PendingRename {
            request,
            previous,
        });
        Ok(())
    }

    /// Resolves a pending rename; a rejected rename restores the previous name.
    pub fn resolve_rename(
        &mut self,
        request: RequestId,
        ack: bool,
    ) -> Resolution<String> {
        match self.rename.take() {
            Some(pending) if pending.request == request => {
                if ack {
                    Resolution::Confirmed(self.name.clone())
                } else {
                    debug!("pipeline({}): rename rejected, back to {}", self.id, pending.previous);
                    self.name = pending.previous;
                    Resolution::Reverted(self.name.clone())
                }
            }
            other => {
                self.rename = other;
                Resolution::Stale
            }
        }
    }

    /// Stores the status reported by the remote side.
    pub fn set_status(
        &mut self,
        status: PipelineStatus,
    ) {
        self.status = status;
    }

    /// Drops a member locally and waits for its remote delete.
    pub(crate) fn note_removed(
        &mut self,
        kind: RecordKind,
        id: &str,
    ) {
        let removed = match kind {
            RecordKind::Unit => self.units.remove(id),
            RecordKind::Edge => self.edges.remove(id),
            RecordKind::Pipeline => false,
        };
        if removed {
            self.pending_removals.insert((kind, id.to_string()));
        }
    }

    /// Closes a pending removal; a restored member comes back.
    pub(crate) fn settle_removal(
        &mut self,
        kind: RecordKind,
        id: &str,
        restored: bool,
    ) {
        if !self.pending_removals.remove(&(kind, id.to_string())) {
            return;
        }
        if restored {
            match kind {
                RecordKind::Unit => self.units.insert(id.to_string()),
                RecordKind::Edge => self.edges.insert(id.to_string()),
                RecordKind::Pipeline => false,
            };
        }
    }

    /// Forgets a member that was evicted from its registry.
    pub(crate) fn forget(
        &mut self,
        kind: RecordKind,
        id: &str,
    ) {
        match kind {
            RecordKind::Unit => self.units.remove(id),
            RecordKind::Edge => self.edges.remove(id),
            RecordKind::Pipeline => false,
        };
        self.pending_removals.remove(&(kind, id.to_string()));
    }

    /// True once every member and every removal has been resolved remotely.
    pub fn is_consistent(
        &self,
        units: &UnitRegistry,
        edges: &EdgeRegistry,
    ) -> bool {
        self.rename.is_none()
            && self.pending_removals.is_empty()
            && self.units.iter().all(|id| !units.is_busy(id))
            && self.edges.iter().all(|id| !edges.is_busy(id))
    }
}
