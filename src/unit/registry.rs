//! Registry of unit instances.
//!
//! Every mutation is validated against the catalog first, then dispatched to the
//! remote authority, then applied locally. A unit whose create is rejected is
//! dropped on the spot: it never lingers in an error state.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::{
    PipecacheError, Result,
    catalog::{MetaUnitCatalog, MetaUnitTemplate},
    common::{RecordStatus, RecordTable, Resolution},
    edge::{EdgeInstance, EdgeRegistry},
    model::UnitModel,
    sync::{RecordKind, RequestId, SyncOp, SyncOutbox},
    unit::{Parameter, Position, UnitInstance, validate_parameters},
    utils,
};

/// Records dispatched by [`UnitRegistry::delete`], in dispatch order.
#[derive(Debug, Clone)]
pub struct UnitRemoval {
    /// incident edges, disconnected before the unit
    pub edges: Vec<EdgeInstance>,
    pub unit: UnitInstance,
}

/// A resolved unit operation and the edges it dropped locally.
#[derive(Debug, Clone)]
pub struct UnitResolution {
    pub resolution: Resolution<UnitInstance>,
    /// incident edges evicted without a remote request
    pub edges: Vec<EdgeInstance>,
}

pub struct UnitRegistry {
    catalog: Arc<MetaUnitCatalog>,
    table: RecordTable<UnitInstance>,
    outbox: SyncOutbox,
}

impl UnitRegistry {
    pub fn new(
        catalog: Arc<MetaUnitCatalog>,
        outbox: SyncOutbox,
    ) -> Self {
        Self {
            catalog,
            table: RecordTable::new(),
            outbox,
        }
    }

    pub fn catalog(&self) -> &MetaUnitCatalog {
        &self.catalog
    }

    /// Creates a unit outside of any pipeline.
    pub fn create(
        &mut self,
        template: &str,
        position: Position,
        parameters: Vec<Parameter>,
    ) -> Result<UnitInstance> {
        self.create_in(None, template, position, parameters)
    }

    /// Creates a pending unit and dispatches its remote create.
    ///
    /// Fails with a validation error, leaving nothing behind, when the template is
    /// unknown, the position is not finite or a parameter does not match its type.
    pub fn create_in(
        &mut self,
        pipeline: Option<&str>,
        template: &str,
        position: Position,
        parameters: Vec<Parameter>,
    ) -> Result<UnitInstance> {
        trace!("units::create({})", template);
        let template = self.catalog.get(template).map_err(|_| PipecacheError::Validation(format!("unknown meta unit {}", template)))?;
        position.validate()?;
        validate_parameters(&parameters)?;

        let unit = UnitInstance {
            id: utils::longid(),
            template: template.id().to_string(),
            name: template.name().to_string(),
            position,
            status: RecordStatus::Pending,
            parameters,
        };
        let payload = serde_json::to_value(unit.to_model(pipeline))?;
        let request = self.outbox.dispatch(RecordKind::Unit, SyncOp::Create, &unit.id, Some(payload))?;
        self.table.insert_pending(unit.clone(), request)?;
        Ok(unit)
    }

    /// Inserts a unit the remote authority already holds.
    pub fn load(
        &mut self,
        model: UnitModel,
    ) -> Result<()> {
        trace!("units::load({})", model.id);
        if model.id.is_empty() {
            return Err(PipecacheError::Validation("missing id in unit".into()));
        }
        if !self.catalog.contains(&model.template) {
            return Err(PipecacheError::Validation(format!("unit {} uses unknown meta unit {}", model.id, model.template)));
        }
        let unit = UnitInstance::from(model);
        unit.position.validate()?;
        validate_parameters(&unit.parameters)?;
        self.table.insert_confirmed(unit)
    }

    pub fn update_position(
        &mut self,
        id: &str,
        top: f64,
        left: f64,
    ) -> Result<UnitInstance> {
        trace!("units::update_position({}, {}, {})", id, top, left);
        let position = Position::new(top, left);
        position.validate()?;

        let mut unit = self.table.ensure_idle(id)?.clone();
        unit.position = position;
        self.begin_update(unit)
    }

    pub fn update_parameters(
        &mut self,
        id: &str,
        parameters: Vec<Parameter>,
    ) -> Result<UnitInstance> {
        trace!("units::update_parameters({})", id);
        validate_parameters(&parameters)?;

        let mut unit = self.table.ensure_idle(id)?.clone();
        unit.parameters = parameters;
        self.begin_update(unit)
    }

    fn begin_update(
        &mut self,
        unit: UnitInstance,
    ) -> Result<UnitInstance> {
        let payload = serde_json::to_value(unit.to_model(None))?;
        let request = self.outbox.dispatch(RecordKind::Unit, SyncOp::Update, &unit.id, Some(payload))?;
        self.table.begin_update(unit.clone(), request)?;
        Ok(unit)
    }

    /// Deletes a unit together with every edge touching it.
    ///
    /// The unit and all incident edges must be idle, otherwise nothing changes and
    /// `Busy` is returned. Likewise nothing changes when the outbox cannot take every
    /// request of the cascade. Edge deletes are dispatched before the unit's own delete.
    pub fn delete(
        &mut self,
        id: &str,
        edges: &mut EdgeRegistry,
    ) -> Result<UnitRemoval> {
        trace!("units::delete({})", id);
        self.table.ensure_idle(id)?;
        let incident = edges.incident(id);
        for edge in incident.iter() {
            if edges.is_busy(&edge.id) {
                return Err(PipecacheError::Busy(format!("edge {} of unit {} has a pending request", edge.id, id)));
            }
        }

        // the whole cascade must fit, a partial one would leave edges half removed
        self.outbox.reserve(incident.len() + 1)?;

        let mut removed = Vec::with_capacity(incident.len());
        for edge in incident {
            removed.push(edges.disconnect(&edge.id)?);
        }

        let request = self.outbox.dispatch(RecordKind::Unit, SyncOp::Delete, id, None)?;
        let unit = self.table.begin_delete(id, request)?;
        Ok(UnitRemoval {
            edges: removed,
            unit,
        })
    }

    /// Resolves the in-flight operation of `id` as acknowledged.
    pub fn confirm(
        &mut self,
        id: &str,
        edges: &mut EdgeRegistry,
    ) -> Resolution<UnitInstance> {
        let resolution = self.table.confirm(id);
        debug!("units::confirm({}) -> {}", id, resolution_name(&resolution));
        self.settle(resolution, edges).resolution
    }

    /// Resolves the in-flight operation of `id` as rejected.
    ///
    /// A rejected create removes the unit entirely, with no retry, together with
    /// every edge touching it; a rejected update restores the previous value and a
    /// rejected delete restores the unit. Calling it for an id without a pending
    /// operation changes nothing.
    pub fn reject(
        &mut self,
        id: &str,
        edges: &mut EdgeRegistry,
    ) -> Resolution<UnitInstance> {
        let resolution = self.table.reject(id);
        self.settle(resolution, edges).resolution
    }

    /// Resolves `request` for `id`, ignoring replies to any other request.
    pub fn resolve(
        &mut self,
        id: &str,
        request: RequestId,
        ack: bool,
        edges: &mut EdgeRegistry,
    ) -> UnitResolution {
        let resolution = self.table.resolve(id, request, ack);
        self.settle(resolution, edges)
    }

    /// Drops the edges left pointing at a unit that is gone.
    fn settle(
        &mut self,
        resolution: Resolution<UnitInstance>,
        edges: &mut EdgeRegistry,
    ) -> UnitResolution {
        let dropped = match &resolution {
            Resolution::Evicted(unit) => {
                warn!("units: create of {} rejected, unit evicted", unit.id);
                edges.evict_incident(&unit.id)
            }
            // edges restored while the delete was pending
            Resolution::Removed(unit) => edges.drop_restored(&unit.id),
            _ => vec![],
        };
        UnitResolution {
            resolution,
            edges: dropped,
        }
    }

    /// Stores a status pushed by the remote authority.
    pub fn set_status(
        &mut self,
        id: &str,
        status: RecordStatus,
    ) -> Result<()> {
        self.table.set_status(id, status)
    }

    pub fn get(
        &self,
        id: &str,
    ) -> Result<&UnitInstance> {
        self.table.get(id).ok_or(PipecacheError::NotFound(format!("unit {}", id)))
    }

    /// The template of a live unit.
    pub fn template_of(
        &self,
        id: &str,
    ) -> Result<Arc<MetaUnitTemplate>> {
        let unit = self.get(id)?;
        self.catalog.get(&unit.template)
    }

    pub fn list(&self) -> Vec<&UnitInstance> {
        self.table.values().collect()
    }

    pub fn contains(
        &self,
        id: &str,
    ) -> bool {
        self.table.contains(id)
    }

    pub fn is_busy(
        &self,
        id: &str,
    ) -> bool {
        self.table.is_busy(id)
    }

    pub fn is_deleting(
        &self,
        id: &str,
    ) -> bool {
        self.table.is_deleting(id)
    }

    pub fn is_settled(&self) -> bool {
        self.table.is_settled()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

pub(crate) fn resolution_name<T>(resolution: &Resolution<T>) -> &'static str {
    match resolution {
        Resolution::Confirmed(_) => "confirmed",
        Resolution::Evicted(_) => "evicted",
        Resolution::Reverted(_) => "reverted",
        Resolution::Removed(_) => "removed",
        Resolution::Restored(_) => "restored",
        Resolution::Stale => "stale",
    }
}
