//! Registry of edges between unit ports.
//!
//! An edge is only accepted when its source port is an output of the source
//! unit's template and its destination port an input of the destination unit's
//! template. Cycles are allowed.

use tracing::{trace, warn};

use crate::{
    PipecacheError, Result,
    common::{RecordStatus, RecordTable, Resolution},
    edge::{EdgeInstance, PortRef},
    model::EdgeModel,
    sync::{RecordKind, RequestId, SyncOp, SyncOutbox},
    unit::UnitRegistry,
    utils,
};

pub struct EdgeRegistry {
    table: RecordTable<EdgeInstance>,
    outbox: SyncOutbox,
}

impl EdgeRegistry {
    pub fn new(outbox: SyncOutbox) -> Self {
        Self {
            table: RecordTable::new(),
            outbox,
        }
    }

    fn check_endpoints(
        units: &UnitRegistry,
        src: &PortRef,
        dst: &PortRef,
    ) -> Result<()> {
        for end in [src, dst] {
            if units.is_deleting(&end.unit) {
                return Err(PipecacheError::NotFound(format!("unit {} is being deleted", end.unit)));
            }
        }

        let src_template = units.template_of(&src.unit)?;
        if !src_template.has_out_port(&src.port) {
            return Err(PipecacheError::Validation(format!(
                "unit {} ({}) has no output port {}",
                src.unit,
                src_template.name(),
                src.port
            )));
        }

        let dst_template = units.template_of(&dst.unit)?;
        if !dst_template.has_in_port(&dst.port) {
            return Err(PipecacheError::Validation(format!(
                "unit {} ({}) has no input port {}",
                dst.unit,
                dst_template.name(),
                dst.port
            )));
        }
        Ok(())
    }

    /// Connects `src` to `dst` and dispatches the remote create.
    ///
    /// The returned edge is pending; if the remote authority refuses it, it is
    /// removed without trace.
    pub fn connect(
        &mut self,
        units: &UnitRegistry,
        src: PortRef,
        dst: PortRef,
        pipeline: &str,
    ) -> Result<EdgeInstance> {
        trace!("edges::connect({}.{} -> {}.{})", src.unit, src.port, dst.unit, dst.port);
        Self::check_endpoints(units, &src, &dst)?;

        let edge = EdgeInstance {
            id: utils::longid(),
            src,
            dst,
            pipeline: pipeline.to_string(),
            status: RecordStatus::Pending,
        };
        let payload = serde_json::to_value(edge.to_model())?;
        let request = self.outbox.dispatch(RecordKind::Edge, SyncOp::Create, &edge.id, Some(payload))?;
        self.table.insert_pending(edge.clone(), request)?;
        Ok(edge)
    }

    /// Inserts an edge the remote authority already holds.
    pub fn load(
        &mut self,
        model: EdgeModel,
        units: &UnitRegistry,
    ) -> Result<()> {
        trace!("edges::load({})", model.id);
        if model.id.is_empty() {
            return Err(PipecacheError::Validation("missing id in edge".into()));
        }
        let edge = EdgeInstance::from(model);
        Self::check_endpoints(units, &edge.src, &edge.dst)?;
        self.table.insert_confirmed(edge)
    }

    /// Removes the edge locally and dispatches the remote delete.
    pub fn disconnect(
        &mut self,
        id: &str,
    ) -> Result<EdgeInstance> {
        trace!("edges::disconnect({})", id);
        self.table.ensure_idle(id)?;
        let request = self.outbox.dispatch(RecordKind::Edge, SyncOp::Delete, id, None)?;
        self.table.begin_delete(id, request)
    }

    pub fn confirm(
        &mut self,
        id: &str,
    ) -> Resolution<EdgeInstance> {
        self.table.confirm(id)
    }

    /// Resolves the in-flight operation of `id` as rejected.
    ///
    /// A rejected connect drops the edge unconditionally. A rejected disconnect
    /// brings the edge back only while both of its units are live or still waiting
    /// on their own delete.
    pub fn reject(
        &mut self,
        id: &str,
        units: &UnitRegistry,
    ) -> Resolution<EdgeInstance> {
        let resolution = self.table.reject(id);
        self.settle(resolution, units)
    }

    /// Resolves `request` for `id`, ignoring replies to any other request.
    pub fn resolve(
        &mut self,
        id: &str,
        request: RequestId,
        ack: bool,
        units: &UnitRegistry,
    ) -> Resolution<EdgeInstance> {
        let resolution = self.table.resolve(id, request, ack);
        self.settle(resolution, units)
    }

    fn settle(
        &mut self,
        resolution: Resolution<EdgeInstance>,
        units: &UnitRegistry,
    ) -> Resolution<EdgeInstance> {
        match resolution {
            Resolution::Evicted(edge) => {
                warn!("edges: connect {} rejected, edge evicted", edge.id);
                Resolution::Evicted(edge)
            }
            Resolution::Restored(edge) if !(endpoint_alive(units, &edge.src.unit) && endpoint_alive(units, &edge.dst.unit)) => {
                warn!("edges: disconnect {} rejected but its units are gone, edge dropped", edge.id);
                self.table.evict(&edge.id);
                Resolution::Removed(edge)
            }
            other => other,
        }
    }

    /// Live edges touching `unit`.
    pub fn incident(
        &self,
        unit: &str,
    ) -> Vec<EdgeInstance> {
        self.table.values().filter(|e| e.touches(unit)).cloned().collect()
    }

    /// Drops every edge touching `unit` without contacting the remote authority.
    ///
    /// Used when the unit itself was rolled back: the remote side never knew it, so
    /// it cannot know its edges either.
    pub fn evict_incident(
        &mut self,
        unit: &str,
    ) -> Vec<EdgeInstance> {
        let evicted = self.table.evict_where(|e| e.touches(unit));
        for edge in evicted.iter() {
            warn!("edges: {} evicted with unit {}", edge.id, unit);
        }
        evicted
    }

    /// Drops live edges touching `unit` once the unit's delete went through.
    ///
    /// Edges still waiting on their own delete are left to their reply.
    pub fn drop_restored(
        &mut self,
        unit: &str,
    ) -> Vec<EdgeInstance> {
        let restored = self.incident(unit);
        for edge in restored.iter() {
            warn!("edges: {} restored but unit {} is gone, edge dropped", edge.id, unit);
            self.table.evict(&edge.id);
        }
        restored
    }

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
    ) -> Result<&EdgeInstance> {
        self.table.get(id).ok_or(PipecacheError::NotFound(format!("edge {}", id)))
    }

    pub fn list(&self) -> Vec<&EdgeInstance> {
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

fn endpoint_alive(
    units: &UnitRegistry,
    unit: &str,
) -> bool {
    units.contains(unit) || units.is_deleting(unit)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        SyncConfig,
        catalog::MetaUnitCatalog,
        sync::SyncCoordinator,
        unit::{Position, UnitInstance},
    };

    struct Fixture {
        coordinator: SyncCoordinator,
        units: UnitRegistry,
        edges: EdgeRegistry,
        a: UnitInstance,
        b: UnitInstance,
    }

    fn setup() -> Fixture {
        let catalog = MetaUnitCatalog::from_json(
            r#"[
                { "id": 1, "name": "Generator", "inPorts": [], "outPorts": ["out1", "out2"] },
                { "id": 2, "name": "Sink", "inPorts": ["in1"], "outPorts": [] },
                { "id": 3, "name": "Adder", "inPorts": ["num1", "num2"], "outPorts": ["res"] }
            ]"#,
        )
        .unwrap();
        let coordinator = SyncCoordinator::new(&SyncConfig::default());
        let mut units = UnitRegistry::new(Arc::new(catalog), coordinator.outbox());
        let mut edges = EdgeRegistry::new(coordinator.outbox());

        let a = units.create("1", Position::default(), vec![]).unwrap();
        let b = units.create("2", Position::default(), vec![]).unwrap();
        units.confirm(&a.id, &mut edges);
        units.confirm(&b.id, &mut edges);
        coordinator.take_requests();

        Fixture {
            coordinator,
            units,
            edges,
            a,
            b,
        }
    }

    #[test]
    fn test_connect_then_reject() {
        let mut f = setup();

        let edge = f.edges.connect(&f.units, PortRef::new(&f.a.id, "out1"), PortRef::new(&f.b.id, "in1"), "p1").unwrap();
        assert_eq!(edge.status, RecordStatus::Pending);

        let request = f.coordinator.take_requests().pop().unwrap();
        assert_eq!((request.kind, request.op), (RecordKind::Edge, SyncOp::Create));
        let payload = request.payload.unwrap();
        assert_eq!(payload["srcPort"], "out1");
        assert_eq!(payload["dstPort"], "in1");

        assert!(matches!(f.edges.resolve(&edge.id, request.id, false, &f.units), Resolution::Evicted(_)));
        assert!(!f.edges.contains(&edge.id));
        assert!(f.edges.is_settled());
    }

    #[test]
    fn test_connect_bad_ports() {
        let mut f = setup();

        let err = f.edges.connect(&f.units, PortRef::new(&f.a.id, "out1"), PortRef::new(&f.b.id, "badport"), "p1").unwrap_err();
        assert!(matches!(err, PipecacheError::Validation(_)));

        // an input port is not a valid source
        let err = f.edges.connect(&f.units, PortRef::new(&f.b.id, "in1"), PortRef::new(&f.a.id, "out1"), "p1").unwrap_err();
        assert!(matches!(err, PipecacheError::Validation(_)));

        assert!(f.edges.is_empty());
        assert!(f.coordinator.take_requests().is_empty());
    }

    #[test]
    fn test_connect_unknown_unit() {
        let mut f = setup();
        let err = f.edges.connect(&f.units, PortRef::new("ghost", "out1"), PortRef::new(&f.b.id, "in1"), "p1").unwrap_err();
        assert!(matches!(err, PipecacheError::NotFound(_)));
    }

    #[test]
    fn test_connect_to_unit_being_deleted() {
        let mut f = setup();
        f.units.delete(&f.b.id, &mut f.edges).unwrap();

        let err = f.edges.connect(&f.units, PortRef::new(&f.a.id, "out1"), PortRef::new(&f.b.id, "in1"), "p1").unwrap_err();
        assert!(matches!(err, PipecacheError::NotFound(_)));
    }

    #[test]
    fn test_cycles_are_allowed() {
        let mut f = setup();
        let adder = f.units.create("3", Position::default(), vec![]).unwrap();

        f.edges.connect(&f.units, PortRef::new(&adder.id, "res"), PortRef::new(&adder.id, "num1"), "p1").unwrap();
        assert_eq!(f.edges.incident(&adder.id).len(), 1);
    }

    #[test]
    fn test_disconnect_reject_restores() {
        let mut f = setup();
        let edge = f.edges.connect(&f.units, PortRef::new(&f.a.id, "out2"), PortRef::new(&f.b.id, "in1"), "p1").unwrap();
        f.edges.confirm(&edge.id);

        f.edges.disconnect(&edge.id).unwrap();
        assert!(!f.edges.contains(&edge.id));
        assert!(f.edges.is_busy(&edge.id));

        assert!(matches!(f.edges.reject(&edge.id, &f.units), Resolution::Restored(_)));
        assert_eq!(f.edges.get(&edge.id).unwrap().status, RecordStatus::Ok);
    }

    #[test]
    fn test_disconnect_reject_after_unit_removed() {
        let mut f = setup();
        let edge = f.edges.connect(&f.units, PortRef::new(&f.a.id, "out1"), PortRef::new(&f.b.id, "in1"), "p1").unwrap();
        f.edges.confirm(&edge.id);

        f.units.delete(&f.a.id, &mut f.edges).unwrap();
        f.units.confirm(&f.a.id, &mut f.edges);

        assert!(matches!(f.edges.reject(&edge.id, &f.units), Resolution::Removed(_)));
        assert!(!f.edges.contains(&edge.id));
        assert!(f.edges.is_settled());
    }

    #[test]
    fn test_disconnect_reject_while_unit_delete_pending() {
        let mut f = setup();
        let edge = f.edges.connect(&f.units, PortRef::new(&f.a.id, "out1"), PortRef::new(&f.b.id, "in1"), "p1").unwrap();
        f.edges.confirm(&edge.id);

        f.units.delete(&f.a.id, &mut f.edges).unwrap();
        assert!(matches!(f.edges.reject(&edge.id, &f.units), Resolution::Restored(_)));
        assert!(f.edges.contains(&edge.id));

        let outcome = f.units.confirm(&f.a.id, &mut f.edges);
        assert!(matches!(outcome, Resolution::Removed(_)));
        assert!(!f.edges.contains(&edge.id));
        assert!(f.edges.is_settled());
    }

    #[test]
    fn test_evict_incident() {
        let mut f = setup();
        let pending = f.units.create("3", Position::default(), vec![]).unwrap();
        let e1 = f.edges.connect(&f.units, PortRef::new(&f.a.id, "out1"), PortRef::new(&pending.id, "num1"), "p1").unwrap();
        let e2 = f.edges.connect(&f.units, PortRef::new(&pending.id, "res"), PortRef::new(&f.b.id, "in1"), "p1").unwrap();
        let other = f.edges.connect(&f.units, PortRef::new(&f.a.id, "out2"), PortRef::new(&f.b.id, "in1"), "p1").unwrap();

        let evicted = f.edges.evict_incident(&pending.id);
        assert_eq!(evicted.len(), 2);
        assert!(!f.edges.contains(&e1.id) && !f.edges.contains(&e2.id));
        assert!(f.edges.contains(&other.id));
    }

    #[test]
    fn test_load() {
        let mut f = setup();
        let model = EdgeModel {
            id: "e9".to_string(),
            src: f.a.id.clone(),
            src_port: "out1".to_string(),
            dst: f.b.id.clone(),
            dst_port: "in1".to_string(),
            pipeline: "p1".to_string(),
            status: RecordStatus::Pending,
        };
        f.edges.load(model.clone(), &f.units).unwrap();
        assert_eq!(f.edges.get("e9").unwrap().status, RecordStatus::Ok);
        assert!(f.coordinator.take_requests().is_empty());

        let bad = EdgeModel {
            id: "e10".to_string(),
            dst_port: "nope".to_string(),
            ..model
        };
        assert!(matches!(f.edges.load(bad, &f.units), Err(PipecacheError::Validation(_))));
    }
}
