//! Editing session - the main entry point for Pipecache.
//!
//! The session owns every piece of client state: the catalog, the unit and edge
//! registries, the loaded pipelines and the sync coordinator. It is also the
//! event loop: replies from the remote authority are applied here and every
//! resulting change is broadcast as a [`RecordEvent`].

use std::{collections::HashMap, sync::Arc};

use tokio::{runtime::Handle, sync::broadcast, task::JoinHandle};
use tracing::{debug, trace};

use crate::{
    Config, PipecacheError, Result,
    catalog::MetaUnitCatalog,
    common::{BroadcastQueue, RecordStatus, Resolution},
    edge::{EdgeInstance, EdgeRegistry, PortRef},
    events::{RecordChange, RecordEvent},
    model::{PipelineModel, SnapshotModel},
    pipeline::{PipelineAggregate, PipelineId, PipelineStatus},
    sync::{RecordKind, RemoteAuthority, SyncCoordinator, SyncOutbox, SyncReply, SyncRequest},
    unit::{Parameter, Position, UnitInstance, UnitRegistry, UnitRemoval},
};

/// A client-side editing session.
///
/// # Example
///
/// ```rust,ignore
/// let session = SessionBuilder::new().catalog(catalog).build()?;
/// session.load_pipeline(PipelineModel::from_json(json_str)?)?;
///
/// let unit = session.add_unit("p1", "1", Position::new(0.0, 0.0), default_parameters())?;
/// session.attach(Arc::new(MemRemote::new()))?;
/// while !session.is_consistent("p1")? {
///     session.pump_next().await;
/// }
/// ```
pub struct Session {
    catalog: Arc<MetaUnitCatalog>,
    units: UnitRegistry,
    edges: EdgeRegistry,
    pipelines: HashMap<PipelineId, PipelineAggregate>,
    coordinator: SyncCoordinator,
    outbox: SyncOutbox,
    events: Arc<BroadcastQueue<RecordEvent>>,
    runtime: Option<Handle>,
}

impl Session {
    pub fn new_with_config(
        config: Config,
        catalog: MetaUnitCatalog,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let coordinator = SyncCoordinator::new(&config.sync);
        let outbox = coordinator.outbox();

        Self {
            units: UnitRegistry::new(catalog.clone(), outbox.clone()),
            edges: EdgeRegistry::new(outbox.clone()),
            catalog,
            pipelines: HashMap::new(),
            coordinator,
            outbox,
            events: BroadcastQueue::new(config.event_queue_size),
            runtime: None,
        }
    }

    pub(crate) fn with_runtime(
        mut self,
        handle: Handle,
    ) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn catalog(&self) -> &MetaUnitCatalog {
        &self.catalog
    }

    pub fn units(&self) -> &UnitRegistry {
        &self.units
    }

    pub fn edges(&self) -> &EdgeRegistry {
        &self.edges
    }

    pub fn pipeline(
        &self,
        id: &str,
    ) -> Result<&PipelineAggregate> {
        self.pipelines.get(id).ok_or(PipecacheError::NotFound(format!("pipeline {}", id)))
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &PipelineAggregate> {
        self.pipelines.values()
    }

    /// Replaces the whole cache with the server state in `snapshot`.
    ///
    /// Nothing changes when any record of the snapshot is invalid. On success the
    /// requests still queued are dropped, since the records they name are gone;
    /// replies to requests already forwarded come back stale.
    pub fn hydrate(
        &mut self,
        snapshot: SnapshotModel,
    ) -> Result<()> {
        trace!("session::hydrate({} pipelines, {} units, {} edges)", snapshot.pipelines.len(), snapshot.units.len(), snapshot.edges.len());
        let mut units = UnitRegistry::new(self.catalog.clone(), self.outbox.clone());
        let mut edges = EdgeRegistry::new(self.outbox.clone());
        for unit in snapshot.units {
            units.load(unit)?;
        }
        for edge in snapshot.edges {
            edges.load(edge, &units)?;
        }

        let mut pipelines = HashMap::with_capacity(snapshot.pipelines.len());
        for model in snapshot.pipelines {
            let pipeline = PipelineAggregate::from_model(model);
            check_members(&pipeline, &pipelines, &units, &edges)?;
            pipelines.insert(pipeline.id().to_string(), pipeline);
        }

        self.units = units;
        self.edges = edges;
        self.pipelines = pipelines;

        let dropped = self.coordinator.take_requests();
        if !dropped.is_empty() {
            debug!("session: hydrate dropped {} queued requests", dropped.len());
        }
        Ok(())
    }

    /// Adds a pipeline whose members are already loaded.
    pub fn load_pipeline(
        &mut self,
        model: PipelineModel,
    ) -> Result<()> {
        trace!("session::load_pipeline({})", model.id);
        let pipeline = PipelineAggregate::from_model(model);
        check_members(&pipeline, &self.pipelines, &self.units, &self.edges)?;
        self.pipelines.insert(pipeline.id().to_string(), pipeline);
        Ok(())
    }

    pub fn add_unit(
        &mut self,
        pipeline: &str,
        template: &str,
        position: Position,
        parameters: Vec<Parameter>,
    ) -> Result<UnitInstance> {
        lookup(&mut self.pipelines, pipeline)?.add_unit(&mut self.units, template, position, parameters)
    }

    pub fn remove_unit(
        &mut self,
        pipeline: &str,
        unit: &str,
    ) -> Result<UnitRemoval> {
        lookup(&mut self.pipelines, pipeline)?.remove_unit(&mut self.units, &mut self.edges, unit)
    }

    pub fn add_edge(
        &mut self,
        pipeline: &str,
        src: PortRef,
        dst: PortRef,
    ) -> Result<EdgeInstance> {
        lookup(&mut self.pipelines, pipeline)?.add_edge(&self.units, &mut self.edges, src, dst)
    }

    pub fn remove_edge(
        &mut self,
        pipeline: &str,
        edge: &str,
    ) -> Result<EdgeInstance> {
        lookup(&mut self.pipelines, pipeline)?.remove_edge(&mut self.edges, edge)
    }

    pub fn rename_pipeline(
        &mut self,
        pipeline: &str,
        name: &str,
    ) -> Result<()> {
        lookup(&mut self.pipelines, pipeline)?.rename(&self.outbox, name)
    }

    pub fn set_pipeline_status(
        &mut self,
        pipeline: &str,
        status: PipelineStatus,
    ) -> Result<()> {
        lookup(&mut self.pipelines, pipeline)?.set_status(status);
        Ok(())
    }

    pub fn is_consistent(
        &self,
        pipeline: &str,
    ) -> Result<bool> {
        Ok(self.pipeline(pipeline)?.is_consistent(&self.units, &self.edges))
    }

    pub fn update_unit_position(
        &mut self,
        unit: &str,
        top: f64,
        left: f64,
    ) -> Result<UnitInstance> {
        self.units.update_position(unit, top, left)
    }

    pub fn update_unit_parameters(
        &mut self,
        unit: &str,
        parameters: Vec<Parameter>,
    ) -> Result<UnitInstance> {
        self.units.update_parameters(unit, parameters)
    }

    /// Stores a status pushed by the remote side for a unit.
    pub fn set_unit_status(
        &mut self,
        unit: &str,
        status: RecordStatus,
    ) -> Result<()> {
        self.units.set_status(unit, status)
    }

    /// Takes the queued requests, for transports driven by the caller.
    pub fn take_requests(&self) -> Vec<SyncRequest> {
        self.coordinator.take_requests()
    }

    /// Queues a reply produced by a caller-driven transport; see [`Session::pump`].
    pub fn reply(
        &self,
        reply: SyncReply,
    ) -> Result<()> {
        self.coordinator.reply(reply)
    }

    /// Applies one reply and broadcasts what changed.
    ///
    /// Stale replies change nothing and produce no event.
    pub fn apply(
        &mut self,
        reply: SyncReply,
    ) -> Vec<RecordEvent> {
        trace!("session::apply({} {} {} #{})", reply.op.as_ref(), reply.kind.as_ref(), reply.record, reply.request);
        let ack = reply.verdict.is_ack();
        let events = match reply.kind {
            RecordKind::Unit => {
                let outcome = self.units.resolve(&reply.record, reply.request, ack, &mut self.edges);
                let mut events: Vec<RecordEvent> = RecordEvent::from_resolution(&reply, &outcome.resolution).into_iter().collect();
                for edge in outcome.edges.iter() {
                    self.forget(RecordKind::Edge, &edge.id);
                    events.push(RecordEvent::new(RecordKind::Edge, &edge.id, RecordChange::Evicted, &reply));
                }
                match outcome.resolution {
                    Resolution::Evicted(unit) => self.forget(RecordKind::Unit, &unit.id),
                    Resolution::Removed(unit) => self.settle_removal(RecordKind::Unit, &unit.id, false),
                    Resolution::Restored(unit) => self.settle_removal(RecordKind::Unit, &unit.id, true),
                    _ => {}
                }
                events
            }
            RecordKind::Edge => {
                let resolution = self.edges.resolve(&reply.record, reply.request, ack, &self.units);
                let events: Vec<RecordEvent> = RecordEvent::from_resolution(&reply, &resolution).into_iter().collect();
                match resolution {
                    Resolution::Evicted(edge) => self.forget(RecordKind::Edge, &edge.id),
                    Resolution::Removed(edge) => self.settle_removal(RecordKind::Edge, &edge.id, false),
                    Resolution::Restored(edge) => self.settle_removal(RecordKind::Edge, &edge.id, true),
                    _ => {}
                }
                events
            }
            RecordKind::Pipeline => match self.pipelines.get_mut(&reply.record) {
                Some(pipeline) => {
                    let resolution = pipeline.resolve_rename(reply.request, ack);
                    RecordEvent::from_resolution(&reply, &resolution).into_iter().collect()
                }
                None => {
                    debug!("session: reply #{} for unknown pipeline {} ignored", reply.request, reply.record);
                    vec![]
                }
            },
        };

        for event in events.iter() {
            self.events.send(event.clone());
        }
        events
    }

    /// Applies every reply already queued.
    pub fn pump(&mut self) -> Vec<RecordEvent> {
        let mut events = vec![];
        while let Some(reply) = self.coordinator.try_next_reply() {
            events.extend(self.apply(reply));
        }
        events
    }

    /// Waits for the next reply and applies it.
    pub async fn pump_next(&mut self) -> Option<Vec<RecordEvent>> {
        let reply = self.coordinator.next_reply().await?;
        Some(self.apply(reply))
    }

    /// Starts forwarding requests to `authority`.
    ///
    /// Uses the runtime given to the builder, or the current one. Replies are
    /// queued; the caller still drives [`Session::pump`] or [`Session::pump_next`].
    pub fn attach(
        &self,
        authority: Arc<dyn RemoteAuthority>,
    ) -> Result<JoinHandle<()>> {
        let handle = match &self.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|e| PipecacheError::Config(format!("no tokio runtime to attach the remote authority: {}", e)))?,
        };
        Ok(self.coordinator.spawn(authority, &handle))
    }

    /// Subscribes to record events.
    pub fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.events.subscribe()
    }

    /// Stops an attached transport.
    pub fn shutdown(&self) {
        self.coordinator.shutdown();
    }

    fn forget(
        &mut self,
        kind: RecordKind,
        id: &str,
    ) {
        for pipeline in self.pipelines.values_mut() {
            pipeline.forget(kind, id);
        }
    }

    fn settle_removal(
        &mut self,
        kind: RecordKind,
        id: &str,
        restored: bool,
    ) {
        for pipeline in self.pipelines.values_mut() {
            pipeline.settle_removal(kind, id, restored);
        }
    }
}

fn lookup<'a>(
    pipelines: &'a mut HashMap<PipelineId, PipelineAggregate>,
    id: &str,
) -> Result<&'a mut PipelineAggregate> {
    pipelines.get_mut(id).ok_or(PipecacheError::NotFound(format!("pipeline {}", id)))
}

/// A pipeline may only reference live records, a unit belongs to one pipeline and
/// an edge only joins units of its own pipeline.
fn check_members(
    pipeline: &PipelineAggregate,
    others: &HashMap<PipelineId, PipelineAggregate>,
    units: &UnitRegistry,
    edges: &EdgeRegistry,
) -> Result<()> {
    if others.contains_key(pipeline.id()) {
        return Err(PipecacheError::Validation(format!("duplicated pipeline id {}", pipeline.id())));
    }

    for unit in pipeline.units() {
        units.get(unit)?;
        if let Some(owner) = others.values().find(|p| p.contains_unit(unit)) {
            return Err(PipecacheError::Validation(format!("unit {} already belongs to pipeline {}", unit, owner.id())));
        }
    }

    for id in pipeline.edges() {
        let edge = edges.get(id)?;
        if edge.pipeline != pipeline.id() {
            return Err(PipecacheError::Validation(format!("edge {} belongs to pipeline {}", id, edge.pipeline)));
        }
        for end in [&edge.src, &edge.dst] {
            if !pipeline.contains_unit(&end.unit) {
                return Err(PipecacheError::Validation(format!("edge {} references unit {} outside pipeline {}", id, end.unit, pipeline.id())));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{
        sync::{MemRemote, RejectRule, SyncOp},
        unit::default_parameters,
    };

    const CATALOG: &str = r#"[
        { "id": 1, "name": "Generator", "inPorts": [], "outPorts": ["out1", "out2"] },
        { "id": 2, "name": "Printer", "inPorts": ["in1"], "outPorts": [] }
    ]"#;

    fn session() -> Session {
        let mut session = Session::new_with_config(Config::default(), MetaUnitCatalog::from_json(CATALOG).unwrap());
        session
            .load_pipeline(PipelineModel {
                id: "p1".to_string(),
                name: "Ppl1".to_string(),
                ..Default::default()
            })
            .unwrap();
        session
    }

    /// answers every queued request with `verdict` and applies the replies
    fn settle_with(
        session: &mut Session,
        reject: impl Fn(&SyncRequest) -> bool,
    ) -> Vec<RecordEvent> {
        for request in session.take_requests() {
            let reply = if reject(&request) { request.reject("refused") } else { request.ack() };
            session.reply(reply).unwrap();
        }
        session.pump()
    }

    fn ack_all(session: &mut Session) -> Vec<RecordEvent> {
        settle_with(session, |_| false)
    }

    /// generator and printer units, both confirmed
    fn two_units(session: &mut Session) -> (UnitInstance, UnitInstance) {
        let a = session.add_unit("p1", "1", Position::new(0.0, 0.0), vec![]).unwrap();
        let b = session.add_unit("p1", "2", Position::new(10.0, 20.0), vec![]).unwrap();
        ack_all(session);
        (a, b)
    }

    #[test]
    fn test_create_unit_then_confirm() {
        let mut session = session();
        let unit = session.add_unit("p1", "1", Position::new(0.0, 0.0), vec![]).unwrap();
        assert_eq!(unit.status, RecordStatus::Pending);
        assert!(!session.is_consistent("p1").unwrap());

        let events = ack_all(&mut session);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].change, RecordChange::Confirmed);
        assert_eq!(session.units().get(&unit.id).unwrap().status, RecordStatus::Ok);
        assert!(session.is_consistent("p1").unwrap());
    }

    #[test]
    fn test_rejected_edge_is_evicted() {
        let mut session = session();
        let (a, b) = two_units(&mut session);

        let edge = session.add_edge("p1", PortRef::new(&a.id, "out1"), PortRef::new(&b.id, "in1")).unwrap();
        assert_eq!(edge.status, RecordStatus::Pending);

        let events = settle_with(&mut session, |_| true);
        assert_eq!(events[0].change, RecordChange::Evicted);
        assert_eq!(events[0].reason.as_deref(), Some("refused"));
        assert!(!session.edges().contains(&edge.id));
        assert!(!session.pipeline("p1").unwrap().contains_edge(&edge.id));
        assert!(session.is_consistent("p1").unwrap());
    }

    #[test]
    fn test_connect_bad_port() {
        let mut session = session();
        let (a, b) = two_units(&mut session);

        let err = session.add_edge("p1", PortRef::new(&a.id, "out1"), PortRef::new(&b.id, "badport")).unwrap_err();
        assert!(matches!(err, PipecacheError::Validation(_)));
        assert!(session.edges().is_empty());
        assert!(session.take_requests().is_empty());
    }

    #[test]
    fn test_delete_unit_removes_edges_first() {
        let mut session = session();
        let (a, b) = two_units(&mut session);
        let edge = session.add_edge("p1", PortRef::new(&a.id, "out1"), PortRef::new(&b.id, "in1")).unwrap();
        ack_all(&mut session);

        session.remove_unit("p1", &a.id).unwrap();
        let requests = session.take_requests();
        let order: Vec<_> = requests.iter().map(|r| (r.kind, r.op, r.record.clone())).collect();
        assert_eq!(order, vec![(RecordKind::Edge, SyncOp::Delete, edge.id.clone()), (RecordKind::Unit, SyncOp::Delete, a.id.clone())]);
        assert!(!session.is_consistent("p1").unwrap());

        for request in requests {
            session.reply(request.ack()).unwrap();
        }
        let events = session.pump();
        assert!(events.iter().all(|e| e.change == RecordChange::Removed));
        assert!(!session.units().contains(&a.id));
        assert!(session.edges().list().iter().all(|e| !e.touches(&a.id)));
        assert!(session.is_consistent("p1").unwrap());
    }

    #[test]
    fn test_rejected_unit_evicts_its_edges() {
        let mut session = session();
        let (_, b) = two_units(&mut session);
        let a = session.add_unit("p1", "1", Position::new(0.0, 0.0), vec![]).unwrap();
        let edge = session.add_edge("p1", PortRef::new(&a.id, "out1"), PortRef::new(&b.id, "in1")).unwrap();

        let events = settle_with(&mut session, |r| r.kind == RecordKind::Unit);
        assert!(!session.units().contains(&a.id));
        assert!(!session.edges().contains(&edge.id));
        assert!(events.iter().any(|e| e.kind == RecordKind::Edge && e.id == edge.id && e.is_gone()));

        let pipeline = session.pipeline("p1").unwrap();
        assert!(!pipeline.contains_unit(&a.id));
        assert!(!pipeline.contains_edge(&edge.id));
        assert!(pipeline.is_consistent(session.units(), session.edges()));
    }

    #[test]
    fn test_rejected_update_reverts() {
        let mut session = session();
        let (a, _) = two_units(&mut session);

        session.update_unit_position(&a.id, 5.0, 6.0).unwrap();
        assert!(matches!(session.update_unit_position(&a.id, 7.0, 8.0), Err(PipecacheError::Busy(_))));
        assert_eq!(session.units().get(&a.id).unwrap().position, Position::new(5.0, 6.0));

        let events = settle_with(&mut session, |_| true);
        assert_eq!(events[0].change, RecordChange::Reverted);
        assert_eq!(session.units().get(&a.id).unwrap().position, Position::new(0.0, 0.0));

        session.update_unit_parameters(&a.id, default_parameters()).unwrap();
        ack_all(&mut session);
        assert_eq!(session.units().get(&a.id).unwrap().parameters, default_parameters());
    }

    #[test]
    fn test_rejected_delete_restores() {
        let mut session = session();
        let (a, b) = two_units(&mut session);
        let edge = session.add_edge("p1", PortRef::new(&a.id, "out1"), PortRef::new(&b.id, "in1")).unwrap();
        ack_all(&mut session);

        session.remove_unit("p1", &a.id).unwrap();
        let events = settle_with(&mut session, |_| true);
        assert!(events.iter().all(|e| e.change == RecordChange::Restored));
        assert!(session.units().contains(&a.id));
        assert!(session.edges().contains(&edge.id));

        let pipeline = session.pipeline("p1").unwrap();
        assert!(pipeline.contains_unit(&a.id) && pipeline.contains_edge(&edge.id));
        assert!(pipeline.is_consistent(session.units(), session.edges()));
    }

    #[test]
    fn test_edge_restore_dropped_with_its_unit() {
        let mut session = session();
        let (a, b) = two_units(&mut session);
        let edge = session.add_edge("p1", PortRef::new(&a.id, "out1"), PortRef::new(&b.id, "in1")).unwrap();
        ack_all(&mut session);

        session.remove_unit("p1", &a.id).unwrap();
        let events = settle_with(&mut session, |r| r.kind == RecordKind::Edge);
        assert!(events.iter().any(|e| e.kind == RecordKind::Edge && e.change == RecordChange::Restored));
        assert!(events.iter().any(|e| e.kind == RecordKind::Edge && e.change == RecordChange::Evicted));

        assert!(!session.units().contains(&a.id));
        assert!(!session.edges().contains(&edge.id));
        assert!(!session.pipeline("p1").unwrap().contains_edge(&edge.id));
        assert!(session.is_consistent("p1").unwrap());
    }

    #[test]
    fn test_stale_reply_is_ignored() {
        let mut session = session();
        let unit = session.add_unit("p1", "1", Position::new(0.0, 0.0), vec![]).unwrap();
        let request = session.take_requests().pop().unwrap();

        let mut stale = request.reject("late");
        stale.request += 100;
        assert!(session.apply(stale).is_empty());
        assert!(session.units().contains(&unit.id));

        assert_eq!(session.apply(request.ack()).len(), 1);
        assert!(session.apply(request.ack()).is_empty());
    }

    #[test]
    fn test_rename_pipeline() {
        let mut session = session();
        session.rename_pipeline("p1", "Renamed").unwrap();
        settle_with(&mut session, |_| true);
        assert_eq!(session.pipeline("p1").unwrap().name(), "Ppl1");

        session.rename_pipeline("p1", "Renamed").unwrap();
        ack_all(&mut session);
        assert_eq!(session.pipeline("p1").unwrap().name(), "Renamed");

        session.set_pipeline_status("p1", PipelineStatus::Finished).unwrap();
        assert_eq!(session.pipeline("p1").unwrap().status(), PipelineStatus::Finished);
        assert!(session.take_requests().is_empty());
    }

    #[test]
    fn test_unknown_pipeline() {
        let mut session = session();
        assert!(matches!(session.add_unit("p9", "1", Position::default(), vec![]), Err(PipecacheError::NotFound(_))));
        assert!(matches!(session.is_consistent("p9"), Err(PipecacheError::NotFound(_))));
    }

    #[test]
    fn test_hydrate() {
        let mut session = session();
        let snapshot = SnapshotModel::from_json(
            r#"{
                "pipelines": [{ "id": 7, "name": "Loaded", "nodes": [1, 2], "edges": [3], "status": "running" }],
                "units": [
                    { "id": 1, "type": 1, "top": 0, "left": 0 },
                    { "id": 2, "type": 2, "top": 0, "left": 100 }
                ],
                "edges": [{ "id": 3, "src": 1, "srcPort": "out1", "dst": 2, "dstPort": "in1", "pipeline": 7 }]
            }"#,
        )
        .unwrap();
        session.hydrate(snapshot).unwrap();

        assert!(session.pipeline("p1").is_err());
        let pipeline = session.pipeline("7").unwrap();
        assert_eq!(pipeline.status(), PipelineStatus::Running);
        assert!(pipeline.contains_edge("3"));
        assert_eq!(session.units().get("1").unwrap().status, RecordStatus::Ok);
        assert!(session.is_consistent("7").unwrap());
        assert!(session.take_requests().is_empty());
    }

    #[test]
    fn test_hydrate_drops_queued_requests() {
        let mut session = session();
        let unit = session.add_unit("p1", "1", Position::default(), vec![]).unwrap();
        session.hydrate(SnapshotModel::default()).unwrap();

        assert!(session.take_requests().is_empty());
        assert!(!session.units().contains(&unit.id));

        session.add_unit("p1", "1", Position::default(), vec![]).unwrap_err();
        let unit = session.units.create("1", Position::default(), vec![]).unwrap();
        let requests = session.take_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].record, unit.id);
    }

    #[test]
    fn test_hydrate_is_atomic() {
        let mut session = session();
        let snapshot = SnapshotModel {
            pipelines: vec![PipelineModel {
                id: "p2".to_string(),
                nodes: vec!["missing".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let unit = session.add_unit("p1", "1", Position::default(), vec![]).unwrap();
        assert!(matches!(session.hydrate(snapshot), Err(PipecacheError::NotFound(_))));
        assert!(session.pipeline("p1").is_ok());
        assert_eq!(session.take_requests()[0].record, unit.id);
    }

    #[test]
    fn test_subscribe() {
        let mut session = session();
        let mut events = session.subscribe();
        let unit = session.add_unit("p1", "1", Position::default(), vec![]).unwrap();
        settle_with(&mut session, |_| true);

        let event = events.try_recv().unwrap();
        assert_eq!(event.id, unit.id);
        assert_eq!(event.change, RecordChange::Evicted);
    }

    #[test]
    fn test_attach_without_runtime() {
        let session = session();
        let err = session.attach(Arc::new(MemRemote::new())).unwrap_err();
        assert!(matches!(err, PipecacheError::Config(_)));
    }

    #[tokio::test]
    async fn test_mem_remote_round_trip() {
        let mut session = session();
        let remote = Arc::new(MemRemote::new());
        remote.reject(RejectRule::new("*").unwrap().kind(RecordKind::Edge).reason("edges are frozen"));
        let transport = session.attach(remote.clone()).unwrap();

        let a = session.add_unit("p1", "1", Position::new(0.0, 0.0), default_parameters()).unwrap();
        let b = session.add_unit("p1", "2", Position::new(0.0, 50.0), vec![]).unwrap();
        let edge = session.add_edge("p1", PortRef::new(&a.id, "out2"), PortRef::new(&b.id, "in1")).unwrap();

        while !session.is_consistent("p1").unwrap() {
            tokio::time::timeout(Duration::from_secs(5), session.pump_next()).await.unwrap();
        }

        assert_eq!(session.units().get(&a.id).unwrap().status, RecordStatus::Ok);
        assert!(!session.edges().contains(&edge.id));
        assert_eq!(remote.count(RecordKind::Unit), 2);
        assert_eq!(remote.record(RecordKind::Unit, &b.id).unwrap()["pipeline"], json!("p1"));

        session.shutdown();
        transport.await.unwrap();
    }
}
