//! # Pipecache
//!
//! Pipecache is the client-side data model of a visual pipeline editor. It keeps
//! a local cache of unit templates, units, edges and pipelines in sync with a
//! remote authority that owns the real records.
//!
//! ## Core Features
//!
//! - **Optimistic Updates**: Every mutation is validated, applied locally and sent to the remote side at once
//! - **Rollback**: Rejected creates vanish, rejected updates revert and rejected deletes come back
//! - **Port Validation**: Edges are checked against the unit templates before anything is sent
//! - **Pluggable Transport**: Any `RemoteAuthority` can be attached, with an in-memory one for tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipecache::{MetaUnitCatalog, PortRef, Position, SessionBuilder};
//!
//! let catalog = MetaUnitCatalog::from_json(meta_units_json)?;
//! let mut session = SessionBuilder::new().catalog(catalog).build()?;
//! session.hydrate(SnapshotModel::from_json(snapshot_json)?)?;
//!
//! let a = session.add_unit("1", "generator", Position::new(0.0, 0.0), vec![])?;
//! let b = session.add_unit("1", "printer", Position::new(0.0, 120.0), vec![])?;
//! session.add_edge("1", PortRef::new(&a.id, "out1"), PortRef::new(&b.id, "in1"))?;
//!
//! session.attach(Arc::new(MemRemote::new()))?;
//! while !session.is_consistent("1")? {
//!     session.pump_next().await;
//! }
//! ```

mod builder;
mod catalog;
mod common;
mod config;
mod edge;
mod error;
mod events;
mod model;
mod pipeline;
mod session;
mod sync;
mod unit;
mod utils;

pub use builder::SessionBuilder;
pub use catalog::{MetaUnitCatalog, MetaUnitId, MetaUnitTemplate};
pub use common::{RecordStatus, Resolution};
pub use config::{Config, SyncConfig};
pub use edge::{EdgeId, EdgeInstance, EdgeRegistry, PortRef};
pub use error::PipecacheError;
pub use events::{RecordChange, RecordEvent};
pub use model::*;
pub use pipeline::{PipelineAggregate, PipelineId, PipelineStatus};
pub use session::Session;
pub use sync::{MemRemote, RecordKind, RejectRule, RemoteAuthority, RequestId, SyncCoordinator, SyncOp, SyncOutbox, SyncReply, SyncRequest, Verdict};
pub use unit::{ParamType, Parameter, Position, UnitId, UnitInstance, UnitRegistry, UnitRemoval, default_parameters, validate_parameters};

/// Result type alias for Pipecache operations.
pub type Result<T> = std::result::Result<T, PipecacheError>;
