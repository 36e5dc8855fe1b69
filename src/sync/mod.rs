//! Remote synchronisation: requests to the remote authority and its replies.
//!
//! Mutations are pushed into a FIFO outbox as [`SyncRequest`]s. A transport, either
//! a task spawned by [`SyncCoordinator::spawn`] around a [`RemoteAuthority`] or an
//! external one draining [`SyncCoordinator::take_requests`], answers each of them
//! with a [`SyncReply`] that the session applies in arrival order.

mod authority;
mod coordinator;
mod mem;
mod request;

pub use authority::RemoteAuthority;
pub use coordinator::{SyncCoordinator, SyncOutbox};
pub use mem::{MemRemote, RejectRule};
pub use request::{RecordKind, RequestId, SyncOp, SyncReply, SyncRequest, Verdict};
