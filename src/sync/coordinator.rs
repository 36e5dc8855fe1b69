use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, trace};

use crate::{
    PipecacheError, Result, SyncConfig,
    common::{Queue, Shutdown},
    sync::{RecordKind, RemoteAuthority, RequestId, SyncOp, SyncReply, SyncRequest, Verdict},
    utils,
};

/// Cloneable handle the registries use to dispatch requests.
#[derive(Clone)]
pub struct SyncOutbox {
    queue: Arc<Queue<SyncRequest>>,
    next_id: Arc<AtomicU64>,
}

impl SyncOutbox {
    /// Queues a request and returns its id.
    ///
    /// Fails with a queue error when the outbox is full; callers dispatch before
    /// touching local state so a failed dispatch leaves nothing behind.
    pub fn dispatch(
        &self,
        kind: RecordKind,
        op: SyncOp,
        record: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<RequestId> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        trace!("sync::dispatch({} {} {}) -> #{}", op.as_ref(), kind.as_ref(), record, id);

        self.queue.send(SyncRequest {
            id,
            kind,
            op,
            record: record.to_string(),
            payload,
            timestamp: utils::time::time_millis(),
        })?;
        Ok(id)
    }

    /// number of requests not yet picked up by a transport
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Fails with a queue error unless `count` more requests fit in the outbox.
    pub fn reserve(
        &self,
        count: usize,
    ) -> Result<()> {
        let remaining = self.queue.remaining();
        if remaining < count {
            return Err(PipecacheError::Queue(format!("outbox has room for {} of {} requests", remaining, count)));
        }
        Ok(())
    }
}

/// Owns the request outbox and the reply inbox.
pub struct SyncCoordinator {
    requests: Arc<Queue<SyncRequest>>,
    replies: Arc<Queue<SyncReply>>,
    next_id: Arc<AtomicU64>,
    shutdown: Arc<Shutdown>,
}

impl SyncCoordinator {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            requests: Queue::new(config.request_queue_size),
            replies: Queue::new(config.reply_queue_size),
            next_id: Arc::new(AtomicU64::new(0)),
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub fn outbox(&self) -> SyncOutbox {
        SyncOutbox {
            queue: self.requests.clone(),
            next_id: self.next_id.clone(),
        }
    }

    /// Takes every queued request, for transports driven by the caller.
    pub fn take_requests(&self) -> Vec<SyncRequest> {
        self.requests.drain()
    }

    /// Queues a reply produced by a caller-driven transport.
    pub fn reply(
        &self,
        reply: SyncReply,
    ) -> Result<()> {
        self.replies.send(reply)
    }

    pub fn try_next_reply(&self) -> Option<SyncReply> {
        self.replies.try_next()
    }

    pub async fn next_reply(&self) -> Option<SyncReply> {
        self.replies.next_async().await
    }

    /// Forwards requests to `authority` on `handle` until [`SyncCoordinator::shutdown`].
    ///
    /// Requests are submitted strictly one after another so replies come back in
    /// dispatch order.
    pub fn spawn(
        &self,
        authority: Arc<dyn RemoteAuthority>,
        handle: &Handle,
    ) -> JoinHandle<()> {
        let requests = self.requests.clone();
        let replies = self.replies.clone();
        let shutdown = self.shutdown.clone();

        handle.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Some(request) = requests.next_async() => {
                        let verdict = authority.submit(&request).await;
                        if let Verdict::Reject(reason) = &verdict {
                            debug!("remote rejected {} {} {}: {}", request.op.as_ref(), request.kind.as_ref(), request.record, reason);
                        }
                        if replies.send_async(request.reply(verdict)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }

    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}
