use async_trait::async_trait;

use crate::sync::{SyncRequest, Verdict};

/// The remote tier that owns the authoritative copy of every record.
///
/// Implementations wrap a transport (HTTP, websocket, ...) and report whether the
/// remote side accepted each request. Requests are submitted one at a time, in
/// dispatch order.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Submits one request and waits for the remote verdict.
    ///
    /// # Arguments
    ///
    /// * `request` - The [`SyncRequest`] to apply remotely.
    ///
    /// # Returns
    ///
    /// Returns [`Verdict::Ack`] when the remote side applied the request, otherwise
    /// [`Verdict::Reject`] with the reason it gave.
    async fn submit(
        &self,
        request: &SyncRequest,
    ) -> Verdict;
}
