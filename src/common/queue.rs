//! Message queues for communication between the session and the remote tier.
//!
//! Provides both point-to-point (Queue) and broadcast (BroadcastQueue) messaging.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::{PipecacheError, Result};

/// Bounded MPMC (multi-producer, multi-consumer) FIFO queue.
///
/// Used for the sync request outbox and the reply inbox, where every message
/// must be consumed exactly once and in the order it was sent.
/// Backed by flume for high-performance message passing.
#[derive(Clone)]
pub struct Queue<T> {
    receiver: Arc<flume::Receiver<T>>,
    sender: Arc<flume::Sender<T>>,
}

impl<T> Queue<T> {
    /// create a new queue
    pub fn new(cap: usize) -> Arc<Self> {
        let (tx, rx) = flume::bounded(cap);

        Arc::new(Self {
            receiver: Arc::new(rx),
            sender: Arc::new(tx),
        })
    }

    /// receive a message without blocking
    pub fn try_next(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// send a message without blocking, fails when the queue is full
    pub fn send(
        &self,
        msg: T,
    ) -> Result<()> {
        self.sender.try_send(msg).map_err(|e| PipecacheError::Queue(e.to_string()))
    }

    /// receive a message from the queue asynchronously
    pub async fn next_async(&self) -> Option<T> {
        self.receiver.recv_async().await.ok()
    }

    /// send a message to the queue asynchronously
    pub async fn send_async(
        &self,
        msg: T,
    ) -> Result<()> {
        self.sender.send_async(msg).await.map_err(|e| PipecacheError::Queue(e.to_string()))
    }

    /// drain every message currently queued
    pub fn drain(&self) -> Vec<T> {
        self.receiver.drain().collect()
    }

    /// number of queued messages
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// free slots left before `send` fails
    pub fn remaining(&self) -> usize {
        self.sender.capacity().map_or(usize::MAX, |cap| cap.saturating_sub(self.sender.len()))
    }
}

/// Broadcast queue for one-to-many message distribution.
///
/// Used for record events where all subscribers receive every message.
/// Backed by tokio's broadcast channel.
#[derive(Clone)]
pub struct BroadcastQueue<T> {
    sender: Arc<broadcast::Sender<T>>,
}

impl<T: Clone> BroadcastQueue<T> {
    /// create a new broadcast queue
    pub fn new(cap: usize) -> Arc<Self> {
        let (tx, _) = broadcast::channel(cap);

        Arc::new(Self {
            sender: Arc::new(tx),
        })
    }

    /// send a message to every current subscriber, a no-op when nobody listens
    pub fn send(
        &self,
        msg: T,
    ) {
        let _ = self.sender.send(msg);
    }

    /// subscribe to the queue
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }
}
