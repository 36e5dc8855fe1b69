use tokio::sync::watch;

/// One-shot shutdown signal shared between an owner and its background tasks.
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender,
        }
    }

    /// signal every waiter
    pub fn shutdown(&self) {
        self.sender.send_replace(true);
    }

    /// resolves once `shutdown` has been called
    pub async fn wait(&self) {
        let mut rx = self.sender.subscribe();
        let _ = rx.wait_for(|down| *down).await;
    }
}
