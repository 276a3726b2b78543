//! Shutdown coordination for background sync tasks.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

/// Coordinator for cancelling long-running tasks.
///
/// Provides a broadcast channel that reconnect tasks subscribe to. Tasks
/// that subscribe after the trigger check [`Shutdown::is_triggered`].
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Later triggers are no-ops.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Get the number of active subscribers (tasks still waiting).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
