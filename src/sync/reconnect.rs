//! Monitor callbacks and the fixed-delay re-subscription loop.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::backend::{BackendError, WatchHandler};
use crate::observability::metrics;
use crate::sync::engine::Inner;
use crate::sync::state::SyncState;

/// The engine's side of a monitor subscription. Holds the engine weakly so a
/// dropped `LiveConf` is not kept alive by its own delivery task.
pub(crate) struct EngineHandler {
    inner: Weak<Inner>,
}

impl EngineHandler {
    pub(crate) fn new(inner: &Arc<Inner>) -> Self {
        Self {
            inner: Arc::downgrade(inner),
        }
    }
}

#[async_trait]
impl WatchHandler for EngineHandler {
    async fn on_changed(&self, namespace: &str, key: &str) {
        if let Some(inner) = self.inner.upgrade() {
            inner.apply_change(namespace, key).await;
        }
    }

    async fn on_error(&self, namespace: &str, error: BackendError) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        if namespace != inner.namespace {
            return;
        }
        inner.watching.store(false, Ordering::SeqCst);
        if inner.shutdown.is_triggered() {
            return;
        }
        inner.set_state(SyncState::Reconnecting);
        tracing::warn!(
            namespace = %namespace,
            error = %error,
            delay_ms = inner.options.reconnect_delay_ms,
            "Monitor failed, scheduling reconnect"
        );
        tokio::spawn(reconnect(Arc::downgrade(&inner)));
    }
}

/// Re-subscribe after a fixed delay until it succeeds or the engine closes.
async fn reconnect(engine: Weak<Inner>) {
    loop {
        let (delay, mut shutdown) = match engine.upgrade() {
            Some(inner) if !inner.shutdown.is_triggered() => {
                metrics::record_reconnect(&inner.namespace);
                (inner.options.reconnect_delay(), inner.shutdown.subscribe())
            }
            _ => return,
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.recv() => {
                tracing::debug!("Reconnect cancelled by shutdown");
                return;
            }
        }

        let Some(inner) = engine.upgrade() else {
            return;
        };
        if inner.shutdown.is_triggered() {
            return;
        }
        match inner.ensure_watching().await {
            Ok(()) => {
                tracing::info!(namespace = %inner.namespace, "Monitor reconnected");
                return;
            }
            Err(e) => {
                tracing::warn!(namespace = %inner.namespace, error = %e, "Reconnect failed, retrying");
            }
        }
    }
}
