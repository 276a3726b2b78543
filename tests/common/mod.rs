//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use liveconf::backend::{BackendError, MemoryBroker};
use liveconf::config::SyncOptions;
use liveconf::{ChangeEvent, LiveConf, RawValue, Storage};

/// A LiveConf over a fresh in-memory broker.
pub fn memory_conf(namespace: &str, reconnect_delay_ms: u64) -> (MemoryBroker, LiveConf) {
    let broker = MemoryBroker::new();
    let conf = LiveConf::with_options(
        namespace,
        Arc::new(broker.storage()),
        Arc::new(broker.monitor()),
        SyncOptions { reconnect_delay_ms },
    );
    (broker, conf)
}

/// Storage wrapper whose reads can be made to fail or to stall.
pub struct ControlledStorage {
    inner: Arc<dyn Storage>,
    failing: AtomicBool,
    gated: AtomicBool,
    /// Signalled when a gated batch read has fetched its values.
    pub entered: Notify,
    /// Lets a gated batch read return.
    pub release: Notify,
}

impl ControlledStorage {
    pub fn new(inner: Arc<dyn Storage>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing: AtomicBool::new(false),
            gated: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Hold the next batch reads after fetching, until `release` fires.
    pub fn set_gated(&self, gated: bool) {
        self.gated.store(gated, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Storage("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for ControlledStorage {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<RawValue>, BackendError> {
        self.check()?;
        self.inner.get(namespace, key).await
    }

    async fn get_many(
        &self,
        namespace: &str,
        keys: &[String],
    ) -> Result<Vec<Option<RawValue>>, BackendError> {
        self.check()?;
        let values = self.inner.get_many(namespace, keys).await?;
        if self.gated.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(values)
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), BackendError> {
        self.inner.set(namespace, key, value).await
    }
}

/// A LiveConf over a fresh in-memory broker whose storage is wrapped in a
/// [`ControlledStorage`].
pub fn controlled_conf(namespace: &str) -> (MemoryBroker, Arc<ControlledStorage>, LiveConf) {
    let broker = MemoryBroker::new();
    let storage = ControlledStorage::new(Arc::new(broker.storage()));
    let conf = LiveConf::with_options(
        namespace,
        storage.clone(),
        Arc::new(broker.monitor()),
        SyncOptions {
            reconnect_delay_ms: 50,
        },
    );
    (broker, storage, conf)
}

/// Forward every change event into a channel.
pub fn event_stream(conf: &LiveConf) -> mpsc::UnboundedReceiver<ChangeEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    conf.subscribe(move |event| {
        let _ = tx.send(event.clone());
    });
    rx
}

/// Next event, or `None` after `wait`.
pub async fn next_event(
    rx: &mut mpsc::UnboundedReceiver<ChangeEvent>,
    wait: Duration,
) -> Option<ChangeEvent> {
    tokio::time::timeout(wait, rx.recv()).await.ok().flatten()
}

/// Poll `check` until it holds or `wait` elapses.
pub async fn eventually<F>(wait: Duration, check: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
