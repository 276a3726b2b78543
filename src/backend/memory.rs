//! In-process pub/sub store.
//!
//! # Responsibilities
//! - Hold physical key → text values in a concurrent map
//! - Broadcast published tokens (physical keys) to every active watch
//! - Let tests terminate deliveries abnormally with [`MemoryBroker::fail`]
//!
//! # Design Decisions
//! - Publishing is explicit: writing a value does not notify by itself,
//!   mirroring a store whose writers publish keyspace events separately
//! - One delivery task per watched namespace; each change is handed to the
//!   handler on its own task so different keys never wait on each other

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::backend::{
    dispatch_change, physical_key, strip_namespace, BackendError, Monitor, Storage, WatchHandler,
};
use crate::convert::RawValue;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
enum Signal {
    Published(String),
    Fault(String),
}

/// Shared state behind a [`MemoryStorage`] / [`MemoryMonitor`] pair.
#[derive(Clone)]
pub struct MemoryBroker {
    values: Arc<DashMap<String, String>>,
    tx: broadcast::Sender<Signal>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            values: Arc::new(DashMap::new()),
            tx,
        }
    }

    pub fn storage(&self) -> MemoryStorage {
        MemoryStorage {
            broker: self.clone(),
        }
    }

    pub fn monitor(&self) -> MemoryMonitor {
        MemoryMonitor {
            broker: self.clone(),
            watching: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Write a value by physical key without notifying.
    pub fn insert(&self, physical: impl Into<String>, value: impl Into<String>) {
        self.values.insert(physical.into(), value.into());
    }

    pub fn remove(&self, physical: &str) -> Option<String> {
        self.values.remove(physical).map(|(_, v)| v)
    }

    pub fn value(&self, physical: &str) -> Option<String> {
        self.values.get(physical).map(|v| v.value().clone())
    }

    /// Announce a change of `token`. Returns how many deliveries received it.
    pub fn publish(&self, token: impl Into<String>) -> usize {
        self.tx.send(Signal::Published(token.into())).unwrap_or(0)
    }

    /// Write `key` in `namespace` and publish it.
    pub fn set_and_publish(&self, namespace: &str, key: &str, value: impl Into<String>) -> usize {
        let token = physical_key(namespace, key);
        self.insert(token.clone(), value);
        self.publish(token)
    }

    /// Terminate every active delivery with `reason`.
    pub fn fail(&self, reason: impl Into<String>) -> usize {
        self.tx.send(Signal::Fault(reason.into())).unwrap_or(0)
    }

    /// Number of active deliveries.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// [`Storage`] over a [`MemoryBroker`].
#[derive(Clone)]
pub struct MemoryStorage {
    broker: MemoryBroker,
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<RawValue>, BackendError> {
        Ok(self
            .broker
            .value(&physical_key(namespace, key))
            .map(RawValue::Text))
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), BackendError> {
        self.broker.insert(physical_key(namespace, key), value);
        Ok(())
    }
}

/// [`Monitor`] over a [`MemoryBroker`].
pub struct MemoryMonitor {
    broker: MemoryBroker,
    watching: Arc<Mutex<HashSet<String>>>,
}

impl MemoryMonitor {
    pub fn is_watching(&self, namespace: &str) -> bool {
        self.watching
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(namespace)
    }
}

#[async_trait]
impl Monitor for MemoryMonitor {
    async fn watch(
        &self,
        namespace: &str,
        handler: Arc<dyn WatchHandler>,
    ) -> Result<(), BackendError> {
        {
            let mut watching = self.watching.lock().unwrap_or_else(PoisonError::into_inner);
            if !watching.insert(namespace.to_string()) {
                return Err(BackendError::AlreadyWatching(namespace.to_string()));
            }
        }
        let rx = self.broker.tx.subscribe();
        tokio::spawn(deliver(
            namespace.to_string(),
            rx,
            handler,
            Arc::clone(&self.watching),
        ));
        tracing::info!(namespace = %namespace, "Memory monitor watching");
        Ok(())
    }
}

async fn deliver(
    namespace: String,
    mut rx: broadcast::Receiver<Signal>,
    handler: Arc<dyn WatchHandler>,
    watching: Arc<Mutex<HashSet<String>>>,
) {
    let error = loop {
        match rx.recv().await {
            Ok(Signal::Published(token)) => {
                if let Some(key) = strip_namespace(&namespace, &token) {
                    dispatch_change(&handler, &namespace, key);
                }
            }
            Ok(Signal::Fault(reason)) => break BackendError::Delivery(reason),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(namespace = %namespace, skipped, "Memory monitor lagged, notifications lost");
            }
            Err(RecvError::Closed) => break BackendError::Delivery("broker closed".to_string()),
        }
    };

    watching
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&namespace);
    tracing::warn!(namespace = %namespace, error = %error, "Memory monitor delivery stopped");
    handler.on_error(&namespace, error).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Recorder {
        changes: mpsc::UnboundedSender<(String, String)>,
        errors: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl WatchHandler for Recorder {
        async fn on_changed(&self, namespace: &str, key: &str) {
            let _ = self.changes.send((namespace.to_string(), key.to_string()));
        }

        async fn on_error(&self, _namespace: &str, error: BackendError) {
            let _ = self.errors.send(error.to_string());
        }
    }

    fn recorder() -> (
        Arc<dyn WatchHandler>,
        mpsc::UnboundedReceiver<(String, String)>,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (ctx, crx) = mpsc::unbounded_channel();
        let (etx, erx) = mpsc::unbounded_channel();
        (Arc::new(Recorder { changes: ctx, errors: etx }), crx, erx)
    }

    #[tokio::test]
    async fn test_storage_round_trip() {
        let broker = MemoryBroker::new();
        let storage = broker.storage();
        storage.set("ns", "A:Field1", "hello").await.unwrap();
        assert_eq!(broker.value("ns:A:Field1").as_deref(), Some("hello"));
        assert_eq!(
            storage.get("ns", "A:Field1").await.unwrap(),
            Some(RawValue::Text("hello".into()))
        );
        assert_eq!(storage.get("ns", "A:Missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delivery_filters_namespace() {
        let broker = MemoryBroker::new();
        let monitor = broker.monitor();
        let (handler, mut changes, _errors) = recorder();
        monitor.watch("ns", handler).await.unwrap();

        broker.publish("other:A:Field1");
        broker.publish("ns:A:Field1");

        let got = tokio::time::timeout(Duration::from_secs(1), changes.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, ("ns".to_string(), "A:Field1".to_string()));
    }

    #[tokio::test]
    async fn test_second_watch_is_rejected() {
        let broker = MemoryBroker::new();
        let monitor = broker.monitor();
        let (handler, _changes, _errors) = recorder();
        monitor.watch("ns", handler.clone()).await.unwrap();
        assert!(matches!(
            monitor.watch("ns", handler).await,
            Err(BackendError::AlreadyWatching(_))
        ));
    }

    #[tokio::test]
    async fn test_fault_ends_delivery_and_forgets_namespace() {
        let broker = MemoryBroker::new();
        let monitor = broker.monitor();
        let (handler, _changes, mut errors) = recorder();
        monitor.watch("ns", handler).await.unwrap();
        assert!(monitor.is_watching("ns"));

        broker.fail("connection reset");
        let err = tokio::time::timeout(Duration::from_secs(1), errors.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(err.contains("connection reset"));
        assert!(!monitor.is_watching("ns"));
    }
}
