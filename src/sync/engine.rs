use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::backend::{DriverRegistry, Monitor, Storage, WatchHandler};
use crate::config::{Settings, SyncOptions};
use crate::convert::convert;
use crate::error::{Error, Result};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::schema::{Field, Live, Reflect, WatchingConfig};
use crate::sync::event::{ChangeEvent, Subscriber, SubscriberSet};
use crate::sync::reconnect::EngineHandler;
use crate::sync::state::SyncState;

/// Keeps registered configuration objects in sync with one namespace of a
/// key/value store.
///
/// Cloning is cheap; clones drive the same engine.
#[derive(Clone)]
pub struct LiveConf {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) namespace: String,
    storage: Arc<dyn Storage>,
    monitor: Arc<dyn Monitor>,
    pub(crate) options: SyncOptions,
    configs: Mutex<HashMap<String, WatchingConfig>>,
    index: DashMap<String, Arc<Field>>,
    subscribers: SubscriberSet,
    state: AtomicU8,
    pub(crate) watching: AtomicBool,
    pub(crate) shutdown: Shutdown,
}

impl LiveConf {
    pub fn new(
        namespace: impl Into<String>,
        storage: Arc<dyn Storage>,
        monitor: Arc<dyn Monitor>,
    ) -> Self {
        Self::with_options(namespace, storage, monitor, SyncOptions::default())
    }

    pub fn with_options(
        namespace: impl Into<String>,
        storage: Arc<dyn Storage>,
        monitor: Arc<dyn Monitor>,
        options: SyncOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                namespace: namespace.into(),
                storage,
                monitor,
                options,
                configs: Mutex::new(HashMap::new()),
                index: DashMap::new(),
                subscribers: SubscriberSet::default(),
                state: AtomicU8::new(SyncState::Idle as u8),
                watching: AtomicBool::new(false),
                shutdown: Shutdown::new(),
            }),
        }
    }

    /// Build the storage and monitor named in `settings` from `registry`.
    pub fn from_settings(settings: &Settings, registry: &DriverRegistry) -> Result<Self> {
        let storage = registry.create_storage(&settings.storage.driver, &settings.storage.options)?;
        let monitor = registry.create_monitor(&settings.monitor.driver, &settings.monitor.options)?;
        Ok(Self::with_options(
            settings.namespace.clone(),
            storage,
            monitor,
            settings.sync.clone(),
        ))
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn state(&self) -> SyncState {
        self.inner.state()
    }

    /// Register `root` under its type name.
    pub async fn register<T: Reflect + Clone>(&self, root: &Live<T>) -> Result<()> {
        self.register_all(vec![WatchingConfig::new(root)?]).await
    }

    /// Register `root` under `name`.
    pub async fn register_named<T: Reflect + Clone>(
        &self,
        name: &str,
        root: &Live<T>,
    ) -> Result<()> {
        self.register_all(vec![WatchingConfig::named(name, root)?]).await
    }

    /// Merge `configs` one at a time, load each one's current values from
    /// storage and make sure the namespace is watched.
    ///
    /// Registering the same instance under the same name again is a no-op.
    /// Stops at the first failing config: its keys are unbound again, while
    /// configs admitted before it stay registered, loaded and watched.
    pub async fn register_all(&self, configs: Vec<WatchingConfig>) -> Result<()> {
        let inner = &self.inner;
        if inner.shutdown.is_triggered() {
            return Err(Error::Closed(inner.namespace.clone()));
        }

        let mut registered = inner.configs.lock().await;
        let previous = inner.state();
        inner.set_state(SyncState::Registering);

        let mut result = Ok(());
        for config in configs {
            if let Err(e) = inner.admit(&mut registered, config).await {
                result = Err(e);
                break;
            }
        }
        metrics::record_watched_keys(&inner.namespace, inner.index.len());

        // Also covers a retry after an earlier watch attempt failed.
        if !inner.index.is_empty() {
            if let Err(e) = inner.ensure_watching().await {
                if result.is_ok() {
                    result = Err(e);
                } else {
                    tracing::warn!(namespace = %inner.namespace, error = %e, "Failed to watch namespace");
                }
            }
        }

        inner.settle(previous);
        if let Err(e) = &result {
            tracing::warn!(namespace = %inner.namespace, error = %e, "Registration failed");
        }
        result
    }

    /// Append a change callback. Callbacks run on the delivery path, in
    /// registration order, after the field has been updated.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.inner.subscribers.add(Arc::new(callback));
    }

    /// Append an already shared callback.
    pub fn subscribe_shared(&self, callback: Subscriber) {
        self.inner.subscribers.add(callback);
    }

    /// Keys currently bound to fields, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.index.iter().map(|entry| entry.key().clone()).collect()
    }

    /// The field bound to `key`.
    pub fn field(&self, key: &str) -> Option<Arc<Field>> {
        self.inner.field(key)
    }

    /// Names of the registered configs, sorted.
    pub async fn configs(&self) -> Vec<String> {
        let registered = self.inner.configs.lock().await;
        let mut names: Vec<String> = registered.keys().cloned().collect();
        names.sort();
        names
    }

    /// Stop reacting to changes and cancel pending reconnects. Registered
    /// objects keep their last values.
    pub fn close(&self) {
        if !self.inner.shutdown.is_triggered() {
            tracing::info!(namespace = %self.inner.namespace, "Closing liveconf");
        }
        self.inner.shutdown.trigger();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_triggered()
    }
}

impl std::fmt::Debug for LiveConf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConf")
            .field("namespace", &self.inner.namespace)
            .field("state", &self.inner.state())
            .field("keys", &self.inner.index.len())
            .field("subscribers", &self.inner.subscribers.len())
            .finish()
    }
}

impl Inner {
    pub(crate) fn state(&self) -> SyncState {
        SyncState::from(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: SyncState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Leave `Registering` for whatever state the engine is actually in.
    fn settle(&self, previous: SyncState) {
        let next = if self.watching.load(Ordering::SeqCst) {
            SyncState::Watching
        } else if previous == SyncState::Reconnecting {
            SyncState::Reconnecting
        } else if !self.index.is_empty() {
            SyncState::Synced
        } else {
            SyncState::Idle
        };
        self.set_state(next);
    }

    fn field(&self, key: &str) -> Option<Arc<Field>> {
        self.index.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Bind `config`'s keys and load their values. Either the config ends up
    /// registered and synced, or nothing of it is left behind.
    async fn admit(
        &self,
        registered: &mut HashMap<String, WatchingConfig>,
        config: WatchingConfig,
    ) -> Result<()> {
        if let Some(existing) = registered.get(config.name()) {
            if existing.identity() == config.identity() {
                tracing::debug!(namespace = %self.namespace, config = config.name(), "Config already registered");
                return Ok(());
            }
            return Err(Error::DuplicateConfig {
                name: config.name().to_string(),
            });
        }

        let bound = self.bind_keys(&config)?;
        if let Err(e) = self.initial_sync(&bound).await {
            self.unbind(&bound);
            return Err(e);
        }

        tracing::info!(
            namespace = %self.namespace,
            config = config.name(),
            keys = bound.len(),
            "Registered config"
        );
        registered.insert(config.name().to_string(), config);
        Ok(())
    }

    fn unbind(&self, keys: &[String]) {
        for key in keys {
            self.index.remove(key);
        }
    }

    /// Bind every field of `config`, or none of them.
    fn bind_keys(&self, config: &WatchingConfig) -> Result<Vec<String>> {
        let mut bound: Vec<String> = Vec::with_capacity(config.fields().len());
        for field in config.fields() {
            let collision = match self.index.entry(field.key().to_string()) {
                Entry::Occupied(slot) => !Arc::ptr_eq(slot.get(), field),
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(field));
                    bound.push(field.key().to_string());
                    false
                }
            };
            if collision {
                self.unbind(&bound);
                return Err(Error::KeyCollision {
                    namespace: self.namespace.clone(),
                    key: field.key().to_string(),
                });
            }
        }
        Ok(bound)
    }

    /// Load `keys` from storage in one batch and write them into their
    /// fields. Raises no change events.
    ///
    /// The keys are already in the index, so a change may be delivered while
    /// the batch is in flight. A field whose revision moved since the batch
    /// started keeps the delivered value.
    async fn initial_sync(&self, keys: &[String]) -> Result<()> {
        let fields: Vec<(Arc<Field>, u64)> = keys
            .iter()
            .filter_map(|key| self.field(key))
            .map(|field| {
                let revision = field.revision();
                (field, revision)
            })
            .collect();
        let keys: Vec<String> = fields.iter().map(|(f, _)| f.key().to_string()).collect();

        let values = self.storage.get_many(&self.namespace, &keys).await?;
        for ((field, revision), raw) in fields.iter().zip(values) {
            let value = convert(field.shape(), raw.as_ref()).map_err(|source| Error::Convert {
                key: field.key().to_string(),
                source,
            })?;
            let _guard = field.lock().await;
            if field.revision() != *revision {
                tracing::debug!(namespace = %self.namespace, key = %field.key(), "Keeping value delivered during initial sync");
                continue;
            }
            field.set(value)?;
        }
        tracing::info!(namespace = %self.namespace, keys = keys.len(), "Initial sync complete");
        Ok(())
    }

    /// Subscribe to the monitor unless a subscription is already active.
    pub(crate) async fn ensure_watching(self: &Arc<Self>) -> Result<()> {
        if self.watching.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let handler: Arc<dyn WatchHandler> = Arc::new(EngineHandler::new(self));
        if let Err(e) = self.monitor.watch(&self.namespace, handler).await {
            self.watching.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        self.set_state(SyncState::Watching);
        tracing::info!(namespace = %self.namespace, "Watching namespace");
        Ok(())
    }

    /// Fetch `key`, convert it and, if its canonical form differs from the
    /// field's, write it and notify subscribers. Failures are dropped.
    pub(crate) async fn apply_change(&self, namespace: &str, key: &str) {
        if namespace != self.namespace || self.shutdown.is_triggered() {
            return;
        }
        let Some(field) = self.field(key) else {
            tracing::trace!(namespace = %namespace, key = %key, "Ignoring change of unwatched key");
            return;
        };

        let raw = match self.storage.get(namespace, key).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(namespace = %namespace, key = %key, error = %e, "Dropping change: storage read failed");
                metrics::record_dropped_update(namespace, "storage");
                return;
            }
        };
        let after = match convert(field.shape(), raw.as_ref()) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(namespace = %namespace, key = %key, error = %e, "Dropping change: conversion failed");
                metrics::record_dropped_update(namespace, "convert");
                return;
            }
        };

        let before = {
            let _guard = field.lock().await;
            let before = match field.value() {
                Ok(value) => value,
                Err(e) => {
                    tracing::debug!(namespace = %namespace, key = %key, error = %e, "Dropping change: field unreadable");
                    metrics::record_dropped_update(namespace, "assign");
                    return;
                }
            };
            if before.to_string() == after.to_string() {
                return;
            }
            if let Err(e) = field.set(after.clone()) {
                tracing::debug!(namespace = %namespace, key = %key, error = %e, "Dropping change: assignment failed");
                metrics::record_dropped_update(namespace, "assign");
                return;
            }
            before
        };

        tracing::debug!(namespace = %namespace, key = %key, before = %before, after = %after, "Applied change");
        metrics::record_change(namespace);
        self.subscribers.notify(&ChangeEvent {
            namespace: namespace.to_string(),
            key: key.to_string(),
            before,
            after,
            updated_at: SystemTime::now(),
        });
    }
}
