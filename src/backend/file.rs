//! JSON file store with `notify`-based change detection.
//!
//! # Responsibilities
//! - Persist physical key → value pairs as one JSON object file
//! - Rewrite the file atomically (temp file + rename) on every `set`
//! - Watch the file's directory, reload on change and deliver the keys whose
//!   values differ from the previous snapshot
//!
//! # Design Decisions
//! - The directory is watched, not the file, so rename-based rewrites by any
//!   writer (including `kv-import`) are seen
//! - A reload that fails to parse keeps the previous snapshot and waits for
//!   the next event

use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::backend::{
    dispatch_change, physical_key, strip_namespace, BackendError, Monitor, Options, Storage,
    WatchHandler,
};
use crate::convert::RawValue;

/// Default notify poll interval, for platforms that fall back to polling.
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

type Snapshot = BTreeMap<String, serde_json::Value>;

fn io_error(path: &Path, source: std::io::Error) -> BackendError {
    BackendError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read the store file. A missing or empty file is an empty store.
pub(crate) async fn load_snapshot(path: &Path) -> Result<Snapshot, BackendError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Snapshot::new()),
        Err(e) => return Err(io_error(path, e)),
    };
    if content.trim().is_empty() {
        return Ok(Snapshot::new());
    }
    serde_json::from_str(&content).map_err(|source| BackendError::Format {
        path: path.to_path_buf(),
        source,
    })
}

async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), BackendError> {
    let body = serde_json::to_string_pretty(snapshot).map_err(|source| BackendError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    let mut tmp_name = OsString::from(".");
    tmp_name.push(path.file_name().unwrap_or_default());
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp, body).await.map_err(|e| io_error(&tmp, e))?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| io_error(path, e))
}

fn raw_value(value: &serde_json::Value) -> RawValue {
    match value {
        serde_json::Value::String(s) => RawValue::Text(s.clone()),
        other => RawValue::Document(other.clone()),
    }
}

fn required_path(options: &Options) -> Result<PathBuf, BackendError> {
    Ok(PathBuf::from(options.require::<String>("path")?))
}

/// [`Storage`] backed by a JSON object file.
pub struct FileStorage {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Options: `path` (required).
    pub fn from_options(options: &Options) -> Result<Self, BackendError> {
        Ok(Self::new(required_path(options)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<RawValue>, BackendError> {
        let snapshot = load_snapshot(&self.path).await?;
        Ok(snapshot.get(&physical_key(namespace, key)).map(raw_value))
    }

    async fn get_many(
        &self,
        namespace: &str,
        keys: &[String],
    ) -> Result<Vec<Option<RawValue>>, BackendError> {
        let snapshot = load_snapshot(&self.path).await?;
        Ok(keys
            .iter()
            .map(|key| snapshot.get(&physical_key(namespace, key)).map(raw_value))
            .collect())
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), BackendError> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = load_snapshot(&self.path).await?;
        snapshot.insert(
            physical_key(namespace, key),
            serde_json::Value::String(value.to_string()),
        );
        write_snapshot(&self.path, &snapshot).await
    }
}

/// [`Monitor`] that watches a JSON store file.
pub struct FileMonitor {
    path: PathBuf,
    poll_interval: Duration,
    watching: Arc<Mutex<HashSet<String>>>,
}

impl FileMonitor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            watching: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Options: `path` (required), `poll_interval_ms`.
    pub fn from_options(options: &Options) -> Result<Self, BackendError> {
        let mut monitor = Self::new(required_path(options)?);
        if let Some(ms) = options.get::<u64>("poll_interval_ms")? {
            monitor.poll_interval = Duration::from_millis(ms);
        }
        Ok(monitor)
    }

    pub fn is_watching(&self, namespace: &str) -> bool {
        self.watching
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(namespace)
    }

    fn forget(&self, namespace: &str) {
        self.watching
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(namespace);
    }

    fn start_watcher(
        &self,
    ) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<notify::Result<Event>>), BackendError>
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            Config::default().with_poll_interval(self.poll_interval),
        )?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        Ok((watcher, rx))
    }
}

#[async_trait]
impl Monitor for FileMonitor {
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

        let started = async {
            let baseline = load_snapshot(&self.path).await?;
            let (watcher, rx) = self.start_watcher()?;
            Ok::<_, BackendError>((baseline, watcher, rx))
        }
        .await;
        let (baseline, watcher, rx) = match started {
            Ok(parts) => parts,
            Err(e) => {
                self.forget(namespace);
                return Err(e);
            }
        };

        let delivery = Delivery {
            path: self.path.clone(),
            namespace: namespace.to_string(),
            snapshot: baseline,
            handler,
            watching: Arc::clone(&self.watching),
        };
        tokio::spawn(delivery.run(watcher, rx));
        tracing::info!(namespace = %namespace, path = ?self.path, "File monitor watching");
        Ok(())
    }
}

struct Delivery {
    path: PathBuf,
    namespace: String,
    snapshot: Snapshot,
    handler: Arc<dyn WatchHandler>,
    watching: Arc<Mutex<HashSet<String>>>,
}

impl Delivery {
    async fn run(
        mut self,
        watcher: RecommendedWatcher,
        mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    ) {
        // Dropping the watcher stops notify; keep it for the loop's lifetime.
        let _watcher = watcher;
        let error = loop {
            match rx.recv().await {
                Some(Ok(event)) => {
                    if self.concerns_store(&event) {
                        self.reload().await;
                    }
                }
                Some(Err(e)) => break BackendError::Watcher(e),
                None => break BackendError::Delivery("file watcher stopped".to_string()),
            }
        };

        self.watching
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.namespace);
        tracing::warn!(namespace = %self.namespace, error = %error, "File monitor delivery stopped");
        self.handler.on_error(&self.namespace, error).await;
    }

    fn concerns_store(&self, event: &Event) -> bool {
        let kind = &event.kind;
        if !(kind.is_modify() || kind.is_create() || kind.is_remove()) {
            return false;
        }
        let name = self.path.file_name();
        event.paths.iter().any(|p| p.file_name() == name)
    }

    async fn reload(&mut self) {
        let next = match load_snapshot(&self.path).await {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Failed to reload store file, keeping previous snapshot");
                return;
            }
        };
        for token in changed_keys(&self.snapshot, &next) {
            if let Some(key) = strip_namespace(&self.namespace, token) {
                dispatch_change(&self.handler, &self.namespace, key);
            }
        }
        self.snapshot = next;
    }
}

/// Keys added, removed or modified between two snapshots.
fn changed_keys<'a>(before: &'a Snapshot, after: &'a Snapshot) -> Vec<&'a str> {
    let mut changed: Vec<&str> = after
        .iter()
        .filter(|(k, v)| before.get(*k) != Some(*v))
        .map(|(k, _)| k.as_str())
        .collect();
    changed.extend(
        before
            .keys()
            .filter(|k| !after.contains_key(*k))
            .map(String::as_str),
    );
    changed
}
