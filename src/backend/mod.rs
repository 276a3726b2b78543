//! Storage and change-notification backends.
//!
//! # Responsibilities
//! - Define the [`Storage`] and [`Monitor`] seams the sync engine talks to
//! - Map logical keys to physical keys (`namespace:key`)
//! - Provide the built-in memory and file drivers and the driver registry
//!
//! # Data Flow
//! ```text
//! LiveConf ──get/get_many──▶ Storage ──▶ RawValue
//! LiveConf ──watch(ns, handler)──▶ Monitor ──(background task)──▶ handler.on_changed(ns, key)
//!                                                             └──▶ handler.on_error(ns, err)
//! ```

pub mod file;
pub mod memory;
pub mod options;
pub mod registry;

pub use file::{FileMonitor, FileStorage};
pub use memory::{MemoryBroker, MemoryMonitor, MemoryStorage};
pub use options::{Options, OptionsError};
pub use registry::{DriverRegistry, RegistryError};

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::convert::RawValue;

/// Backend failures.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("namespace {0:?} is already being watched")]
    AlreadyWatching(String),

    #[error("watch delivery failed: {0}")]
    Delivery(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed store file {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("file watcher error: {0}")]
    Watcher(#[from] notify::Error),

    #[error(transparent)]
    Options(#[from] OptionsError),
}

/// Key under which `key` is stored for `namespace`.
pub fn physical_key(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", namespace, key)
    }
}

/// Logical key carried by a published `token`, or `None` when the token
/// belongs to another namespace.
pub fn strip_namespace<'a>(namespace: &str, token: &'a str) -> Option<&'a str> {
    let key = if namespace.is_empty() {
        token
    } else {
        token.strip_prefix(namespace)?.strip_prefix(':')?
    };
    (!key.is_empty()).then_some(key)
}

/// Namespaced key/value store.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Value of `key`, or `None` when it is absent.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<RawValue>, BackendError>;

    /// Values of `keys`, positionally. Backends with a batch primitive should
    /// override this.
    async fn get_many(
        &self,
        namespace: &str,
        keys: &[String],
    ) -> Result<Vec<Option<RawValue>>, BackendError> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(namespace, key).await?);
        }
        Ok(values)
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), BackendError>;
}

/// Receiver of change notifications for one namespace.
#[async_trait]
pub trait WatchHandler: Send + Sync {
    /// `key` has the namespace prefix already removed.
    async fn on_changed(&self, namespace: &str, key: &str);

    /// Delivery for `namespace` stopped abnormally. Called at most once per
    /// successful `watch`.
    async fn on_error(&self, namespace: &str, error: BackendError);
}

/// Change-notification source.
#[async_trait]
pub trait Monitor: Send + Sync {
    /// Start background delivery for `namespace` and return. Fails when the
    /// namespace is already watched by this monitor.
    async fn watch(
        &self,
        namespace: &str,
        handler: Arc<dyn WatchHandler>,
    ) -> Result<(), BackendError>;
}

/// Hand one change to `handler` without blocking the delivery loop.
pub(crate) fn dispatch_change(handler: &Arc<dyn WatchHandler>, namespace: &str, key: &str) {
    let handler = Arc::clone(handler);
    let namespace = namespace.to_string();
    let key = key.to_string();
    tokio::spawn(async move {
        handler.on_changed(&namespace, &key).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_key() {
        assert_eq!(physical_key("prod", "App:Port"), "prod:App:Port");
        assert_eq!(physical_key("", "App:Port"), "App:Port");
    }

    #[test]
    fn test_strip_namespace() {
        assert_eq!(strip_namespace("prod", "prod:App:Port"), Some("App:Port"));
        assert_eq!(strip_namespace("prod", "production:App:Port"), None);
        assert_eq!(strip_namespace("prod", "dev:App:Port"), None);
        assert_eq!(strip_namespace("prod", "prod:"), None);
        assert_eq!(strip_namespace("", "App:Port"), Some("App:Port"));
    }
}
