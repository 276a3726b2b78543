//! Named driver factories.
//!
//! A [`DriverRegistry`] maps driver names to factories that build a
//! [`Storage`] or [`Monitor`] from [`Options`]. It is an ordinary value owned
//! by the composition root; there is no process-wide registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::backend::file::{FileMonitor, FileStorage};
use crate::backend::memory::MemoryBroker;
use crate::backend::{BackendError, Monitor, Options, Storage};

pub type StorageFactory =
    Arc<dyn Fn(&Options) -> Result<Arc<dyn Storage>, BackendError> + Send + Sync>;
pub type MonitorFactory =
    Arc<dyn Fn(&Options) -> Result<Arc<dyn Monitor>, BackendError> + Send + Sync>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("driver name must not be empty")]
    EmptyName,

    #[error("{kind} driver {name:?} already registered")]
    Duplicate { kind: &'static str, name: String },

    #[error("{kind} driver {name:?} is not registered")]
    Unknown { kind: &'static str, name: String },

    #[error("failed to create {kind} driver {name:?}: {source}")]
    Create {
        kind: &'static str,
        name: String,
        #[source]
        source: BackendError,
    },
}

#[derive(Default)]
struct Drivers {
    storages: HashMap<String, StorageFactory>,
    monitors: HashMap<String, MonitorFactory>,
}

/// Storage and monitor driver factories, keyed by name.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: Mutex<Drivers>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `memory` and `file` drivers. The memory storage and
    /// monitor created from it share one broker.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        let broker = MemoryBroker::new();

        let storage_broker = broker.clone();
        let monitor_broker = broker;
        // Fresh registry: these names cannot collide.
        let _ = registry.register_storage("memory", move |_| {
            Ok(Arc::new(storage_broker.storage()) as Arc<dyn Storage>)
        });
        let _ = registry.register_monitor("memory", move |_| {
            Ok(Arc::new(monitor_broker.monitor()) as Arc<dyn Monitor>)
        });
        let _ = registry.register_storage("file", |opts| {
            Ok(Arc::new(FileStorage::from_options(opts)?) as Arc<dyn Storage>)
        });
        let _ = registry.register_monitor("file", |opts| {
            Ok(Arc::new(FileMonitor::from_options(opts)?) as Arc<dyn Monitor>)
        });
        registry
    }

    pub fn register_storage<F>(&self, name: &str, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(&Options) -> Result<Arc<dyn Storage>, BackendError> + Send + Sync + 'static,
    {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let mut drivers = self.drivers.lock().unwrap_or_else(PoisonError::into_inner);
        if drivers.storages.contains_key(name) {
            return Err(RegistryError::Duplicate {
                kind: "storage",
                name: name.to_string(),
            });
        }
        drivers.storages.insert(name.to_string(), Arc::new(factory));
        tracing::debug!(driver = name, "Registered storage driver");
        Ok(())
    }

    pub fn register_monitor<F>(&self, name: &str, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(&Options) -> Result<Arc<dyn Monitor>, BackendError> + Send + Sync + 'static,
    {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let mut drivers = self.drivers.lock().unwrap_or_else(PoisonError::into_inner);
        if drivers.monitors.contains_key(name) {
            return Err(RegistryError::Duplicate {
                kind: "monitor",
                name: name.to_string(),
            });
        }
        drivers.monitors.insert(name.to_string(), Arc::new(factory));
        tracing::debug!(driver = name, "Registered monitor driver");
        Ok(())
    }

    pub fn create_storage(
        &self,
        name: &str,
        options: &Options,
    ) -> Result<Arc<dyn Storage>, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let factory = {
            let drivers = self.drivers.lock().unwrap_or_else(PoisonError::into_inner);
            drivers.storages.get(name).cloned()
        };
        let factory = factory.ok_or_else(|| RegistryError::Unknown {
            kind: "storage",
            name: name.to_string(),
        })?;
        factory(options).map_err(|source| RegistryError::Create {
            kind: "storage",
            name: name.to_string(),
            source,
        })
    }

    pub fn create_monitor(
        &self,
        name: &str,
        options: &Options,
    ) -> Result<Arc<dyn Monitor>, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let factory = {
            let drivers = self.drivers.lock().unwrap_or_else(PoisonError::into_inner);
            drivers.monitors.get(name).cloned()
        };
        let factory = factory.ok_or_else(|| RegistryError::Unknown {
            kind: "monitor",
            name: name.to_string(),
        })?;
        factory(options).map_err(|source| RegistryError::Create {
            kind: "monitor",
            name: name.to_string(),
            source,
        })
    }

    /// Registered storage driver names, sorted.
    pub fn storage_drivers(&self) -> Vec<String> {
        let drivers = self.drivers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = drivers.storages.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered monitor driver names, sorted.
    pub fn monitor_drivers(&self) -> Vec<String> {
        let drivers = self.drivers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = drivers.monitors.keys().cloned().collect();
        names.sort();
        names
    }
}
