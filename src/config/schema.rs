//! Settings schema definitions.
//!
//! Settings drive the binaries: which namespace to bind, which storage and
//! monitor drivers to build, and how the sync engine behaves. All types
//! derive Serde traits for deserialization from TOML files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::Options;

/// Root settings for a liveconf process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Key namespace every registered config lives under.
    pub namespace: String,

    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Storage driver.
    pub storage: DriverConfig,

    /// Monitor driver.
    pub monitor: DriverConfig,

    /// Sync engine behaviour.
    pub sync: SyncOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            log_level: "info".to_string(),
            storage: DriverConfig::default(),
            monitor: DriverConfig::default(),
            sync: SyncOptions::default(),
        }
    }
}

/// A driver name plus its free-form options table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriverConfig {
    pub driver: String,

    #[serde(default)]
    pub options: Options,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            driver: "memory".to_string(),
            options: Options::default(),
        }
    }
}

/// Sync engine tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Delay before re-subscribing after the monitor fails.
    pub reconnect_delay_ms: u64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 5000,
        }
    }
}

impl SyncOptions {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
