//! Settings management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → Settings (validated, immutable)
//!     → DriverRegistry builds storage/monitor, LiveConf takes SyncOptions
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal settings files
//! - Validation separates syntactic (serde) from semantic checks
//! - Live reload is the job of the sync engine, not of this module

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_settings, parse_settings, ConfigError};
pub use schema::{DriverConfig, Settings, SyncOptions};
pub use validation::{validate_settings, ValidationError};
