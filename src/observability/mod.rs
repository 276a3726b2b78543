//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! schema / sync / backend produce:
//!     → tracing events (structured fields: namespace, key, config)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → logging.rs subscriber in the binaries
//!     → whatever metrics recorder the host installs
//! ```
//!
//! # Design Decisions
//! - Structured fields over formatted strings
//! - Metrics are cheap and recorder-agnostic

pub mod logging;
pub mod metrics;
