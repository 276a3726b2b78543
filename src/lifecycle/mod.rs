//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     LiveConf::close() → trigger → pending reconnect tasks exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
