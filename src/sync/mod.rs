//! Synchronization engine.
//!
//! # Data Flow
//! ```text
//! register(root)
//!     → WatchingConfig (introspection)
//!     → bind keys into the index (collision checks)   (per config)
//!     → Storage::get_many → convert → Field::set      (initial sync, no events)
//!     → on failure: unbind that config's keys
//!     → Monitor::watch(namespace, EngineHandler)      (once per namespace)
//!
//! Monitor delivery task
//!     → EngineHandler::on_changed(ns, key)
//!     → Storage::get → convert → compare canonical text under the field lock
//!     → Field::set → ChangeEvent to every subscriber
//!
//!     → EngineHandler::on_error(ns, err)
//!     → Reconnecting → sleep(reconnect_delay) → Monitor::watch → Watching
//! ```
//!
//! # Design Decisions
//! - Live-delivery failures (storage, conversion) are dropped and logged at debug
//! - Changes to one key are serialized by that field's lock; different keys run in parallel
//! - Reconnect uses a fixed delay and retries until success or `close()`

mod engine;
mod event;
mod reconnect;
mod state;

pub use engine::LiveConf;
pub use event::{ChangeEvent, Subscriber};
pub use state::SyncState;
