//! Live-reloadable configuration structs bound to a namespaced key/value store.
//!
//! # Architecture Overview
//!
//! ```text
//!   user struct + impl_reflect!          key/value store
//!            │                               │
//!            ▼                               ▼
//!   ┌─────────────────┐   get_many   ┌──────────────┐
//!   │ schema          │◀─────────────│ backend      │
//!   │ Live<T>, Field  │   convert    │ Storage      │
//!   └────────┬────────┘              │ Monitor      │
//!            │                       └──────┬───────┘
//!            ▼                              │ on_changed / on_error
//!   ┌─────────────────┐                     │
//!   │ sync::LiveConf  │◀────────────────────┘
//!   │ key index,      │──▶ ChangeEvent subscribers
//!   │ reconnect loop  │
//!   └─────────────────┘
//! ```
//!
//! Every leaf field of a registered struct maps to the key
//! `<config name>:<nested names…>:<field name>` inside one namespace. After
//! registration the field holds the stored value; when the monitor reports a
//! change, the field is refreshed and subscribers get a [`ChangeEvent`].

// Core subsystems
pub mod convert;
pub mod schema;
pub mod sync;

// Drivers and tooling
pub mod backend;
pub mod import;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use backend::{DriverRegistry, Monitor, Options, Storage, WatchHandler};
pub use convert::{convert, ConvertError, RawValue, Value};
pub use error::{Error, Result};
pub use schema::{Field, FieldShape, Live, Reflect, Shape, ShapeError, StructShape, WatchingConfig};
pub use sync::{ChangeEvent, LiveConf, SyncState};
