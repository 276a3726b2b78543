//! Schema introspection subsystem.
//!
//! # Data Flow
//! ```text
//! user struct (impl_reflect!)
//!     → reflect.rs (static Shape + index-addressed member access)
//!     → live.rs (caller-owned Live<T>, read-copy-update writes)
//!     → introspect.rs (depth-first walk, auto-allocates nil Option<struct>)
//!     → field.rs (one Field per leaf: key, owner path, index lens)
//!     → watching.rs (WatchingConfig = named root + ordered fields)
//! ```
//!
//! # Design Decisions
//! - Shapes are computed once per registered type and cached on each Field
//! - Fields address their slot by member index, never by name lookup
//! - Traversal order is declared order; key enumeration is deterministic

pub mod field;
pub mod introspect;
pub mod live;
pub mod reflect;
pub mod shape;
pub mod watching;

pub use field::Field;
pub use live::Live;
pub use reflect::Reflect;
pub use shape::{FieldShape, FloatKind, IntKind, Shape, ShapeKind, StructShape, UintKind};
pub use watching::WatchingConfig;

use thiserror::Error;

/// Errors raised while describing, walking or assigning typed values.
#[derive(Debug, Error)]
pub enum ShapeError {
    /// The root object's type is not a struct.
    #[error("{type_name} is not a struct and cannot be watched")]
    NotAStruct { type_name: String },

    /// A member has a shape the introspector cannot address.
    #[error("field {path} has unsupported shape {shape}")]
    Unsupported { path: String, shape: String },

    /// A dynamic value does not fit the slot it is assigned to.
    #[error("expected a {expected} value, found {found}")]
    Mismatch { expected: String, found: &'static str },

    /// A fixed-length array received the wrong number of elements.
    #[error("array of length {expected} cannot hold {actual} elements")]
    Length { expected: usize, actual: usize },

    /// A captured member index no longer resolves on the live object.
    #[error("field path {path:?} does not resolve")]
    Unresolved { path: Vec<usize> },
}
