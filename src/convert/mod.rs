//! Raw value → typed value conversion.
//!
//! # Responsibilities
//! - Turn a stored [`RawValue`] (or its absence) into a [`Value`] of a given [`Shape`]
//! - Dispatch by shape kind through a fixed converter table
//! - Produce the canonical text form used for change detection
//!
//! # Conversion Rules
//! - Missing values yield the shape's zero value
//! - bool: unparsable text is `false`, never an error
//! - integers: trimmed, empty is zero, otherwise parsed at the slot's width
//! - floats: trimmed and parsed; empty is an error
//! - sequences of scalars: comma separated text
//! - maps, structs and sequences of composites: JSON documents
//! - `Option<T>`: missing is `None`, otherwise `Some` of the converted target

mod document;
mod raw;
mod text;
mod value;

pub use raw::RawValue;
pub use value::Value;

use thiserror::Error;

use crate::schema::shape::{Shape, ShapeKind};

/// Conversion failures. The slot is left untouched when one is returned.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("no conversion for shape {shape}")]
    Unsupported { shape: String },

    #[error("cannot parse {text:?} as {shape}: {reason}")]
    Parse {
        shape: String,
        text: String,
        reason: String,
    },

    #[error("invalid JSON document for {shape}: {source}")]
    Document {
        shape: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected {expected}, found JSON {found}")]
    Mismatch { expected: String, found: &'static str },

    #[error("{shape} holds {expected} elements, got {actual}")]
    Length {
        shape: String,
        expected: usize,
        actual: usize,
    },
}

type ConvertFn = fn(&Shape, Option<&RawValue>) -> Result<Value, ConvertError>;

fn converter(kind: ShapeKind) -> Option<ConvertFn> {
    match kind {
        ShapeKind::Bool => Some(text::convert_bool),
        ShapeKind::Int => Some(text::convert_int),
        ShapeKind::Uint => Some(text::convert_uint),
        ShapeKind::Float => Some(text::convert_float),
        ShapeKind::String => Some(text::convert_string),
        ShapeKind::Slice | ShapeKind::Array => Some(text::convert_sequence),
        ShapeKind::Map | ShapeKind::Struct => Some(document::convert_document),
        ShapeKind::Pointer => Some(convert_pointer),
        ShapeKind::Opaque => None,
    }
}

/// Convert `raw` into a value of `shape`. `None` means the key is absent.
pub fn convert(shape: &Shape, raw: Option<&RawValue>) -> Result<Value, ConvertError> {
    match converter(shape.kind()) {
        Some(convert_fn) => convert_fn(shape, raw),
        None => Err(ConvertError::Unsupported {
            shape: shape.to_string(),
        }),
    }
}

/// Convert text directly, as if it had been read from storage.
pub fn convert_text(shape: &Shape, text: &str) -> Result<Value, ConvertError> {
    convert(shape, Some(&RawValue::Text(text.to_string())))
}

fn convert_pointer(shape: &Shape, raw: Option<&RawValue>) -> Result<Value, ConvertError> {
    let Shape::Pointer(target) = shape else {
        return Err(ConvertError::Unsupported {
            shape: shape.to_string(),
        });
    };
    if matches!(target.as_ref(), Shape::Pointer(_)) {
        return Err(ConvertError::Unsupported {
            shape: shape.to_string(),
        });
    }
    match raw {
        None => Ok(Value::Pointer(None)),
        Some(raw) => Ok(Value::Pointer(Some(Box::new(convert(target, Some(raw))?)))),
    }
}
