//! Dynamic values and their canonical text form.

use std::fmt;

use crate::convert::ConvertError;
use crate::schema::shape::{FloatKind, IntKind, Shape, UintKind};

/// A typed value detached from any Rust type.
///
/// `Slice(None)`, `Map(None)` and `Pointer(None)` are the nil forms.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(IntKind, i64),
    Uint(UintKind, u64),
    Float(FloatKind, f64),
    String(String),
    Slice(Option<Vec<Value>>),
    Array(Vec<Value>),
    Map(Option<Vec<(Value, Value)>>),
    Struct(Vec<(String, Value)>),
    Pointer(Option<Box<Value>>),
}

impl Value {
    /// Zero value of `shape`.
    pub fn zero(shape: &Shape) -> Result<Value, ConvertError> {
        Ok(match shape {
            Shape::Bool => Value::Bool(false),
            Shape::Int(kind) => Value::Int(*kind, 0),
            Shape::Uint(kind) => Value::Uint(*kind, 0),
            Shape::Float(kind) => Value::Float(*kind, 0.0),
            Shape::String => Value::String(String::new()),
            Shape::Slice(_) => Value::Slice(None),
            Shape::Array(elem, len) => {
                let zero = Value::zero(elem)?;
                Value::Array(vec![zero; *len])
            }
            Shape::Map(_, _) => Value::Map(None),
            Shape::Struct(s) => Value::Struct(
                s.fields
                    .iter()
                    .map(|f| Ok((f.name.to_string(), Value::zero(&f.shape)?)))
                    .collect::<Result<_, ConvertError>>()?,
            ),
            Shape::Pointer(_) => Value::Pointer(None),
            Shape::Opaque(_) => {
                return Err(ConvertError::Unsupported {
                    shape: shape.to_string(),
                })
            }
        })
    }

    /// Short category name used in mismatch errors.
    pub fn describe(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_, _) => "int",
            Value::Uint(_, _) => "uint",
            Value::Float(_, _) => "float",
            Value::String(_) => "string",
            Value::Slice(_) => "slice",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Struct(_) => "struct",
            Value::Pointer(_) => "pointer",
        }
    }

    /// Whether this value can be assigned to a slot of `shape`.
    pub fn conforms_to(&self, shape: &Shape) -> bool {
        match (self, shape) {
            (Value::Bool(_), Shape::Bool) | (Value::String(_), Shape::String) => true,
            (Value::Int(k, _), Shape::Int(s)) => k == s,
            (Value::Uint(k, _), Shape::Uint(s)) => k == s,
            (Value::Float(k, _), Shape::Float(s)) => k == s,
            (Value::Slice(None), Shape::Slice(_)) => true,
            (Value::Slice(Some(items)), Shape::Slice(elem)) => {
                items.iter().all(|v| v.conforms_to(elem))
            }
            (Value::Array(items), Shape::Array(elem, len)) => {
                items.len() == *len && items.iter().all(|v| v.conforms_to(elem))
            }
            (Value::Map(None), Shape::Map(_, _)) => true,
            (Value::Map(Some(entries)), Shape::Map(key, val)) => entries
                .iter()
                .all(|(k, v)| k.conforms_to(key) && v.conforms_to(val)),
            (Value::Struct(members), Shape::Struct(s)) => {
                members.len() == s.fields.len()
                    && members
                        .iter()
                        .zip(&s.fields)
                        .all(|((name, v), f)| name == f.name && v.conforms_to(&f.shape))
            }
            (Value::Pointer(None), Shape::Pointer(_)) => true,
            (Value::Pointer(Some(inner)), Shape::Pointer(target)) => inner.conforms_to(target),
            _ => false,
        }
    }

    /// JSON rendering; nil slices, maps and pointers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(_, v) => Json::from(*v),
            Value::Uint(_, v) => Json::from(*v),
            Value::Float(FloatKind::F32, v) => float_json(f64::from(*v as f32)),
            Value::Float(FloatKind::F64, v) => float_json(*v),
            Value::String(s) => Json::String(s.clone()),
            Value::Slice(None) | Value::Map(None) | Value::Pointer(None) => Json::Null,
            Value::Slice(Some(items)) | Value::Array(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(Some(entries)) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (map_key(k), v.to_json()))
                    .collect(),
            ),
            Value::Struct(members) => Json::Object(
                members
                    .iter()
                    .map(|(name, v)| (name.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Pointer(Some(inner)) => inner.to_json(),
        }
    }
}

fn float_json(v: f64) -> serde_json::Value {
    serde_json::Number::from_f64(v)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn map_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Canonical text form, used for change detection.
///
/// Sequences render as `[a b]`, maps as `map[k:v]` with entries sorted by
/// rendered key, structs as `{a b}`, nil pointers as `<nil>` and set pointers
/// as `&` followed by the target. Nil and empty sequences both render `[]`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(_, v) => write!(f, "{}", v),
            Value::Uint(_, v) => write!(f, "{}", v),
            Value::Float(FloatKind::F32, v) => write!(f, "{}", *v as f32),
            Value::Float(FloatKind::F64, v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
            Value::Slice(None) => f.write_str("[]"),
            Value::Slice(Some(items)) | Value::Array(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            Value::Map(None) => f.write_str("map[]"),
            Value::Map(Some(entries)) => {
                let mut rendered: Vec<(String, String)> = entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                rendered.sort();
                f.write_str("map[")?;
                for (i, (k, v)) in rendered.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                f.write_str("]")
            }
            Value::Struct(members) => {
                f.write_str("{")?;
                for (i, (_, v)) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("}")
            }
            Value::Pointer(None) => f.write_str("<nil>"),
            Value::Pointer(Some(inner)) => write!(f, "&{}", inner),
        }
    }
}
