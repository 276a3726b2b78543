use serde_json::Value as Json;

use crate::convert::{convert, ConvertError, RawValue, Value};
use crate::schema::shape::{FloatKind, IntKind, Shape, UintKind};

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn mismatch(shape: &Shape, json: &Json) -> ConvertError {
    ConvertError::Mismatch {
        expected: shape.to_string(),
        found: json_kind(json),
    }
}

/// Decode a JSON document (text or pre-decoded) into `shape`.
pub(super) fn convert_document(
    shape: &Shape,
    raw: Option<&RawValue>,
) -> Result<Value, ConvertError> {
    match raw {
        None => Value::zero(shape),
        Some(RawValue::Document(doc)) => from_json(shape, doc),
        Some(RawValue::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Value::zero(shape);
            }
            let doc: Json = serde_json::from_str(text).map_err(|source| ConvertError::Document {
                shape: shape.to_string(),
                source,
            })?;
            from_json(shape, &doc)
        }
    }
}

pub(super) fn fill_array(
    shape: &Shape,
    elem: &Shape,
    len: usize,
    mut items: Vec<Value>,
) -> Result<Value, ConvertError> {
    if items.len() > len {
        return Err(ConvertError::Length {
            shape: shape.to_string(),
            expected: len,
            actual: items.len(),
        });
    }
    while items.len() < len {
        items.push(Value::zero(elem)?);
    }
    Ok(Value::Array(items))
}

fn int_in_range(kind: IntKind, v: i64) -> bool {
    match kind {
        IntKind::I8 => i8::try_from(v).is_ok(),
        IntKind::I16 => i16::try_from(v).is_ok(),
        IntKind::I32 => i32::try_from(v).is_ok(),
        IntKind::I64 => true,
        IntKind::Isize => isize::try_from(v).is_ok(),
    }
}

fn uint_in_range(kind: UintKind, v: u64) -> bool {
    match kind {
        UintKind::U8 => u8::try_from(v).is_ok(),
        UintKind::U16 => u16::try_from(v).is_ok(),
        UintKind::U32 => u32::try_from(v).is_ok(),
        UintKind::U64 => true,
        UintKind::Usize => usize::try_from(v).is_ok(),
    }
}

/// Shape-directed decoding of a JSON value. `null` yields the zero value.
pub(super) fn from_json(shape: &Shape, json: &Json) -> Result<Value, ConvertError> {
    if json.is_null() {
        return Value::zero(shape);
    }
    match shape {
        Shape::Bool => json.as_bool().map(Value::Bool).ok_or_else(|| mismatch(shape, json)),
        Shape::Int(kind) => json
            .as_i64()
            .filter(|v| int_in_range(*kind, *v))
            .map(|v| Value::Int(*kind, v))
            .ok_or_else(|| mismatch(shape, json)),
        Shape::Uint(kind) => json
            .as_u64()
            .filter(|v| uint_in_range(*kind, *v))
            .map(|v| Value::Uint(*kind, v))
            .ok_or_else(|| mismatch(shape, json)),
        Shape::Float(kind) => json
            .as_f64()
            .map(|v| match kind {
                FloatKind::F32 => Value::Float(*kind, f64::from(v as f32)),
                FloatKind::F64 => Value::Float(*kind, v),
            })
            .ok_or_else(|| mismatch(shape, json)),
        Shape::String => json
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| mismatch(shape, json)),
        Shape::Slice(elem) => {
            let items = json.as_array().ok_or_else(|| mismatch(shape, json))?;
            let items = items
                .iter()
                .map(|item| from_json(elem, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Slice(Some(items)))
        }
        Shape::Array(elem, len) => {
            let items = json.as_array().ok_or_else(|| mismatch(shape, json))?;
            let items = items
                .iter()
                .map(|item| from_json(elem, item))
                .collect::<Result<Vec<_>, _>>()?;
            fill_array(shape, elem, *len, items)
        }
        Shape::Map(key, val) => {
            let object = json.as_object().ok_or_else(|| mismatch(shape, json))?;
            if !key.is_scalar() {
                return Err(ConvertError::Unsupported {
                    shape: shape.to_string(),
                });
            }
            let entries = object
                .iter()
                .map(|(k, v)| {
                    let k = convert(key, Some(&RawValue::Text(k.clone())))?;
                    Ok((k, from_json(val, v)?))
                })
                .collect::<Result<Vec<_>, ConvertError>>()?;
            Ok(Value::Map(Some(entries)))
        }
        Shape::Struct(s) => {
            let object = json.as_object().ok_or_else(|| mismatch(shape, json))?;
            let members = s
                .fields
                .iter()
                .map(|field| {
                    let found = object.get(field.name).or_else(|| {
                        object
                            .iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case(field.name))
                            .map(|(_, v)| v)
                    });
                    let value = match found {
                        Some(v) => from_json(&field.shape, v)?,
                        None => Value::zero(&field.shape)?,
                    };
                    Ok((field.name.to_string(), value))
                })
                .collect::<Result<Vec<_>, ConvertError>>()?;
            Ok(Value::Struct(members))
        }
        Shape::Pointer(target) => {
            if matches!(target.as_ref(), Shape::Pointer(_)) {
                return Err(ConvertError::Unsupported {
                    shape: shape.to_string(),
                });
            }
            Ok(Value::Pointer(Some(Box::new(from_json(target, json)?))))
        }
        Shape::Opaque(_) => Err(ConvertError::Unsupported {
            shape: shape.to_string(),
        }),
    }
}
