use std::fmt::Display;
use std::str::FromStr;

use crate::convert::{convert, document, ConvertError, RawValue, Value};
use crate::schema::shape::{FloatKind, IntKind, Shape, UintKind};

fn unsupported(shape: &Shape) -> ConvertError {
    ConvertError::Unsupported {
        shape: shape.to_string(),
    }
}

fn parse<T>(shape: &Shape, text: &str) -> Result<T, ConvertError>
where
    T: FromStr,
    T::Err: Display,
{
    text.parse::<T>().map_err(|e| ConvertError::Parse {
        shape: shape.to_string(),
        text: text.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

pub(super) fn convert_bool(_shape: &Shape, raw: Option<&RawValue>) -> Result<Value, ConvertError> {
    let parsed = raw.and_then(|raw| parse_bool(raw.text().trim()));
    Ok(Value::Bool(parsed.unwrap_or(false)))
}

pub(super) fn convert_int(shape: &Shape, raw: Option<&RawValue>) -> Result<Value, ConvertError> {
    let Shape::Int(kind) = shape else {
        return Err(unsupported(shape));
    };
    let text = raw.map(RawValue::text).unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Ok(Value::Int(*kind, 0));
    }
    let v = match kind {
        IntKind::I8 => i64::from(parse::<i8>(shape, text)?),
        IntKind::I16 => i64::from(parse::<i16>(shape, text)?),
        IntKind::I32 => i64::from(parse::<i32>(shape, text)?),
        IntKind::I64 => parse::<i64>(shape, text)?,
        IntKind::Isize => parse::<isize>(shape, text)? as i64,
    };
    Ok(Value::Int(*kind, v))
}

pub(super) fn convert_uint(shape: &Shape, raw: Option<&RawValue>) -> Result<Value, ConvertError> {
    let Shape::Uint(kind) = shape else {
        return Err(unsupported(shape));
    };
    let text = raw.map(RawValue::text).unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Ok(Value::Uint(*kind, 0));
    }
    let v = match kind {
        UintKind::U8 => u64::from(parse::<u8>(shape, text)?),
        UintKind::U16 => u64::from(parse::<u16>(shape, text)?),
        UintKind::U32 => u64::from(parse::<u32>(shape, text)?),
        UintKind::U64 => parse::<u64>(shape, text)?,
        UintKind::Usize => parse::<usize>(shape, text)? as u64,
    };
    Ok(Value::Uint(*kind, v))
}

pub(super) fn convert_float(shape: &Shape, raw: Option<&RawValue>) -> Result<Value, ConvertError> {
    let Shape::Float(kind) = shape else {
        return Err(unsupported(shape));
    };
    let Some(raw) = raw else {
        return Ok(Value::Float(*kind, 0.0));
    };
    let text = raw.text();
    let text = text.trim();
    let v = match kind {
        FloatKind::F32 => f64::from(parse::<f32>(shape, text)?),
        FloatKind::F64 => parse::<f64>(shape, text)?,
    };
    Ok(Value::Float(*kind, v))
}

pub(super) fn convert_string(
    _shape: &Shape,
    raw: Option<&RawValue>,
) -> Result<Value, ConvertError> {
    let text = raw.map(RawValue::text).unwrap_or_default();
    Ok(Value::String(text.trim().to_string()))
}

/// Element shapes that are split out of comma separated text.
fn splits_as_text(elem: &Shape) -> bool {
    match elem {
        Shape::Pointer(target) => target.is_scalar(),
        other => other.is_scalar(),
    }
}

pub(super) fn convert_sequence(
    shape: &Shape,
    raw: Option<&RawValue>,
) -> Result<Value, ConvertError> {
    let elem = match shape {
        Shape::Slice(elem) | Shape::Array(elem, _) => elem,
        _ => return Err(unsupported(shape)),
    };
    let Some(raw) = raw else {
        return Value::zero(shape);
    };
    if !splits_as_text(elem) {
        return document::convert_document(shape, Some(raw));
    }
    if let RawValue::Document(doc @ serde_json::Value::Array(_)) = raw {
        return document::from_json(shape, doc);
    }

    let text = raw.text();
    let text = text.trim();
    let items = if text.is_empty() {
        Vec::new()
    } else {
        text.split(',')
            .map(|part| convert(elem, Some(&RawValue::Text(part.to_string()))))
            .collect::<Result<Vec<_>, _>>()?
    };
    match shape {
        Shape::Array(_, len) => document::fill_array(shape, elem, *len, items),
        _ => Ok(Value::Slice(Some(items))),
    }
}
