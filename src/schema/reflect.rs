//! Type-directed reflection over configuration values.
//!
//! [`Reflect`] gives every supported Rust type a static [`Shape`], a lossless
//! mapping to and from the dynamic [`Value`], and index-addressed access to
//! struct members. Scalars, `String`, `Vec<T>`, `[T; N]`, `HashMap`,
//! `BTreeMap`, `Option<T>` and `Box<T>` are covered here; user structs opt in
//! with [`impl_reflect!`](crate::impl_reflect).

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use crate::convert::Value;
use crate::schema::shape::{FloatKind, IntKind, Shape, UintKind};
use crate::schema::ShapeError;

/// A value with a statically known shape that can be read and written
/// dynamically.
///
/// The member accessors (`field`, `field_mut`, `allocate`) only do something
/// for structs and for `Option`/`Box` wrappers around structs; leaf types keep
/// the defaults.
pub trait Reflect: Send + Sync + 'static {
    /// Shape descriptor of this type.
    fn shape() -> Shape
    where
        Self: Sized;

    /// Build an instance from a value of this type's shape.
    fn from_value(value: Value) -> Result<Self, ShapeError>
    where
        Self: Sized;

    /// Dynamic copy of the current value.
    fn to_value(&self) -> Value;

    /// Replace `self` with `value`, which must conform to this type's shape.
    fn assign(&mut self, value: Value) -> Result<(), ShapeError>;

    /// Member at `index` in declared order.
    fn field(&self, _index: usize) -> Option<&dyn Reflect> {
        None
    }

    /// Mutable member at `index` in declared order.
    fn field_mut(&mut self, _index: usize) -> Option<&mut dyn Reflect> {
        None
    }

    /// Fill an empty `Option` with a zero instance. Returns true when an
    /// allocation happened.
    fn allocate(&mut self) -> bool {
        false
    }
}

fn mismatch<T: Reflect>(found: &Value) -> ShapeError {
    ShapeError::Mismatch {
        expected: T::shape().to_string(),
        found: found.describe(),
    }
}

/// Shape of the member selected by `project`. Used by `impl_reflect!` to
/// infer member types from field names.
#[doc(hidden)]
pub fn shape_of<S, F: Reflect>(_project: fn(&S) -> &F) -> Shape {
    F::shape()
}

/// Unwrap a struct value's members, or fail with a mismatch naming `S`.
#[doc(hidden)]
pub fn struct_members<S: Reflect>(value: Value) -> Result<Vec<(String, Value)>, ShapeError> {
    match value {
        Value::Struct(members) => Ok(members),
        other => Err(mismatch::<S>(&other)),
    }
}

/// Remove and return the member named `name`.
#[doc(hidden)]
pub fn take_member(members: &mut Vec<(String, Value)>, name: &str) -> Option<Value> {
    let position = members.iter().position(|(member, _)| member == name)?;
    Some(members.swap_remove(position).1)
}

macro_rules! reflect_scalar {
    ($($ty:ty => $variant:ident($kind:expr) as $wide:ty),* $(,)?) => {$(
        impl Reflect for $ty {
            fn shape() -> Shape {
                Shape::$variant($kind)
            }

            fn from_value(value: Value) -> Result<Self, ShapeError> {
                match value {
                    Value::$variant(kind, v) if kind == $kind => Ok(v as $ty),
                    other => Err(mismatch::<Self>(&other)),
                }
            }

            fn to_value(&self) -> Value {
                Value::$variant($kind, *self as $wide)
            }

            fn assign(&mut self, value: Value) -> Result<(), ShapeError> {
                *self = Self::from_value(value)?;
                Ok(())
            }
        }
    )*};
}

reflect_scalar! {
    i8 => Int(IntKind::I8) as i64,
    i16 => Int(IntKind::I16) as i64,
    i32 => Int(IntKind::I32) as i64,
    i64 => Int(IntKind::I64) as i64,
    isize => Int(IntKind::Isize) as i64,
    u8 => Uint(UintKind::U8) as u64,
    u16 => Uint(UintKind::U16) as u64,
    u32 => Uint(UintKind::U32) as u64,
    u64 => Uint(UintKind::U64) as u64,
    usize => Uint(UintKind::Usize) as u64,
    f32 => Float(FloatKind::F32) as f64,
    f64 => Float(FloatKind::F64) as f64,
}

impl Reflect for bool {
    fn shape() -> Shape {
        Shape::Bool
    }

    fn from_value(value: Value) -> Result<Self, ShapeError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn assign(&mut self, value: Value) -> Result<(), ShapeError> {
        *self = Self::from_value(value)?;
        Ok(())
    }
}

impl Reflect for String {
    fn shape() -> Shape {
        Shape::String
    }

    fn from_value(value: Value) -> Result<Self, ShapeError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn assign(&mut self, value: Value) -> Result<(), ShapeError> {
        *self = Self::from_value(value)?;
        Ok(())
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn shape() -> Shape {
        Shape::Slice(Box::new(T::shape()))
    }

    fn from_value(value: Value) -> Result<Self, ShapeError> {
        match value {
            Value::Slice(None) => Ok(Vec::new()),
            Value::Slice(Some(items)) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Slice(Some(self.iter().map(Reflect::to_value).collect()))
    }

    fn assign(&mut self, value: Value) -> Result<(), ShapeError> {
        *self = Self::from_value(value)?;
        Ok(())
    }
}

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn shape() -> Shape {
        Shape::Array(Box::new(T::shape()), N)
    }

    fn from_value(value: Value) -> Result<Self, ShapeError> {
        match value {
            Value::Array(items) => {
                let items = items
                    .into_iter()
                    .map(T::from_value)
                    .collect::<Result<Vec<T>, _>>()?;
                items.try_into().map_err(|rest: Vec<T>| ShapeError::Length {
                    expected: N,
                    actual: rest.len(),
                })
            }
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(Reflect::to_value).collect())
    }

    fn assign(&mut self, value: Value) -> Result<(), ShapeError> {
        *self = Self::from_value(value)?;
        Ok(())
    }
}

fn map_entries<T: Reflect>(value: Value) -> Result<Vec<(Value, Value)>, ShapeError> {
    match value {
        Value::Map(None) => Ok(Vec::new()),
        Value::Map(Some(entries)) => Ok(entries),
        other => Err(mismatch::<T>(&other)),
    }
}

impl<K, V> Reflect for HashMap<K, V>
where
    K: Reflect + Eq + Hash,
    V: Reflect,
{
    fn shape() -> Shape {
        Shape::Map(Box::new(K::shape()), Box::new(V::shape()))
    }

    fn from_value(value: Value) -> Result<Self, ShapeError> {
        map_entries::<Self>(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect()
    }

    fn to_value(&self) -> Value {
        Value::Map(Some(
            self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect(),
        ))
    }

    fn assign(&mut self, value: Value) -> Result<(), ShapeError> {
        *self = Self::from_value(value)?;
        Ok(())
    }
}

impl<K, V> Reflect for BTreeMap<K, V>
where
    K: Reflect + Ord,
    V: Reflect,
{
    fn shape() -> Shape {
        Shape::Map(Box::new(K::shape()), Box::new(V::shape()))
    }

    fn from_value(value: Value) -> Result<Self, ShapeError> {
        map_entries::<Self>(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect()
    }

    fn to_value(&self) -> Value {
        Value::Map(Some(
            self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect(),
        ))
    }

    fn assign(&mut self, value: Value) -> Result<(), ShapeError> {
        *self = Self::from_value(value)?;
        Ok(())
    }
}

/// `Option<T>` is the single level of indirection: `None` is a nil pointer.
impl<T: Reflect + Default> Reflect for Option<T> {
    fn shape() -> Shape {
        Shape::Pointer(Box::new(T::shape()))
    }

    fn from_value(value: Value) -> Result<Self, ShapeError> {
        match value {
            Value::Pointer(None) => Ok(None),
            Value::Pointer(Some(inner)) => Ok(Some(T::from_value(*inner)?)),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Pointer(self.as_ref().map(|v| Box::new(v.to_value())))
    }

    fn assign(&mut self, value: Value) -> Result<(), ShapeError> {
        *self = Self::from_value(value)?;
        Ok(())
    }

    fn field(&self, index: usize) -> Option<&dyn Reflect> {
        self.as_ref().and_then(|inner| inner.field(index))
    }

    fn field_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        self.as_mut().and_then(|inner| inner.field_mut(index))
    }

    fn allocate(&mut self) -> bool {
        if self.is_some() {
            return false;
        }
        *self = Some(T::default());
        true
    }
}

/// Boxes are transparent; `Option<Box<T>>` behaves like `Option<T>`.
impl<T: Reflect> Reflect for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }

    fn from_value(value: Value) -> Result<Self, ShapeError> {
        T::from_value(value).map(Box::new)
    }

    fn to_value(&self) -> Value {
        (**self).to_value()
    }

    fn assign(&mut self, value: Value) -> Result<(), ShapeError> {
        (**self).assign(value)
    }

    fn field(&self, index: usize) -> Option<&dyn Reflect> {
        (**self).field(index)
    }

    fn field_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        (**self).field_mut(index)
    }

    fn allocate(&mut self) -> bool {
        (**self).allocate()
    }
}

/// Implement [`Reflect`] for a struct with named fields.
///
/// Members are listed in declared order; each may carry an external key
/// segment with `as "Key"`, otherwise the Rust field name is used. The struct
/// must implement `Default` and `Clone`.
///
/// ```
/// use liveconf::impl_reflect;
///
/// #[derive(Debug, Clone, Default)]
/// struct Server {
///     host: Option<String>,
///     port: u16,
///     allow_ips: Vec<String>,
/// }
///
/// impl_reflect!(Server { host as "Host", port as "Port", allow_ips as "AllowIPs" });
/// ```
#[macro_export]
macro_rules! impl_reflect {
    ($ty:ident { $($field:ident $(as $key:literal)?),* $(,)? }) => {
        impl $crate::Reflect for $ty {
            fn shape() -> $crate::Shape {
                $crate::Shape::Struct(::std::sync::Arc::new($crate::StructShape::new(
                    stringify!($ty),
                    vec![$(
                        $crate::FieldShape::new(
                            $crate::__reflect_key!($field $(, $key)?),
                            $crate::schema::reflect::shape_of::<$ty, _>(|s| &s.$field),
                        ),
                    )*],
                )))
            }

            #[allow(unused_mut)]
            fn from_value(value: $crate::Value) -> ::std::result::Result<Self, $crate::ShapeError> {
                let mut members = $crate::schema::reflect::struct_members::<Self>(value)?;
                let mut out = <$ty as ::std::default::Default>::default();
                $(
                    if let Some(member) = $crate::schema::reflect::take_member(
                        &mut members,
                        $crate::__reflect_key!($field $(, $key)?),
                    ) {
                        out.$field = $crate::Reflect::from_value(member)?;
                    }
                )*
                Ok(out)
            }

            fn to_value(&self) -> $crate::Value {
                $crate::Value::Struct(vec![$(
                    (
                        $crate::__reflect_key!($field $(, $key)?).to_string(),
                        $crate::Reflect::to_value(&self.$field),
                    ),
                )*])
            }

            fn assign(
                &mut self,
                value: $crate::Value,
            ) -> ::std::result::Result<(), $crate::ShapeError> {
                *self = <Self as $crate::Reflect>::from_value(value)?;
                Ok(())
            }

            #[allow(unused_mut, unused_assignments)]
            fn field(&self, index: usize) -> ::std::option::Option<&dyn $crate::Reflect> {
                let mut position = 0usize;
                $(
                    if index == position {
                        return Some(&self.$field);
                    }
                    position += 1;
                )*
                None
            }

            #[allow(unused_mut, unused_assignments)]
            fn field_mut(
                &mut self,
                index: usize,
            ) -> ::std::option::Option<&mut dyn $crate::Reflect> {
                let mut position = 0usize;
                $(
                    if index == position {
                        return Some(&mut self.$field);
                    }
                    position += 1;
                )*
                None
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __reflect_key {
    ($field:ident) => {
        stringify!($field)
    };
    ($field:ident, $key:literal) => {
        $key
    };
}
