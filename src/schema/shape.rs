//! Static shape descriptors.
//!
//! A [`Shape`] is the structural category of one field slot, derived once
//! from the declared Rust type through [`Reflect::shape`](crate::Reflect::shape).
//! Composite shapes carry their element or member shapes.

use std::fmt;
use std::sync::Arc;

/// Signed integer widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    Isize,
}

/// Unsigned integer widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UintKind {
    U8,
    U16,
    U32,
    U64,
    Usize,
}

/// Floating point widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatKind {
    F32,
    F64,
}

/// Discriminant of a [`Shape`], used as the conversion dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Bool,
    Int,
    Uint,
    Float,
    String,
    Slice,
    Array,
    Map,
    Struct,
    Pointer,
    Opaque,
}

/// Structural description of a value slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Bool,
    Int(IntKind),
    Uint(UintKind),
    Float(FloatKind),
    String,
    /// Growable sequence (`Vec<T>`).
    Slice(Box<Shape>),
    /// Fixed-length sequence (`[T; N]`).
    Array(Box<Shape>, usize),
    /// Key/value map.
    Map(Box<Shape>, Box<Shape>),
    Struct(Arc<StructShape>),
    /// One level of optional indirection (`Option<T>`).
    Pointer(Box<Shape>),
    /// A type that has a shape but no conversion; named for error messages.
    Opaque(&'static str),
}

/// Member list of a struct shape, in declared order.
#[derive(Debug, Clone, PartialEq)]
pub struct StructShape {
    pub name: &'static str,
    pub fields: Vec<FieldShape>,
}

/// One struct member: its key segment and its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldShape {
    pub name: &'static str,
    pub shape: Shape,
}

impl StructShape {
    pub fn new(name: &'static str, fields: Vec<FieldShape>) -> Self {
        Self { name, fields }
    }

    /// Index of the member whose key matches `name` exactly, falling back to
    /// an ASCII case-insensitive match.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .or_else(|| self.fields.iter().position(|f| f.name.eq_ignore_ascii_case(name)))
    }
}

impl FieldShape {
    pub fn new(name: &'static str, shape: Shape) -> Self {
        Self { name, shape }
    }
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Bool => ShapeKind::Bool,
            Shape::Int(_) => ShapeKind::Int,
            Shape::Uint(_) => ShapeKind::Uint,
            Shape::Float(_) => ShapeKind::Float,
            Shape::String => ShapeKind::String,
            Shape::Slice(_) => ShapeKind::Slice,
            Shape::Array(_, _) => ShapeKind::Array,
            Shape::Map(_, _) => ShapeKind::Map,
            Shape::Struct(_) => ShapeKind::Struct,
            Shape::Pointer(_) => ShapeKind::Pointer,
            Shape::Opaque(_) => ShapeKind::Opaque,
        }
    }

    /// True for bool, numeric and string shapes.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Shape::Bool | Shape::Int(_) | Shape::Uint(_) | Shape::Float(_) | Shape::String
        )
    }

    /// Shapes the introspector turns into a single addressable field.
    pub fn is_leaf(&self) -> bool {
        self.is_scalar() || matches!(self, Shape::Slice(_) | Shape::Array(_, _) | Shape::Map(_, _))
    }

    /// The struct behind this shape, looking through one pointer.
    pub fn as_struct(&self) -> Option<&Arc<StructShape>> {
        match self {
            Shape::Struct(s) => Some(s),
            Shape::Pointer(inner) => match inner.as_ref() {
                Shape::Struct(s) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for IntKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntKind::I8 => "i8",
            IntKind::I16 => "i16",
            IntKind::I32 => "i32",
            IntKind::I64 => "i64",
            IntKind::Isize => "isize",
        };
        f.write_str(name)
    }
}

impl fmt::Display for UintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UintKind::U8 => "u8",
            UintKind::U16 => "u16",
            UintKind::U32 => "u32",
            UintKind::U64 => "u64",
            UintKind::Usize => "usize",
        };
        f.write_str(name)
    }
}

impl fmt::Display for FloatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FloatKind::F32 => f.write_str("f32"),
            FloatKind::F64 => f.write_str("f64"),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Bool => f.write_str("bool"),
            Shape::Int(k) => write!(f, "{}", k),
            Shape::Uint(k) => write!(f, "{}", k),
            Shape::Float(k) => write!(f, "{}", k),
            Shape::String => f.write_str("String"),
            Shape::Slice(elem) => write!(f, "Vec<{}>", elem),
            Shape::Array(elem, len) => write!(f, "[{}; {}]", elem, len),
            Shape::Map(k, v) => write!(f, "Map<{}, {}>", k, v),
            Shape::Struct(s) => f.write_str(s.name),
            Shape::Pointer(inner) => write!(f, "Option<{}>", inner),
            Shape::Opaque(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_display() {
        let shape = Shape::Map(
            Box::new(Shape::String),
            Box::new(Shape::Slice(Box::new(Shape::Int(IntKind::I32)))),
        );
        assert_eq!(shape.to_string(), "Map<String, Vec<i32>>");
        assert_eq!(Shape::Pointer(Box::new(Shape::Bool)).to_string(), "Option<bool>");
        assert_eq!(Shape::Array(Box::new(Shape::Float(FloatKind::F32)), 3).to_string(), "[f32; 3]");
    }

    #[test]
    fn test_leaf_classification() {
        assert!(Shape::String.is_leaf());
        assert!(Shape::Slice(Box::new(Shape::String)).is_leaf());
        assert!(!Shape::Pointer(Box::new(Shape::String)).is_leaf());
        assert!(!Shape::Opaque("fn()").is_leaf());

        let inner = Arc::new(StructShape::new("Inner", vec![]));
        assert!(Shape::Pointer(Box::new(Shape::Struct(inner.clone()))).as_struct().is_some());
        assert!(Shape::Struct(inner).as_struct().is_some());
    }

    #[test]
    fn test_position_falls_back_to_case_insensitive() {
        let s = StructShape::new(
            "Account",
            vec![
                FieldShape::new("Name", Shape::String),
                FieldShape::new("name", Shape::Bool),
                FieldShape::new("Password", Shape::String),
            ],
        );
        assert_eq!(s.position("name"), Some(1));
        assert_eq!(s.position("PASSWORD"), Some(2));
        assert_eq!(s.position("missing"), None);
    }
}
