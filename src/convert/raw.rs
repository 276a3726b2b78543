use std::borrow::Cow;

/// A value as it comes out of a storage backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Plain text, the common case.
    Text(String),
    /// An already-decoded structured document.
    Document(serde_json::Value),
}

impl RawValue {
    /// Text form of the value. Documents holding a JSON string yield the
    /// string itself, other documents their JSON encoding.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            RawValue::Text(s) => Cow::Borrowed(s),
            RawValue::Document(serde_json::Value::String(s)) => Cow::Borrowed(s),
            RawValue::Document(serde_json::Value::Null) => Cow::Borrowed(""),
            RawValue::Document(doc) => Cow::Owned(doc.to_string()),
        }
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(doc: serde_json::Value) -> Self {
        RawValue::Document(doc)
    }
}
