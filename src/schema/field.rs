//! Addressable leaf fields of registered configs.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::convert::Value;
use crate::schema::introspect::FieldSpec;
use crate::schema::shape::Shape;
use crate::schema::watching::RootObject;
use crate::schema::ShapeError;

/// One addressable leaf of a registered configuration object.
///
/// The storage key is `<config name>:<owner path…>:<field name>`; the
/// namespace is applied by the backend. A field's key and shape never change
/// after construction.
pub struct Field {
    name: String,
    owner_path: Vec<String>,
    shape: Shape,
    key: String,
    lens: Vec<usize>,
    root: Arc<dyn RootObject>,
    lock: Mutex<()>,
    revision: AtomicU64,
}

impl Field {
    pub(crate) fn bind(config_name: &str, spec: FieldSpec, root: Arc<dyn RootObject>) -> Self {
        let mut segments = Vec::with_capacity(spec.owner_path.len() + 2);
        segments.push(config_name);
        segments.extend(spec.owner_path.iter().map(String::as_str));
        segments.push(spec.name.as_str());
        let key = segments.join(":");

        Self {
            key,
            name: spec.name,
            owner_path: spec.owner_path,
            shape: spec.shape,
            lens: spec.lens,
            root,
            lock: Mutex::new(()),
            revision: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the enclosing nested structs, outermost first.
    pub fn owner_path(&self) -> &[String] {
        &self.owner_path
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Nesting depth; top-level members are at level 0.
    pub fn level(&self) -> usize {
        self.owner_path.len()
    }

    /// Current value of the slot.
    pub fn value(&self) -> Result<Value, ShapeError> {
        self.root.read(&self.lens)
    }

    pub(crate) fn set(&self, value: Value) -> Result<(), ShapeError> {
        self.root.write(&self.lens, value)?;
        self.revision.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Number of successful writes through this field.
    pub(crate) fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Serializes compare-and-write for this field.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("key", &self.key)
            .field("shape", &self.shape.to_string())
            .field("level", &self.level())
            .finish()
    }
}
