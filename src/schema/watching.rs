//! Registered configuration objects.

use std::sync::Arc;

use crate::convert::Value;
use crate::schema::introspect;
use crate::schema::reflect::Reflect;
use crate::schema::shape::Shape;
use crate::schema::{Field, Live, ShapeError};

/// Type-erased access to a live root, addressed by member index paths.
pub(crate) trait RootObject: Send + Sync {
    fn identity(&self) -> usize;

    fn read(&self, lens: &[usize]) -> Result<Value, ShapeError>;

    fn write(&self, lens: &[usize], value: Value) -> Result<(), ShapeError>;
}

fn resolve<'a>(mut node: &'a dyn Reflect, lens: &[usize]) -> Result<&'a dyn Reflect, ShapeError> {
    for &index in lens {
        node = node.field(index).ok_or_else(|| ShapeError::Unresolved {
            path: lens.to_vec(),
        })?;
    }
    Ok(node)
}

fn resolve_mut<'a>(
    mut node: &'a mut dyn Reflect,
    lens: &[usize],
) -> Result<&'a mut dyn Reflect, ShapeError> {
    for &index in lens {
        // Owners may have been reset to None by a caller's store().
        node.allocate();
        node = node.field_mut(index).ok_or_else(|| ShapeError::Unresolved {
            path: lens.to_vec(),
        })?;
    }
    Ok(node)
}

impl<T: Reflect + Clone> RootObject for Live<T> {
    fn identity(&self) -> usize {
        Live::identity(self)
    }

    fn read(&self, lens: &[usize]) -> Result<Value, ShapeError> {
        let snapshot = self.load();
        let slot = resolve(&*snapshot, lens)?;
        Ok(slot.to_value())
    }

    fn write(&self, lens: &[usize], value: Value) -> Result<(), ShapeError> {
        self.try_modify(|root| resolve_mut(root, lens)?.assign(value.clone()))
    }
}

/// A named configuration object and its ordered leaf fields.
pub struct WatchingConfig {
    name: String,
    root: Arc<dyn RootObject>,
    fields: Vec<Arc<Field>>,
}

impl WatchingConfig {
    /// Introspect `root` under its type name.
    pub fn new<T: Reflect + Clone>(root: &Live<T>) -> Result<Self, ShapeError> {
        Self::build(None, root)
    }

    /// Introspect `root` under an explicit name. An empty name falls back to
    /// the type name.
    pub fn named<T: Reflect + Clone>(
        name: impl Into<String>,
        root: &Live<T>,
    ) -> Result<Self, ShapeError> {
        let name = name.into();
        Self::build((!name.is_empty()).then_some(name), root)
    }

    fn build<T: Reflect + Clone>(name: Option<String>, root: &Live<T>) -> Result<Self, ShapeError> {
        let Shape::Struct(shape) = T::shape() else {
            return Err(ShapeError::NotAStruct {
                type_name: std::any::type_name::<T>().to_string(),
            });
        };
        let name = name.unwrap_or_else(|| shape.name.to_string());

        let mut specs = Vec::new();
        root.try_modify(|value| {
            let (found, allocated) = introspect::walk(&shape, value)?;
            specs = found;
            if allocated > 0 {
                tracing::debug!(config = %name, allocated, "Filled empty nested configs");
            }
            Ok::<_, ShapeError>(())
        })?;

        let erased: Arc<dyn RootObject> = Arc::new(root.clone());
        let fields = specs
            .into_iter()
            .map(|spec| Arc::new(Field::bind(&name, spec, Arc::clone(&erased))))
            .collect();

        Ok(Self {
            name,
            root: erased,
            fields,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Leaf fields in traversal order.
    pub fn fields(&self) -> &[Arc<Field>] {
        &self.fields
    }

    /// Storage keys of every field, in traversal order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key())
    }

    /// Identity of the underlying root object.
    pub(crate) fn identity(&self) -> usize {
        self.root.identity()
    }
}

impl std::fmt::Debug for WatchingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchingConfig")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Limits {
        burst: u32,
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Service {
        name: String,
        limits: Option<Limits>,
    }

    crate::impl_reflect!(Limits { burst as "Burst" });
    crate::impl_reflect!(Service { name as "Name", limits as "Limits" });

    #[test]
    fn test_keys_use_type_name_by_default() {
        let live = Live::new(Service::default());
        let config = WatchingConfig::new(&live).unwrap();
        assert_eq!(config.name(), "Service");
        assert_eq!(config.keys().collect::<Vec<_>>(), vec!["Service:Name", "Service:Limits:Burst"]);
        assert_eq!(config.fields()[1].level(), 1);
        assert_eq!(config.fields()[1].owner_path(), ["Limits".to_string()]);
        assert!(live.load().limits.is_some());
    }

    #[test]
    fn test_named_config() {
        let live = Live::new(Service::default());
        let config = WatchingConfig::named("edge", &live).unwrap();
        assert_eq!(config.fields()[0].key(), "edge:Name");
        let fallback = WatchingConfig::named("", &live).unwrap();
        assert_eq!(fallback.name(), "Service");
    }

    #[test]
    fn test_field_writes_reach_the_live_object() {
        let live = Live::new(Service::default());
        let config = WatchingConfig::new(&live).unwrap();
        let before = live.load();

        config.fields()[1].set(Value::Uint(crate::schema::UintKind::U32, 7)).unwrap();
        assert_eq!(live.load().limits, Some(Limits { burst: 7 }));
        assert_eq!(before.limits, Some(Limits { burst: 0 }));

        assert_eq!(config.fields()[1].value().unwrap().to_string(), "7");
    }

    #[test]
    fn test_non_struct_root_is_rejected() {
        let live = Live::new(5u32);
        assert!(matches!(WatchingConfig::new(&live), Err(ShapeError::NotAStruct { .. })));
    }
}
