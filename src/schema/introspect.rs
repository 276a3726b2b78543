//! Depth-first field discovery.
//!
//! Walks a root struct in declared member order. Leaf members become one
//! [`FieldSpec`] each; struct members (directly or behind one `Option`) are
//! descended into, and empty `Option<struct>` members are filled with a zero
//! instance on the way so every discovered field has a live slot.

use crate::schema::reflect::Reflect;
use crate::schema::shape::{Shape, StructShape};
use crate::schema::ShapeError;

/// A discovered leaf, before it is bound to a root.
#[derive(Debug, Clone)]
pub(crate) struct FieldSpec {
    pub name: String,
    pub owner_path: Vec<String>,
    pub shape: Shape,
    pub lens: Vec<usize>,
}

enum Member<'a> {
    Leaf,
    Composite(&'a StructShape),
    Unsupported,
}

fn classify(shape: &Shape) -> Member<'_> {
    if shape.is_leaf() {
        return Member::Leaf;
    }
    if let Shape::Pointer(target) = shape {
        if target.is_leaf() {
            return Member::Leaf;
        }
    }
    match shape.as_struct() {
        Some(s) => Member::Composite(s),
        None => Member::Unsupported,
    }
}

/// Discover every leaf under `root`. Returns the specs and how many empty
/// `Option` members were allocated.
pub(crate) fn walk(
    shape: &StructShape,
    root: &mut dyn Reflect,
) -> Result<(Vec<FieldSpec>, usize), ShapeError> {
    let mut walker = Walker::default();
    walker.visit(shape, root)?;
    Ok((walker.specs, walker.allocated))
}

#[derive(Default)]
struct Walker {
    owners: Vec<String>,
    lens: Vec<usize>,
    specs: Vec<FieldSpec>,
    allocated: usize,
}

impl Walker {
    fn visit(&mut self, shape: &StructShape, node: &mut dyn Reflect) -> Result<(), ShapeError> {
        for (index, member) in shape.fields.iter().enumerate() {
            self.lens.push(index);
            match classify(&member.shape) {
                Member::Leaf => self.specs.push(FieldSpec {
                    name: member.name.to_string(),
                    owner_path: self.owners.clone(),
                    shape: member.shape.clone(),
                    lens: self.lens.clone(),
                }),
                Member::Composite(inner) => {
                    let child = node.field_mut(index).ok_or_else(|| ShapeError::Unresolved {
                        path: self.lens.clone(),
                    })?;
                    if child.allocate() {
                        self.allocated += 1;
                        tracing::debug!(
                            owner = %self.owners.join("."),
                            field = member.name,
                            "Allocated empty nested config"
                        );
                    }
                    self.owners.push(member.name.to_string());
                    self.visit(inner, child)?;
                    self.owners.pop();
                }
                Member::Unsupported => {
                    let mut path = self.owners.clone();
                    path.push(member.name.to_string());
                    return Err(ShapeError::Unsupported {
                        path: path.join("."),
                        shape: member.shape.to_string(),
                    });
                }
            }
            self.lens.pop();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::reflect::Reflect;

    #[derive(Debug, Clone, Default)]
    struct Db {
        host: String,
        port: u16,
    }

    #[derive(Debug, Clone, Default)]
    struct App {
        name: Option<String>,
        db: Db,
        replica: Option<Db>,
        weights: Vec<f64>,
    }

    crate::impl_reflect!(Db { host as "Host", port as "Port" });
    crate::impl_reflect!(App {
        name as "Name",
        db as "DB",
        replica as "Replica",
        weights as "Weights",
    });

    fn root_shape() -> std::sync::Arc<StructShape> {
        match App::shape() {
            Shape::Struct(s) => s,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_walk_discovers_leaves_in_order() {
        let mut app = App::default();
        let (specs, allocated) = walk(&root_shape(), &mut app).unwrap();
        let keys: Vec<String> = specs
            .iter()
            .map(|s| {
                let mut parts = s.owner_path.clone();
                parts.push(s.name.clone());
                parts.join(":")
            })
            .collect();
        assert_eq!(
            keys,
            vec!["Name", "DB:Host", "DB:Port", "Replica:Host", "Replica:Port", "Weights"]
        );
        assert_eq!(specs[4].lens, vec![2, 1]);
        assert_eq!(allocated, 1);
        assert!(app.replica.is_some());
    }

    #[test]
    fn test_walk_rejects_nested_pointers() {
        #[derive(Debug, Clone, Default)]
        struct Bad {
            deep: Option<Option<String>>,
        }
        crate::impl_reflect!(Bad { deep });

        let shape = match Bad::shape() {
            Shape::Struct(s) => s,
            _ => unreachable!(),
        };
        let err = walk(&shape, &mut Bad::default()).unwrap_err();
        assert!(matches!(err, ShapeError::Unsupported { ref path, .. } if path == "deep"));
    }
}
