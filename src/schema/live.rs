//! Caller-owned, concurrently updatable configuration roots.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::schema::Reflect;

/// A shared handle to a configuration object.
///
/// Readers take cheap snapshots with [`Live::load`]; the sync engine writes
/// through read-copy-update, so a snapshot never changes under its reader.
/// Clones share the same underlying object.
pub struct Live<T> {
    cell: Arc<ArcSwap<T>>,
}

impl<T> Clone for Live<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Reflect + Clone> Live<T> {
    pub fn new(value: T) -> Self {
        Self {
            cell: Arc::new(ArcSwap::from_pointee(value)),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<T> {
        self.cell.load_full()
    }

    /// Replace the whole object.
    pub fn store(&self, value: T) {
        self.cell.store(Arc::new(value));
    }

    /// True when both handles refer to the same object.
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.cell) as *const () as usize
    }

    /// Apply `update` to a copy of the current value and publish it.
    /// Retries if another writer published in between; nothing is published
    /// when `update` fails.
    pub(crate) fn try_modify<E>(
        &self,
        mut update: impl FnMut(&mut T) -> Result<(), E>,
    ) -> Result<(), E> {
        loop {
            let current = self.cell.load_full();
            let mut next = T::clone(&current);
            update(&mut next)?;
            let previous = self.cell.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &current) {
                return Ok(());
            }
        }
    }
}

impl<T: Reflect + Clone + Default> Default for Live<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Live<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Live").field(&self.cell.load_full()).finish()
    }
}
