use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use crate::convert::Value;

/// A field value changed because the store changed.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub namespace: String,
    /// Logical key, without the namespace prefix.
    pub key: String,
    pub before: Value,
    pub after: Value,
    pub updated_at: SystemTime,
}

pub type Subscriber = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Append-only list of change callbacks.
#[derive(Default)]
pub(crate) struct SubscriberSet {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl SubscriberSet {
    pub(crate) fn add(&self, subscriber: Subscriber) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Invoke every subscriber in registration order. The list is copied
    /// first so callbacks may subscribe without deadlocking.
    pub(crate) fn notify(&self, event: &ChangeEvent) {
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for subscriber in subscribers {
            subscriber(event);
        }
    }
}
