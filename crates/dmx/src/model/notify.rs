//! Change notifications for elements, arrays and the document registry.
//!
//! Callbacks are always invoked after the notifying container has released
//! its locks, so a handler may read (or even mutate) the container.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::model::ElementId;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// Change to an element's attribute mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeChange {
    Added { name: String },
    Removed { name: String },
    Replaced { name: String },
}

/// Change to an array's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayChange {
    Added { index: usize, count: usize },
    Removed { index: usize, count: usize },
    Replaced { index: usize },
    Reset,
}

/// Change to a document's element registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryChange {
    Added { id: ElementId },
    Removed { id: ElementId },
    /// A stub (or removed element) was swapped for another element with the same ID.
    Replaced { id: ElementId },
    RootChanged { root: Option<ElementId> },
}

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A list of change handlers.
pub struct Observers<E> {
    next: AtomicU64,
    handlers: RwLock<Vec<(Subscription, Handler<E>)>>,
}

impl<E> Observers<E> {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, handler: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let id = Subscription(self.next.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, Arc::new(handler)));
        id
    }

    /// Returns false if the subscription was not found.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != subscription);
        handlers.len() != before
    }

    /// Invokes every handler with `event`.
    pub fn emit(&self, event: &E) {
        // Snapshot so handlers may subscribe/unsubscribe re-entrantly.
        let handlers: Vec<Handler<E>> = {
            let guard = self.handlers.read();
            if guard.is_empty() {
                return;
            }
            guard.iter().map(|(_, h)| Arc::clone(h)).collect()
        };
        for handler in handlers {
            handler(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("handlers", &self.handlers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let observers = Observers::<ArrayChange>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = observers.subscribe(move |e| sink.lock().unwrap().push(*e));

        observers.emit(&ArrayChange::Reset);
        assert!(observers.unsubscribe(sub));
        observers.emit(&ArrayChange::Replaced { index: 0 });

        assert_eq!(*seen.lock().unwrap(), vec![ArrayChange::Reset]);
        assert!(!observers.unsubscribe(sub));
    }
}
