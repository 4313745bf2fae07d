//! Listener registration shared by every subscribable collaborator.
//!
//! DESIGN
//! ======
//! Listeners are keyed by `(session_id, subscription_id)` so two connections
//! that pick the same subscription id never overwrite each other.
//!
//! Sources call listeners after releasing their own state locks. A listener
//! may block briefly on its subscription's delivery lock, and a source that
//! held its state lock at that point could deadlock against a concurrent
//! `current` read.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

/// Push callback registered by a subscription.
pub type Listener<E> = Arc<dyn Fn(E) + Send + Sync>;

/// Connection-scoped listener key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerKey {
    pub session_id: Uuid,
    pub subscription_id: String,
}

impl ListenerKey {
    pub fn new(session_id: Uuid, subscription_id: impl Into<String>) -> Self {
        Self { session_id, subscription_id: subscription_id.into() }
    }
}

impl fmt::Display for ListenerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.subscription_id)
    }
}

/// A collaborator that streams state changes of type `E`.
pub trait EventSource<E>: Send + Sync {
    /// Snapshot of the current state, if the source keeps one.
    fn current(&self, _owner: Option<&str>) -> Option<E> {
        None
    }

    fn add_listener(&self, owner: Option<&str>, key: ListenerKey, listener: Listener<E>);

    /// Idempotent.
    fn remove_listener(&self, key: &ListenerKey);
}

/// Listener map embedded in collaborators.
pub struct ListenerSet<E> {
    listeners: Mutex<HashMap<ListenerKey, Listener<E>>>,
}

impl<E: Clone> ListenerSet<E> {
    #[must_use]
    pub fn new() -> Self {
        Self { listeners: Mutex::new(HashMap::new()) }
    }

    pub fn insert(&self, key: ListenerKey, listener: Listener<E>) {
        self.lock().insert(key, listener);
    }

    pub fn remove(&self, key: &ListenerKey) -> bool {
        self.lock().remove(key).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, key: &ListenerKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Invoke every listener with a copy of `event`, outside the map lock.
    pub fn emit(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self.lock().values().cloned().collect();
        for listener in listeners {
            listener(event.clone());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ListenerKey, Listener<E>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: Clone> Default for ListenerSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn keys_from_different_sessions_do_not_collide() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let a = ListenerKey::new(Uuid::new_v4(), "s1");
        let b = ListenerKey::new(Uuid::new_v4(), "s1");

        set.insert(a.clone(), Arc::new(|_| {}));
        set.insert(b.clone(), Arc::new(|_| {}));
        assert_eq!(set.len(), 2);

        assert!(set.remove(&a));
        assert!(!set.remove(&a));
        assert!(set.contains(&b));
    }

    #[test]
    fn emit_reaches_every_listener() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let total = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let total = Arc::clone(&total);
            set.insert(
                ListenerKey::new(Uuid::new_v4(), "s"),
                Arc::new(move |v| {
                    total.fetch_add(v as usize, Ordering::SeqCst);
                }),
            );
        }

        set.emit(&5);
        assert_eq!(total.load(Ordering::SeqCst), 15);
    }

    #[test]
    fn listener_may_unregister_itself_during_emit() {
        let set: Arc<ListenerSet<u32>> = Arc::new(ListenerSet::new());
        let key = ListenerKey::new(Uuid::new_v4(), "self-removing");
        let weak = Arc::downgrade(&set);
        let own_key = key.clone();
        set.insert(
            key,
            Arc::new(move |_| {
                if let Some(set) = weak.upgrade() {
                    set.remove(&own_key);
                }
            }),
        );

        set.emit(&1);
        assert!(set.is_empty());
    }
}
