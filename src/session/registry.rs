//! Per-session subscription registry.
//!
//! At most one subscription per id. The first subscribe for an id wins; a
//! repeat is reported as [`Opened::Existing`] and never reaches the source.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tracing::error;

use super::subscription::Subscription;

#[derive(Debug, thiserror::Error)]
#[error("session is closed")]
pub struct RegistryClosed;

pub enum Opened {
    Created(Arc<dyn Subscription>),
    Existing,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<String, Arc<dyn Subscription>>,
    closed: bool,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entry for `id`, calling `open` only when there is none.
    ///
    /// # Errors
    ///
    /// [`RegistryClosed`] once [`close_all`](Self::close_all) has run.
    pub fn get_or_open(
        &mut self,
        id: &str,
        open: impl FnOnce() -> Arc<dyn Subscription>,
    ) -> Result<Opened, RegistryClosed> {
        if self.closed {
            return Err(RegistryClosed);
        }
        if self.entries.contains_key(id) {
            return Ok(Opened::Existing);
        }
        let subscription = open();
        self.entries.insert(id.to_string(), Arc::clone(&subscription));
        Ok(Opened::Created(subscription))
    }

    /// Remove and close `id`. Returns whether it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.entries.remove(id) {
            Some(subscription) => {
                subscription.close();
                true
            }
            None => false,
        }
    }

    /// Close every subscription and refuse new ones. A panicking close does
    /// not stop the others. Returns how many were closed.
    pub fn close_all(&mut self) -> usize {
        self.closed = true;
        let mut closed = 0;
        for (id, subscription) in self.entries.drain() {
            match std::panic::catch_unwind(AssertUnwindSafe(|| subscription.close())) {
                Ok(()) => closed += 1,
                Err(_) => error!(subscription_id = %id, "subscription close panicked"),
            }
        }
        closed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::SubscriptionType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Probe {
        id: String,
        closes: Arc<AtomicUsize>,
        panics: bool,
    }

    impl Subscription for Probe {
        fn id(&self) -> &str {
            &self.id
        }

        fn kind(&self) -> SubscriptionType {
            SubscriptionType::Firewall
        }

        fn activate(&self) {}

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
            assert!(!self.panics, "close failed for {}", self.id);
        }
    }

    fn probe(id: &str, closes: &Arc<AtomicUsize>, panics: bool) -> Arc<dyn Subscription> {
        Arc::new(Probe { id: id.to_string(), closes: Arc::clone(closes), panics })
    }

    #[test]
    fn second_open_for_same_id_is_existing() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut registry = SubscriptionRegistry::new();
        let opens = AtomicUsize::new(0);
        let mut open = || {
            opens.fetch_add(1, Ordering::SeqCst);
            probe("s1", &closes, false)
        };

        assert!(matches!(registry.get_or_open("s1", &mut open), Ok(Opened::Created(_))));
        assert!(matches!(registry.get_or_open("s1", &mut open), Ok(Opened::Existing)));
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_closes_and_is_idempotent() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut registry = SubscriptionRegistry::new();
        registry.get_or_open("s1", || probe("s1", &closes, false)).unwrap();

        assert!(registry.remove("s1"));
        assert!(!registry.remove("s1"));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn close_all_survives_a_panicking_close() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut registry = SubscriptionRegistry::new();
        registry.get_or_open("a", || probe("a", &closes, false)).unwrap();
        registry.get_or_open("b", || probe("b", &closes, true)).unwrap();
        registry.get_or_open("c", || probe("c", &closes, false)).unwrap();

        assert_eq!(registry.close_all(), 2);
        assert_eq!(closes.load(Ordering::SeqCst), 3);
        assert!(registry.is_empty());
        assert!(!registry.contains("b"));
    }

    #[test]
    fn closed_registry_refuses_new_subscriptions() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut registry = SubscriptionRegistry::new();
        registry.close_all();
        assert!(registry.get_or_open("late", || probe("late", &closes, false)).is_err());
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }
}
