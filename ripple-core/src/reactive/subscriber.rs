//! Listener identity.
//!
//! Closures have no identity of their own, so every registration is keyed by
//! a [`SubscriberId`]. Adding or removing a listener is always done by id.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a listener.
///
/// Registering two callbacks under the same id keeps only the first, which
/// gives listener stores set semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Mint an id no other listener in the process holds.
    pub fn new() -> Self {
        static NEXT_LISTENER: AtomicU64 = AtomicU64::new(0);
        Self(NEXT_LISTENER.fetch_add(1, Ordering::Relaxed))
    }

    /// The number behind the id, for log fields.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A nullary callback that follows a value graph.
///
/// Registered on a container, it fires on every change record of that
/// container and, transitively, of every cell and container reachable from
/// its elements. Clones share the id and the callback.
#[derive(Clone)]
pub struct DeepListener {
    id: SubscriberId,
    notify: Arc<dyn Fn() + Send + Sync>,
}

impl DeepListener {
    /// Create a deep listener with a fresh id.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_id(SubscriberId::new(), notify)
    }

    /// Create a deep listener under a caller-chosen id.
    pub fn with_id<F>(id: SubscriberId, notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id,
            notify: Arc::new(notify),
        }
    }

    /// Get the listener's id.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Run the callback.
    pub fn notify(&self) {
        (self.notify)();
    }
}

impl fmt::Debug for DeepListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepListener").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_increase_and_never_repeat() {
        let ids: Vec<SubscriberId> = (0..16).map(|_| SubscriberId::new()).collect();

        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(ids.windows(2).all(|pair| pair[1].raw() > pair[0].raw()));
    }

    #[test]
    fn deep_listener_notify_calls_callback() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let listener = DeepListener::new(move || {
            called_clone.store(true, Ordering::SeqCst);
        });

        assert!(!called.load(Ordering::SeqCst));
        listener.notify();
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn deep_listener_clones_share_identity() {
        let id = SubscriberId::new();
        let listener = DeepListener::with_id(id, || {});
        let clone = listener.clone();

        assert_eq!(listener.id(), id);
        assert_eq!(clone.id(), id);
    }
}
