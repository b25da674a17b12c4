//! Listener Registry
//!
//! Every cell and container owns one registry. It stores callbacks in
//! registration order, keyed by [`SubscriberId`], and tracks which deep
//! listeners are currently attached to its owner.
//!
//! # Dispatch
//!
//! Notification never iterates the live store. The owner takes a
//! [`snapshot`](Registry::snapshot) under the lock, releases the lock, then
//! calls each callback. Listeners added during dispatch first run on the next
//! change; listeners removed during dispatch still run for the current one.
//!
//! # Deep attachments
//!
//! A deep listener can reach the same target along several paths (the same
//! cell stored twice, a value moved by `sort`). Each attachment therefore
//! counts its structural holds separately from a direct registration made by
//! the caller. The listener is live while either is present, and its callback
//! sits in the ordinary listener store, so it fires in registration order.
//! Deep and plain callbacks are keyed apart: a plain listener subscribed
//! under a deep listener's id is a separate entry.

use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::subscriber::{DeepListener, SubscriberId};

/// Callback type used by containers for their change records.
pub type Callback<C> = dyn Fn(&C) + Send + Sync;

/// A stable copy of the listener store, taken before dispatch.
pub(crate) type Snapshot<F> = SmallVec<[Arc<F>; 4]>;

/// Wrap a deep listener as a container callback that ignores the record.
pub(crate) fn deep_callback<C>(listener: DeepListener) -> Arc<Callback<C>>
where
    C: 'static,
{
    Arc::new(move |_: &C| listener.notify())
}

/// Key of one entry in the listener store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Plain(SubscriberId),
    Deep(SubscriberId),
}

struct Attachment {
    listener: DeepListener,
    /// Number of structural paths that reach the owner.
    holds: usize,
    /// Registered by the caller rather than inherited from a parent.
    direct: bool,
}

impl Attachment {
    fn is_live(&self) -> bool {
        self.direct || self.holds > 0
    }
}

pub(crate) struct Registry<F: ?Sized> {
    listeners: IndexMap<Slot, Arc<F>>,
    attachments: IndexMap<SubscriberId, Attachment>,
}

impl<F: ?Sized> Registry<F> {
    pub fn new() -> Self {
        Self {
            listeners: IndexMap::new(),
            attachments: IndexMap::new(),
        }
    }

    /// Register `callback` under `id`. Returns `false` if the id is taken.
    pub fn subscribe(&mut self, id: SubscriberId, callback: Arc<F>) -> bool {
        let slot = Slot::Plain(id);
        if self.listeners.contains_key(&slot) {
            return false;
        }
        self.listeners.insert(slot, callback);
        true
    }

    /// Remove a plain listener. Deep attachments are only removed through
    /// [`release`](Self::release) and [`unregister`](Self::unregister).
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.listeners.shift_remove(&Slot::Plain(id)).is_some()
    }

    pub fn snapshot(&self) -> Snapshot<F> {
        self.listeners.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Add one structural hold. Returns `true` if the listener just went live.
    pub fn hold<W>(&mut self, listener: &DeepListener, wrap: W) -> bool
    where
        W: FnOnce(DeepListener) -> Arc<F>,
    {
        let attachment = self.attachment(listener);
        let was_live = attachment.is_live();
        attachment.holds += 1;
        self.enliven(was_live, listener, wrap)
    }

    /// Mark a direct registration. Returns `true` if the listener just went
    /// live. Registering twice is one registration.
    pub fn register<W>(&mut self, listener: &DeepListener, wrap: W) -> bool
    where
        W: FnOnce(DeepListener) -> Arc<F>,
    {
        let attachment = self.attachment(listener);
        if attachment.direct {
            return false;
        }
        let was_live = attachment.is_live();
        attachment.direct = true;
        self.enliven(was_live, listener, wrap)
    }

    /// Drop one structural hold. Returns `true` if the listener just died.
    pub fn release(&mut self, id: SubscriberId) -> bool {
        match self.attachments.get_mut(&id) {
            Some(attachment) if attachment.holds > 0 => attachment.holds -= 1,
            _ => return false,
        }
        self.settle(id)
    }

    /// Clear a direct registration. Returns `true` if the listener just died.
    pub fn unregister(&mut self, id: SubscriberId) -> bool {
        match self.attachments.get_mut(&id) {
            Some(attachment) if attachment.direct => attachment.direct = false,
            _ => return false,
        }
        self.settle(id)
    }

    /// Deep listeners currently attached, in attachment order.
    pub fn deep(&self) -> SmallVec<[DeepListener; 2]> {
        self.attachments
            .values()
            .map(|attachment| attachment.listener.clone())
            .collect()
    }

    pub fn is_attached(&self, id: SubscriberId) -> bool {
        self.attachments.contains_key(&id)
    }

    fn attachment(&mut self, listener: &DeepListener) -> &mut Attachment {
        self.attachments
            .entry(listener.id())
            .or_insert_with(|| Attachment {
                listener: listener.clone(),
                holds: 0,
                direct: false,
            })
    }

    fn enliven<W>(&mut self, was_live: bool, listener: &DeepListener, wrap: W) -> bool
    where
        W: FnOnce(DeepListener) -> Arc<F>,
    {
        if was_live {
            return false;
        }
        self.listeners
            .insert(Slot::Deep(listener.id()), wrap(listener.clone()));
        true
    }

    fn settle(&mut self, id: SubscriberId) -> bool {
        let dead = self
            .attachments
            .get(&id)
            .is_some_and(|attachment| !attachment.is_live());
        if dead {
            self.attachments.shift_remove(&id);
            self.listeners.shift_remove(&Slot::Deep(id));
        }
        dead
    }
}

impl<F: ?Sized> Default for Registry<F> {
    fn default() -> Self {
        Self::new()
    }
}
