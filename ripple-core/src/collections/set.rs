//! Observable Set
//!
//! A container of unique values. Adding a value already present does
//! nothing; every real addition or removal is reported as a [`SetChange`].
//!
//! Iteration follows insertion order because the backing store is an
//! `IndexSet`, but callers should treat the set as unordered.

use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::trace;

use super::change::SetChange;
use super::map::Map;
use super::{next_container_id, Element, Key};
use crate::reactive::{
    attach, deep_callback, detach, Callback, DeepListener, DeepObservable, Reachable, Registry,
    Shape, SubscriberId,
};

/// An observable set.
pub struct Set<T>
where
    T: Element + Key,
{
    /// Unique identifier for this set.
    id: u64,

    /// Backing storage.
    values: Arc<RwLock<IndexSet<T>>>,

    /// Change listeners and deep attachments.
    registry: Arc<RwLock<Registry<Callback<SetChange<T>>>>>,
}

impl<T> Set<T>
where
    T: Element + Key,
{
    pub fn new() -> Self {
        Self {
            id: next_container_id(),
            values: Arc::new(RwLock::new(IndexSet::new())),
            registry: Arc::new(RwLock::new(Registry::new())),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn add_listener<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&SetChange<T>) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.subscribe(id, listener);
        id
    }

    pub fn subscribe<F>(&self, id: SubscriberId, listener: F) -> bool
    where
        F: Fn(&SetChange<T>) + Send + Sync + 'static,
    {
        self.registry.write().subscribe(id, Arc::new(listener))
    }

    pub fn remove_listener(&self, id: SubscriberId) -> bool {
        self.registry.write().unsubscribe(id)
    }

    /// Register a deep listener on this set and everything reachable from
    /// its members.
    pub fn add_deep_listener(&self, listener: &DeepListener) {
        if self.registry.write().register(listener, deep_callback) {
            self.spread(listener);
        }
    }

    pub fn remove_deep_listener(&self, id: SubscriberId) {
        if self.registry.write().unregister(id) {
            self.withdraw(id);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Add `value`. Returns `false`, emitting nothing, if it is already a
    /// member.
    pub fn add(&self, value: T) -> bool {
        if !self.values.write().insert(value.clone()) {
            return false;
        }

        trace!(set = self.id, "value added");
        for listener in self.deep_listeners() {
            attach(&value, &listener);
        }
        self.emit(&SetChange::Add { value });
        true
    }

    /// Remove `value`. Returns `false` if it was not a member.
    pub fn delete(&self, value: &T) -> bool {
        let Some(removed) = self.values.write().shift_take(value) else {
            return false;
        };
        self.deleted(removed);
        true
    }

    /// Remove every member matching `predicate`, one `Delete` each.
    pub fn delete_if<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut removed = 0;
        for value in self.to_vec() {
            if predicate(&value) && self.delete(&value) {
                removed += 1;
            }
        }
        removed
    }

    /// Remove every member, one `Delete` each. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut removed = 0;
        loop {
            let Some(value) = self.values.write().pop() else {
                break;
            };
            self.deleted(value);
            removed += 1;
        }
        removed
    }

    /// Build a map holding `transform(member)` for every member, kept in step
    /// with this set for as long as the set lives.
    pub fn derive_map<U, F>(&self, transform: F) -> Map<T, U>
    where
        U: Element,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.derive_map_under(SubscriberId::new(), transform)
    }

    /// Like [`derive_map`](Self::derive_map), with the forwarding listener
    /// subscribed under `id`. `remove_listener(id)` freezes the map.
    pub fn derive_map_under<U, F>(&self, id: SubscriberId, transform: F) -> Map<T, U>
    where
        U: Element,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let map = Map::new();
        for value in self.to_vec() {
            let mapped = transform(&value);
            map.set(value, mapped);
        }

        let target = map.clone();
        self.subscribe(id, move |change| match change {
            SetChange::Add { value } => {
                target.set(value.clone(), transform(value));
            }
            SetChange::Delete { value } => {
                target.delete(value);
            }
        });

        trace!(set = self.id, map = map.id(), "derived map created");
        map
    }

    pub fn contains(&self, value: &T) -> bool {
        self.values.read().contains(value)
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.values.read().iter().cloned().collect()
    }

    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&T),
    {
        self.to_vec().iter().for_each(f);
    }

    pub fn map<U, F>(&self, f: F) -> Vec<U>
    where
        F: FnMut(&T) -> U,
    {
        self.to_vec().iter().map(f).collect()
    }

    pub fn reduce<A, F>(&self, init: A, f: F) -> A
    where
        F: FnMut(A, &T) -> A,
    {
        self.to_vec().iter().fold(init, f)
    }

    fn deleted(&self, value: T) {
        trace!(set = self.id, "value deleted");
        for listener in self.deep_listeners() {
            detach(&value, listener.id());
        }
        self.emit(&SetChange::Delete { value });
    }

    fn emit(&self, change: &SetChange<T>) {
        let listeners = self.registry.read().snapshot();
        for listener in listeners {
            listener(change);
        }
    }

    fn deep_listeners(&self) -> SmallVec<[DeepListener; 2]> {
        self.registry.read().deep()
    }

    fn spread(&self, listener: &DeepListener) {
        for value in self.to_vec() {
            attach(&value, listener);
        }
    }

    fn withdraw(&self, id: SubscriberId) {
        for value in self.to_vec() {
            detach(&value, id);
        }
    }
}

impl<T> DeepObservable for Set<T>
where
    T: Element + Key,
{
    fn attach_deep(&self, listener: &DeepListener) {
        if self.registry.write().hold(listener, deep_callback) {
            self.spread(listener);
        }
    }

    fn detach_deep(&self, id: SubscriberId) {
        if self.registry.write().release(id) {
            self.withdraw(id);
        }
    }
}

impl<T> Reachable for Set<T>
where
    T: Element + Key,
{
    fn shape(&self) -> Shape<'_> {
        Shape::Container(self)
    }
}

impl<T> Default for Set<T>
where
    T: Element + Key,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Set<T>
where
    T: Element + Key,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            values: Arc::clone(&self.values),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> PartialEq for Set<T>
where
    T: Element + Key,
{
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}

impl<T> Eq for Set<T> where T: Element + Key {}

impl<T> Hash for Set<T>
where
    T: Element + Key,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.values).hash(state);
    }
}

impl<T> FromIterator<T> for Set<T>
where
    T: Element + Key,
{
    /// Collect into a new set without emitting events.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let set = Self::new();
        set.values.write().extend(iter);
        set
    }
}

impl<T> Debug for Set<T>
where
    T: Element + Key + Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Set")
            .field("id", &self.id)
            .field("values", &*self.values.read())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

impl<T> Display for Set<T>
where
    T: Element + Key + Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .values
            .read()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{{{joined}}}")
    }
}
