//! Observable Map
//!
//! A key/value container with first-write-wins semantics: [`Map::set`] on a
//! key that is already bound does nothing. Changing a binding takes either
//! [`Map::delete`] followed by [`Map::set`], or [`Map::replace`], which does
//! both as one call and reports them as two records.
//!
//! Deep listeners follow the bound values. Keys are never traversed.

use std::borrow::Borrow;
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::trace;

use super::change::MapChange;
use super::{next_container_id, Element, Key};
use crate::error::Outcome;
use crate::reactive::{
    attach, deep_callback, detach, Callback, DeepListener, DeepObservable, Reachable, Registry,
    Shape, SubscriberId,
};

/// An observable map.
///
/// # Example
///
/// ```rust
/// use ripple_core::collections::Map;
///
/// let scores = Map::new();
/// assert!(scores.set("k", 1));
/// assert!(!scores.set("k", 2));
/// assert_eq!(scores.get("k"), Some(1));
/// ```
pub struct Map<K, V>
where
    K: Key,
    V: Element,
{
    /// Unique identifier for this map.
    id: u64,

    /// Backing storage, in insertion order.
    entries: Arc<RwLock<IndexMap<K, V>>>,

    /// Change listeners and deep attachments.
    registry: Arc<RwLock<Registry<Callback<MapChange<K, V>>>>>,
}

impl<K, V> Map<K, V>
where
    K: Key,
    V: Element,
{
    pub fn new() -> Self {
        Self {
            id: next_container_id(),
            entries: Arc::new(RwLock::new(IndexMap::new())),
            registry: Arc::new(RwLock::new(Registry::new())),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn add_listener<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&MapChange<K, V>) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.subscribe(id, listener);
        id
    }

    pub fn subscribe<F>(&self, id: SubscriberId, listener: F) -> bool
    where
        F: Fn(&MapChange<K, V>) + Send + Sync + 'static,
    {
        self.registry.write().subscribe(id, Arc::new(listener))
    }

    pub fn remove_listener(&self, id: SubscriberId) -> bool {
        self.registry.write().unsubscribe(id)
    }

    /// Register a deep listener on this map and everything reachable from
    /// its values.
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

    /// Bind `key` to `value` if `key` is unbound.
    ///
    /// Returns `false`, emitting nothing, if the key already has a value.
    pub fn set(&self, key: K, value: V) -> bool {
        {
            let mut entries = self.entries.write();
            if entries.contains_key(&key) {
                return false;
            }
            entries.insert(key.clone(), value.clone());
        }

        self.bound(key, value);
        true
    }

    /// Rebind `key` to `value`, binding it fresh if it was unbound.
    ///
    /// An existing binding is reported as `Delete` of the old value then
    /// `Set` of the new one. The key keeps its position, and deep listeners
    /// have already moved to the new value when either record goes out.
    pub fn replace(&self, key: K, value: V) -> Outcome {
        let old = {
            let mut entries = self.entries.write();
            if entries.get(&key) == Some(&value) {
                return Outcome::SameValue;
            }
            entries.insert(key.clone(), value.clone())
        };

        let Some(old) = old else {
            self.bound(key, value);
            return Outcome::Success;
        };

        trace!(map = self.id, "key rebound");
        self.detach_value(&old);
        self.attach_value(&value);
        self.emit(&MapChange::Delete {
            key: key.clone(),
            value: old,
        });
        self.emit(&MapChange::Set { key, value });
        Outcome::Success
    }

    /// Remove the binding for `key` and return its value.
    pub fn delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (key, value) = self.entries.write().shift_remove_entry(key)?;
        self.unbound(key, value.clone());
        Some(value)
    }

    /// Remove every binding matching `predicate`, one `Delete` each.
    pub fn delete_if<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut removed = 0;
        for (key, value) in self.entries() {
            if predicate(&key, &value) && self.delete(&key).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Remove every binding, one `Delete` each. Returns how many were
    /// removed.
    pub fn clear(&self) -> usize {
        let mut removed = 0;
        loop {
            let Some((key, value)) = self.entries.write().pop() else {
                break;
            };
            self.unbound(key, value);
            removed += 1;
        }
        removed
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.read().get(key).cloned()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn keys(&self) -> Vec<K> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<V> {
        self.entries.read().values().cloned().collect()
    }

    /// A copy of every binding, in insertion order.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.entries
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn reduce<A, F>(&self, init: A, mut f: F) -> A
    where
        F: FnMut(A, &K, &V) -> A,
    {
        self.entries()
            .iter()
            .fold(init, |acc, (key, value)| f(acc, key, value))
    }

    fn bound(&self, key: K, value: V) {
        trace!(map = self.id, "key bound");
        self.attach_value(&value);
        self.emit(&MapChange::Set { key, value });
    }

    fn unbound(&self, key: K, value: V) {
        trace!(map = self.id, "key unbound");
        self.detach_value(&value);
        self.emit(&MapChange::Delete { key, value });
    }

    fn attach_value(&self, value: &V) {
        for listener in self.deep_listeners() {
            attach(value, &listener);
        }
    }

    fn detach_value(&self, value: &V) {
        for listener in self.deep_listeners() {
            detach(value, listener.id());
        }
    }

    fn emit(&self, change: &MapChange<K, V>) {
        let listeners = self.registry.read().snapshot();
        for listener in listeners {
            listener(change);
        }
    }

    fn deep_listeners(&self) -> SmallVec<[DeepListener; 2]> {
        self.registry.read().deep()
    }

    fn spread(&self, listener: &DeepListener) {
        for value in self.values() {
            attach(&value, listener);
        }
    }

    fn withdraw(&self, id: SubscriberId) {
        for value in self.values() {
            detach(&value, id);
        }
    }
}

impl<K, V> DeepObservable for Map<K, V>
where
    K: Key,
    V: Element,
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

impl<K, V> Reachable for Map<K, V>
where
    K: Key,
    V: Element,
{
    fn shape(&self) -> Shape<'_> {
        Shape::Container(self)
    }
}

impl<K, V> Default for Map<K, V>
where
    K: Key,
    V: Element,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for Map<K, V>
where
    K: Key,
    V: Element,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            entries: Arc::clone(&self.entries),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<K, V> PartialEq for Map<K, V>
where
    K: Key,
    V: Element,
{
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl<K, V> Eq for Map<K, V>
where
    K: Key,
    V: Element,
{
}

impl<K, V> Hash for Map<K, V>
where
    K: Key,
    V: Element,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.entries).hash(state);
    }
}

impl<K, V> FromIterator<(K, V)> for Map<K, V>
where
    K: Key,
    V: Element,
{
    /// Collect into a new map without emitting events. Later duplicates of a
    /// key are dropped.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = Self::new();
        {
            let mut entries = map.entries.write();
            for (key, value) in iter {
                entries.entry(key).or_insert(value);
            }
        }
        map
    }
}

impl<K, V> Debug for Map<K, V>
where
    K: Key + Debug,
    V: Element + Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("id", &self.id)
            .field("entries", &*self.entries.read())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

impl<K, V> Display for Map<K, V>
where
    K: Key + Display,
    V: Element + Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .entries
            .read()
            .iter()
            .map(|(key, value)| format!("{key}:{value}"))
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{{{joined}}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Cell;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorded<K: Key, V: Element>(map: &Map<K, V>) -> Arc<Mutex<Vec<MapChange<K, V>>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        map.add_listener(move |change| log_clone.lock().push(change.clone()));
        log
    }

    #[test]
    fn first_write_wins() {
        let map = Map::new();
        let log = recorded(&map);

        assert!(map.set("k", 1));
        assert!(!map.set("k", 2));
        assert_eq!(map.get("k"), Some(1));
        assert_eq!(*log.lock(), vec![MapChange::Set { key: "k", value: 1 }]);
    }

    #[test]
    fn replace_is_delete_then_set() {
        let map: Map<&str, i32> = [("a", 1), ("b", 2)].into_iter().collect();
        let log = recorded(&map);

        assert_eq!(map.replace("a", 10), Outcome::Success);
        assert_eq!(map.replace("a", 10), Outcome::SameValue);
        assert_eq!(map.replace("c", 3), Outcome::Success);

        assert_eq!(map.keys(), vec!["a", "b", "c"]);
        assert_eq!(
            *log.lock(),
            vec![
                MapChange::Delete { key: "a", value: 1 },
                MapChange::Set { key: "a", value: 10 },
                MapChange::Set { key: "c", value: 3 },
            ]
        );
    }

    #[test]
    fn delete_returns_old_value() {
        let map: Map<String, i32> = [("x".to_string(), 5)].into_iter().collect();
        let log = recorded(&map);

        assert_eq!(map.delete("x"), Some(5));
        assert_eq!(map.delete("x"), None);
        assert_eq!(
            *log.lock(),
            vec![MapChange::Delete {
                key: "x".to_string(),
                value: 5
            }]
        );
    }

    #[test]
    fn clear_and_delete_if() {
        let map: Map<i32, i32> = (0..6).map(|k| (k, k * k)).collect();

        assert_eq!(map.delete_if(|_, v| *v > 10), 2);
        assert_eq!(map.len(), 4);

        let log = recorded(&map);
        assert_eq!(map.clear(), 4);
        assert!(map.is_empty());
        assert_eq!(log.lock().len(), 4);
    }

    #[test]
    fn deep_listener_follows_values() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let listener = DeepListener::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let old = Cell::new(0);
        let new = Cell::new(0);
        let map = Map::new();
        map.set("cell", old.clone());
        map.add_deep_listener(&listener);

        old.set(1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        map.replace("cell", new.clone());
        assert_eq!(count.load(Ordering::SeqCst), 3);

        old.set(2);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        new.set(1);
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn deep_listener_added_during_set_is_released_by_delete() {
        let listener = DeepListener::new(|| {});
        let map: Map<&str, Cell<i32>> = Map::new();
        let handle = map.clone();
        map.add_listener(move |change| {
            if let MapChange::Set { .. } = change {
                handle.add_deep_listener(&listener);
            }
        });

        let cell = Cell::new(0);
        map.set("cell", cell.clone());
        assert_eq!(cell.listener_count(), 1);

        map.delete("cell");
        assert_eq!(cell.listener_count(), 0);
    }

    #[test]
    fn value_deleted_during_set_stays_detached() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let listener = DeepListener::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let map: Map<&str, Cell<i32>> = Map::new();
        map.add_deep_listener(&listener);
        let handle = map.clone();
        map.add_listener(move |change| {
            if let MapChange::Set { key, .. } = change {
                handle.delete(key);
            }
        });

        let cell = Cell::new(0);
        map.set("cell", cell.clone());
        assert!(map.is_empty());
        assert_eq!(cell.listener_count(), 0);

        let before = count.load(Ordering::SeqCst);
        cell.set(1);
        assert_eq!(count.load(Ordering::SeqCst), before);
    }

    #[test]
    fn deep_listener_added_during_replace_holds_new_value_once() {
        let listener = DeepListener::new(|| {});
        let old = Cell::new(0);
        let new = Cell::new(1);
        let map = Map::new();
        map.set("cell", old.clone());
        let handle = map.clone();
        map.add_listener(move |change| {
            if let MapChange::Delete { .. } = change {
                handle.add_deep_listener(&listener);
            }
        });

        map.replace("cell", new.clone());
        assert_eq!(old.listener_count(), 0);
        assert_eq!(new.listener_count(), 1);

        map.clear();
        assert_eq!(new.listener_count(), 0);
    }

    #[test]
    fn reading_helpers() {
        let map: Map<&str, i32> = [("a", 1), ("b", 2), ("a", 9)].into_iter().collect();

        assert_eq!(map.get("a"), Some(1));
        assert!(map.contains_key("b"));
        assert_eq!(map.values(), vec![1, 2]);
        assert_eq!(map.entries(), vec![("a", 1), ("b", 2)]);
        assert_eq!(map.reduce(0, |acc, _, v| acc + v), 3);
        assert_eq!(map.to_string(), "{a:1,b:2}");
    }
}
