//! Observable Sequence
//!
//! An ordered, index-addressed list that reports every mutation as one or
//! more [`SequenceChange`] records.
//!
//! # Index rules
//!
//! Negative indices count from the end. Which normalization applies depends
//! on the operation (see [`crate::index`]):
//!
//! | Operation | Rule |
//! |---|---|
//! | `insert` | clamp to insertion point |
//! | `try_insert` | strict, `0..=len` |
//! | `set`, `delete_at`, `swap_indices`, `at` | strict, `0..len` |
//! | `fill`, `copy_within` | range start clamped, end clamped to `len` |
//!
//! # Events
//!
//! - Inserting emits `Insert`. Removing emits `Delete`.
//! - Replacing an element emits `Delete` of the old value then `Insert` of
//!   the new one at the same index.
//! - Swapping emits one `Swap` with the values as they were before.
//! - `clear` removes from the back, one `Delete` per element.
//! - `fill`, `copy_within` and the sorts are sequences of replacements.
//!
//! Deep listeners are withdrawn from a leaving value before its `Delete` is
//! dispatched and attached to an entering value after its `Insert`.

use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::ops::RangeBounds;
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::change::SequenceChange;
use super::{next_container_id, Element};
use crate::error::{Error, Outcome, Result};
use crate::index::{clamp, clamp_insertion, normalize, normalize_insertion, resolve_range};
use crate::reactive::{
    attach, deep_callback, detach, Callback, DeepListener, DeepObservable, Reachable, Registry,
    Shape, SubscriberId,
};

/// An observable ordered sequence.
///
/// # Example
///
/// ```rust
/// use ripple_core::collections::Sequence;
///
/// let items = Sequence::from_vec(vec!["a", "b", "c"]);
/// items.add_listener(|change| println!("{change:?}"));
///
/// items.set(1, "x").unwrap();
/// assert_eq!(items.to_vec(), ["a", "x", "c"]);
/// assert_eq!(items.to_string(), "[a,x,c]");
/// ```
pub struct Sequence<T>
where
    T: Element,
{
    /// Unique identifier for this sequence.
    id: u64,

    /// Backing storage.
    items: Arc<RwLock<Vec<T>>>,

    /// Change listeners and deep attachments.
    registry: Arc<RwLock<Registry<Callback<SequenceChange<T>>>>>,
}

impl<T> Sequence<T>
where
    T: Element,
{
    /// Create an empty sequence.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Create an empty sequence with room for `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_vec(Vec::with_capacity(capacity))
    }

    /// Create a sequence that starts out holding `items`.
    ///
    /// No events are emitted for the initial contents.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            id: next_container_id(),
            items: Arc::new(RwLock::new(items)),
            registry: Arc::new(RwLock::new(Registry::new())),
        }
    }

    /// Get the sequence's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    // ------------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------------

    /// Register a change listener under a fresh id and return that id.
    pub fn add_listener<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&SequenceChange<T>) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.subscribe(id, listener);
        id
    }

    /// Register a change listener under `id`. Returns `false` if `id` is
    /// already registered.
    pub fn subscribe<F>(&self, id: SubscriberId, listener: F) -> bool
    where
        F: Fn(&SequenceChange<T>) + Send + Sync + 'static,
    {
        self.registry.write().subscribe(id, Arc::new(listener))
    }

    /// Remove a change listener. Unknown ids are ignored.
    pub fn remove_listener(&self, id: SubscriberId) -> bool {
        self.registry.write().unsubscribe(id)
    }

    /// Register a deep listener on this sequence and everything reachable
    /// from its elements. Registering the same listener twice is a no-op.
    pub fn add_deep_listener(&self, listener: &DeepListener) {
        if self.registry.write().register(listener, deep_callback) {
            self.spread(listener);
        }
    }

    /// Withdraw a deep listener registered with [`add_deep_listener`].
    ///
    /// [`add_deep_listener`]: Self::add_deep_listener
    pub fn remove_deep_listener(&self, id: SubscriberId) {
        if self.registry.write().unregister(id) {
            self.withdraw(id);
        }
    }

    /// Number of registered listeners, deep attachments included.
    pub fn listener_count(&self) -> usize {
        self.registry.read().len()
    }

    // ------------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------------

    /// Append `value`. Returns its index.
    pub fn append(&self, value: T) -> usize {
        let index = {
            let mut items = self.items.write();
            items.push(value.clone());
            items.len() - 1
        };
        self.inserted(value, index);
        index
    }

    /// Insert `value` at the front.
    pub fn prepend(&self, value: T) {
        self.insert_at(0, value);
    }

    /// Append every value from `values`, one `Insert` each.
    pub fn extend<I>(&self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.append(value);
        }
    }

    /// Insert `value` at `index`, clamping the index onto `0..=len`.
    /// Returns the position used.
    pub fn insert(&self, index: isize, value: T) -> usize {
        let index = {
            let mut items = self.items.write();
            let index = clamp_insertion(index, items.len());
            items.insert(index, value.clone());
            index
        };
        self.inserted(value, index);
        index
    }

    /// Insert `value` at `index`, rejecting indices outside `-len..=len`.
    pub fn try_insert(&self, index: isize, value: T) -> Result<usize> {
        let index = {
            let mut items = self.items.write();
            let index = normalize_insertion(index, items.len())
                .map_err(|err| self.rejected("insert", err))?;
            items.insert(index, value.clone());
            index
        };
        self.inserted(value, index);
        Ok(index)
    }

    fn insert_at(&self, index: usize, value: T) {
        self.items.write().insert(index, value.clone());
        self.inserted(value, index);
    }

    // ------------------------------------------------------------------------
    // Replacement
    // ------------------------------------------------------------------------

    /// Replace the element at `index`.
    ///
    /// Emits `Delete` of the old value followed by `Insert` of the new one.
    /// Deep listeners have already moved to the new value when either record
    /// goes out. Returns [`Outcome::SameValue`] without emitting anything if the
    /// element already equals `value`.
    pub fn set(&self, index: isize, value: T) -> Result<Outcome> {
        let (index, old) = {
            let mut items = self.items.write();
            let index = normalize(index, items.len()).map_err(|err| self.rejected("set", err))?;
            if items[index] == value {
                return Ok(Outcome::SameValue);
            }
            (index, std::mem::replace(&mut items[index], value.clone()))
        };

        trace!(sequence = self.id, index, "element replaced");
        self.detach_value(&old);
        self.attach_value(&value);
        self.emit(&SequenceChange::Delete { value: old, index });
        self.emit(&SequenceChange::Insert { value, index });
        Ok(Outcome::Success)
    }

    /// Set every element in `range` to `value`. Returns how many elements
    /// actually changed.
    pub fn fill<R>(&self, value: T, range: R) -> Result<usize>
    where
        R: RangeBounds<isize>,
    {
        let range = resolve_range(range, self.len());
        let mut changed = 0;
        for index in range {
            if self.set(index as isize, value.clone())?.is_success() {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Copy the elements in `src` over the elements starting at `dest`,
    /// reading every source value before writing any. Returns how many
    /// elements actually changed.
    pub fn copy_within<R>(&self, src: R, dest: isize) -> Result<usize>
    where
        R: RangeBounds<isize>,
    {
        let snapshot = self.to_vec();
        let len = snapshot.len();
        let src = resolve_range(src, len);
        let dest = clamp(dest, len);
        let count = src.len().min(len.saturating_sub(dest));

        let mut changed = 0;
        for offset in 0..count {
            let value = snapshot[src.start + offset].clone();
            if self.set((dest + offset) as isize, value)?.is_success() {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Stable sort using `compare`. Every element that moves is replaced in
    /// place, so listeners see a `Delete`/`Insert` pair per changed slot.
    /// Returns how many slots changed.
    pub fn sort_by<F>(&self, mut compare: F) -> Result<usize>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let mut sorted = self.to_vec();
        sorted.sort_by(&mut compare);

        let mut changed = 0;
        for (index, value) in sorted.into_iter().enumerate() {
            if self.set(index as isize, value)?.is_success() {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Stable sort by a derived key.
    pub fn sort_by_key<K, F>(&self, mut key: F) -> Result<usize>
    where
        K: Ord,
        F: FnMut(&T) -> K,
    {
        self.sort_by(|a, b| key(a).cmp(&key(b)))
    }

    /// Stable sort in ascending order.
    pub fn sort(&self) -> Result<usize>
    where
        T: Ord,
    {
        self.sort_by(Ord::cmp)
    }

    // ------------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------------

    /// Remove and return the element at `index`.
    pub fn delete_at(&self, index: isize) -> Result<T> {
        let (index, value) = {
            let mut items = self.items.write();
            let index =
                normalize(index, items.len()).map_err(|err| self.rejected("delete_at", err))?;
            (index, items.remove(index))
        };
        self.deleted(value.clone(), index);
        Ok(value)
    }

    /// Remove the first element equal to `value`. Returns its former index.
    pub fn delete(&self, value: &T) -> Result<usize> {
        let (index, removed) = {
            let mut items = self.items.write();
            let index = items
                .iter()
                .position(|item| item == value)
                .ok_or_else(|| self.rejected("delete", Error::NotFound))?;
            (index, items.remove(index))
        };
        self.deleted(removed, index);
        Ok(index)
    }

    /// Remove every element matching `predicate`, scanning from the back.
    /// Returns how many were removed.
    pub fn delete_if<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut removed = 0;
        let mut index = self.len();
        while index > 0 {
            index -= 1;
            let Some(candidate) = self.get(index) else {
                continue;
            };
            if predicate(&candidate) && self.delete_at(index as isize).is_ok() {
                removed += 1;
            }
        }
        removed
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Option<T> {
        let (index, value) = {
            let mut items = self.items.write();
            let value = items.pop()?;
            (items.len(), value)
        };
        self.deleted(value.clone(), index);
        Some(value)
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Option<T> {
        let value = {
            let mut items = self.items.write();
            if items.is_empty() {
                return None;
            }
            items.remove(0)
        };
        self.deleted(value.clone(), 0);
        Some(value)
    }

    /// Remove every element from the back, one `Delete` each. Returns how
    /// many were removed.
    pub fn clear(&self) -> usize {
        let mut removed = 0;
        while self.pop().is_some() {
            removed += 1;
        }
        removed
    }

    // ------------------------------------------------------------------------
    // Swapping
    // ------------------------------------------------------------------------

    /// Exchange the elements at two indices.
    ///
    /// Each index is validated on its own. Equal positions are reported as
    /// [`Outcome::IndicesAreEqual`] and change nothing.
    pub fn swap_indices(&self, a: isize, b: isize) -> Result<Outcome> {
        let change = {
            let mut items = self.items.write();
            let len = items.len();
            let index_a = normalize(a, len).map_err(|err| self.rejected("swap", err))?;
            let index_b = normalize(b, len).map_err(|err| self.rejected("swap", err))?;
            if index_a == index_b {
                return Ok(Outcome::IndicesAreEqual);
            }
            let change = SequenceChange::Swap {
                a: items[index_a].clone(),
                b: items[index_b].clone(),
                index_a,
                index_b,
            };
            items.swap(index_a, index_b);
            change
        };

        trace!(sequence = self.id, "elements swapped");
        self.emit(&change);
        Ok(Outcome::Success)
    }

    /// Exchange the first occurrences of two values.
    ///
    /// Fails with [`Error::NotFound`] if either is absent; equal values are
    /// reported as [`Outcome::SameValues`].
    pub fn swap(&self, a: &T, b: &T) -> Result<Outcome> {
        let (index_a, index_b) = {
            let items = self.items.read();
            let find = |value: &T| items.iter().position(|item| item == value);
            match (find(a), find(b)) {
                (Some(index_a), Some(index_b)) => (index_a, index_b),
                _ => return Err(self.rejected("swap", Error::NotFound)),
            }
        };
        if a == b {
            return Ok(Outcome::SameValues);
        }
        self.swap_indices(index_a as isize, index_b as isize)
    }

    /// Reverse the sequence in place with one `Swap` per mirrored pair.
    /// Returns how many swaps were made.
    pub fn reverse(&self) -> usize {
        let len = self.len();
        let mut swaps = 0;
        for low in 0..len / 2 {
            let high = len - 1 - low;
            if let Ok(Outcome::Success) = self.swap_indices(low as isize, high as isize) {
                swaps += 1;
            }
        }
        swaps
    }

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// The element at a possibly negative index.
    pub fn at(&self, index: isize) -> Option<T> {
        let items = self.items.read();
        normalize(index, items.len())
            .ok()
            .map(|index| items[index].clone())
    }

    /// The element at a concrete position.
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.read().get(index).cloned()
    }

    pub fn first(&self) -> Option<T> {
        self.items.read().first().cloned()
    }

    pub fn last(&self) -> Option<T> {
        self.items.read().last().cloned()
    }

    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.items.read().iter().position(|item| item == value)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.index_of(value).is_some()
    }

    /// A copy of the current contents.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.read().clone()
    }

    /// The first element matching `predicate`.
    pub fn find<F>(&self, mut predicate: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        self.to_vec().into_iter().find(|item| predicate(item))
    }

    /// The position of the first element matching `predicate`.
    pub fn position_by<F>(&self, predicate: F) -> Option<usize>
    where
        F: FnMut(&T) -> bool,
    {
        self.to_vec().iter().position(predicate)
    }

    /// Visit each element of a snapshot in order.
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

    /// Stringify every element and join with `separator`.
    pub fn join(&self, separator: &str) -> String
    where
        T: Display,
    {
        self.items
            .read()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(separator)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn inserted(&self, value: T, index: usize) {
        trace!(sequence = self.id, index, "element inserted");
        self.attach_value(&value);
        self.emit(&SequenceChange::Insert { value, index });
    }

    fn deleted(&self, value: T, index: usize) {
        trace!(sequence = self.id, index, "element deleted");
        self.detach_value(&value);
        self.emit(&SequenceChange::Delete { value, index });
    }

    fn emit(&self, change: &SequenceChange<T>) {
        let listeners = self.registry.read().snapshot();
        for listener in listeners {
            listener(change);
        }
    }

    fn deep_listeners(&self) -> SmallVec<[DeepListener; 2]> {
        self.registry.read().deep()
    }

    fn attach_value(&self, value: &T) {
        for listener in self.deep_listeners() {
            attach(value, &listener);
        }
    }

    fn detach_value(&self, value: &T) {
        for listener in self.deep_listeners() {
            detach(value, listener.id());
        }
    }

    fn spread(&self, listener: &DeepListener) {
        trace!(sequence = self.id, listener = listener.id().raw(), "deep listener live");
        for item in self.to_vec() {
            attach(&item, listener);
        }
    }

    fn withdraw(&self, id: SubscriberId) {
        trace!(sequence = self.id, listener = id.raw(), "deep listener gone");
        for item in self.to_vec() {
            detach(&item, id);
        }
    }

    fn rejected(&self, operation: &'static str, err: Error) -> Error {
        debug!(sequence = self.id, operation, %err, "operation rejected");
        err
    }
}

impl<T> DeepObservable for Sequence<T>
where
    T: Element,
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

impl<T> Reachable for Sequence<T>
where
    T: Element,
{
    fn shape(&self) -> Shape<'_> {
        Shape::Container(self)
    }
}

impl<T> Default for Sequence<T>
where
    T: Element,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Sequence<T>
where
    T: Element,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            items: Arc::clone(&self.items),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> PartialEq for Sequence<T>
where
    T: Element,
{
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

impl<T> Eq for Sequence<T> where T: Element {}

impl<T> Hash for Sequence<T>
where
    T: Element,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.items).hash(state);
    }
}

impl<T> FromIterator<T> for Sequence<T>
where
    T: Element,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T> IntoIterator for &Sequence<T>
where
    T: Element,
{
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    /// Iterate over a snapshot taken now.
    fn into_iter(self) -> Self::IntoIter {
        self.to_vec().into_iter()
    }
}

impl<T> Debug for Sequence<T>
where
    T: Element + Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("id", &self.id)
            .field("items", &*self.items.read())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

impl<T> Display for Sequence<T>
where
    T: Element + Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.join(","))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
