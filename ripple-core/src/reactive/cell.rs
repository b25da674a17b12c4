//! Cell Implementation
//!
//! A Cell holds one value and tells its listeners, synchronously and in
//! registration order, every time that value is replaced.
//!
//! # How Cells Work
//!
//! 1. `set` compares the new value with the current one. Equal values are a
//!    no-op: nothing is stored and no listener runs.
//!
//! 2. Otherwise the value is swapped in and every listener is called with
//!    `(new, old)` from a snapshot of the listener store.
//!
//! 3. `derive` builds a read-only cell that follows this one through a
//!    transform.
//!
//! # Identity
//!
//! Cloning a Cell clones the handle, not the value. Two handles compare equal
//! exactly when they share state, which is what lets a cell be stored in a
//! set or compared by a sequence without comparing contents.
//!
//! # Thread Safety
//!
//! The value and the listener store sit behind `parking_lot` locks so handles
//! can cross threads. No lock is held while listeners run, so a listener may
//! read or write the cell it is listening to.

use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::deep::{Observable, Reachable, Shape};
use super::registry::Registry;
use super::subscriber::{DeepListener, SubscriberId};
use crate::error::Outcome;

/// Counter for generating unique cell IDs.
static CELL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique cell ID.
fn next_cell_id() -> u64 {
    CELL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Listener signature for cells: `(new, old)`.
pub type CellCallback<T> = dyn Fn(&T, &T) + Send + Sync;

fn deep_cell_callback<T>(listener: DeepListener) -> Arc<CellCallback<T>>
where
    T: 'static,
{
    Arc::new(move |_: &T, _: &T| listener.notify())
}

/// A reactive cell holding a value of type T.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Cell;
///
/// let count = Cell::new(0);
/// count.add_listener(|new, old| println!("{old} -> {new}"));
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Unique identifier for this cell.
    id: u64,

    /// The current value.
    value: Arc<RwLock<T>>,

    /// Plain listeners plus any deep listeners attached through a parent.
    registry: Arc<RwLock<Registry<CellCallback<T>>>>,
}

impl<T> Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new cell with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: next_cell_id(),
            value: Arc::new(RwLock::new(value)),
            registry: Arc::new(RwLock::new(Registry::new())),
        }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Read the current value without cloning it.
    ///
    /// The closure runs under the read lock and must not write to this cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    /// Register a listener under a fresh id and return that id.
    pub fn add_listener<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.subscribe(id, listener);
        id
    }

    /// Register a listener under `id`.
    ///
    /// Returns `false`, keeping the existing listener, if `id` is already
    /// registered.
    pub fn subscribe<F>(&self, id: SubscriberId, listener: F) -> bool
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        self.registry.write().subscribe(id, Arc::new(listener))
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn remove_listener(&self, id: SubscriberId) -> bool {
        self.registry.write().unsubscribe(id)
    }

    /// Number of registered listeners, deep attachments included.
    pub fn listener_count(&self) -> usize {
        self.registry.read().len()
    }

    /// A handle that can read and listen but not write.
    pub fn read_only(&self) -> ReadCell<T> {
        ReadCell { cell: self.clone() }
    }

    fn notify(&self, new: &T, old: &T) {
        let listeners = self.registry.read().snapshot();
        for listener in listeners {
            listener(new, old);
        }
    }
}

impl<T> Cell<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Replace the value and notify listeners.
    ///
    /// Returns [`Outcome::SameValue`] without notifying anyone if `value`
    /// equals the current value.
    pub fn set(&self, value: T) -> Outcome {
        let old = {
            let mut guard = self.value.write();
            if *guard == value {
                return Outcome::SameValue;
            }
            std::mem::replace(&mut *guard, value.clone())
        };

        trace!(cell = self.id, "cell value replaced");
        self.notify(&value, &old);
        Outcome::Success
    }

    /// Replace the value with one computed from the current value.
    pub fn update<F>(&self, f: F) -> Outcome
    where
        F: FnOnce(&T) -> T,
    {
        let next = self.with(f);
        self.set(next)
    }

    /// Build a read-only cell that holds `transform(value)` and follows every
    /// change to this cell.
    pub fn derive<U, F>(&self, transform: F) -> ReadCell<U>
    where
        U: Clone + PartialEq + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let derived = Cell::new(self.with(&transform));
        let target = derived.clone();
        self.add_listener(move |new, _old| {
            target.set(transform(new));
        });

        trace!(source = self.id, cell = derived.id, "derived cell created");
        ReadCell { cell: derived }
    }
}

impl<T> Observable for Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn attach(&self, listener: &DeepListener) {
        if self.registry.write().hold(listener, deep_cell_callback) {
            trace!(cell = self.id, listener = listener.id().raw(), "deep listener attached");
        }
    }

    fn detach(&self, id: SubscriberId) {
        if self.registry.write().release(id) {
            trace!(cell = self.id, listener = id.raw(), "deep listener detached");
        }
    }
}

impl<T> Reachable for Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn shape(&self) -> Shape<'_> {
        Shape::Cell(self)
    }
}

impl<T> Clone for Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> PartialEq for Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl<T> Eq for Cell<T> where T: Clone + Send + Sync + 'static {}

impl<T> Hash for Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.value).hash(state);
    }
}

impl<T> Debug for Cell<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.id)
            .field("value", &*self.value.read())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

impl<T> Display for Cell<T>
where
    T: Clone + Send + Sync + Display + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&*self.value.read(), f)
    }
}

// ----------------------------------------------------------------------------
// Read-only view
// ----------------------------------------------------------------------------

/// A cell handle without write access.
///
/// Returned by [`Cell::derive`] and the combinators: only the linkage that
/// created it can change its value.
pub struct ReadCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    cell: Cell<T>,
}

impl<T> ReadCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn from_cell(cell: Cell<T>) -> Self {
        Self { cell }
    }

    pub fn id(&self) -> u64 {
        self.cell.id()
    }

    pub fn get(&self) -> T {
        self.cell.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.cell.with(f)
    }

    pub fn add_listener<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        self.cell.add_listener(listener)
    }

    pub fn subscribe<F>(&self, id: SubscriberId, listener: F) -> bool
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        self.cell.subscribe(id, listener)
    }

    pub fn remove_listener(&self, id: SubscriberId) -> bool {
        self.cell.remove_listener(id)
    }

    pub fn listener_count(&self) -> usize {
        self.cell.listener_count()
    }

    pub fn derive<U, F>(&self, transform: F) -> ReadCell<U>
    where
        T: PartialEq,
        U: Clone + PartialEq + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.cell.derive(transform)
    }
}

impl<T> Reachable for ReadCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn shape(&self) -> Shape<'_> {
        Shape::Cell(&self.cell)
    }
}

impl<T> Clone for ReadCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> PartialEq for ReadCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.cell == other.cell
    }
}

impl<T> Eq for ReadCell<T> where T: Clone + Send + Sync + 'static {}

impl<T> Hash for ReadCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cell.hash(state);
    }
}

impl<T> Debug for ReadCell<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadCell").field(&self.cell).finish()
    }
}

impl<T> Display for ReadCell<T>
where
    T: Clone + Send + Sync + Display + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.cell, f)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn cell_get_and_set() {
        let cell = Cell::new(0);
        assert_eq!(cell.get(), 0);

        assert_eq!(cell.set(42), Outcome::Success);
        assert_eq!(cell.get(), 42);
    }

    #[test]
    fn cell_update() {
        let cell = Cell::new(10);
        cell.update(|v| v + 5);
        assert_eq!(cell.get(), 15);
    }

    #[test]
    fn cell_notifies_with_new_and_old() {
        let cell = Cell::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        cell.add_listener(move |new, old| seen_clone.lock().push((*new, *old)));

        cell.set(2);
        cell.set(3);
        assert_eq!(*seen.lock(), vec![(2, 1), (3, 2)]);
    }

    #[test]
    fn setting_same_value_is_silent() {
        let cell = Cell::new("a".to_string());
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();
        cell.add_listener(move |_, _| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(cell.set(cell.get()), Outcome::SameValue);
        assert_eq!(call_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let cell = Cell::new(0);
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = order.clone();
            cell.add_listener(move |_, _| order.lock().push(tag));
        }

        cell.set(1);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn subscribe_same_id_twice_registers_once() {
        let cell = Cell::new(0);
        let call_count = Arc::new(AtomicI32::new(0));
        let id = SubscriberId::new();

        for _ in 0..2 {
            let call_count = call_count.clone();
            cell.subscribe(id, move |_, _| {
                call_count.fetch_add(1, Ordering::SeqCst);
            });
        }

        cell.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(cell.listener_count(), 1);
    }

    #[test]
    fn remove_listener_stops_notifications() {
        let cell = Cell::new(0);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let id = cell.add_listener(move |_, _| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        cell.set(1);
        assert!(cell.remove_listener(id));
        assert!(!cell.remove_listener(id));
        cell.set(2);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_removed_during_dispatch_still_runs_this_round() {
        let cell = Cell::new(0);
        let call_count = Arc::new(AtomicI32::new(0));
        let second_id = SubscriberId::new();

        let remover = cell.clone();
        cell.add_listener(move |_, _| {
            remover.remove_listener(second_id);
        });
        let counter = call_count.clone();
        cell.subscribe(second_id, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cell.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        cell.set(2);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_write_back_to_its_cell() {
        let cell = Cell::new(0);
        let writer = cell.clone();
        cell.add_listener(move |new, _| {
            if *new < 3 {
                writer.set(new + 1);
            }
        });

        cell.set(1);
        assert_eq!(cell.get(), 3);
    }

    #[test]
    fn derive_follows_source() {
        let source = Cell::new(2);
        let doubled = source.derive(|v| v * 2);
        assert_eq!(doubled.get(), 4);

        source.set(5);
        assert_eq!(doubled.get(), 10);
    }

    #[test]
    fn derived_cell_skips_unchanged_results() {
        let source = Cell::new(1);
        let parity = source.derive(|v| v % 2);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();
        parity.add_listener(move |_, _| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        source.set(3);
        assert_eq!(call_count.load(Ordering::SeqCst), 0);
        source.set(4);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn derive_chains() {
        let source = Cell::new(1);
        let label = source.derive(|v| v + 1).derive(|v| format!("#{v}"));

        source.set(9);
        assert_eq!(label.get(), "#10");
    }

    #[test]
    fn clones_share_state_and_identity() {
        let cell1 = Cell::new(0);
        let cell2 = cell1.clone();
        let other = Cell::new(0);

        cell1.set(42);
        assert_eq!(cell2.get(), 42);
        assert_eq!(cell1, cell2);
        assert_ne!(cell1, other);
        assert_eq!(cell1.id(), cell2.id());
    }

    #[test]
    fn display_shows_value() {
        let cell = Cell::new(7);
        assert_eq!(cell.to_string(), "7");
        assert_eq!(cell.read_only().to_string(), "7");
    }
}
