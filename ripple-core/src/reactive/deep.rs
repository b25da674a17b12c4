//! Deep Listening
//!
//! A deep listener registered on a container must also hear about changes to
//! every cell and container reachable from that container's elements. This
//! module decides, for an arbitrary value, where a deep listener should be
//! attached.
//!
//! # Capabilities
//!
//! Values describe themselves through [`Reachable::shape`], which returns one
//! of a closed set of variants:
//!
//! - [`Shape::Container`]: a sequence, set or map. It receives the listener
//!   as a deep listener and forwards it to its own elements.
//! - [`Shape::Cell`]: a cell. It receives the listener as a plain listener.
//! - [`Shape::Aggregate`]: a plain value with fields. Each field is visited.
//! - [`Shape::Leaf`]: nothing to attach to.
//!
//! [`attach`] and [`detach`] are the only places that interpret a shape, so
//! the traversal rule lives in one spot.
//!
//! # Implementing `Reachable`
//!
//! Primitive types, strings and the common std wrappers are covered here.
//! A user record lists its fields:
//!
//! ```rust
//! use ripple_core::reactive::{Cell, Reachable, Shape};
//!
//! #[derive(Clone, PartialEq)]
//! struct Todo {
//!     title: String,
//!     done: Cell<bool>,
//! }
//!
//! impl Reachable for Todo {
//!     fn shape(&self) -> Shape<'_> {
//!         Shape::aggregate([&self.title as &dyn Reachable, &self.done])
//!     }
//! }
//! ```
//!
//! # Cycles
//!
//! Attaching stops at any target where the listener is already live, so a
//! container that (indirectly) contains itself does not recurse forever.
//! Detachment is reference counted per path; a cycle keeps its own members
//! attached after the last outside path is cut.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use smallvec::SmallVec;

use super::subscriber::{DeepListener, SubscriberId};

/// Plain listening capability, implemented by cells.
pub trait Observable: Send + Sync {
    /// Add one structural hold of `listener`.
    fn attach(&self, listener: &DeepListener);

    /// Drop one structural hold of the listener with this id.
    fn detach(&self, id: SubscriberId);
}

/// Deep listening capability, implemented by containers.
pub trait DeepObservable: Send + Sync {
    /// Add one structural hold of `listener` and forward it to the elements
    /// if it just went live.
    fn attach_deep(&self, listener: &DeepListener);

    /// Drop one structural hold and withdraw it from the elements if it just
    /// died.
    fn detach_deep(&self, id: SubscriberId);
}

/// How a value participates in deep listening.
pub enum Shape<'a> {
    /// No reactive content.
    Leaf,

    /// A single-value cell.
    Cell(&'a dyn Observable),

    /// A collection that forwards deep listeners to its elements.
    Container(&'a dyn DeepObservable),

    /// A plain value whose fields may hold reactive content.
    Aggregate(SmallVec<[&'a dyn Reachable; 4]>),
}

impl<'a> Shape<'a> {
    /// Build an aggregate from a list of fields.
    pub fn aggregate<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = &'a dyn Reachable>,
    {
        Shape::Aggregate(fields.into_iter().collect())
    }
}

/// Capability marker for values stored in reactive containers.
pub trait Reachable {
    fn shape(&self) -> Shape<'_>;
}

/// Attach `listener` to every reactive value reachable from `value`.
pub fn attach<V>(value: &V, listener: &DeepListener)
where
    V: Reachable + ?Sized,
{
    match value.shape() {
        Shape::Container(container) => container.attach_deep(listener),
        Shape::Cell(cell) => cell.attach(listener),
        Shape::Aggregate(fields) => {
            for field in fields {
                attach(field, listener);
            }
        }
        Shape::Leaf => {}
    }
}

/// Reverse one earlier [`attach`] of the listener with this id.
pub fn detach<V>(value: &V, id: SubscriberId)
where
    V: Reachable + ?Sized,
{
    match value.shape() {
        Shape::Container(container) => container.detach_deep(id),
        Shape::Cell(cell) => cell.detach(id),
        Shape::Aggregate(fields) => {
            for field in fields {
                detach(field, id);
            }
        }
        Shape::Leaf => {}
    }
}

// ----------------------------------------------------------------------------
// Std implementations
// ----------------------------------------------------------------------------

macro_rules! leaf {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Reachable for $ty {
                fn shape(&self) -> Shape<'_> {
                    Shape::Leaf
                }
            }
        )*
    };
}

leaf!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    str, String,
);

impl<T: Reachable + ?Sized> Reachable for &T {
    fn shape(&self) -> Shape<'_> {
        (**self).shape()
    }
}

impl<T: Reachable + ?Sized> Reachable for Box<T> {
    fn shape(&self) -> Shape<'_> {
        (**self).shape()
    }
}

impl<T: Reachable + ?Sized> Reachable for Arc<T> {
    fn shape(&self) -> Shape<'_> {
        (**self).shape()
    }
}

impl<T: Reachable + ?Sized> Reachable for Rc<T> {
    fn shape(&self) -> Shape<'_> {
        (**self).shape()
    }
}

impl<T: Reachable> Reachable for Option<T> {
    fn shape(&self) -> Shape<'_> {
        match self {
            Some(value) => value.shape(),
            None => Shape::Leaf,
        }
    }
}

macro_rules! sequence_like {
    ($($ty:ident),*) => {
        $(
            impl<T: Reachable> Reachable for $ty<T> {
                fn shape(&self) -> Shape<'_> {
                    Shape::aggregate(self.iter().map(|item| item as &dyn Reachable))
                }
            }
        )*
    };
}

sequence_like!(Vec, VecDeque, BTreeSet);

impl<T: Reachable> Reachable for [T] {
    fn shape(&self) -> Shape<'_> {
        Shape::aggregate(self.iter().map(|item| item as &dyn Reachable))
    }
}

impl<T: Reachable, const N: usize> Reachable for [T; N] {
    fn shape(&self) -> Shape<'_> {
        self.as_slice().shape()
    }
}

impl<K, V: Reachable> Reachable for BTreeMap<K, V> {
    fn shape(&self) -> Shape<'_> {
        Shape::aggregate(self.values().map(|value| value as &dyn Reachable))
    }
}

macro_rules! tuple {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: Reachable),+> Reachable for ($($name,)+) {
            fn shape(&self) -> Shape<'_> {
                Shape::aggregate([$(&self.$idx as &dyn Reachable),+])
            }
        }
    };
}

tuple!(A 0);
tuple!(A 0, B 1);
tuple!(A 0, B 1, C 2);
tuple!(A 0, B 1, C 2, D 3);
tuple!(A 0, B 1, C 2, D 3, E 4);
tuple!(A 0, B 1, C 2, D 3, E 4, F 5);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (DeepListener, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let listener = DeepListener::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (listener, count)
    }

    #[derive(Clone, PartialEq)]
    struct Record {
        label: String,
        score: Cell<i32>,
        tags: Vec<Cell<String>>,
    }

    impl Reachable for Record {
        fn shape(&self) -> Shape<'_> {
            Shape::aggregate([
                &self.label as &dyn Reachable,
                &self.score,
                &self.tags,
            ])
        }
    }

    #[test]
    fn leaves_ignore_listeners() {
        let (listener, count) = counting();
        attach(&42, &listener);
        attach("text", &listener);
        detach(&42, listener.id());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn attach_reaches_cells_inside_aggregates() {
        let (listener, count) = counting();
        let record = Record {
            label: "a".into(),
            score: Cell::new(0),
            tags: vec![Cell::new("x".into()), Cell::new("y".into())],
        };

        attach(&record, &listener);
        record.score.set(1);
        record.tags[1].set("z".into());
        assert_eq!(count.load(Ordering::SeqCst), 2);

        detach(&record, listener.id());
        record.score.set(2);
        record.tags[0].set("w".into());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn shared_cell_stays_attached_until_every_path_detaches() {
        let (listener, count) = counting();
        let shared = Cell::new(0);
        let first = (shared.clone(), 1);
        let second = Some(shared.clone());

        attach(&first, &listener);
        attach(&second, &listener);
        detach(&first, listener.id());

        shared.set(1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        detach(&second, listener.id());
        shared.set(2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cell_receives_deep_listener_once() {
        let (listener, count) = counting();
        let cell = Cell::new(0);

        attach(&cell, &listener);
        attach(&cell, &listener);
        cell.set(5);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(cell.listener_count(), 1);
    }
}
