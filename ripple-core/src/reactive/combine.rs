//! Derivation over several cells.
//!
//! [`combine`] takes a tuple of cells and a function over their values and
//! returns a read-only cell holding the function's result. Each source gets
//! its own listener that writes the new value into a shared slot tuple and
//! recomputes, so the result always reflects the latest value of every
//! source as of the most recent change to any one of them.

use std::sync::Arc;

use parking_lot::Mutex;

use super::cell::{Cell, ReadCell};
use super::subscriber::SubscriberId;

/// Something [`combine`] can read from and listen to.
pub trait Source {
    type Value: Clone + Send + Sync + 'static;

    fn current(&self) -> Self::Value;

    fn on_change(&self, f: Box<dyn Fn(&Self::Value) + Send + Sync>) -> SubscriberId;
}

impl<T> Source for Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Value = T;

    fn current(&self) -> T {
        self.get()
    }

    fn on_change(&self, f: Box<dyn Fn(&T) + Send + Sync>) -> SubscriberId {
        self.add_listener(move |new, _old| f(new))
    }
}

impl<T> Source for ReadCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Value = T;

    fn current(&self) -> T {
        self.get()
    }

    fn on_change(&self, f: Box<dyn Fn(&T) + Send + Sync>) -> SubscriberId {
        self.add_listener(move |new, _old| f(new))
    }
}

/// A fixed-size tuple of sources.
pub trait Sources {
    type Values: Clone + Send + Sync + 'static;

    fn values(&self) -> Self::Values;

    fn watch(
        &self,
        slots: Arc<Mutex<Self::Values>>,
        recompute: Arc<dyn Fn(&Self::Values) + Send + Sync>,
    );
}

macro_rules! sources {
    ($($name:ident $idx:tt),+) => {
        impl<'a, $($name),+> Sources for ($(&'a $name,)+)
        where
            $($name: Source),+
        {
            type Values = ($(<$name as Source>::Value,)+);

            fn values(&self) -> Self::Values {
                ($(self.$idx.current(),)+)
            }

            fn watch(
                &self,
                slots: Arc<Mutex<Self::Values>>,
                recompute: Arc<dyn Fn(&Self::Values) + Send + Sync>,
            ) {
                $(
                    {
                        let slots = Arc::clone(&slots);
                        let recompute = Arc::clone(&recompute);
                        self.$idx.on_change(Box::new(move |value: &<$name as Source>::Value| {
                            let values = {
                                let mut guard = slots.lock();
                                guard.$idx = value.clone();
                                guard.clone()
                            };
                            recompute(&values);
                        }));
                    }
                )+
            }
        }
    };
}

sources!(A 0);
sources!(A 0, B 1);
sources!(A 0, B 1, C 2);
sources!(A 0, B 1, C 2, D 3);
sources!(A 0, B 1, C 2, D 3, E 4);
sources!(A 0, B 1, C 2, D 3, E 4, F 5);

/// Build a cell from a tuple of sources.
///
/// ```rust
/// use ripple_core::reactive::{combine, Cell};
///
/// let count = Cell::new(10);
/// let unit = Cell::new("x".to_string());
/// let label = combine((&count, &unit), |(count, unit)| format!("{count}{unit}"));
///
/// assert_eq!(label.get(), "10x");
/// count.set(13);
/// assert_eq!(label.get(), "13x");
/// ```
pub fn combine<S, U, F>(sources: S, combine: F) -> ReadCell<U>
where
    S: Sources,
    U: Clone + PartialEq + Send + Sync + 'static,
    F: Fn(&S::Values) -> U + Send + Sync + 'static,
{
    let values = sources.values();
    let result = Cell::new(combine(&values));
    let slots = Arc::new(Mutex::new(values));

    let target = result.clone();
    sources.watch(
        slots,
        Arc::new(move |values: &S::Values| {
            target.set(combine(values));
        }),
    );

    ReadCell::from_cell(result)
}

/// Build a cell from any number of same-typed cells.
pub fn combine_all<T, U, F>(sources: &[Cell<T>], combine: F) -> ReadCell<U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + PartialEq + Send + Sync + 'static,
    F: Fn(&[T]) -> U + Send + Sync + 'static,
{
    let values: Vec<T> = sources.iter().map(Cell::get).collect();
    let result = Cell::new(combine(values.as_slice()));
    let slots = Arc::new(Mutex::new(values));
    let combine = Arc::new(combine);

    for (slot, source) in sources.iter().enumerate() {
        let slots = Arc::clone(&slots);
        let combine = Arc::clone(&combine);
        let target = result.clone();
        source.add_listener(move |new, _old| {
            let values = {
                let mut guard = slots.lock();
                guard[slot] = new.clone();
                guard.clone()
            };
            target.set(combine(values.as_slice()));
        });
    }

    ReadCell::from_cell(result)
}
