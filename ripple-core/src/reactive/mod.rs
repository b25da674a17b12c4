//! Reactive Primitives
//!
//! This module implements cells, derivations and the deep-listening rules
//! shared by every container in [`crate::collections`].
//!
//! # Concepts
//!
//! ## Cells
//!
//! A [`Cell`] is a container for one value. Replacing the value with a
//! different one calls every listener with `(new, old)`. Replacing it with an
//! equal value does nothing at all.
//!
//! ## Derivations
//!
//! [`Cell::derive`] and [`combine`] build read-only cells that recompute
//! from their sources whenever a source changes. Updates are pushed
//! eagerly; there is no scheduler and no batching.
//!
//! ## Deep listeners
//!
//! A [`DeepListener`] registered on a container follows the container's
//! elements: it is attached to every cell and container reachable from them,
//! and withdrawn again when an element leaves. [`Reachable`] is the explicit
//! capability each element type implements to take part.
//!
//! # Implementation Notes
//!
//! Every notification dispatches over a snapshot of the listener store taken
//! when the change is applied, so a listener can add or remove listeners, or
//! mutate the very container it observes, without skipping or repeating
//! anyone in the current round.

mod cell;
mod combine;
mod deep;
mod registry;
mod subscriber;

pub use cell::{Cell, CellCallback, ReadCell};
pub use combine::{combine, combine_all, Source, Sources};
pub use deep::{attach, detach, DeepObservable, Observable, Reachable, Shape};
pub use registry::Callback;
pub use subscriber::{DeepListener, SubscriberId};

pub(crate) use registry::{deep_callback, Registry};
