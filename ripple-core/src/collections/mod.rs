//! Observable Collections
//!
//! This module implements the three containers of the engine:
//!
//! - [`Sequence`]: ordered and index-addressed, duplicates allowed
//! - [`Set`]: unique values
//! - [`Map`]: unique keys, first write wins
//!
//! Each container owns its storage and its listener store. Every mutation is
//! applied to storage first, then deep listeners are moved onto or off the
//! values involved, then every listener is called synchronously with a change
//! record from [`change`].
//!
//! # Design Decisions
//!
//! 1. Replacement is always delete-then-insert. Consumers handle two shapes
//!    per container instead of three.
//!
//! 2. Bulk operations (`clear`, `fill`, `sort`, ...) are spelled out as
//!    individual mutations. There is no "range changed" record, because a
//!    coarse record could not tell deep listeners which values left.
//!
//! 3. Validation happens before anything is touched. A rejected call leaves
//!    the container and every listener attachment as they were.

mod change;
mod map;
mod sequence;
mod set;

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

pub use change::{MapChange, SequenceChange, SetChange};
pub use map::Map;
pub use sequence::Sequence;
pub use set::Set;

use crate::reactive::Reachable;

/// Counter for generating unique container IDs.
static CONTAINER_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique container ID.
fn next_container_id() -> u64 {
    CONTAINER_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Values that can live in a container.
///
/// Implemented for every type that meets the bounds.
pub trait Element: Reachable + Clone + PartialEq + Send + Sync + 'static {}

impl<T> Element for T where T: Reachable + Clone + PartialEq + Send + Sync + 'static {}

/// Values that can live in a [`Set`] or be a [`Map`] key.
pub trait Key: Clone + Eq + Hash + Send + Sync + 'static {}

impl<T> Key for T where T: Clone + Eq + Hash + Send + Sync + 'static {}
