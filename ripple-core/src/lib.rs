//! Ripple Core
//!
//! This crate provides the state layer for the Ripple UI toolkit: observable
//! values and containers that report every mutation to their listeners as a
//! small, ordered change record. A renderer keeps its own structure in step
//! by replaying those records instead of diffing.
//!
//! It implements:
//!
//! - Single-value cells with change listeners and derivations
//! - Observable sequences, sets and maps
//! - Deep listeners that follow every cell and container reachable from a
//!   container's elements
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: cells, derivations and the deep-listening capability traits
//! - `collections`: the three containers and their change records
//! - `index`: Python-style index normalization shared by sequence operations
//! - `error`: error and outcome codes
//!
//! Everything is synchronous. A mutation returns only after every listener
//! has run.
//!
//! # Example
//!
//! ```rust
//! use ripple_core::collections::{Sequence, SequenceChange};
//! use ripple_core::reactive::Cell;
//!
//! let items = Sequence::from_vec(vec!["a", "b", "c"]);
//! items.add_listener(|change: &SequenceChange<&str>| println!("{change:?}"));
//!
//! // Prints Delete { value: "b", index: 1 } then Insert { value: "x", index: 1 }
//! items.set(1, "x").unwrap();
//!
//! let count = Cell::new(1);
//! let doubled = count.derive(|n| n * 2);
//! count.set(5);
//! assert_eq!(doubled.get(), 10);
//! ```

pub mod collections;
pub mod error;
pub mod index;
pub mod reactive;

pub use collections::{Map, MapChange, Sequence, SequenceChange, Set, SetChange};
pub use error::{Error, Outcome, Result};
pub use reactive::{combine, combine_all, Cell, DeepListener, ReadCell, Reachable, SubscriberId};
