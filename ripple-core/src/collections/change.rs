//! Change Records
//!
//! One enum per container kind. A record is built once per mutation, handed
//! by reference to every listener, and dropped when dispatch ends.
//!
//! Replacing an element is never its own variant: containers report it as a
//! delete followed by an insert (or set), so a consumer only ever handles
//! the shapes listed here. The `apply` helpers replay a record onto a plain
//! std collection, which is how a renderer keeps a parallel structure in
//! step with a container.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A mutation of a [`Sequence`](super::Sequence).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SequenceChange<T> {
    /// `value` now sits at `index`; later elements shifted right.
    Insert { value: T, index: usize },

    /// The elements at `index_a` and `index_b` traded places. `a` and `b`
    /// are the values that sat there before the swap.
    Swap {
        a: T,
        b: T,
        index_a: usize,
        index_b: usize,
    },

    /// `value` was removed from `index`; later elements shifted left.
    Delete { value: T, index: usize },
}

impl<T> SequenceChange<T> {
    /// Replay this change onto a mirror of the sequence.
    ///
    /// # Panics
    ///
    /// Panics if the mirror has fallen out of step, i.e. an index in the
    /// record is out of bounds for `mirror`.
    pub fn apply<N>(&self, mirror: &mut Vec<N>, mut node: impl FnMut(&T) -> N) {
        match self {
            SequenceChange::Insert { value, index } => mirror.insert(*index, node(value)),
            SequenceChange::Swap {
                index_a, index_b, ..
            } => mirror.swap(*index_a, *index_b),
            SequenceChange::Delete { index, .. } => {
                mirror.remove(*index);
            }
        }
    }
}

/// A mutation of a [`Set`](super::Set).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SetChange<T> {
    Add { value: T },
    Delete { value: T },
}

impl<T> SetChange<T> {
    /// The value that entered or left the set.
    pub fn value(&self) -> &T {
        match self {
            SetChange::Add { value } | SetChange::Delete { value } => value,
        }
    }

    /// Replay this change onto a mirror of the set.
    pub fn apply(&self, mirror: &mut HashSet<T>)
    where
        T: Clone + Eq + Hash,
    {
        match self {
            SetChange::Add { value } => {
                mirror.insert(value.clone());
            }
            SetChange::Delete { value } => {
                mirror.remove(value);
            }
        }
    }
}

/// A mutation of a [`Map`](super::Map).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MapChange<K, V> {
    Set { key: K, value: V },
    Delete { key: K, value: V },
}

impl<K, V> MapChange<K, V> {
    pub fn key(&self) -> &K {
        match self {
            MapChange::Set { key, .. } | MapChange::Delete { key, .. } => key,
        }
    }

    /// Replay this change onto a mirror of the map.
    pub fn apply(&self, mirror: &mut HashMap<K, V>)
    where
        K: Clone + Eq + Hash,
        V: Clone,
    {
        match self {
            MapChange::Set { key, value } => {
                mirror.insert(key.clone(), value.clone());
            }
            MapChange::Delete { key, .. } => {
                mirror.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_changes_replay_onto_mirror() {
        let mut mirror: Vec<String> = Vec::new();
        let label = |v: &i32| format!("node-{v}");

        SequenceChange::Insert { value: 1, index: 0 }.apply(&mut mirror, label);
        SequenceChange::Insert { value: 2, index: 1 }.apply(&mut mirror, label);
        SequenceChange::Insert { value: 0, index: 0 }.apply(&mut mirror, label);
        assert_eq!(mirror, ["node-0", "node-1", "node-2"]);

        SequenceChange::Swap {
            a: 0,
            b: 2,
            index_a: 0,
            index_b: 2,
        }
        .apply(&mut mirror, label);
        assert_eq!(mirror, ["node-2", "node-1", "node-0"]);

        SequenceChange::Delete { value: 1, index: 1 }.apply(&mut mirror, label);
        assert_eq!(mirror, ["node-2", "node-0"]);
    }

    #[test]
    fn set_and_map_changes_replay_onto_mirrors() {
        let mut set = HashSet::new();
        SetChange::Add { value: "a" }.apply(&mut set);
        SetChange::Add { value: "b" }.apply(&mut set);
        SetChange::Delete { value: "a" }.apply(&mut set);
        assert_eq!(set, HashSet::from(["b"]));

        let mut map = HashMap::new();
        MapChange::Set { key: "k", value: 1 }.apply(&mut map);
        MapChange::Delete { key: "k", value: 1 }.apply(&mut map);
        assert!(map.is_empty());
    }

    #[test]
    fn accessors_expose_payload() {
        assert_eq!(SetChange::Delete { value: 3 }.value(), &3);
        assert_eq!(MapChange::Set { key: "k", value: 0 }.key(), &"k");
    }
}
