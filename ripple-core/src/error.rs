//! Result and Info Codes
//!
//! Every mutating operation either applies a change, declines because the
//! change would be a no-op, or rejects the request outright. The first two
//! cases are reported through [`Outcome`]; only the third is an [`Error`].
//!
//! Rejection always happens before any storage or listener is touched, so a
//! failed call leaves the container exactly as it was.

use thiserror::Error;

/// Reasons a container operation was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// The index lies before the first valid position, even after counting
    /// negative indices from the end.
    #[error("index {index} is too small for a sequence of length {len}")]
    IndexTooSmall { index: isize, len: usize },

    /// The index lies past the last valid position for the operation.
    #[error("index {index} is too big for a sequence of length {len}")]
    IndexTooBig { index: isize, len: usize },

    /// A lookup by value found nothing.
    #[error("value not found")]
    NotFound,
}

/// How an accepted operation resolved.
///
/// Anything other than [`Outcome::Success`] means no mutation happened and no
/// listener ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Outcome {
    /// The container changed and listeners were notified.
    Success,

    /// The supplied value equals the one already stored.
    SameValue,

    /// Both swap positions resolved to the same index.
    IndicesAreEqual,

    /// Both swap values are equal.
    SameValues,
}

impl Outcome {
    /// Whether the operation mutated the container.
    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
