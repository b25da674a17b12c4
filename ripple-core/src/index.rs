//! Index Normalization
//!
//! Pure functions that map caller-supplied indices onto concrete positions
//! in a container of a given length. Negative indices count from the end, so
//! `-1` is the last element.
//!
//! There are three policies, chosen per operation:
//!
//! - [`clamp`]: never fails, lands on an existing element. Used for the start
//!   of range operations such as `fill` and `copy_within`.
//! - [`clamp_insertion`]: never fails, may land one past the end. Used for
//!   lenient insertion and exclusive range ends.
//! - [`normalize`] / [`normalize_insertion`]: fail with an [`Error`] instead
//!   of guessing. Used wherever a wrong guess would silently mutate the
//!   wrong slot.

use std::ops::{Bound, Range, RangeBounds};

use crate::error::{Error, Result};

/// Clamp `index` onto an existing element.
///
/// `index < -len` maps to `0`, other negatives wrap, and anything at or past
/// `len` maps to the last element. An empty container always yields `0`.
pub fn clamp(index: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let signed_len = len as isize;
    if index < -signed_len {
        0
    } else if index < 0 {
        (index + signed_len) as usize
    } else if index >= signed_len {
        len - 1
    } else {
        index as usize
    }
}

/// Clamp `index` onto a valid insertion point, allowing `len` (append).
pub fn clamp_insertion(index: isize, len: usize) -> usize {
    let signed_len = len as isize;
    if index < -signed_len {
        0
    } else if index < 0 {
        (index + signed_len) as usize
    } else if index > signed_len {
        len
    } else {
        index as usize
    }
}

/// Resolve `index` to an existing element or report which bound it broke.
pub fn normalize(index: isize, len: usize) -> Result<usize> {
    let signed_len = len as isize;
    if index < -signed_len {
        Err(Error::IndexTooSmall { index, len })
    } else if index >= signed_len {
        Err(Error::IndexTooBig { index, len })
    } else if index < 0 {
        Ok((index + signed_len) as usize)
    } else {
        Ok(index as usize)
    }
}

/// Resolve `index` to an insertion point (`0..=len`) or report which bound it
/// broke.
pub fn normalize_insertion(index: isize, len: usize) -> Result<usize> {
    let signed_len = len as isize;
    if index < -signed_len {
        Err(Error::IndexTooSmall { index, len })
    } else if index > signed_len {
        Err(Error::IndexTooBig { index, len })
    } else if index < 0 {
        Ok((index + signed_len) as usize)
    } else {
        Ok(index as usize)
    }
}

/// Turn a signed range into concrete positions.
///
/// The start is clamped onto an existing element, the end onto an insertion
/// point. An inverted range resolves to an empty one at its start.
pub fn resolve_range<R>(range: R, len: usize) -> Range<usize>
where
    R: RangeBounds<isize>,
{
    if len == 0 {
        return 0..0;
    }

    let start = match range.start_bound() {
        Bound::Included(&start) => clamp(start, len),
        Bound::Excluded(&start) => (clamp(start, len) + 1).min(len),
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&end) => clamp(end, len) + 1,
        Bound::Excluded(&end) => clamp_insertion(end, len),
        Bound::Unbounded => len,
    };

    start..end.max(start)
}
