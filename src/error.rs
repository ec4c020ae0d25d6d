//! Error types for contract violations on indexed access.
//!
//! Every operation in this crate is either well-formed or a programmer error.
//! The panicking entry points (`cow::update`, `PersistentVector::range`, ...)
//! report their failures through [`BoundsError`], and the checked variants
//! (`cow::try_update`, ...) hand the same value back to the caller.

use std::fmt;

/// Represents an index or range that does not fit the sequence it was applied to.
///
/// # Examples
///
/// ```rust
/// use datoms::error::BoundsError;
///
/// let error = BoundsError::IndexOutOfBounds { index: 4, length: 3 };
/// assert_eq!(
///     format!("{error}"),
///     "index out of bounds: the length is 3 but the index is 4"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsError {
    /// A single position lies outside the sequence.
    IndexOutOfBounds {
        /// The offending index.
        index: usize,
        /// The length of the sequence.
        length: usize,
    },
    /// A half-open range `[start, end)` is reversed or reaches past the end.
    InvalidRange {
        /// Inclusive lower bound.
        start: usize,
        /// Exclusive upper bound.
        end: usize,
        /// The length of the sequence.
        length: usize,
    },
}

impl BoundsError {
    /// Validates `index < length`.
    pub(crate) const fn check_index(index: usize, length: usize) -> Result<(), Self> {
        if index < length {
            Ok(())
        } else {
            Err(Self::IndexOutOfBounds { index, length })
        }
    }

    /// Validates `start <= end <= length`.
    pub(crate) const fn check_range(start: usize, end: usize, length: usize) -> Result<(), Self> {
        if start <= end && end <= length {
            Ok(())
        } else {
            Err(Self::InvalidRange { start, end, length })
        }
    }
}

impl fmt::Display for BoundsError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfBounds { index, length } => write!(
                formatter,
                "index out of bounds: the length is {length} but the index is {index}"
            ),
            Self::InvalidRange { start, end, length } => write!(
                formatter,
                "range {start}..{end} is invalid for a sequence of length {length}"
            ),
        }
    }
}

impl std::error::Error for BoundsError {}
