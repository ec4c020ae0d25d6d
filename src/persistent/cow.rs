//! Copy-on-write sequence primitives.
//!
//! Each function reads a source slice and returns a freshly allocated `Vec`
//! of the final length; the source is never written to. The tries in this
//! module tree use these whenever a shared node has to be cloned with a
//! change, so that every older version keeps seeing its original children.
//!
//! There is a single empty representation: an empty slice in, and
//! `Vec::new()` (no allocation) out of [`shallow_copy`].
//!
//! # Examples
//!
//! ```rust
//! use datoms::persistent::cow;
//!
//! let original = vec![1, 2, 3];
//! let inserted = cow::insert(&original, 1, 9);
//! let removed = cow::delete(&inserted, 0, 1);
//!
//! assert_eq!(original, vec![1, 2, 3]);
//! assert_eq!(inserted, vec![1, 9, 2, 3]);
//! assert_eq!(removed, vec![9, 2, 3]);
//! ```

use crate::error::BoundsError;

/// Returns a copy of `slice`.
///
/// An empty input yields the canonical empty `Vec`, which does not allocate.
#[must_use]
pub fn shallow_copy<T: Clone>(slice: &[T]) -> Vec<T> {
    if slice.is_empty() {
        return Vec::new();
    }
    slice.to_vec()
}

/// Returns a copy of `slice` with `elements` appended.
#[must_use]
pub fn append<T, I>(slice: &[T], elements: I) -> Vec<T>
where
    T: Clone,
    I: IntoIterator<Item = T>,
{
    let elements = elements.into_iter();
    let (lower, _) = elements.size_hint();
    let mut copy = Vec::with_capacity(slice.len() + lower);
    copy.extend_from_slice(slice);
    copy.extend(elements);
    copy
}

/// Returns a copy of `slice` with the element at `index` replaced by `element`.
///
/// # Panics
///
/// Panics if `index >= slice.len()`.
#[must_use]
#[track_caller]
pub fn update<T: Clone>(slice: &[T], index: usize, element: T) -> Vec<T> {
    try_update(slice, index, element).unwrap_or_else(|error| panic!("cow::update: {error}"))
}

/// Checked form of [`update`].
///
/// # Errors
///
/// Returns [`BoundsError::IndexOutOfBounds`] if `index >= slice.len()`.
pub fn try_update<T: Clone>(slice: &[T], index: usize, element: T) -> Result<Vec<T>, BoundsError> {
    BoundsError::check_index(index, slice.len())?;
    let mut copy = shallow_copy(slice);
    copy[index] = element;
    Ok(copy)
}

/// Returns a copy of `slice` with `element` inserted before `index`.
///
/// # Panics
///
/// Panics if `index > slice.len()`.
#[must_use]
#[track_caller]
pub fn insert<T: Clone>(slice: &[T], index: usize, element: T) -> Vec<T> {
    try_insert(slice, index, element).unwrap_or_else(|error| panic!("cow::insert: {error}"))
}

/// Checked form of [`insert`].
///
/// # Errors
///
/// Returns [`BoundsError::IndexOutOfBounds`] if `index > slice.len()`.
pub fn try_insert<T: Clone>(slice: &[T], index: usize, element: T) -> Result<Vec<T>, BoundsError> {
    if index > slice.len() {
        return Err(BoundsError::IndexOutOfBounds {
            index,
            length: slice.len(),
        });
    }
    let mut copy = Vec::with_capacity(slice.len() + 1);
    copy.extend_from_slice(&slice[..index]);
    copy.push(element);
    copy.extend_from_slice(&slice[index..]);
    Ok(copy)
}

/// Returns a copy of `slice` without the half-open range `[start, end)`.
///
/// The tries only ever remove a single element (`end == start + 1`).
///
/// # Panics
///
/// Panics unless `start <= end <= slice.len()`.
#[must_use]
#[track_caller]
pub fn delete<T: Clone>(slice: &[T], start: usize, end: usize) -> Vec<T> {
    try_delete(slice, start, end).unwrap_or_else(|error| panic!("cow::delete: {error}"))
}

/// Checked form of [`delete`].
///
/// # Errors
///
/// Returns [`BoundsError::InvalidRange`] unless `start <= end <= slice.len()`.
pub fn try_delete<T: Clone>(slice: &[T], start: usize, end: usize) -> Result<Vec<T>, BoundsError> {
    BoundsError::check_range(start, end, slice.len())?;
    let mut copy = Vec::with_capacity(slice.len() - (end - start));
    copy.extend_from_slice(&slice[..start]);
    copy.extend_from_slice(&slice[end..]);
    Ok(copy)
}
