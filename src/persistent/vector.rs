//! Persistent (immutable) vector based on a bit-partitioned trie.
//!
//! This module provides [`PersistentVector`], an immutable append-only
//! sequence that uses structural sharing for efficient operations, and its
//! bulk-build sibling [`TransientVector`].
//!
//! # Overview
//!
//! `PersistentVector` is a `2^bits`-way branching trie in the style of
//! Clojure's `PersistentVector`. The branching exponent is chosen per vector
//! (default 5, that is 32-way). It provides:
//!
//! - O(log N) random access
//! - amortized O(1) `push_back` through a tail buffer
//! - O(1) `last`
//! - O(1) len and `is_empty`
//!
//! # Internal Structure
//!
//! The bits of an index are the path to its element: at each level a
//! `bits`-wide slice selects the child, and the lowest slice selects the
//! element inside a leaf. The vector consists of:
//! - a root array of child nodes, indexed at `shift`
//! - a tail buffer (up to `2^bits` elements) not yet pushed into the trie
//!
//! # Examples
//!
//! ```rust
//! use datoms::persistent::PersistentVector;
//!
//! let vector = PersistentVector::with_bits(2)
//!     .push_back(0)
//!     .push_back(1)
//!     .push_back(2)
//!     .push_back(3)
//!     .push_back(4);
//!
//! assert_eq!(vector.get(3), Some(&3));
//! assert_eq!(vector.get(4), Some(&4));
//! assert_eq!(vector.len(), 5);
//! ```

use std::fmt;
use std::iter::FromIterator;
use std::ops::Index;

use super::ReferenceCounter;
use super::cow;
use crate::error::BoundsError;

// =============================================================================
// Constants
// =============================================================================

/// Branching exponent used by [`PersistentVector::new`] (2^5 = 32)
pub const DEFAULT_BITS: u32 = 5;

/// Smallest accepted branching exponent
pub const MIN_BITS: u32 = 1;

/// Largest accepted branching exponent
pub const MAX_BITS: u32 = 8;

/// Bit mask selecting the position inside a node of `2^bits` slots.
#[inline]
const fn mask(bits: u32) -> usize {
    (1 << bits) - 1
}

// =============================================================================
// Node Definition
// =============================================================================

/// Internal node structure; a node holds either elements or children, never both.
#[derive(Clone)]
enum Node<T> {
    /// Full leaf of `2^bits` elements (a former tail)
    Leaf(ReferenceCounter<Vec<T>>),
    /// Up to `2^bits` child nodes
    Branch(ReferenceCounter<Vec<Self>>),
}

impl<T> Node<T> {
    /// Builds a chain of single-child branches ending in `leaf`.
    ///
    /// The result is placed in a node array indexed at `shift + bits`.
    fn new_path(leaf: Self, shift: u32, bits: u32) -> Self {
        if shift == 0 {
            leaf
        } else {
            Self::Branch(ReferenceCounter::new(vec![Self::new_path(
                leaf,
                shift - bits,
                bits,
            )]))
        }
    }
}

impl<T: Clone> Node<T> {
    /// Copy-on-write push of a full leaf along the rightmost path.
    ///
    /// `last_index` is the index of the last element carried by `leaf`.
    fn push_leaf(
        nodes: &[Self],
        leaf: Self,
        shift: u32,
        bits: u32,
        last_index: usize,
    ) -> Vec<Self> {
        let index = (last_index >> shift) & mask(bits);
        if shift == bits {
            assert_eq!(index, nodes.len(), "leaf pushed out of order");
            return cow::append(nodes, [leaf]);
        }
        match nodes.get(index) {
            Some(Self::Branch(children)) => {
                let children = Self::push_leaf(children, leaf, shift - bits, bits, last_index);
                cow::update(nodes, index, Self::Branch(ReferenceCounter::new(children)))
            }
            Some(Self::Leaf(_)) => unreachable!("leaf found above the bottom level"),
            None => cow::append(nodes, [Self::new_path(leaf, shift - bits, bits)]),
        }
    }

    /// In-place counterpart of [`push_leaf`](Self::push_leaf) for transients.
    fn push_leaf_in_place(
        nodes: &mut Vec<Self>,
        leaf: Self,
        shift: u32,
        bits: u32,
        last_index: usize,
    ) {
        let index = (last_index >> shift) & mask(bits);
        if shift == bits {
            assert_eq!(index, nodes.len(), "leaf pushed out of order");
            nodes.push(leaf);
            return;
        }
        match nodes.get_mut(index) {
            Some(Self::Branch(children)) => Self::push_leaf_in_place(
                ReferenceCounter::make_mut(children),
                leaf,
                shift - bits,
                bits,
                last_index,
            ),
            Some(Self::Leaf(_)) => unreachable!("leaf found above the bottom level"),
            None => nodes.push(Self::new_path(leaf, shift - bits, bits)),
        }
    }
}

// =============================================================================
// PersistentVector Definition
// =============================================================================

/// A persistent (immutable) vector based on a bit-partitioned trie.
///
/// # Time Complexity
///
/// | Operation    | Complexity                    |
/// |--------------|-------------------------------|
/// | `new`        | O(1)                          |
/// | `get`        | O(log N)                      |
/// | `push_back`  | O(log N) amortized O(1)       |
/// | `last`       | O(1)                          |
/// | `len`        | O(1)                          |
/// | `range`      | O(log N) to create, O(1) amortized per step |
///
/// # Examples
///
/// ```rust
/// use datoms::persistent::PersistentVector;
///
/// let vector: PersistentVector<i32> = (0..100).collect();
/// assert_eq!(vector.len(), 100);
/// assert_eq!(vector.get(50), Some(&50));
/// ```
pub struct PersistentVector<T> {
    /// Root node array, indexed at `shift`
    root: ReferenceCounter<Vec<Node<T>>>,
    /// Trailing elements not yet pushed into the trie
    tail: ReferenceCounter<Vec<T>>,
    /// Total number of elements
    count: usize,
    /// Height of the trie in units of `bits`; starts at `bits`
    shift: u32,
    /// Branching exponent
    bits: u32,
}

impl<T> PersistentVector<T> {
    /// Creates a new empty vector with the default branching factor of 32.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use datoms::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = PersistentVector::new();
    /// assert!(vector.is_empty());
    /// assert_eq!(vector.bits(), 5);
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_bits(DEFAULT_BITS)
    }

    /// Creates a new empty vector with a branching factor of `2^bits`.
    ///
    /// # Panics
    ///
    /// Panics unless `MIN_BITS <= bits <= MAX_BITS`.
    #[must_use]
    #[track_caller]
    pub fn with_bits(bits: u32) -> Self {
        assert!(
            (MIN_BITS..=MAX_BITS).contains(&bits),
            "branching exponent must be within {MIN_BITS}..={MAX_BITS}, got {bits}"
        );
        Self {
            root: ReferenceCounter::new(Vec::new()),
            tail: ReferenceCounter::new(Vec::new()),
            count: 0,
            shift: bits,
            bits,
        }
    }

    /// Returns the number of elements in the vector.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if the vector contains no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the branching exponent the vector was built with.
    #[inline]
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    #[inline]
    const fn branching(&self) -> usize {
        1 << self.bits
    }

    /// Returns `true` if a full tail can be pushed without growing the trie.
    ///
    /// The trie at `shift` holds `2^shift` leaves; after the push it holds
    /// `count >> bits` of them.
    fn has_room(&self) -> bool {
        1usize
            .checked_shl(self.shift)
            .is_none_or(|capacity| (self.count >> self.bits) <= capacity)
    }

    /// Returns the leaf (or the tail) holding `index`.
    fn leaf_for(&self, index: usize) -> &[T] {
        if self.count == 0 {
            return &self.tail;
        }
        let mask = mask(self.bits);
        let cutoff = (self.count - 1) & !mask;
        if index >= cutoff {
            return &self.tail;
        }

        let mut nodes: &[Node<T>] = &self.root;
        let mut shift = self.shift;
        while shift > self.bits {
            let Node::Branch(children) = &nodes[(index >> shift) & mask] else {
                unreachable!("leaf found above the bottom level");
            };
            nodes = children;
            shift -= self.bits;
        }
        let Node::Leaf(elements) = &nodes[(index >> shift) & mask] else {
            unreachable!("branch found at the bottom level");
        };
        elements
    }

    /// Returns a reference to the element at `index`, or `None` if out of bounds.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use datoms::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// assert_eq!(vector.get(0), Some(&1));
    /// assert_eq!(vector.get(4), Some(&5));
    /// assert_eq!(vector.get(10), None);
    /// ```
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.count {
            return None;
        }
        self.leaf_for(index).get(index & mask(self.bits))
    }

    /// Returns a reference to the first element.
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    /// Returns a reference to the last element.
    ///
    /// # Complexity
    ///
    /// O(1) - the last element is always in the tail
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.tail.last()
    }

    /// Returns a cursor over the positions `[min, max)`.
    ///
    /// The cursor is `Clone`; cloning it before advancing gives a restartable
    /// traversal.
    ///
    /// # Panics
    ///
    /// Panics unless `min <= max <= self.len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use datoms::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (0..100).collect();
    /// let collected: Vec<i32> = vector.range(30, 35).copied().collect();
    /// assert_eq!(collected, vec![30, 31, 32, 33, 34]);
    /// ```
    #[must_use]
    #[track_caller]
    pub fn range(&self, min: usize, max: usize) -> PersistentVectorRange<'_, T> {
        if let Err(error) = BoundsError::check_range(min, max, self.count) {
            panic!("PersistentVector::range: {error}");
        }
        PersistentVectorRange {
            vector: self,
            leaf: if min < max { self.leaf_for(min) } else { &[] },
            index: min,
            end: max,
        }
    }

    /// Returns an iterator over all elements, front to back.
    #[must_use]
    pub fn iter(&self) -> PersistentVectorRange<'_, T> {
        self.range(0, self.count)
    }

    /// Returns `true` if both vectors share their root and tail.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        ReferenceCounter::ptr_eq(&self.root, &other.root)
            && ReferenceCounter::ptr_eq(&self.tail, &other.tail)
            && self.count == other.count
    }

    /// Converts the vector into a transient for bulk appends.
    #[must_use]
    pub fn transient(self) -> TransientVector<T> {
        TransientVector { vector: self }
    }
}

impl<T: Clone> PersistentVector<T> {
    /// Appends an element to the back of the vector.
    ///
    /// Returns a new vector with the element at the end.
    ///
    /// # Complexity
    ///
    /// O(1) while the tail has room; O(log N) when a full tail is pushed into
    /// the trie, which grows by one level when it is full at its height.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use datoms::persistent::PersistentVector;
    ///
    /// let vector = PersistentVector::new().push_back(1).push_back(2);
    /// let extended = vector.push_back(3);
    ///
    /// assert_eq!(vector.len(), 2);   // Original unchanged
    /// assert_eq!(extended.len(), 3); // New vector
    /// ```
    #[must_use]
    pub fn push_back(&self, element: T) -> Self {
        if self.tail.len() < self.branching() {
            return Self {
                root: self.root.clone(),
                tail: ReferenceCounter::new(cow::append(&self.tail, [element])),
                count: self.count + 1,
                shift: self.shift,
                bits: self.bits,
            };
        }

        let leaf = Node::Leaf(self.tail.clone());
        let (root, shift) = if self.has_room() {
            let root = Node::push_leaf(&self.root, leaf, self.shift, self.bits, self.count - 1);
            (root, self.shift)
        } else {
            log::trace!(
                "vector of {} elements grows to shift {}",
                self.count,
                self.shift + self.bits
            );
            let root = vec![
                Node::Branch(self.root.clone()),
                Node::new_path(leaf, self.shift, self.bits),
            ];
            (root, self.shift + self.bits)
        };

        Self {
            root: ReferenceCounter::new(root),
            tail: ReferenceCounter::new(vec![element]),
            count: self.count + 1,
            shift,
            bits: self.bits,
        }
    }
}

// =============================================================================
// TransientVector Definition
// =============================================================================

/// A single-owner, in-place appendable builder for [`PersistentVector`].
///
/// The tail and the rightmost spine are mutated directly whenever the
/// transient holds the only reference to them. [`immutable`](Self::immutable)
/// consumes the transient, so it cannot be written to once a snapshot has
/// been handed out.
///
/// # Examples
///
/// ```rust
/// use datoms::persistent::TransientVector;
///
/// let mut transient = TransientVector::with_bits(3);
/// for index in 0..1000 {
///     transient.push_back(index);
/// }
/// let vector = transient.immutable();
/// assert_eq!(vector.len(), 1000);
/// assert_eq!(vector.get(999), Some(&999));
/// ```
pub struct TransientVector<T> {
    vector: PersistentVector<T>,
}

impl<T> TransientVector<T> {
    /// Creates a new empty transient with the default branching factor.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        PersistentVector::new().transient()
    }

    /// Creates a new empty transient with a branching factor of `2^bits`.
    ///
    /// # Panics
    ///
    /// Panics unless `MIN_BITS <= bits <= MAX_BITS`.
    #[must_use]
    #[track_caller]
    pub fn with_bits(bits: u32) -> Self {
        PersistentVector::with_bits(bits).transient()
    }

    /// Returns the number of elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.vector.len()
    }

    /// Returns `true` if the transient contains no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }

    /// Returns a reference to the element at `index`, or `None` if out of bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.vector.get(index)
    }

    /// Converts the transient into a persistent vector, consuming it.
    #[must_use]
    pub fn immutable(self) -> PersistentVector<T> {
        log::trace!("transient vector of {} elements made immutable", self.vector.count);
        self.vector
    }
}

impl<T: Clone> TransientVector<T> {
    /// Appends an element in place.
    pub fn push_back(&mut self, element: T) {
        let vector = &mut self.vector;
        let branching = vector.branching();

        if vector.tail.len() < branching {
            ReferenceCounter::make_mut(&mut vector.tail).push(element);
            vector.count += 1;
            return;
        }

        let mut tail = Vec::with_capacity(branching);
        tail.push(element);
        let leaf = Node::Leaf(std::mem::replace(
            &mut vector.tail,
            ReferenceCounter::new(tail),
        ));

        if vector.has_room() {
            Node::push_leaf_in_place(
                ReferenceCounter::make_mut(&mut vector.root),
                leaf,
                vector.shift,
                vector.bits,
                vector.count - 1,
            );
        } else {
            log::trace!(
                "vector of {} elements grows to shift {}",
                vector.count,
                vector.shift + vector.bits
            );
            let previous = std::mem::take(&mut vector.root);
            let mut root = Vec::with_capacity(branching);
            root.push(Node::Branch(previous));
            root.push(Node::new_path(leaf, vector.shift, vector.bits));
            vector.root = ReferenceCounter::new(root);
            vector.shift += vector.bits;
        }
        vector.count += 1;
    }
}

// =============================================================================
// Range Iterator
// =============================================================================

/// A forward cursor over a contiguous range of a [`PersistentVector`].
///
/// Holds the current leaf and moves to the next one each time the position
/// crosses a `2^bits` boundary.
pub struct PersistentVectorRange<'a, T> {
    vector: &'a PersistentVector<T>,
    leaf: &'a [T],
    index: usize,
    end: usize,
}

impl<'a, T> Iterator for PersistentVectorRange<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.end {
            return None;
        }
        let mask = mask(self.vector.bits);
        let leaf = self.leaf;
        let element = &leaf[self.index & mask];
        self.index += 1;
        if self.index < self.end && self.index & mask == 0 {
            self.leaf = self.vector.leaf_for(self.index);
        }
        Some(element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.index;
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for PersistentVectorRange<'_, T> {
    fn len(&self) -> usize {
        self.end - self.index
    }
}

impl<T> std::iter::FusedIterator for PersistentVectorRange<'_, T> {}

impl<T> Clone for PersistentVectorRange<'_, T> {
    fn clone(&self) -> Self {
        Self {
            vector: self.vector,
            leaf: self.leaf,
            index: self.index,
            end: self.end,
        }
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Clone for PersistentVector<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            tail: self.tail.clone(),
            count: self.count,
            shift: self.shift,
            bits: self.bits,
        }
    }
}

impl<T> Default for PersistentVector<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Default for TransientVector<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for PersistentVector<T> {
    type Output = T;

    #[track_caller]
    fn index(&self, index: usize) -> &Self::Output {
        self.get(index).unwrap_or_else(|| {
            panic!(
                "{}",
                BoundsError::IndexOutOfBounds {
                    index,
                    length: self.count,
                }
            )
        })
    }
}

impl<T: Clone> FromIterator<T> for PersistentVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut transient = TransientVector::new();
        transient.extend(iter);
        transient.immutable()
    }
}

impl<T: Clone> Extend<T> for TransientVector<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for element in iter {
            self.push_back(element);
        }
    }
}

impl<'a, T> IntoIterator for &'a PersistentVector<T> {
    type Item = &'a T;
    type IntoIter = PersistentVectorRange<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: PartialEq> PartialEq for PersistentVector<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.len() == other.len() && self.iter().eq(other.iter()))
    }
}

impl<T: Eq> Eq for PersistentVector<T> {}

impl<T: fmt::Debug> fmt::Debug for PersistentVector<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

impl<T: fmt::Debug> fmt::Debug for TransientVector<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TransientVector")
            .field("count", &self.vector.count)
            .field("bits", &self.vector.bits)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Serde Support
// =============================================================================

/// Serializes the elements as a plain sequence.
///
/// The branching exponent is not part of the output; a deserialized vector
/// always uses [`DEFAULT_BITS`].
#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for PersistentVector<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for element in self {
            seq.serialize_element(element)?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentVectorVisitor<T> {
    marker: std::marker::PhantomData<T>,
}

#[cfg(feature = "serde")]
impl<'de, T> serde::de::Visitor<'de> for PersistentVectorVisitor<T>
where
    T: serde::Deserialize<'de> + Clone,
{
    type Value = PersistentVector<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut transient = TransientVector::new();
        while let Some(element) = seq.next_element()? {
            transient.push_back(element);
        }
        Ok(transient.immutable())
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for PersistentVector<T>
where
    T: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(PersistentVectorVisitor {
            marker: std::marker::PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
