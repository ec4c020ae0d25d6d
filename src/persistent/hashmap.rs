//! Persistent (immutable) hash map based on HAMT.
//!
//! This module provides [`PersistentHashMap`], an immutable hash map
//! that uses structural sharing for efficient operations, and its bulk-build
//! sibling [`TransientHashMap`].
//!
//! # Overview
//!
//! `PersistentHashMap` is a Hash Array Mapped Trie after Bagwell's
//! "Ideal Hash Trees". Hashes are not computed by the map: every operation
//! takes the key together with a caller-supplied 64-bit hash, so a database
//! layer that resolves the same identifiers again and again can reuse them.
//!
//! - O(log64 N) get (at most 11 levels for a 64-bit hash)
//! - O(log64 N) insert
//! - O(log64 N) remove
//! - O(1) len and `is_empty`
//!
//! # Examples
//!
//! ```rust
//! use datoms::persistent::PersistentHashMap;
//!
//! let map = PersistentHashMap::new()
//!     .insert(1, 0x11, "one")
//!     .insert(2, 0x22, "two");
//!
//! assert_eq!(map.get(&1, 0x11), Some(&"one"));
//! assert_eq!(map.get(&2, 0x22), Some(&"two"));
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.insert(1, 0x11, "uno");
//! assert_eq!(map.get(&1, 0x11), Some(&"one"));
//! assert_eq!(updated.get(&1, 0x11), Some(&"uno"));
//! ```
//!
//! # Internal Structure
//!
//! The HAMT uses:
//! - 64-way branching (6 bits per level) with a `u64` population bitmap
//! - Leaf nodes holding one `(key, hash, value)` triple
//! - Bucket nodes for two or more keys sharing the full 64-bit hash
//! - Structural sharing via `ReferenceCounter`

use std::borrow::Borrow;
use std::fmt;
use std::iter::FromIterator;

use super::ReferenceCounter;
use super::cow;
use crate::hash::Hashed;

// =============================================================================
// Constants
// =============================================================================

/// Bits of the hash consumed per level in the trie
const BITS_PER_LEVEL: u32 = 6;

/// Branching factor (2^6 = 64)
const BRANCHING_FACTOR: u64 = 1 << BITS_PER_LEVEL;

/// Bit mask for extracting index within a node
const MASK: u64 = BRANCHING_FACTOR - 1;

/// Extracts the 6-bit slice of `hash` used at `shift`.
#[inline]
const fn fragment(hash: u64, shift: u32) -> u32 {
    debug_assert!(shift < u64::BITS);
    ((hash >> shift) & MASK) as u32
}

/// Returns the bitmap bit for `hash` at `shift`.
#[inline]
const fn bit_position(hash: u64, shift: u32) -> u64 {
    1 << fragment(hash, shift)
}

/// Position of `bit` within the densely packed child array.
#[inline]
const fn compact_index(bitmap: u64, bit: u64) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

// =============================================================================
// Node Definition
// =============================================================================

/// Internal node structure for the HAMT.
#[derive(Clone)]
enum Node<K, V> {
    /// Bitmap-indexed branch; one child per set bit, ordered low to high
    Branch {
        bitmap: u64,
        children: Vec<ReferenceCounter<Self>>,
    },
    /// Single key-value entry
    Leaf { hash: u64, key: K, value: V },
    /// Two or more entries sharing the same full hash
    Bucket { hash: u64, entries: Vec<(K, V)> },
}

/// Outcome of removing a key from a subtree.
enum Removal<K, V> {
    /// The key was not present; the subtree is untouched.
    Unchanged,
    /// The key was removed; `None` means the subtree is now empty.
    Removed(Option<ReferenceCounter<Node<K, V>>>),
}

impl<K, V> Node<K, V> {
    /// Looks `key` up below `node`.
    fn lookup<'a, Q>(mut node: &'a Self, key: &Q, hash: u64) -> Option<&'a V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut shift = 0;
        loop {
            match node {
                Self::Branch { bitmap, children } => {
                    let bit = bit_position(hash, shift);
                    if bitmap & bit == 0 {
                        return None;
                    }
                    node = children[compact_index(*bitmap, bit)].as_ref();
                    shift += BITS_PER_LEVEL;
                }
                Self::Leaf {
                    hash: leaf_hash,
                    key: leaf_key,
                    value,
                } => {
                    return (*leaf_hash == hash && leaf_key.borrow() == key).then_some(value);
                }
                Self::Bucket {
                    hash: bucket_hash,
                    entries,
                } => {
                    if *bucket_hash != hash {
                        return None;
                    }
                    return entries
                        .iter()
                        .find(|(entry_key, _)| entry_key.borrow() == key)
                        .map(|(_, value)| value);
                }
            }
        }
    }
}

impl<K: Clone + Eq, V: Clone + PartialEq> Node<K, V> {
    /// Creates a root branch holding a single leaf.
    fn singleton_branch(key: K, hash: u64, value: V) -> Self {
        Self::Branch {
            bitmap: bit_position(hash, 0),
            children: vec![ReferenceCounter::new(Self::Leaf { hash, key, value })],
        }
    }

    /// Wraps an existing leaf or bucket in a branch keyed on its own hash at `shift`.
    fn split(node: &ReferenceCounter<Self>, existing_hash: u64, shift: u32) -> ReferenceCounter<Self> {
        ReferenceCounter::new(Self::Branch {
            bitmap: bit_position(existing_hash, shift),
            children: vec![node.clone()],
        })
    }

    /// Copy-on-write insert.
    ///
    /// Returns `node` itself (same pointer) when nothing changed. `inserted` is
    /// incremented once for every key that was not present before.
    fn insert(
        node: &ReferenceCounter<Self>,
        key: K,
        hash: u64,
        shift: u32,
        value: V,
        inserted: &mut usize,
    ) -> ReferenceCounter<Self> {
        match node.as_ref() {
            Self::Branch { bitmap, children } => {
                let bit = bit_position(hash, shift);
                let index = compact_index(*bitmap, bit);

                if bitmap & bit == 0 {
                    *inserted += 1;
                    let leaf = ReferenceCounter::new(Self::Leaf { hash, key, value });
                    return ReferenceCounter::new(Self::Branch {
                        bitmap: bitmap | bit,
                        children: cow::insert(children, index, leaf),
                    });
                }

                let child = &children[index];
                let updated =
                    Self::insert(child, key, hash, shift + BITS_PER_LEVEL, value, inserted);
                if ReferenceCounter::ptr_eq(child, &updated) {
                    return node.clone();
                }
                ReferenceCounter::new(Self::Branch {
                    bitmap: *bitmap,
                    children: cow::update(children, index, updated),
                })
            }
            Self::Leaf {
                hash: leaf_hash,
                key: leaf_key,
                value: leaf_value,
            } => {
                if *leaf_hash != hash {
                    let split = Self::split(node, *leaf_hash, shift);
                    return Self::insert(&split, key, hash, shift, value, inserted);
                }
                if *leaf_key == key {
                    if *leaf_value == value {
                        return node.clone();
                    }
                    return ReferenceCounter::new(Self::Leaf { hash, key, value });
                }
                *inserted += 1;
                log::trace!("hash collision at {hash:#018x}, creating bucket");
                ReferenceCounter::new(Self::Bucket {
                    hash,
                    entries: vec![(leaf_key.clone(), leaf_value.clone()), (key, value)],
                })
            }
            Self::Bucket {
                hash: bucket_hash,
                entries,
            } => {
                if *bucket_hash != hash {
                    let split = Self::split(node, *bucket_hash, shift);
                    return Self::insert(&split, key, hash, shift, value, inserted);
                }
                let Some(position) = entries.iter().position(|(entry_key, _)| *entry_key == key)
                else {
                    *inserted += 1;
                    return ReferenceCounter::new(Self::Bucket {
                        hash,
                        entries: cow::append(entries, [(key, value)]),
                    });
                };
                if entries[position].1 == value {
                    return node.clone();
                }
                ReferenceCounter::new(Self::Bucket {
                    hash,
                    entries: cow::update(entries, position, (key, value)),
                })
            }
        }
    }

    /// Copy-on-write remove.
    fn remove<Q>(node: &ReferenceCounter<Self>, key: &Q, hash: u64, shift: u32) -> Removal<K, V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        match node.as_ref() {
            Self::Branch { bitmap, children } => {
                let bit = bit_position(hash, shift);
                if bitmap & bit == 0 {
                    return Removal::Unchanged;
                }
                let index = compact_index(*bitmap, bit);

                // Single-child branches left behind here are not merged into
                // their parent; lookups stay correct, only depth is wasted.
                match Self::remove(&children[index], key, hash, shift + BITS_PER_LEVEL) {
                    Removal::Unchanged => Removal::Unchanged,
                    Removal::Removed(None) if children.len() == 1 => Removal::Removed(None),
                    Removal::Removed(None) => {
                        Removal::Removed(Some(ReferenceCounter::new(Self::Branch {
                            bitmap: bitmap & !bit,
                            children: cow::delete(children, index, index + 1),
                        })))
                    }
                    Removal::Removed(Some(child)) => {
                        Removal::Removed(Some(ReferenceCounter::new(Self::Branch {
                            bitmap: *bitmap,
                            children: cow::update(children, index, child),
                        })))
                    }
                }
            }
            Self::Leaf {
                hash: leaf_hash,
                key: leaf_key,
                ..
            } => {
                if *leaf_hash == hash && leaf_key.borrow() == key {
                    Removal::Removed(None)
                } else {
                    Removal::Unchanged
                }
            }
            Self::Bucket {
                hash: bucket_hash,
                entries,
            } => {
                if *bucket_hash != hash {
                    return Removal::Unchanged;
                }
                let Some(position) = entries
                    .iter()
                    .position(|(entry_key, _)| entry_key.borrow() == key)
                else {
                    return Removal::Unchanged;
                };
                if entries.len() == 2 {
                    let (survivor_key, survivor_value) = &entries[1 - position];
                    return Removal::Removed(Some(ReferenceCounter::new(Self::Leaf {
                        hash,
                        key: survivor_key.clone(),
                        value: survivor_value.clone(),
                    })));
                }
                Removal::Removed(Some(ReferenceCounter::new(Self::Bucket {
                    hash,
                    entries: cow::delete(entries, position, position + 1),
                })))
            }
        }
    }

    /// In-place insert used by [`TransientHashMap`].
    ///
    /// Nodes held only by the transient are mutated directly; shared nodes
    /// are cloned first by `make_mut`, leaving every snapshot untouched.
    fn insert_mut(
        node: &mut ReferenceCounter<Self>,
        key: K,
        hash: u64,
        shift: u32,
        value: V,
        inserted: &mut usize,
    ) {
        let current = ReferenceCounter::make_mut(node);
        Self::insert_in_place(current, key, hash, shift, value, inserted);
    }

    fn insert_in_place(
        current: &mut Self,
        key: K,
        hash: u64,
        shift: u32,
        value: V,
        inserted: &mut usize,
    ) {
        match current {
            Self::Branch { bitmap, children } => {
                let bit = bit_position(hash, shift);
                let index = compact_index(*bitmap, bit);
                if *bitmap & bit == 0 {
                    *inserted += 1;
                    *bitmap |= bit;
                    children.insert(index, ReferenceCounter::new(Self::Leaf { hash, key, value }));
                } else {
                    Self::insert_mut(
                        &mut children[index],
                        key,
                        hash,
                        shift + BITS_PER_LEVEL,
                        value,
                        inserted,
                    );
                }
            }
            Self::Leaf {
                hash: leaf_hash,
                key: leaf_key,
                value: leaf_value,
            } if *leaf_hash == hash => {
                if *leaf_key == key {
                    *leaf_value = value;
                    return;
                }
                *inserted += 1;
                log::trace!("hash collision at {hash:#018x}, creating bucket");
                let entries = vec![(leaf_key.clone(), leaf_value.clone()), (key, value)];
                *current = Self::Bucket { hash, entries };
            }
            Self::Bucket {
                hash: bucket_hash,
                entries,
            } if *bucket_hash == hash => {
                let Some((_, entry_value)) =
                    entries.iter_mut().find(|(entry_key, _)| *entry_key == key)
                else {
                    *inserted += 1;
                    entries.push((key, value));
                    return;
                };
                *entry_value = value;
            }
            Self::Leaf {
                hash: existing_hash,
                ..
            }
            | Self::Bucket {
                hash: existing_hash,
                ..
            } => {
                let bitmap = bit_position(*existing_hash, shift);
                let displaced = std::mem::replace(
                    current,
                    Self::Branch {
                        bitmap,
                        children: Vec::with_capacity(2),
                    },
                );
                if let Self::Branch { children, .. } = current {
                    children.push(ReferenceCounter::new(displaced));
                }
                Self::insert_in_place(current, key, hash, shift, value, inserted);
            }
        }
    }

    /// In-place remove used by [`TransientHashMap`].
    ///
    /// Returns the removed value and whether `current` is now empty, or
    /// `None` if `key` is absent.
    fn remove_in_place<Q>(current: &mut Self, key: &Q, hash: u64, shift: u32) -> Option<(V, bool)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        match current {
            Self::Branch { bitmap, children } => {
                let bit = bit_position(hash, shift);
                if *bitmap & bit == 0 {
                    return None;
                }
                let index = compact_index(*bitmap, bit);
                let child = ReferenceCounter::make_mut(&mut children[index]);
                let (value, emptied) =
                    Self::remove_in_place(child, key, hash, shift + BITS_PER_LEVEL)?;
                if emptied {
                    children.remove(index);
                    *bitmap &= !bit;
                }
                Some((value, children.is_empty()))
            }
            Self::Leaf {
                hash: leaf_hash,
                key: leaf_key,
                value,
            } => (*leaf_hash == hash && (*leaf_key).borrow() == key).then(|| (value.clone(), true)),
            Self::Bucket {
                hash: bucket_hash,
                entries,
            } => {
                if *bucket_hash != hash {
                    return None;
                }
                let position = entries
                    .iter()
                    .position(|(entry_key, _)| entry_key.borrow() == key)?;
                let (_, value) = entries.remove(position);
                if entries.len() == 1
                    && let Some((survivor_key, survivor_value)) = entries.pop()
                {
                    *current = Self::Leaf {
                        hash,
                        key: survivor_key,
                        value: survivor_value,
                    };
                }
                Some((value, false))
            }
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> Node<K, V> {
    /// Appends an indented dump of the subtree to `output`.
    fn write_tree(&self, level: usize, output: &mut String) {
        match self {
            Self::Branch { bitmap, children } => {
                output.push_str(&format!("(:bitmap {bitmap:#x} ["));
                for child in children {
                    output.push('\n');
                    output.push_str(&"  ".repeat(level + 1));
                    child.write_tree(level + 1, output);
                }
                output.push('\n');
                output.push_str(&"  ".repeat(level));
                output.push_str("])");
            }
            Self::Leaf { hash, key, value } => {
                output.push_str(&format!("{{{key:?} {hash} {value:?}}}"));
            }
            Self::Bucket { hash, entries } => {
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| format!("{{{key:?} {hash} {value:?}}}"))
                    .collect();
                output.push_str(&format!("(:bucket [{}])", entries.join(" ")));
            }
        }
    }
}

// =============================================================================
// PersistentHashMap Definition
// =============================================================================

/// A persistent (immutable) hash map based on HAMT.
///
/// Keys are compared with `Eq`; hashes are supplied by the caller. Values
/// must be `PartialEq` so that writing an identical value is a no-op that
/// returns a map sharing the same root (see [`ptr_eq`](Self::ptr_eq)).
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log64 N)        |
/// | `insert`       | O(log64 N)        |
/// | `remove`       | O(log64 N)        |
/// | `len`          | O(1)              |
///
/// # Examples
///
/// ```rust
/// use datoms::persistent::PersistentHashMap;
///
/// let map = PersistentHashMap::new().insert("foo", 7, "bar");
/// assert_eq!(map.len(), 1);
/// assert_eq!(map.get("foo", 7), Some(&"bar"));
/// ```
pub struct PersistentHashMap<K, V> {
    /// Root branch; `None` for the empty map
    root: Option<ReferenceCounter<Node<K, V>>>,
    /// Number of entries
    size: usize,
}

impl<K, V> PersistentHashMap<K, V> {
    /// Creates a new empty map.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: None,
            size: 0,
        }
    }

    /// Returns the number of entries in the map.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns a reference to the value stored for `key`.
    ///
    /// `hash` must be the hash that was supplied when the key was inserted.
    /// A matching hash is necessary but not sufficient: keys are compared too.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use datoms::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("hello".to_string(), 1, 42);
    ///
    /// // Can use &str to look up String keys
    /// assert_eq!(map.get("hello", 1), Some(&42));
    /// assert_eq!(map.get("hello", 2), None);
    /// assert_eq!(map.get("world", 1), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q, hash: u64) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        Node::lookup(self.root.as_deref()?, key, hash)
    }

    /// Returns `true` if the map contains a value for `key`.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q, hash: u64) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.get(key, hash).is_some()
    }

    /// Looks up a key that carries its own hash.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use datoms::hash::KeyHasher;
    /// use datoms::persistent::PersistentHashMap;
    ///
    /// let hasher = KeyHasher::with_seeds(1, 2, 3, 4);
    /// let ident = hasher.key("db/ident");
    /// let map = PersistentHashMap::new().insert_hashed(ident, 10);
    ///
    /// assert_eq!(map.get_hashed(&ident), Some(&10));
    /// assert_eq!(map.get("db/ident", ident.hash()), Some(&10));
    /// ```
    #[must_use]
    pub fn get_hashed(&self, key: &Hashed<K>) -> Option<&V>
    where
        K: Eq,
    {
        self.get(key.key(), key.hash())
    }

    /// Returns `true` if both maps share the same root node.
    ///
    /// A write that changes nothing returns a map for which this holds, which
    /// lets callers detect "no change" without comparing contents.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use datoms::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert(1, 1, "a");
    /// assert!(map.insert(1, 1, "a").ptr_eq(&map));
    /// assert!(!map.insert(1, 1, "b").ptr_eq(&map));
    /// ```
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(left), Some(right)) => ReferenceCounter::ptr_eq(left, right),
            (None, None) => true,
            _ => false,
        }
    }

    /// Returns an iterator over `(key, hash, value)` triples in trie order.
    #[must_use]
    pub fn iter(&self) -> PersistentHashMapIterator<'_, K, V> {
        PersistentHashMapIterator {
            stack: self
                .root
                .iter()
                .map(|root| std::slice::from_ref(root).iter())
                .collect(),
            bucket: None,
            remaining: self.size,
        }
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _, _)| key)
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, _, value)| value)
    }

    /// Converts the map into a transient for bulk updates.
    ///
    /// Nodes stay shared with any other snapshot until the transient writes
    /// through them.
    #[must_use]
    pub fn transient(self) -> TransientHashMap<K, V> {
        TransientHashMap {
            root: self.root,
            size: self.size,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> PersistentHashMap<K, V> {
    /// Renders the trie layout, one node per line.
    ///
    /// Intended for diagnosing failures; the format is not stable.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use datoms::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert(1, 0, "foo").insert(2, 0, "bar");
    /// assert!(map.tree_string().contains(":bucket"));
    /// ```
    #[must_use]
    pub fn tree_string(&self) -> String {
        let mut output = String::from("\n");
        if let Some(root) = &self.root {
            root.write_tree(0, &mut output);
        }
        output
    }
}

impl<K: Clone + Eq, V: Clone + PartialEq> PersistentHashMap<K, V> {
    /// Returns a map with `key` bound to `value`.
    ///
    /// If `key` is already bound to an equal value, the returned map shares
    /// the root of `self` and no node is allocated.
    ///
    /// # Complexity
    ///
    /// O(log64 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use datoms::persistent::PersistentHashMap;
    ///
    /// let map1 = PersistentHashMap::new().insert("key", 9, 1);
    /// let map2 = map1.insert("key", 9, 2);
    ///
    /// assert_eq!(map1.get("key", 9), Some(&1)); // Original unchanged
    /// assert_eq!(map2.get("key", 9), Some(&2)); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, hash: u64, value: V) -> Self {
        let Some(root) = &self.root else {
            return Self {
                root: Some(ReferenceCounter::new(Node::singleton_branch(key, hash, value))),
                size: 1,
            };
        };
        let mut inserted = 0;
        let root = Node::insert(root, key, hash, 0, value, &mut inserted);
        Self {
            root: Some(root),
            size: self.size + inserted,
        }
    }

    /// Returns a map without `key`.
    ///
    /// Removing an absent key returns a map sharing the root of `self`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use datoms::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("a", 1, 1).insert("b", 2, 2);
    /// let removed = map.remove("a", 1);
    ///
    /// assert_eq!(removed.len(), 1);
    /// assert_eq!(removed.get("a", 1), None);
    /// assert_eq!(map.get("a", 1), Some(&1));
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q, hash: u64) -> Self
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let Some(root) = &self.root else {
            return self.clone();
        };
        match Node::remove(root, key, hash, 0) {
            Removal::Unchanged => self.clone(),
            Removal::Removed(root) => Self {
                root,
                size: self.size - 1,
            },
        }
    }

    /// [`insert`](Self::insert) for a key that carries its own hash.
    #[must_use]
    pub fn insert_hashed(&self, key: Hashed<K>, value: V) -> Self {
        let (key, hash) = key.into_parts();
        self.insert(key, hash, value)
    }

    /// [`remove`](Self::remove) for a key that carries its own hash.
    #[must_use]
    pub fn remove_hashed(&self, key: &Hashed<K>) -> Self {
        self.remove(key.key(), key.hash())
    }
}

// =============================================================================
// TransientHashMap Definition
// =============================================================================

/// A single-owner, in-place mutable builder for [`PersistentHashMap`].
///
/// All mutators take `&mut self`, and [`immutable`](Self::immutable) consumes
/// the transient, so a snapshot that has been handed out can never be
/// changed through it afterwards.
///
/// # Examples
///
/// ```rust
/// use datoms::persistent::TransientHashMap;
///
/// let mut transient = TransientHashMap::new();
/// for index in 0..64u64 {
///     transient.insert(index, index, index * index);
/// }
/// let map = transient.immutable();
///
/// assert_eq!(map.len(), 64);
/// assert_eq!(map.get(&7, 7), Some(&49));
/// ```
pub struct TransientHashMap<K, V> {
    root: Option<ReferenceCounter<Node<K, V>>>,
    size: usize,
}

impl<K, V> TransientHashMap<K, V> {
    /// Creates a new empty transient map.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: None,
            size: 0,
        }
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the transient contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns a reference to the value stored for `key`.
    #[must_use]
    pub fn get<Q>(&self, key: &Q, hash: u64) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        Node::lookup(self.root.as_deref()?, key, hash)
    }

    /// Returns `true` if the transient contains a value for `key`.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q, hash: u64) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.get(key, hash).is_some()
    }

    /// Looks up a key that carries its own hash.
    #[must_use]
    pub fn get_hashed(&self, key: &Hashed<K>) -> Option<&V>
    where
        K: Eq,
    {
        self.get(key.key(), key.hash())
    }

    /// Converts the transient into a persistent map, consuming it.
    #[must_use]
    pub fn immutable(self) -> PersistentHashMap<K, V> {
        log::trace!("transient map of {} entries made immutable", self.size);
        PersistentHashMap {
            root: self.root,
            size: self.size,
        }
    }
}

impl<K: Clone + Eq, V: Clone + PartialEq> TransientHashMap<K, V> {
    /// Binds `key` to `value` in place.
    pub fn insert(&mut self, key: K, hash: u64, value: V) {
        let Some(root) = &mut self.root else {
            self.root = Some(ReferenceCounter::new(Node::singleton_branch(
                key, hash, value,
            )));
            self.size = 1;
            return;
        };
        let mut inserted = 0;
        Node::insert_mut(root, key, hash, 0, value, &mut inserted);
        self.size += inserted;
    }

    /// Removes `key` in place, returning its value if it was present.
    pub fn remove<Q>(&mut self, key: &Q, hash: u64) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let root = self.root.as_mut()?;
        let (value, emptied) =
            Node::remove_in_place(ReferenceCounter::make_mut(root), key, hash, 0)?;
        if emptied {
            self.root = None;
        }
        self.size -= 1;
        Some(value)
    }

    /// [`insert`](Self::insert) for a key that carries its own hash.
    pub fn insert_hashed(&mut self, key: Hashed<K>, value: V) {
        let (key, hash) = key.into_parts();
        self.insert(key, hash, value);
    }

    /// [`remove`](Self::remove) for a key that carries its own hash.
    pub fn remove_hashed(&mut self, key: &Hashed<K>) -> Option<V> {
        self.remove(key.key(), key.hash())
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the entries of a [`PersistentHashMap`].
///
/// Yields `(key, hash, value)` in trie order, which is unrelated to key order.
pub struct PersistentHashMapIterator<'a, K, V> {
    stack: Vec<std::slice::Iter<'a, ReferenceCounter<Node<K, V>>>>,
    bucket: Option<(u64, std::slice::Iter<'a, (K, V)>)>,
    remaining: usize,
}

impl<'a, K, V> Iterator for PersistentHashMapIterator<'a, K, V> {
    type Item = (&'a K, u64, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((hash, entries)) = &mut self.bucket {
                if let Some((key, value)) = entries.next() {
                    self.remaining -= 1;
                    return Some((key, *hash, value));
                }
                self.bucket = None;
            }

            let level = self.stack.last_mut()?;
            let Some(child) = level.next() else {
                self.stack.pop();
                continue;
            };
            match child.as_ref() {
                Node::Branch { children, .. } => self.stack.push(children.iter()),
                Node::Leaf { hash, key, value } => {
                    self.remaining -= 1;
                    return Some((key, *hash, value));
                }
                Node::Bucket { hash, entries } => self.bucket = Some((*hash, entries.iter())),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentHashMapIterator<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Clone for PersistentHashMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            size: self.size,
        }
    }
}

impl<K, V> Default for PersistentHashMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Default for TransientHashMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Eq, V: Clone + PartialEq> FromIterator<(K, u64, V)> for PersistentHashMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, u64, V)>>(iter: I) -> Self {
        let mut transient = TransientHashMap::new();
        transient.extend(iter);
        transient.immutable()
    }
}

impl<K: Clone + Eq, V: Clone + PartialEq> Extend<(K, u64, V)> for TransientHashMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, u64, V)>>(&mut self, iter: I) {
        for (key, hash, value) in iter {
            self.insert(key, hash, value);
        }
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentHashMap<K, V> {
    type Item = (&'a K, u64, &'a V);
    type IntoIter = PersistentHashMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Eq, V: PartialEq> PartialEq for PersistentHashMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, hash, value)| other.get(key, hash) == Some(value))
    }
}

impl<K: Eq, V: Eq> Eq for PersistentHashMap<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentHashMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_map()
            .entries(self.iter().map(|(key, _, value)| (key, value)))
            .finish()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for TransientHashMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TransientHashMap")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K: serde::Serialize, V: serde::Serialize> serde::Serialize for PersistentHashMap<K, V> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for entry in self {
            seq.serialize_element(&entry)?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentHashMapVisitor<K, V> {
    marker: std::marker::PhantomData<(K, V)>,
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::de::Visitor<'de> for PersistentHashMapVisitor<K, V>
where
    K: serde::Deserialize<'de> + Clone + Eq,
    V: serde::Deserialize<'de> + Clone + PartialEq,
{
    type Value = PersistentHashMap<K, V>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence of (key, hash, value) triples")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut transient = TransientHashMap::new();
        while let Some((key, hash, value)) = seq.next_element::<(K, u64, V)>()? {
            transient.insert(key, hash, value);
        }
        Ok(transient.immutable())
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::Deserialize<'de> for PersistentHashMap<K, V>
where
    K: serde::Deserialize<'de> + Clone + Eq,
    V: serde::Deserialize<'de> + Clone + PartialEq,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(PersistentHashMapVisitor {
            marker: std::marker::PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::KeyHasher;
    use rstest::rstest;

    /// Walks the trie and checks the structural invariants.
    fn assert_well_formed<K, V>(map: &PersistentHashMap<K, V>) {
        fn walk<K, V>(node: &Node<K, V>, shift: u32) -> usize {
            match node {
                Node::Branch { bitmap, children } => {
                    assert_eq!(bitmap.count_ones() as usize, children.len());
                    assert!(!children.is_empty(), "empty branch left in trie");
                    children
                        .iter()
                        .map(|child| walk(child, shift + BITS_PER_LEVEL))
                        .sum()
                }
                Node::Leaf { .. } => 1,
                Node::Bucket { entries, .. } => {
                    assert!(entries.len() >= 2, "bucket with fewer than two entries");
                    entries.len()
                }
            }
        }
        let counted = map.root.as_deref().map_or(0, |root| walk(root, 0));
        assert_eq!(counted, map.len());
    }

    #[rstest]
    fn test_fragment_and_index() {
        assert_eq!(fragment(0b1_000001, 0), 1);
        assert_eq!(fragment(0b1_000001, 6), 1);
        assert_eq!(fragment(u64::MAX, 60), 0b1111);
        assert_eq!(compact_index(0b1011, 0b1000), 2);
        assert_eq!(compact_index(0b1011, 0b0001), 0);
    }

    #[rstest]
    fn test_new_map_has_no_root() {
        let map: PersistentHashMap<i32, i32> = PersistentHashMap::new();
        assert!(map.root.is_none());
        assert!(map.is_empty());
        assert_eq!(map.get(&1, 1), None);
    }

    #[rstest]
    fn test_collision_creates_bucket() {
        let map = PersistentHashMap::new()
            .insert(1, 0, "foo")
            .insert(2, 0, "bar")
            .insert(3, 0, "baz");

        let Some(root) = map.root.as_deref() else {
            panic!("root missing");
        };
        let Node::Branch { children, .. } = root else {
            panic!("root must be a branch");
        };
        assert!(matches!(children[0].as_ref(), Node::Bucket { entries, .. } if entries.len() == 3));
        assert_well_formed(&map);
    }

    #[rstest]
    fn test_distinct_hash_splits_bucket() {
        let map = PersistentHashMap::new()
            .insert(1, 0, "foo")
            .insert(2, 0, "bar")
            .insert(3, 0, "baz")
            .insert(4, BRANCHING_FACTOR, "qux");

        assert_eq!(map.len(), 4);
        assert_eq!(map.get(&1, 0), Some(&"foo"));
        assert_eq!(map.get(&2, 0), Some(&"bar"));
        assert_eq!(map.get(&3, 0), Some(&"baz"));
        assert_eq!(map.get(&4, BRANCHING_FACTOR), Some(&"qux"));
        assert_well_formed(&map);
    }

    #[rstest]
    fn test_bucket_update_replaces_value() {
        let map = PersistentHashMap::new()
            .insert(1, 0, "foo")
            .insert(2, 0, "bar")
            .insert(2, 0, "BAR");

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&2, 0), Some(&"BAR"));
        assert!(map.insert(2, 0, "BAR").ptr_eq(&map));
    }

    #[rstest]
    fn test_bucket_of_two_collapses_to_leaf_on_remove() {
        let map = PersistentHashMap::new().insert(1, 0, "foo").insert(2, 0, "bar");
        let removed = map.remove(&1, 0);

        assert_eq!(removed.len(), 1);
        assert_eq!(removed.get(&2, 0), Some(&"bar"));
        assert_well_formed(&removed);
    }

    #[rstest]
    fn test_removing_last_key_clears_root() {
        let map = PersistentHashMap::new().insert(1, 5, 1);
        let removed = map.remove(&1, 5);
        assert!(removed.root.is_none());
        assert!(removed.is_empty());
    }

    #[rstest]
    fn test_remove_absent_key_shares_root() {
        let map = PersistentHashMap::new().insert(1, 5, 1);
        let removed = map.remove(&2, 5);
        assert!(removed.ptr_eq(&map));
        assert_eq!(removed.len(), 1);
        let removed = map.remove(&1, 6);
        assert!(removed.ptr_eq(&map));
    }

    #[rstest]
    fn test_deep_split_on_shared_low_bits() {
        // The two hashes agree on the first ten fragments and differ only in
        // the top four bits, forcing a chain of single-child branches.
        let low = 0x0123_4567_89ab_cdef_u64 & !(0xf << 60);
        let high = low | (0x1 << 60);
        let map = PersistentHashMap::new().insert("low", low, 1).insert("high", high, 2);

        assert_eq!(map.get("low", low), Some(&1));
        assert_eq!(map.get("high", high), Some(&2));
        assert_well_formed(&map);

        let removed = map.remove("high", high);
        assert_eq!(removed.get("low", low), Some(&1));
        assert_well_formed(&removed);
    }

    #[rstest]
    fn test_transient_matches_persistent_structure() {
        let mut transient = TransientHashMap::new();
        let mut persistent = PersistentHashMap::new();
        for index in 0..500u64 {
            let hash = index.wrapping_mul(0x9e37_79b9_7f4a_7c15) % 97;
            transient.insert(index, hash, index);
            persistent = persistent.insert(index, hash, index);
        }
        let built = transient.immutable();
        assert_well_formed(&built);
        assert_eq!(built, persistent);
    }

    #[rstest]
    fn test_transient_remove_in_place() {
        let map: PersistentHashMap<u64, u64> =
            (0..10u64).map(|index| (index, index % 3, index)).collect();
        let mut transient = map.transient();
        assert_eq!(transient.remove(&4, 1), Some(4));
        assert_eq!(transient.remove(&4, 1), None);
        assert_eq!(transient.len(), 9);

        for index in (0..10u64).filter(|index| *index != 4) {
            assert_eq!(transient.remove(&index, index % 3), Some(index));
        }
        let map = transient.immutable();
        assert!(map.is_empty());
        assert!(map.root.is_none());
    }

    #[rstest]
    fn test_tree_string_shows_layout() {
        let map = PersistentHashMap::new().insert(1, 0, 10).insert(2, 1, 20);
        let dump = map.tree_string();
        assert!(dump.starts_with("\n(:bitmap 0x3 ["));
        assert!(dump.contains("{1 0 10}"));
        assert!(dump.contains("{2 1 20}"));
    }

    #[rstest]
    fn test_tree_string_shows_bucket() {
        let map = PersistentHashMap::new().insert(1, 0, 10).insert(2, 0, 20);
        let dump = map.tree_string();
        assert!(dump.contains("(:bucket [{1 0 10} {2 0 20}])"));
        assert_eq!(PersistentHashMap::<i32, i32>::new().tree_string(), "\n");
    }

    #[rstest]
    #[case::bucket_without_key(9, 0)]
    #[case::bucket_hash_mismatch(9, 64)]
    #[case::leaf_hash_mismatch(9, 1 + 64)]
    #[case::empty_slot(9, 5)]
    fn test_transient_remove_absent_key_leaves_map_intact(#[case] key: u64, #[case] hash: u64) {
        let map = PersistentHashMap::new()
            .insert(1u64, 0, 1u64)
            .insert(2, 0, 2)
            .insert(3, 1, 3);
        let mut transient = map.clone().transient();

        assert_eq!(transient.remove(&key, hash), None);
        assert_eq!(transient.len(), 3);

        let after = transient.immutable();
        assert_well_formed(&after);
        assert_eq!(after, map);
    }

    #[rstest]
    fn test_transient_remove_from_bucket_of_three_keeps_bucket() {
        let mut transient = TransientHashMap::new();
        for key in 1..=3u64 {
            transient.insert(key, 0, key);
        }
        assert_eq!(transient.remove(&2, 0), Some(2));

        let map = transient.immutable();
        assert_well_formed(&map);
        assert_eq!(map.len(), 2);
        assert!(map.tree_string().contains("(:bucket [{1 0 1} {3 0 3}])"));
    }

    #[rstest]
    fn test_hashed_entry_points_match_explicit_hashes() {
        let hasher = KeyHasher::with_seeds(1, 2, 3, 4);
        let ident = hasher.key("db/ident");
        let doc = hasher.key("db/doc");

        let map = PersistentHashMap::new()
            .insert_hashed(ident, 10)
            .insert_hashed(doc, 20);
        assert_eq!(map.get_hashed(&ident), Some(&10));
        assert_eq!(map.get(&"db/doc", doc.hash()), Some(&20));

        let removed = map.remove_hashed(&ident);
        assert_eq!(removed.get_hashed(&ident), None);
        assert_eq!(removed.len(), 1);

        let mut transient = map.transient();
        transient.insert_hashed(hasher.key("db/cardinality"), 30);
        assert_eq!(transient.get_hashed(&hasher.key("db/cardinality")), Some(&30));
        assert_eq!(transient.remove_hashed(&doc), Some(20));
        assert_eq!(transient.remove_hashed(&doc), None);
        assert_eq!(transient.len(), 2);
    }
}
