//! Persistent (immutable) data structures.
//!
//! This module provides the two containers the fact database is built on,
//! both using structural sharing to minimize copying:
//!
//! - [`PersistentHashMap`]: hash array mapped trie keyed by `(key, hash)`
//! - [`PersistentVector`]: bit-partitioned trie vector with a tail buffer
//!
//! Each has a transient sibling ([`TransientHashMap`], [`TransientVector`])
//! for bulk construction, and both are built from the copy-on-write
//! primitives in [`cow`].
//!
//! # Structural Sharing
//!
//! Every write allocates new nodes along the path from the root to the
//! change and reuses every untouched sibling. A value captured at any point
//! stays a complete, independently readable snapshot.
//!
//! # Examples
//!
//! ## `PersistentHashMap`
//!
//! ```rust
//! use datoms::hash::KeyHasher;
//! use datoms::persistent::PersistentHashMap;
//!
//! let hasher = KeyHasher::new();
//! let map = PersistentHashMap::new().insert("foo", hasher.string("foo"), "bar");
//!
//! let updated = map.insert("foo", hasher.string("foo"), "baz");
//! assert_eq!(map.get("foo", hasher.string("foo")), Some(&"bar"));     // Original unchanged
//! assert_eq!(updated.get("foo", hasher.string("foo")), Some(&"baz")); // New version
//! ```
//!
//! ## `PersistentVector`
//!
//! ```rust
//! use datoms::persistent::PersistentVector;
//!
//! let vector: PersistentVector<i32> = (0..100).collect();
//! let extended = vector.push_back(100);
//!
//! assert_eq!(vector.len(), 100);   // Original unchanged
//! assert_eq!(extended.len(), 101); // New version
//! assert_eq!(extended.get(100), Some(&100));
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled (default), this is `std::sync::Arc`,
/// which lets snapshots be shared across threads.
///
/// When the `arc` feature is disabled, this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

pub mod cow;
mod hashmap;
mod vector;

pub use hashmap::PersistentHashMap;
pub use hashmap::PersistentHashMapIterator;
pub use hashmap::TransientHashMap;
pub use vector::PersistentVector;
pub use vector::PersistentVectorRange;
pub use vector::TransientVector;
pub use vector::{DEFAULT_BITS, MAX_BITS, MIN_BITS};

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentHashMap<String, u64>: Send, Sync);
#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentVector<String>: Send, Sync);

// =============================================================================
// Tests
// =============================================================================
