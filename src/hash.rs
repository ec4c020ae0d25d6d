//! Hashing collaborator for [`PersistentHashMap`](crate::persistent::PersistentHashMap) keys.
//!
//! The map never hashes keys itself: callers pass a precomputed `u64` with
//! every key. [`KeyHasher`] is the seeded hash function the database layer
//! uses to produce those values, and [`Hashed`] keeps a key next to its hash
//! so that repeated lookups of the same attribute or identifier do not pay
//! for rehashing.
//!
//! A hasher is an explicit value with a caller-managed lifetime; there is no
//! process-wide seed. Two hashers only agree when built from the same seeds.
//!
//! # Examples
//!
//! ```rust
//! use datoms::hash::KeyHasher;
//!
//! let hasher = KeyHasher::with_seeds(1, 2, 3, 4);
//! let again = KeyHasher::with_seeds(1, 2, 3, 4);
//!
//! assert_eq!(hasher.string("db/ident"), again.string("db/ident"));
//! assert_eq!(hasher.int(17), hasher.uint64(17));
//! ```

use std::hash::Hash;

use ahash::RandomState;

/// Seeded 64-bit hash function for map keys.
#[derive(Clone, Debug)]
pub struct KeyHasher {
    state: RandomState,
}

impl KeyHasher {
    /// Creates a hasher with a fresh random seed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RandomState::new(),
        }
    }

    /// Creates a deterministic hasher from four seed words.
    #[must_use]
    pub const fn with_seeds(k0: u64, k1: u64, k2: u64, k3: u64) -> Self {
        Self {
            state: RandomState::with_seeds(k0, k1, k2, k3),
        }
    }

    /// Hashes a byte string.
    #[must_use]
    pub fn bytes(&self, bytes: &[u8]) -> u64 {
        self.state.hash_one(bytes)
    }

    /// Hashes a string by its UTF-8 bytes.
    #[must_use]
    pub fn string(&self, string: &str) -> u64 {
        self.bytes(string.as_bytes())
    }

    /// Hashes a signed integer by the little-endian bytes of its two's complement.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn int(&self, value: i64) -> u64 {
        self.uint64(value as u64)
    }

    /// Hashes the little-endian bytes of a `u16`.
    #[must_use]
    pub fn uint16(&self, value: u16) -> u64 {
        self.bytes(&value.to_le_bytes())
    }

    /// Hashes the little-endian bytes of a `u32`.
    #[must_use]
    pub fn uint32(&self, value: u32) -> u64 {
        self.bytes(&value.to_le_bytes())
    }

    /// Hashes the little-endian bytes of a `u64`.
    #[must_use]
    pub fn uint64(&self, value: u64) -> u64 {
        self.bytes(&value.to_le_bytes())
    }

    /// Hashes any value through its [`Hash`] implementation.
    #[must_use]
    pub fn hash<T: Hash + ?Sized>(&self, value: &T) -> u64 {
        self.state.hash_one(value)
    }

    /// Pairs `key` with its hash.
    #[must_use]
    pub fn key<K: Hash>(&self, key: K) -> Hashed<K> {
        let hash = self.hash(&key);
        Hashed { key, hash }
    }
}

impl Default for KeyHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// A key together with its precomputed hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Hashed<K> {
    key: K,
    hash: u64,
}

impl<K> Hashed<K> {
    /// Pairs `key` with a hash computed elsewhere.
    #[inline]
    #[must_use]
    pub const fn new(key: K, hash: u64) -> Self {
        Self { key, hash }
    }

    /// Returns the key.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> &K {
        &self.key
    }

    /// Returns the precomputed hash.
    #[inline]
    #[must_use]
    pub const fn hash(&self) -> u64 {
        self.hash
    }

    /// Splits into `(key, hash)`.
    #[inline]
    #[must_use]
    pub fn into_parts(self) -> (K, u64) {
        (self.key, self.hash)
    }
}
