//! # datoms
//!
//! Persistent storage primitives for an in-memory fact database.
//!
//! ## Overview
//!
//! The database keeps every version of its indexes readable at once, so its
//! containers never change in place once shared. This crate provides:
//!
//! - **Persistent Hash Map**: a hash array mapped trie whose keys arrive
//!   with a caller-computed 64-bit hash
//! - **Persistent Vector**: an append-only trie vector with a tail buffer
//!   and a configurable branching factor
//! - **Transients**: single-owner builders that batch many writes in place
//!   before freezing into a persistent value
//! - **Copy-on-Write Primitives**: slice helpers the tries are built from
//! - **Key Hashing**: a seeded hash function for producing map keys' hashes
//!
//! ## Feature Flags
//!
//! - `arc` (default): share nodes through `Arc` so snapshots are `Send + Sync`;
//!   without it nodes use `Rc`
//! - `serde`: `Serialize`/`Deserialize` for the persistent containers
//!
//! ## Example
//!
//! ```rust
//! use datoms::prelude::*;
//!
//! let hasher = KeyHasher::with_seeds(1, 2, 3, 4);
//! let attributes = PersistentHashMap::new()
//!     .insert("person/name", hasher.string("person/name"), 10)
//!     .insert("person/age", hasher.string("person/age"), 11);
//!
//! let history: PersistentVector<&str> = ["person/name", "person/age"].into_iter().collect();
//!
//! for name in &history {
//!     assert!(attributes.contains_key(name, hasher.string(name)));
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports the containers and the key hasher.
///
/// # Usage
///
/// ```rust
/// use datoms::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::BoundsError;
    pub use crate::hash::{Hashed, KeyHasher};
    pub use crate::persistent::*;
}

pub mod error;
pub mod hash;
pub mod persistent;
