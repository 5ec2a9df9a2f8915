//! # Hashing Primitives
//!
//! The decision core treats every choice as an opaque [`crate::id::Id`] —
//! a 32-byte content hash. This module is the one place that hash function
//! lives, so a future change of primitive (should one ever be needed) stays
//! a one-file diff.
//!
//! We use BLAKE3 exclusively: fast on every platform that matters, and
//! `derive_key` gives us free, correct domain separation for round-seed
//! derivation without hand-rolled prefixing.

pub mod hash;

pub use hash::{blake3_hash, blake3_hash_multi, domain_separated_hash};
