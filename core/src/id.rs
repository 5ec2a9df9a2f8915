//! # Identifier
//!
//! Every choice the consensus core votes over — a block, a vertex, a
//! bootstrap frontier entry — is named by a 32-byte opaque content hash.
//! The core never interprets the bytes; hashing a payload into an `Id` is
//! the VM's job (see [`crate::consensus::interfaces::Vm`]).
//!
//! `Id` is `Copy` and total-ordered bytewise, which is what lets
//! [`crate::consensus::bag::Bag::mode`] break ties deterministically and
//! lets `Id` live as a `HashMap`/`BTreeMap` key without extra ceremony.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 32-byte opaque content hash identifying a block, vertex, or other
/// voteable choice.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Id([u8; 32]);

impl Id {
    /// The zero identifier, used as a sentinel (e.g. "no parent").
    pub const EMPTY: Id = Id([0u8; 32]);

    /// Wrap raw bytes as an `Id`.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Id(bytes)
    }

    /// Borrow the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns `true` if this is the zero/empty identifier.
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Hash arbitrary content into an `Id`. Convenience for tests and demo
    /// harnesses that need to mint identifiers without a real VM.
    pub fn from_content(data: &[u8]) -> Self {
        Id(crate::crypto::blake3_hash(data))
    }

    /// Hex-encode the identifier, e.g. for logging.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({}…)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for Id {
    fn default() -> Self {
        Id::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero_bytes() {
        assert_eq!(Id::EMPTY.as_bytes(), &[0u8; 32]);
        assert!(Id::EMPTY.is_empty());
    }

    #[test]
    fn total_order_is_bytewise() {
        let a = Id::from_bytes([0u8; 32]);
        let mut high = [0u8; 32];
        high[31] = 1;
        let b = Id::from_bytes(high);
        assert!(a < b);
    }

    #[test]
    fn from_content_is_deterministic() {
        let a = Id::from_content(b"block-payload");
        let b = Id::from_content(b"block-payload");
        assert_eq!(a, b);
        assert_ne!(a, Id::from_content(b"other-payload"));
    }

    #[test]
    fn hex_round_trips_length() {
        let id = Id::from_content(b"x");
        assert_eq!(id.to_hex().len(), 64);
    }
}
