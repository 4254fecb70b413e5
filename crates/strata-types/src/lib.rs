//! Shared types and identifiers for Strata.
//!
//! This crate defines the core types used across the Strata workspace:
//! identifiers ([`BlockId`], [`BundleId`], [`DictionaryId`]) and the
//! changelog data model ([`Changelog`], [`BundleSlot`]).
//!
//! All identifiers are SHA-256 digests rendered as lowercase hex. They
//! serialize as hex strings so the changelog stays a plain JSON document.

pub mod changelog;

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

pub use changelog::{
    BundleSlot, Changelog, ChangelogError, BLOCKS_DIR, BUNDLES_DIR, CHANGELOG_FILE_NAME,
    DICTIONARY_FILE_NAME, VERSION_FILE_NAME,
};

// ---------------------------------------------------------------------------
// ID types
// ---------------------------------------------------------------------------

/// Error parsing a hex identifier string.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid id: expected 64 lowercase hex characters, got {0:?}")]
pub struct ParseIdError(String);

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Create an ID by hashing arbitrary data with SHA-256.
            pub fn from_data(data: &[u8]) -> Self {
                Self(Sha256::digest(data).into())
            }

            /// Return the raw 32-byte representation.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// The two-character shard prefix used in the block store layout.
            pub fn shard_prefix(&self) -> String {
                format!("{:02x}", self.0[0])
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                hex_to_bytes(s)
                    .map(Self)
                    .ok_or_else(|| ParseIdError(truncate_for_error(s)))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(D::Error::custom)
            }
        }
    };
}

define_id!(
    /// Content-addressed identifier for a block: `sha256(uncompressed_bytes)`.
    ///
    /// Doubles as the block's filename in the block store.
    BlockId
);

define_id!(
    /// Content-addressed identifier for a bundle: `sha256` of the
    /// concatenated uncompressed payloads of its member blocks, in order.
    BundleId
);

define_id!(
    /// Identifier for a trained compression dictionary:
    /// `sha256(dictionary_bytes)`.
    DictionaryId
);

/// Decode a 64-character lowercase hex string into a `[u8; 32]`.
///
/// Uppercase digits are rejected: changelog ids are canonical lowercase,
/// and accepting both would make the same id appear under two spellings.
fn hex_to_bytes(hex: &str) -> Option<[u8; 32]> {
    if hex.len() != 64 {
        return None;
    }
    let mut bytes = [0u8; 32];
    for (i, byte) in bytes.iter_mut().enumerate() {
        let hi = hex_nibble(hex.as_bytes()[i * 2])?;
        let lo = hex_nibble(hex.as_bytes()[i * 2 + 1])?;
        *byte = (hi << 4) | lo;
    }
    Some(bytes)
}

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

fn truncate_for_error(s: &str) -> String {
    let mut out: String = s.chars().take(80).collect();
    if out.len() < s.len() {
        out.push('…');
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
