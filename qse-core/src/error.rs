// File:    error.rs
// Author:  apezoo
// Date:    2026-10-18
//
// Description: Error types for every cryptographic layer and for the key ledger.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

use thiserror::Error;

/// Errors that can occur while encrypting, decrypting or managing keys.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed hex, base64, JSON or UTF-8 input.
    #[error("Malformed input: {0}")]
    Format(String),

    /// The GCM authentication tag did not match.
    #[error("Authentication failed: tag mismatch")]
    Authentication,

    /// The ledger cannot provide the requested bytes without reusing pad material.
    #[error("Key exhaustion for '{key_id}': needed {needed} bytes, {available} available")]
    KeyExhaustion {
        /// The key identifier that was asked for.
        key_id: String,
        /// Number of bytes required.
        needed: usize,
        /// Number of bytes that could be handed out safely.
        available: usize,
    },

    /// A fixed-size field had the wrong length.
    #[error("Invalid {field} length: expected {expected}, got {actual}")]
    InvalidLength {
        /// The field that was checked.
        field: &'static str,
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// An input that must be block aligned was not.
    #[error("Invalid {field} length: {actual} is not a multiple of {block}")]
    Misaligned {
        /// The field that was checked.
        field: &'static str,
        /// The block size the input must be a multiple of.
        block: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// The block cipher key is not 16, 24 or 32 bytes long.
    #[error("Unsupported AES key size: {0} bytes")]
    UnsupportedKeySize(usize),

    /// PKCS#7 padding was malformed.
    #[error("Invalid padding")]
    Padding,

    /// A one-time pad was shorter than the data it had to cover.
    #[error("One-time pad too short: needed {needed} bytes, got {available}")]
    ShortPad {
        /// Number of pad bytes required.
        needed: usize,
        /// Number of pad bytes supplied.
        available: usize,
    },

    /// No key has been issued under this identifier.
    #[error("Unknown key id '{0}'")]
    UnknownKey(String),

    /// Reading or writing the ledger store or a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The ledger store or a configuration file could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The operating system random number generator failed.
    #[error("Random number generation failed: {0}")]
    Rng(String),
}

impl Error {
    /// Whether this is a formatting failure, which the envelope protocol recovers locally.
    #[must_use]
    pub const fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }

    /// Whether this is a length failure (wrong-size field or unaligned input).
    #[must_use]
    pub const fn is_length(&self) -> bool {
        matches!(
            self,
            Self::InvalidLength { .. } | Self::Misaligned { .. } | Self::UnsupportedKeySize(_)
        )
    }
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
