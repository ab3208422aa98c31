// File:    lib.rs
// Author:  apezoo
// Date:    2026-10-18
//
// Description: The main library crate for qse-core, orchestrating the block cipher, its modes,
//              the one-time pad, the key ledger and the envelope layering protocol.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! # QSE Core Library
//!
//! This library provides the layered symmetric engine of the quantum-secure email
//! pipeline: an AES block cipher with CBC and GCM modes, a one-time pad backed by a
//! key ledger that refuses pad reuse, and the envelope protocol that nests an opaque
//! post-quantum payload inside an AES layer inside an OTP layer.

/// The AES block cipher and its key schedule.
pub mod block;
/// Cipher block chaining mode with PKCS#7 padding.
pub mod cbc;
/// Explicit configuration for the protocol and the ledger.
pub mod config;
/// Typed wire envelopes for each encryption layer.
pub mod envelope;
/// The error taxonomy shared by every module.
pub mod error;
/// Galois/counter mode authenticated encryption.
pub mod gcm;
/// Fresh key material and key identifiers.
pub mod keygen;
/// The key ledger tracking one-time-pad consumption.
pub mod ledger;
/// One-time-pad encryption and decryption.
pub mod otp;
/// The envelope layering protocol.
pub mod protocol;

pub use error::{Error, Result};
