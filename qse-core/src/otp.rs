// File:    otp.rs
// Author:  apezoo
// Date:    2026-10-18
//
// Description: One-time-pad encryption and decryption backed by the key ledger.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! This module contains the one-time-pad operations.

use log::debug;

use crate::ledger::KeySource;
use crate::{Error, Result};

/// The result of a one-time-pad encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpCiphertext {
    /// The ciphertext, always as long as the plaintext.
    pub ciphertext: Vec<u8>,
    /// The key the pad bytes were taken from.
    pub key_id: String,
    /// Number of pad bytes consumed.
    pub bytes_used: usize,
}

/// XORs `data` with the first `data.len()` bytes of `pad`.
///
/// # Errors
///
/// Returns [`Error::ShortPad`] if the pad is shorter than the data.
pub fn xor(data: &[u8], pad: &[u8]) -> Result<Vec<u8>> {
    if pad.len() < data.len() {
        return Err(Error::ShortPad {
            needed: data.len(),
            available: pad.len(),
        });
    }
    Ok(data.iter().zip(pad).map(|(x, y)| x ^ y).collect())
}

/// Encrypts `plaintext` with pad bytes taken from `key_id` and records their consumption.
///
/// The ciphertext is only returned once the ledger has accepted the consumption, so a
/// refused reuse never releases a ciphertext.
///
/// # Errors
///
/// Returns [`Error::KeyExhaustion`] if the ledger refuses the consumption.
pub fn encrypt<S: KeySource + ?Sized>(
    keys: &S,
    plaintext: &[u8],
    key_id: &str,
) -> Result<OtpCiphertext> {
    let pad = keys.get_key(key_id, plaintext.len())?;
    let ciphertext = xor(plaintext, &pad)?;
    keys.mark_used(key_id, plaintext.len())?;
    debug!("OTP-encrypted {} bytes with key '{key_id}'", plaintext.len());
    Ok(OtpCiphertext {
        ciphertext,
        key_id: key_id.to_string(),
        bytes_used: plaintext.len(),
    })
}

/// Decrypts `ciphertext` with `key`. Pure: no ledger bookkeeping happens here.
///
/// # Errors
///
/// Returns [`Error::ShortPad`] if the key is shorter than the ciphertext.
pub fn decrypt(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    xor(ciphertext, key)
}
