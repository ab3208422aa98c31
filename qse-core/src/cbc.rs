// File:    cbc.rs
// Author:  apezoo
// Date:    2026-10-18
//
// Description: AES in cipher block chaining mode with PKCS#7 padding.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Confidentiality-only CBC mode. Nothing here authenticates the ciphertext.

use crate::block::{BLOCK_SIZE, Block, KeySchedule};
use crate::{Error, Result};

/// Appends 1..=16 bytes, each equal to the number of bytes appended.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn pad(plaintext: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - plaintext.len() % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(plaintext.len() + pad_len);
    padded.extend_from_slice(plaintext);
    padded.resize(plaintext.len() + pad_len, pad_len as u8);
    padded
}

/// Strips PKCS#7 padding.
///
/// # Errors
///
/// Returns [`Error::Padding`] if the input is empty, the trailing byte is zero or larger
/// than the block size, or the padding bytes are not all equal to it.
pub fn unpad(padded: &[u8]) -> Result<Vec<u8>> {
    let &last = padded.last().ok_or(Error::Padding)?;
    let pad_len = usize::from(last);
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > padded.len() {
        return Err(Error::Padding);
    }
    let (body, padding) = padded.split_at(padded.len() - pad_len);
    if padding.iter().any(|&b| b != last) {
        return Err(Error::Padding);
    }
    Ok(body.to_vec())
}

fn check_iv(iv: &[u8]) -> Result<Block> {
    Block::try_from(iv).map_err(|_| Error::InvalidLength {
        field: "CBC IV",
        expected: BLOCK_SIZE,
        actual: iv.len(),
    })
}

/// Pads and encrypts `plaintext`; the output is always a whole number of blocks.
///
/// # Errors
///
/// Returns an error if the key size is unsupported or the IV is not 16 bytes.
pub fn encrypt(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    let schedule = KeySchedule::derive(key)?;
    let mut previous = check_iv(iv)?;
    let padded = pad(plaintext);

    let mut ciphertext = Vec::with_capacity(padded.len());
    for chunk in padded.chunks_exact(BLOCK_SIZE) {
        let mut block = previous;
        for (b, p) in block.iter_mut().zip(chunk) {
            *b ^= p;
        }
        previous = schedule.encrypt_block(&block);
        ciphertext.extend_from_slice(&previous);
    }
    Ok(ciphertext)
}

/// Decrypts and unpads `ciphertext`.
///
/// # Errors
///
/// Returns [`Error::Misaligned`] if the ciphertext is not a multiple of the block size,
/// [`Error::Padding`] if the recovered padding is malformed (including empty input), and
/// a length error for a bad key or IV.
pub fn decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::Misaligned {
            field: "CBC ciphertext",
            block: BLOCK_SIZE,
            actual: ciphertext.len(),
        });
    }
    let schedule = KeySchedule::derive(key)?;
    let mut previous = check_iv(iv)?;

    let mut padded = Vec::with_capacity(ciphertext.len());
    for chunk in ciphertext.chunks_exact(BLOCK_SIZE) {
        let mut current = [0u8; BLOCK_SIZE];
        current.copy_from_slice(chunk);
        let decrypted = schedule.decrypt_block(&current);
        padded.extend(decrypted.iter().zip(&previous).map(|(d, p)| d ^ p));
        previous = current;
    }
    unpad(&padded)
}
