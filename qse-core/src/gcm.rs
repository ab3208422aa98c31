// File:    gcm.rs
// Author:  apezoo
// Date:    2026-10-18
//
// Description: AES in Galois/counter mode (NIST SP 800-38D) with a 128-bit tag.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Authenticated encryption with AES-GCM.
//!
//! Decryption recomputes the tag over the received ciphertext and compares it in
//! constant time before a single plaintext byte is produced.

use subtle::ConstantTimeEq;

use crate::block::{BLOCK_SIZE, Block, KeySchedule};
use crate::{Error, Result};

/// Length of the authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// The nonce length that takes the fast path (`nonce || 0x00000001`).
pub const NONCE_LEN: usize = 12;

/// A GCM authentication tag.
pub type Tag = [u8; TAG_LEN];

/// The reduction constant R = 0xe1 || 0^120.
const R: u128 = 0xe1 << 120;

/// Multiplies two elements of GF(2^128) in GCM's bit-reflected convention.
///
/// Runs in time independent of the operands.
#[must_use]
pub const fn gf128_mul(x: u128, y: u128) -> u128 {
    let mut z = 0u128;
    let mut v = y;
    let mut i = 0;
    while i < 128 {
        let bit = (x >> (127 - i)) & 1;
        z ^= v & 0u128.wrapping_sub(bit);
        let lsb = v & 1;
        v = (v >> 1) ^ (R & 0u128.wrapping_sub(lsb));
        i += 1;
    }
    z
}

/// Increments the low 32 bits of a counter block, wrapping within those 4 bytes.
#[must_use]
pub fn increment_counter(block: &Block) -> Block {
    let mut next = *block;
    let counter = u32::from_be_bytes([block[12], block[13], block[14], block[15]]).wrapping_add(1);
    next[12..].copy_from_slice(&counter.to_be_bytes());
    next
}

/// Incremental GHASH over AAD and ciphertext.
struct GHash {
    h: u128,
    acc: u128,
}

impl GHash {
    const fn new(h: u128) -> Self {
        Self { h, acc: 0 }
    }

    /// Absorbs `data`, zero-padding the final partial block.
    fn update_padded(&mut self, data: &[u8]) {
        for chunk in data.chunks(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);
            self.acc = gf128_mul(self.acc ^ u128::from_be_bytes(block), self.h);
        }
    }

    /// Absorbs the length block and returns the digest.
    fn finalize(mut self, aad_len: usize, text_len: usize) -> u128 {
        let lengths = (u128::from(bit_len(aad_len)) << 64) | u128::from(bit_len(text_len));
        self.acc = gf128_mul(self.acc ^ lengths, self.h);
        self.acc
    }
}

fn bit_len(len: usize) -> u64 {
    (len as u64).wrapping_mul(8)
}

/// Per-call GCM state: the key schedule, the hash subkey and the initial counter block.
struct GcmContext {
    schedule: KeySchedule,
    h: u128,
    j0: Block,
}

impl GcmContext {
    fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        if iv.is_empty() {
            return Err(Error::InvalidLength {
                field: "GCM nonce",
                expected: NONCE_LEN,
                actual: 0,
            });
        }
        let schedule = KeySchedule::derive(key)?;
        let h = u128::from_be_bytes(schedule.encrypt_block(&[0u8; BLOCK_SIZE]));

        let j0 = if iv.len() == NONCE_LEN {
            let mut j0 = [0u8; BLOCK_SIZE];
            j0[..NONCE_LEN].copy_from_slice(iv);
            j0[BLOCK_SIZE - 1] = 1;
            j0
        } else {
            let mut ghash = GHash::new(h);
            ghash.update_padded(iv);
            ghash.finalize(0, iv.len()).to_be_bytes()
        };

        Ok(Self { schedule, h, j0 })
    }

    /// Counter-mode keystream starting one increment past J0.
    fn gctr(&self, input: &[u8]) -> Vec<u8> {
        let mut output = Vec::with_capacity(input.len());
        let mut counter = increment_counter(&self.j0);
        for chunk in input.chunks(BLOCK_SIZE) {
            let keystream = self.schedule.encrypt_block(&counter);
            output.extend(chunk.iter().zip(keystream).map(|(b, k)| b ^ k));
            counter = increment_counter(&counter);
        }
        output
    }

    fn tag(&self, aad: &[u8], ciphertext: &[u8]) -> Tag {
        let mut ghash = GHash::new(self.h);
        ghash.update_padded(aad);
        ghash.update_padded(ciphertext);
        let s = ghash.finalize(aad.len(), ciphertext.len());
        let mask = u128::from_be_bytes(self.schedule.encrypt_block(&self.j0));
        (s ^ mask).to_be_bytes()
    }
}

/// Encrypts `plaintext` and authenticates it together with `aad`.
///
/// Returns the ciphertext (same length as the plaintext) and the 16-byte tag.
///
/// # Errors
///
/// Returns an error if the key size is unsupported or the nonce is empty.
pub fn encrypt(plaintext: &[u8], aad: &[u8], key: &[u8], iv: &[u8]) -> Result<(Vec<u8>, Tag)> {
    let ctx = GcmContext::new(key, iv)?;
    let ciphertext = ctx.gctr(plaintext);
    let tag = ctx.tag(aad, &ciphertext);
    Ok((ciphertext, tag))
}

/// Verifies `tag` over `aad` and `ciphertext`, then decrypts.
///
/// # Errors
///
/// Returns [`Error::Authentication`] on a tag mismatch, in which case no plaintext is
/// produced, and a length error for a bad key, nonce or tag.
pub fn decrypt(
    ciphertext: &[u8],
    aad: &[u8],
    key: &[u8],
    iv: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>> {
    if tag.len() != TAG_LEN {
        return Err(Error::InvalidLength {
            field: "GCM tag",
            expected: TAG_LEN,
            actual: tag.len(),
        });
    }
    let ctx = GcmContext::new(key, iv)?;
    let expected = ctx.tag(aad, ciphertext);
    if !bool::from(expected[..].ct_eq(tag)) {
        return Err(Error::Authentication);
    }
    Ok(ctx.gctr(ciphertext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with_counter(low_word: u32) -> GcmContext {
        let key = [0x42u8; 16];
        let schedule = KeySchedule::derive(&key).unwrap();
        let h = u128::from_be_bytes(schedule.encrypt_block(&[0u8; BLOCK_SIZE]));
        let mut j0 = [0xa5u8; BLOCK_SIZE];
        j0[12..].copy_from_slice(&low_word.to_be_bytes());
        GcmContext { schedule, h, j0 }
    }

    #[test]
    fn test_gctr_wraps_counter_across_blocks() {
        let ctx = context_with_counter(0xffff_fffe);
        let plaintext: Vec<u8> = (0..40u8).collect();

        let ciphertext = ctx.gctr(&plaintext);
        assert_eq!(ciphertext.len(), plaintext.len());

        let mut expected = Vec::new();
        for low_word in [0xffff_ffffu32, 0, 1] {
            let mut counter = [0xa5u8; BLOCK_SIZE];
            counter[12..].copy_from_slice(&low_word.to_be_bytes());
            expected.extend(ctx.schedule.encrypt_block(&counter));
        }
        let keystream: Vec<u8> = plaintext
            .iter()
            .zip(&ciphertext)
            .map(|(p, c)| p ^ c)
            .collect();
        assert_eq!(keystream, expected[..plaintext.len()]);

        assert_eq!(ctx.gctr(&ciphertext), plaintext);
        assert_eq!(ctx.tag(b"aad", &ciphertext), ctx.tag(b"aad", &ciphertext));
        assert_ne!(ctx.tag(b"aad", &ciphertext), ctx.tag(b"aad", &plaintext));
    }
}
