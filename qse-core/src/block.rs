// File:    block.rs
// Author:  apezoo
// Date:    2026-10-18
//
// Description: The AES block cipher (FIPS-197): GF(2^8) arithmetic, the key schedule and
//              single-block encryption and decryption for 128, 192 and 256-bit keys.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! The AES block cipher.
//!
//! A [`KeySchedule`] is derived once per key and owned by the operation that derived it.
//! Block operations borrow it immutably, so any number of threads may encrypt with their
//! own schedules concurrently.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result};

/// The size of one AES block in bytes.
pub const BLOCK_SIZE: usize = 16;

/// A single 16-byte cipher block, stored column-major as in FIPS-197.
pub type Block = [u8; BLOCK_SIZE];

/// Round constants; index 0 is unused.
const RCON: [u8; 11] = [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80, 0x1b, 0x36];

/// Multiplies two elements of GF(2^8) modulo x^8 + x^4 + x^3 + x + 1.
#[must_use]
pub const fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut p = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            p ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1b;
        }
        b >>= 1;
    }
    p
}

/// Multiplicative inverse in GF(2^8) as a^254; zero maps to zero.
const fn gf_inv(a: u8) -> u8 {
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u8;
    while exp != 0 {
        if exp & 1 != 0 {
            result = gf_mul(result, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    if a == 0 { 0 } else { result }
}

const fn affine(x: u8) -> u8 {
    x ^ x.rotate_left(1) ^ x.rotate_left(2) ^ x.rotate_left(3) ^ x.rotate_left(4) ^ 0x63
}

#[allow(clippy::cast_possible_truncation)]
const fn make_sbox() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0usize;
    while i < 256 {
        table[i] = affine(gf_inv(i as u8));
        i += 1;
    }
    table
}

#[allow(clippy::cast_possible_truncation)]
const fn make_inv_sbox(sbox: &[u8; 256]) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0usize;
    while i < 256 {
        table[sbox[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// The forward substitution box.
pub const SBOX: [u8; 256] = make_sbox();
/// The inverse substitution box.
pub const INV_SBOX: [u8; 256] = make_inv_sbox(&SBOX);

fn sub_word(word: [u8; 4]) -> [u8; 4] {
    word.map(|b| SBOX[b as usize])
}

/// An expanded AES key: one round key per round plus the initial whitening key.
///
/// Immutable once derived and wiped from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeySchedule {
    round_keys: Vec<Block>,
}

impl KeySchedule {
    /// Expands a 16, 24 or 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedKeySize`] for any other key length.
    pub fn derive(key: &[u8]) -> Result<Self> {
        let nk = match key.len() {
            16 | 24 | 32 => key.len() / 4,
            other => return Err(Error::UnsupportedKeySize(other)),
        };
        let rounds = nk + 6;
        let total_words = 4 * (rounds + 1);

        let mut words: Vec<[u8; 4]> = key
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();
        for i in nk..total_words {
            let mut temp = words[i - 1];
            if i % nk == 0 {
                temp.rotate_left(1);
                temp = sub_word(temp);
                temp[0] ^= RCON[i / nk];
            } else if nk > 6 && i % nk == 4 {
                temp = sub_word(temp);
            }
            let prev = words[i - nk];
            words.push([
                prev[0] ^ temp[0],
                prev[1] ^ temp[1],
                prev[2] ^ temp[2],
                prev[3] ^ temp[3],
            ]);
        }

        let round_keys = words
            .chunks_exact(4)
            .map(|w| {
                let mut rk = [0u8; BLOCK_SIZE];
                for (dst, word) in rk.chunks_exact_mut(4).zip(w) {
                    dst.copy_from_slice(word);
                }
                rk
            })
            .collect();
        words.zeroize();

        Ok(Self { round_keys })
    }

    /// Number of cipher rounds (10, 12 or 14).
    #[must_use]
    pub fn rounds(&self) -> usize {
        self.round_keys.len() - 1
    }

    /// The round key used before round `round` (0 is the initial whitening key).
    #[must_use]
    pub fn round_key(&self, round: usize) -> Option<&Block> {
        self.round_keys.get(round)
    }

    /// Encrypts one block.
    #[must_use]
    pub fn encrypt_block(&self, block: &Block) -> Block {
        let rounds = self.rounds();
        let mut state = *block;
        add_round_key(&mut state, &self.round_keys[0]);
        for round in 1..rounds {
            sub_bytes(&mut state);
            shift_rows(&mut state);
            mix_columns(&mut state);
            add_round_key(&mut state, &self.round_keys[round]);
        }
        sub_bytes(&mut state);
        shift_rows(&mut state);
        add_round_key(&mut state, &self.round_keys[rounds]);
        state
    }

    /// Decrypts one block.
    #[must_use]
    pub fn decrypt_block(&self, block: &Block) -> Block {
        let rounds = self.rounds();
        let mut state = *block;
        add_round_key(&mut state, &self.round_keys[rounds]);
        for round in (1..rounds).rev() {
            inv_shift_rows(&mut state);
            inv_sub_bytes(&mut state);
            add_round_key(&mut state, &self.round_keys[round]);
            inv_mix_columns(&mut state);
        }
        inv_shift_rows(&mut state);
        inv_sub_bytes(&mut state);
        add_round_key(&mut state, &self.round_keys[0]);
        state
    }
}

impl std::fmt::Debug for KeySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeySchedule(rounds: {}, [REDACTED])", self.rounds())
    }
}

fn add_round_key(state: &mut Block, round_key: &Block) {
    for (s, k) in state.iter_mut().zip(round_key) {
        *s ^= k;
    }
}

fn sub_bytes(state: &mut Block) {
    for b in state.iter_mut() {
        *b = SBOX[*b as usize];
    }
}

fn inv_sub_bytes(state: &mut Block) {
    for b in state.iter_mut() {
        *b = INV_SBOX[*b as usize];
    }
}

// Byte (row, col) lives at index row + 4 * col.
fn shift_rows(state: &mut Block) {
    let old = *state;
    for row in 1..4 {
        for col in 0..4 {
            state[row + 4 * col] = old[row + 4 * ((col + row) % 4)];
        }
    }
}

fn inv_shift_rows(state: &mut Block) {
    let old = *state;
    for row in 1..4 {
        for col in 0..4 {
            state[row + 4 * col] = old[row + 4 * ((col + 4 - row) % 4)];
        }
    }
}

fn mix_columns(state: &mut Block) {
    for column in state.chunks_exact_mut(4) {
        let [a0, a1, a2, a3] = [column[0], column[1], column[2], column[3]];
        column[0] = gf_mul(a0, 2) ^ gf_mul(a1, 3) ^ a2 ^ a3;
        column[1] = a0 ^ gf_mul(a1, 2) ^ gf_mul(a2, 3) ^ a3;
        column[2] = a0 ^ a1 ^ gf_mul(a2, 2) ^ gf_mul(a3, 3);
        column[3] = gf_mul(a0, 3) ^ a1 ^ a2 ^ gf_mul(a3, 2);
    }
}

fn inv_mix_columns(state: &mut Block) {
    for column in state.chunks_exact_mut(4) {
        let [a0, a1, a2, a3] = [column[0], column[1], column[2], column[3]];
        column[0] = gf_mul(a0, 14) ^ gf_mul(a1, 11) ^ gf_mul(a2, 13) ^ gf_mul(a3, 9);
        column[1] = gf_mul(a0, 9) ^ gf_mul(a1, 14) ^ gf_mul(a2, 11) ^ gf_mul(a3, 13);
        column[2] = gf_mul(a0, 13) ^ gf_mul(a1, 9) ^ gf_mul(a2, 14) ^ gf_mul(a3, 11);
        column[3] = gf_mul(a0, 11) ^ gf_mul(a1, 13) ^ gf_mul(a2, 9) ^ gf_mul(a3, 14);
    }
}
