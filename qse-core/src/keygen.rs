// File:    keygen.rs
// Author:  apezoo
// Date:    2026-10-18
//
// Description: Provides fresh key material and key identifiers from the operating system RNG.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::{TryRngCore, rngs::OsRng};
use uuid::Uuid;

use crate::{Error, Result};

/// Returns `size` bytes of fresh randomness.
///
/// # Errors
///
/// Returns [`Error::Rng`] if the operating system RNG cannot be read.
pub fn random_bytes(size: usize) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; size];
    OsRng
        .try_fill_bytes(&mut buffer)
        .map_err(|e| Error::Rng(e.to_string()))?;
    Ok(buffer)
}

/// Mints a new key identifier of the form `K<unix-millis>-<8 hex chars>`.
#[must_use]
pub fn new_key_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    let suffix = Uuid::new_v4().simple().to_string();
    format!("K{millis}-{}", &suffix[..8])
}

/// Milliseconds since the Unix epoch, or zero if the clock is before it.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
