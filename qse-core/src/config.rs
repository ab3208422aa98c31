// File:    config.rs
// Author:  apezoo
// Date:    2026-10-18
//
// Description: Explicit configuration for the envelope protocol and the key ledger.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::envelope::AesAlgorithm;
use crate::ledger::ReusePolicy;

/// Settings for the middle (AES) layer of the envelope protocol.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Cipher used for the middle layer.
    pub algorithm: AesAlgorithm,
    /// Associated data authenticated by GCM, hex encoded in JSON.
    #[serde(with = "hex")]
    pub aad: Vec<u8>,
}

/// Settings for the key ledger.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON file the ledger is written through to; `None` keeps it in memory.
    pub store_path: Option<PathBuf>,
    /// Whether reuse of consumed pad bytes is refused.
    pub reuse_policy: ReusePolicy,
}

/// Top-level configuration file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Envelope protocol settings.
    pub protocol: ProtocolConfig,
    /// Key ledger settings.
    pub ledger: LedgerConfig,
}

impl Config {
    /// Loads a configuration file; absent fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
