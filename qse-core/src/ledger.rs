// File:    ledger.rs
// Author:  apezoo
// Date:    2026-10-18
//
// Description: The key ledger: a keyed store of pad material that records which byte ranges
//              of each key have been consumed and refuses to hand them out twice.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::config::LedgerConfig;
use crate::{Error, Result, keygen};

/// Key bytes handed out by a [`KeySource`]; wiped when dropped.
pub type KeyBytes = Zeroizing<Vec<u8>>;

/// Whether the ledger may record the same byte range of a key twice.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReusePolicy {
    /// Refuse any consumption overlapping an already consumed range.
    #[default]
    Refuse,
    /// Record every consumption without refusing; only for interoperating with mock key managers.
    Permit,
}

/// The boundary between the ciphers and whatever store backs the keys.
pub trait KeySource {
    /// Returns the first `required_bytes` of the key named `key_id`, creating the key or
    /// appending fresh random bytes to it as needed. Existing bytes are never regenerated.
    ///
    /// # Errors
    ///
    /// Returns an error if randomness or persistence fails.
    fn get_key(&self, key_id: &str, required_bytes: usize) -> Result<KeyBytes>;

    /// Records that the first `bytes_used` bytes of `key_id` were consumed for encryption.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyExhaustion`] if the consumption cannot be recorded without reuse.
    fn mark_used(&self, key_id: &str, bytes_used: usize) -> Result<()>;

    /// Looks up an existing key without creating or extending it. A key issued with zero
    /// bytes is returned empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownKey`] if no key has that identifier.
    fn fetch_key(&self, key_id: &str) -> Result<KeyBytes>;

    /// Mints a fresh key identifier holding `size` random bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be created.
    fn issue(&self, size: usize) -> Result<(String, KeyBytes)> {
        let key_id = keygen::new_key_id();
        let key = self.get_key(&key_id, size)?;
        Ok((key_id, key))
    }
}

impl<T: KeySource + ?Sized> KeySource for &T {
    fn get_key(&self, key_id: &str, required_bytes: usize) -> Result<KeyBytes> {
        (**self).get_key(key_id, required_bytes)
    }

    fn mark_used(&self, key_id: &str, bytes_used: usize) -> Result<()> {
        (**self).mark_used(key_id, bytes_used)
    }

    fn fetch_key(&self, key_id: &str) -> Result<KeyBytes> {
        (**self).fetch_key(key_id)
    }
}

impl<T: KeySource + ?Sized> KeySource for Arc<T> {
    fn get_key(&self, key_id: &str, required_bytes: usize) -> Result<KeyBytes> {
        (**self).get_key(key_id, required_bytes)
    }

    fn mark_used(&self, key_id: &str, bytes_used: usize) -> Result<()> {
        (**self).mark_used(key_id, bytes_used)
    }

    fn fetch_key(&self, key_id: &str) -> Result<KeyBytes> {
        (**self).fetch_key(key_id)
    }
}

/// Represents a segment of a key that has been consumed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsedSegment {
    /// The starting byte (inclusive) of the used segment.
    pub start: usize,
    /// The ending byte (exclusive) of the used segment.
    pub end: usize,
}

/// One key in the ledger.
#[derive(Serialize, Deserialize, Clone)]
pub struct KeyRecord {
    /// The key identifier.
    pub id: String,
    #[serde(with = "hex")]
    material: Vec<u8>,
    /// Segments consumed for encryption, in the order they were recorded.
    pub used_segments: Vec<UsedSegment>,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at_ms: u64,
}

impl KeyRecord {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            material: Vec::new(),
            used_segments: Vec::new(),
            created_at_ms: keygen::now_millis(),
        }
    }

    /// Length of the key material in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.material.len()
    }

    /// Whether the record holds no material yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.material.is_empty()
    }

    /// The raw key material.
    #[must_use]
    pub fn material(&self) -> &[u8] {
        &self.material
    }

    /// Calculates the total number of bytes consumed, counting overlaps once.
    #[must_use]
    pub fn total_used_bytes(&self) -> usize {
        let mut sorted = self.used_segments.clone();
        sorted.sort_by_key(|s| s.start);
        let mut total = 0;
        let mut covered_to = 0;
        for segment in sorted {
            let start = segment.start.max(covered_to);
            if segment.end > start {
                total += segment.end - start;
                covered_to = segment.end;
            }
        }
        total
    }

    /// Highest offset consumed so far.
    #[must_use]
    pub fn high_water_mark(&self) -> usize {
        self.used_segments.iter().map(|s| s.end).max().unwrap_or(0)
    }

    /// Checks if every byte of the key has been consumed.
    #[must_use]
    pub fn is_fully_used(&self) -> bool {
        !self.material.is_empty() && self.total_used_bytes() >= self.material.len()
    }

    /// Whether `[start, end)` overlaps any consumed segment.
    #[must_use]
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.used_segments
            .iter()
            .any(|s| start < s.end && end > s.start)
    }

    /// First 8 bytes of the SHA-256 of the material, hex encoded.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.material);
        hex::encode(&digest[..8])
    }

    /// Appends fresh random bytes until the material is at least `required` long.
    fn extend_to(&mut self, required: usize) -> Result<bool> {
        if self.material.len() >= required {
            return Ok(false);
        }
        let mut fresh = keygen::random_bytes(required - self.material.len())?;
        self.material.extend_from_slice(&fresh);
        fresh.zeroize();
        Ok(true)
    }

    fn prefix(&self, len: usize) -> KeyBytes {
        Zeroizing::new(self.material[..len.min(self.material.len())].to_vec())
    }
}

impl Drop for KeyRecord {
    fn drop(&mut self) {
        self.material.zeroize();
    }
}

impl std::fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRecord")
            .field("id", &self.id)
            .field("len", &self.material.len())
            .field("used_segments", &self.used_segments)
            .field("created_at_ms", &self.created_at_ms)
            .finish_non_exhaustive()
    }
}

/// Represents the persisted state of the ledger.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct LedgerState {
    /// A map of key IDs to their records.
    pub keys: HashMap<String, KeyRecord>,
}

impl LedgerState {
    /// Number of keys held.
    #[must_use]
    pub fn total_keys(&self) -> usize {
        self.keys.len()
    }

    /// Total key material held, in bytes.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.keys.values().map(KeyRecord::len).sum()
    }

    /// Total bytes consumed across all keys.
    #[must_use]
    pub fn total_used_bytes(&self) -> usize {
        self.keys.values().map(KeyRecord::total_used_bytes).sum()
    }

    /// Number of keys with every byte consumed.
    #[must_use]
    pub fn fully_used_keys(&self) -> usize {
        self.keys.values().filter(|k| k.is_fully_used()).count()
    }
}

/// Loads the state from a store file. A missing file yields an empty state.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_state(store_path: &Path) -> Result<LedgerState> {
    if store_path.exists() {
        let state_str = fs::read_to_string(store_path)?;
        Ok(serde_json::from_str(&state_str)?)
    } else {
        Ok(LedgerState::default())
    }
}

/// Saves the state to a store file.
///
/// # Errors
///
/// Returns an error if the state cannot be serialized or written.
pub fn save_state(store_path: &Path, state: &LedgerState) -> Result<()> {
    if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let state_str = serde_json::to_string_pretty(state)?;
    fs::write(store_path, state_str)?;
    Ok(())
}

/// A thread-safe key ledger.
///
/// Calls for the same key id are serialized on that id's lock; calls for different ids
/// run in parallel. When a store path is configured, every mutation is written through.
#[derive(Debug)]
pub struct KeyLedger {
    records: RwLock<HashMap<String, Arc<Mutex<KeyRecord>>>>,
    policy: ReusePolicy,
    store_path: Option<PathBuf>,
    persist_lock: Mutex<()>,
}

impl KeyLedger {
    /// Creates an empty ledger that is never persisted.
    #[must_use]
    pub fn in_memory(policy: ReusePolicy) -> Self {
        Self::from_state(LedgerState::default(), policy, None)
    }

    /// Opens the ledger described by `config`, loading its store file if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store file exists but cannot be read or parsed.
    pub fn open(config: &LedgerConfig) -> Result<Self> {
        let state = match &config.store_path {
            Some(path) => load_state(path)?,
            None => LedgerState::default(),
        };
        info!(
            "Opened key ledger with {} key(s){}",
            state.keys.len(),
            config
                .store_path
                .as_ref()
                .map(|p| format!(" from '{}'", p.display()))
                .unwrap_or_default()
        );
        Ok(Self::from_state(
            state,
            config.reuse_policy,
            config.store_path.clone(),
        ))
    }

    fn from_state(state: LedgerState, policy: ReusePolicy, store_path: Option<PathBuf>) -> Self {
        let records = state
            .keys
            .into_iter()
            .map(|(id, record)| (id, Arc::new(Mutex::new(record))))
            .collect();
        Self {
            records: RwLock::new(records),
            policy,
            store_path,
            persist_lock: Mutex::new(()),
        }
    }

    /// The reuse policy this ledger enforces.
    #[must_use]
    pub const fn policy(&self) -> ReusePolicy {
        self.policy
    }

    /// The store file, if the ledger is persisted.
    #[must_use]
    pub fn store_path(&self) -> Option<&Path> {
        self.store_path.as_deref()
    }

    /// Bytes of `key_id` consumed so far, or `None` for an unknown id.
    #[must_use]
    pub fn consumed(&self, key_id: &str) -> Option<usize> {
        self.record(key_id).map(|record| {
            let record = record.lock();
            record.total_used_bytes()
        })
    }

    /// A point-in-time copy of every record.
    #[must_use]
    pub fn snapshot(&self) -> LedgerState {
        let records = self.records.read();
        let keys = records
            .iter()
            .map(|(id, record)| (id.clone(), record.lock().clone()))
            .collect();
        LedgerState { keys }
    }

    /// Writes the current state to the store file, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.store_path else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock();
        let state = self.snapshot();
        save_state(path, &state)?;
        debug!("Persisted {} key(s) to '{}'", state.keys.len(), path.display());
        Ok(())
    }

    fn record(&self, key_id: &str) -> Option<Arc<Mutex<KeyRecord>>> {
        self.records.read().get(key_id).cloned()
    }

    /// Returns the record for `key_id` and whether this call created it.
    fn record_or_insert(&self, key_id: &str) -> (Arc<Mutex<KeyRecord>>, bool) {
        if let Some(record) = self.record(key_id) {
            return (record, false);
        }
        let mut records = self.records.write();
        if let Some(record) = records.get(key_id) {
            return (Arc::clone(record), false);
        }
        let record = Arc::new(Mutex::new(KeyRecord::new(key_id)));
        records.insert(key_id.to_string(), Arc::clone(&record));
        (record, true)
    }
}

impl KeySource for KeyLedger {
    fn get_key(&self, key_id: &str, required_bytes: usize) -> Result<KeyBytes> {
        let (record, created) = self.record_or_insert(key_id);
        let (key, grown) = {
            let mut record = record.lock();
            let previous = record.len();
            let grown = record.extend_to(required_bytes)?;
            if grown {
                info!("Key '{key_id}' grown from {previous} to {required_bytes} bytes");
            }
            (record.prefix(required_bytes), grown)
        };
        if created || grown {
            self.persist()?;
        }
        Ok(key)
    }

    fn mark_used(&self, key_id: &str, bytes_used: usize) -> Result<()> {
        if bytes_used == 0 {
            return Ok(());
        }
        let record = self
            .record(key_id)
            .ok_or_else(|| Error::UnknownKey(key_id.to_string()))?;
        {
            let mut record = record.lock();
            if bytes_used > record.len() {
                return Err(Error::KeyExhaustion {
                    key_id: key_id.to_string(),
                    needed: bytes_used,
                    available: record.len(),
                });
            }
            if record.overlaps(0, bytes_used) {
                match self.policy {
                    ReusePolicy::Refuse => {
                        warn!("Refused reuse of key '{key_id}' bytes 0..{bytes_used}");
                        return Err(Error::KeyExhaustion {
                            key_id: key_id.to_string(),
                            needed: bytes_used,
                            available: 0,
                        });
                    }
                    ReusePolicy::Permit => {
                        warn!(
                            "Key '{key_id}' bytes 0..{bytes_used} reused under permissive policy"
                        );
                    }
                }
            }
            record.used_segments.push(UsedSegment {
                start: 0,
                end: bytes_used,
            });
            debug!(
                "Key '{key_id}' is now {}/{} bytes used",
                record.total_used_bytes(),
                record.len()
            );
        }
        self.persist()
    }

    fn fetch_key(&self, key_id: &str) -> Result<KeyBytes> {
        let record = self
            .record(key_id)
            .ok_or_else(|| Error::UnknownKey(key_id.to_string()))?;
        let record = record.lock();
        Ok(record.prefix(record.len()))
    }
}
