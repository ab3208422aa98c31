// File:    envelope.rs
// Author:  apezoo
// Date:    2026-10-18
//
// Description: Wire shapes of the three envelope layers and their field encodings.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Typed envelopes.
//!
//! Field names are a wire contract shared with other implementations:
//!
//! - outer: `{"otp_key_id", "ciphertext_b64url"}` (base64url, unpadded)
//! - middle: `{"KeyId", "IvHex", "CiphertextHex", "TagHex", "AadHex", "Algorithm"}`
//! - inner: caller-supplied JSON with at least `encryptedBody` and `pqcCiphertext`

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// base64url without padding on encode; accepts padded or unpadded input on decode.
pub const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Keys every inner (PQC) payload must carry.
pub const INNER_REQUIRED_FIELDS: [&str; 2] = ["encryptedBody", "pqcCiphertext"];

/// Block cipher mode of the middle layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesMode {
    /// Galois/counter mode, authenticated.
    Gcm,
    /// Cipher block chaining, confidentiality only.
    Cbc,
}

impl AesMode {
    /// Length of the IV generated for this mode.
    #[must_use]
    pub const fn iv_len(self) -> usize {
        match self {
            Self::Gcm => crate::gcm::NONCE_LEN,
            Self::Cbc => crate::block::BLOCK_SIZE,
        }
    }
}

/// The `Algorithm` field of a middle envelope.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AesAlgorithm {
    /// AES-128 in GCM.
    #[default]
    #[serde(rename = "AES-128-GCM")]
    Aes128Gcm,
    /// AES-192 in GCM.
    #[serde(rename = "AES-192-GCM")]
    Aes192Gcm,
    /// AES-256 in GCM.
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
    /// AES-128 in CBC.
    #[serde(rename = "AES-128-CBC")]
    Aes128Cbc,
    /// AES-192 in CBC.
    #[serde(rename = "AES-192-CBC")]
    Aes192Cbc,
    /// AES-256 in CBC.
    #[serde(rename = "AES-256-CBC")]
    Aes256Cbc,
}

impl AesAlgorithm {
    const ALL: [Self; 6] = [
        Self::Aes128Gcm,
        Self::Aes192Gcm,
        Self::Aes256Gcm,
        Self::Aes128Cbc,
        Self::Aes192Cbc,
        Self::Aes256Cbc,
    ];

    /// The wire name, e.g. `AES-128-GCM`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aes128Gcm => "AES-128-GCM",
            Self::Aes192Gcm => "AES-192-GCM",
            Self::Aes256Gcm => "AES-256-GCM",
            Self::Aes128Cbc => "AES-128-CBC",
            Self::Aes192Cbc => "AES-192-CBC",
            Self::Aes256Cbc => "AES-256-CBC",
        }
    }

    /// Data key length in bytes.
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128Gcm | Self::Aes128Cbc => 16,
            Self::Aes192Gcm | Self::Aes192Cbc => 24,
            Self::Aes256Gcm | Self::Aes256Cbc => 32,
        }
    }

    /// The block cipher mode.
    #[must_use]
    pub const fn mode(self) -> AesMode {
        match self {
            Self::Aes128Gcm | Self::Aes192Gcm | Self::Aes256Gcm => AesMode::Gcm,
            Self::Aes128Cbc | Self::Aes192Cbc | Self::Aes256Cbc => AesMode::Cbc,
        }
    }
}

impl fmt::Display for AesAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AesAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Format(format!("unknown algorithm '{s}'")))
    }
}

/// The outer (OTP) envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OtpEnvelope {
    /// Ledger id of the pad.
    pub otp_key_id: String,
    /// The ciphertext, base64url without padding.
    pub ciphertext_b64url: String,
}

impl OtpEnvelope {
    /// Builds an envelope around raw ciphertext bytes.
    #[must_use]
    pub fn new(otp_key_id: &str, ciphertext: &[u8]) -> Self {
        Self {
            otp_key_id: otp_key_id.to_string(),
            ciphertext_b64url: URL_SAFE_LENIENT.encode(ciphertext),
        }
    }

    /// Parses an outer envelope; both fields are required.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if the text is not such an envelope.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Format(format!("outer envelope: {e}")))
    }

    /// Decodes the ciphertext field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if the field is not valid base64url.
    pub fn ciphertext(&self) -> Result<Vec<u8>> {
        URL_SAFE_LENIENT
            .decode(self.ciphertext_b64url.as_bytes())
            .map_err(|e| Error::Format(format!("ciphertext_b64url: {e}")))
    }

    /// Serializes to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The middle (AES) envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AesEnvelope {
    /// Ledger id of the data key.
    pub key_id: String,
    /// The IV or nonce, hex.
    pub iv_hex: String,
    /// The ciphertext, hex.
    pub ciphertext_hex: String,
    /// The GCM tag, hex; empty for CBC.
    #[serde(default)]
    pub tag_hex: String,
    /// Associated data, hex; may be empty.
    #[serde(default)]
    pub aad_hex: String,
    /// Cipher and key size.
    pub algorithm: AesAlgorithm,
}

/// The binary fields of an [`AesEnvelope`] after hex decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AesFields {
    /// IV or nonce.
    pub iv: Vec<u8>,
    /// Ciphertext.
    pub ciphertext: Vec<u8>,
    /// Tag; empty for CBC.
    pub tag: Vec<u8>,
    /// Associated data.
    pub aad: Vec<u8>,
}

impl AesEnvelope {
    /// Parses a middle envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if a required field is missing or the algorithm is unknown.
    pub fn parse(text: &str) -> Result<Self> {
        let envelope: Self = serde_json::from_str(text)
            .map_err(|e| Error::Format(format!("middle envelope: {e}")))?;
        if envelope.algorithm.mode() == AesMode::Gcm && envelope.tag_hex.is_empty() {
            return Err(Error::Format("middle envelope: GCM without TagHex".to_string()));
        }
        Ok(envelope)
    }

    /// Hex-decodes the binary fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] naming the first field that is not valid hex.
    pub fn decode(&self) -> Result<AesFields> {
        Ok(AesFields {
            iv: decode_hex("IvHex", &self.iv_hex)?,
            ciphertext: decode_hex("CiphertextHex", &self.ciphertext_hex)?,
            tag: decode_hex("TagHex", &self.tag_hex)?,
            aad: decode_hex("AadHex", &self.aad_hex)?,
        })
    }

    /// Serializes to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value).map_err(|e| Error::Format(format!("{field}: {e}")))
}

/// Checks that `text` is a JSON object carrying every [`INNER_REQUIRED_FIELDS`] key.
///
/// Nothing else about the payload is inspected.
///
/// # Errors
///
/// Returns [`Error::Format`] otherwise.
pub fn check_inner(text: &str) -> Result<()> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| Error::Format(format!("inner payload: {e}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| Error::Format("inner payload is not a JSON object".to_string()))?;
    match INNER_REQUIRED_FIELDS.iter().find(|k| !object.contains_key(**k)) {
        Some(missing) => Err(Error::Format(format!("inner payload lacks '{missing}'"))),
        None => Ok(()),
    }
}

/// Which layer a piece of text looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// An OTP envelope.
    Outer,
    /// An AES envelope.
    Middle,
    /// A PQC payload.
    Inner,
}

impl Layer {
    /// Classifies `text` by structure alone; `None` means it does not look like any
    /// envelope and is presumably plaintext.
    #[must_use]
    pub fn detect(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        let object = value.as_object()?;
        let has = |key: &str| object.contains_key(key);
        if has("otp_key_id") && has("ciphertext_b64url") {
            Some(Self::Outer)
        } else if has("KeyId") && has("CiphertextHex") {
            Some(Self::Middle)
        } else if INNER_REQUIRED_FIELDS.iter().all(|k| has(k)) {
            Some(Self::Inner)
        } else {
            None
        }
    }
}
