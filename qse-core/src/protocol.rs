// File:    protocol.rs
// Author:  apezoo
// Date:    2026-10-18
//
// Description: The envelope layering protocol: wraps an opaque PQC payload in an AES layer
//              and an OTP layer, and peels those layers back off.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Envelope layering.
//!
//! Wrapping goes inner → middle → outer:
//!
//! 1. the inner PQC JSON text is base64-encoded,
//! 2. that text is AES-encrypted under a freshly issued data key (middle envelope),
//! 3. the middle envelope's JSON is OTP-encrypted under a freshly issued pad (outer envelope).
//!
//! Unwrapping reverses the chain. A layer that fails to parse or decode hands back its
//! input unchanged, so a partially failed unwrap yields the deepest text that could be
//! recovered. Authentication failures, wrong-size fields and CBC padding failures are
//! hard errors.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, warn};

use crate::config::ProtocolConfig;
use crate::envelope::{AesEnvelope, AesMode, OtpEnvelope, check_inner};
use crate::ledger::KeySource;
use crate::{Error, Result, cbc, gcm, keygen, otp};

/// Wraps and unwraps envelopes using keys from `S`.
#[derive(Debug)]
pub struct EnvelopeProtocol<S> {
    keys: S,
    config: ProtocolConfig,
}

impl<S: KeySource> EnvelopeProtocol<S> {
    /// Creates a protocol instance over a key source.
    pub const fn new(keys: S, config: ProtocolConfig) -> Self {
        Self { keys, config }
    }

    /// The configuration in use.
    pub const fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// The key source in use.
    pub const fn keys(&self) -> &S {
        &self.keys
    }

    /// Wraps an inner PQC payload into an outer envelope and returns its JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if `inner_json` is not a JSON object with the required
    /// keys, and any ledger or cipher error encountered while encrypting.
    pub fn wrap(&self, inner_json: &str) -> Result<String> {
        check_inner(inner_json)?;
        let middle = self.seal_middle(inner_json)?;
        let outer = self.seal_outer(&middle)?;
        outer.to_json()
    }

    /// Encrypts the base64 form of the inner payload into a middle envelope.
    ///
    /// # Errors
    ///
    /// Returns any ledger or cipher error encountered.
    pub fn seal_middle(&self, inner_json: &str) -> Result<AesEnvelope> {
        let algorithm = self.config.algorithm;
        let encoded = STANDARD.encode(inner_json.as_bytes());
        let (key_id, key) = self.keys.issue(algorithm.key_len())?;
        // Data keys share the ledger with pads; consume them so no pad can be cut from one.
        self.keys.mark_used(&key_id, key.len())?;
        let iv = keygen::random_bytes(algorithm.mode().iv_len())?;
        let aad = &self.config.aad;

        let (ciphertext, tag) = match algorithm.mode() {
            AesMode::Gcm => {
                let (ciphertext, tag) = gcm::encrypt(encoded.as_bytes(), aad, &key, &iv)?;
                (ciphertext, hex::encode(tag))
            }
            AesMode::Cbc => (cbc::encrypt(encoded.as_bytes(), &key, &iv)?, String::new()),
        };
        debug!("Sealed middle layer with {algorithm} under key '{key_id}'");

        Ok(AesEnvelope {
            key_id,
            iv_hex: hex::encode(iv),
            ciphertext_hex: hex::encode(ciphertext),
            tag_hex: tag,
            aad_hex: hex::encode(aad),
            algorithm,
        })
    }

    /// OTP-encrypts the JSON text of a middle envelope into an outer envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyExhaustion`] if the ledger refuses the pad, or any other ledger error.
    pub fn seal_outer(&self, middle: &AesEnvelope) -> Result<OtpEnvelope> {
        let middle_json = middle.to_json()?;
        let key_id = keygen::new_key_id();
        let sealed = otp::encrypt(&self.keys, middle_json.as_bytes(), &key_id)?;
        debug!(
            "Sealed outer layer with {} pad bytes of key '{}'",
            sealed.bytes_used, sealed.key_id
        );
        Ok(OtpEnvelope::new(&sealed.key_id, &sealed.ciphertext))
    }

    /// Unwraps an outer envelope down to the inner PQC JSON text.
    ///
    /// When a layer cannot be parsed or decoded, the text that reached that layer is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] on a GCM tag mismatch and length or padding
    /// errors from the middle layer.
    pub fn unwrap(&self, outer_json: &str) -> Result<String> {
        let Some(middle) = self.try_open_outer(outer_json) else {
            return Ok(outer_json.to_string());
        };
        let Some(encoded) = self.try_open_middle(&middle)? else {
            return Ok(middle);
        };
        Ok(open_inner(&encoded))
    }

    /// Peels the OTP layer, or returns `outer_json` unchanged if it cannot be peeled.
    pub fn open_outer(&self, outer_json: &str) -> String {
        self.try_open_outer(outer_json)
            .unwrap_or_else(|| outer_json.to_string())
    }

    /// Peels the AES layer, or returns `middle_json` unchanged if it cannot be parsed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] on a GCM tag mismatch and length or padding errors.
    pub fn open_middle(&self, middle_json: &str) -> Result<String> {
        Ok(self
            .try_open_middle(middle_json)?
            .unwrap_or_else(|| middle_json.to_string()))
    }

    fn try_open_outer(&self, outer_json: &str) -> Option<String> {
        match self.decrypt_outer(outer_json) {
            Ok(middle) => Some(middle),
            Err(e) => {
                warn!("Outer layer left sealed: {e}");
                None
            }
        }
    }

    fn decrypt_outer(&self, outer_json: &str) -> Result<String> {
        let outer = OtpEnvelope::parse(outer_json)?;
        let ciphertext = outer.ciphertext()?;
        let pad = self.keys.fetch_key(&outer.otp_key_id)?;
        let middle = otp::decrypt(&ciphertext, &pad)?;
        debug!("Opened outer layer with key '{}'", outer.otp_key_id);
        String::from_utf8(middle).map_err(|e| Error::Format(format!("middle layer text: {e}")))
    }

    fn try_open_middle(&self, middle_json: &str) -> Result<Option<String>> {
        match self.decrypt_middle(middle_json) {
            Ok(encoded) => Ok(Some(encoded)),
            Err(e @ (Error::Format(_) | Error::UnknownKey(_))) => {
                warn!("Middle layer left sealed: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn decrypt_middle(&self, middle_json: &str) -> Result<String> {
        let middle = AesEnvelope::parse(middle_json)?;
        let fields = middle.decode()?;
        let key = self.keys.fetch_key(&middle.key_id)?;
        let expected = middle.algorithm.key_len();
        if key.len() != expected {
            return Err(Error::InvalidLength {
                field: "data key",
                expected,
                actual: key.len(),
            });
        }

        let plaintext = match middle.algorithm.mode() {
            AesMode::Gcm => gcm::decrypt(
                &fields.ciphertext,
                &fields.aad,
                &key,
                &fields.iv,
                &fields.tag,
            )?,
            AesMode::Cbc => cbc::decrypt(&fields.ciphertext, &key, &fields.iv)?,
        };
        debug!("Opened middle layer ({}) with key '{}'", middle.algorithm, middle.key_id);
        String::from_utf8(plaintext).map_err(|e| Error::Format(format!("inner layer text: {e}")))
    }
}

/// Base64-decodes the inner payload, or returns `encoded` unchanged if the result is
/// not a JSON object.
#[must_use]
pub fn open_inner(encoded: &str) -> String {
    match decode_inner(encoded) {
        Ok(inner) => inner,
        Err(e) => {
            warn!("Inner layer left encoded: {e}");
            encoded.to_string()
        }
    }
}

fn decode_inner(encoded: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(encoded.trim().as_bytes())
        .map_err(|e| Error::Format(format!("inner base64: {e}")))?;
    let inner = String::from_utf8(bytes).map_err(|e| Error::Format(format!("inner text: {e}")))?;
    let value: serde_json::Value =
        serde_json::from_str(&inner).map_err(|e| Error::Format(format!("inner payload: {e}")))?;
    if !value.is_object() {
        return Err(Error::Format("inner payload is not a JSON object".to_string()));
    }
    Ok(inner)
}
