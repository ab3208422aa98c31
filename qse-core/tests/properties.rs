#![allow(missing_docs)]
//! Property-based tests for the ciphers and the envelope chain.

use proptest::prelude::*;

use qse_core::block::KeySchedule;
use qse_core::config::ProtocolConfig;
use qse_core::envelope::AesAlgorithm;
use qse_core::ledger::{KeyLedger, ReusePolicy};
use qse_core::protocol::EnvelopeProtocol;
use qse_core::{cbc, gcm, otp};

fn aes_key() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 16),
        prop::collection::vec(any::<u8>(), 24),
        prop::collection::vec(any::<u8>(), 32),
    ]
}

proptest! {
    #[test]
    fn padding_round_trips(data in prop::collection::vec(any::<u8>(), 0..100)) {
        let padded = cbc::pad(&data);
        prop_assert_eq!(padded.len() % 16, 0);
        prop_assert!(padded.len() > data.len());
        prop_assert_eq!(cbc::unpad(&padded).unwrap(), data);
    }

    #[test]
    fn block_decrypt_inverts_encrypt(key in aes_key(), block in any::<[u8; 16]>()) {
        let schedule = KeySchedule::derive(&key).unwrap();
        prop_assert_eq!(schedule.decrypt_block(&schedule.encrypt_block(&block)), block);
    }

    #[test]
    fn cbc_round_trips(
        key in aes_key(),
        iv in any::<[u8; 16]>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..200),
    ) {
        let ciphertext = cbc::encrypt(&plaintext, &key, &iv).unwrap();
        prop_assert_eq!(ciphertext.len(), (plaintext.len() / 16 + 1) * 16);
        prop_assert_eq!(cbc::decrypt(&ciphertext, &key, &iv).unwrap(), plaintext);
    }

    #[test]
    fn gcm_round_trips(
        key in aes_key(),
        iv in prop::collection::vec(any::<u8>(), 1..32),
        aad in prop::collection::vec(any::<u8>(), 0..40),
        plaintext in prop::collection::vec(any::<u8>(), 0..200),
    ) {
        let (ciphertext, tag) = gcm::encrypt(&plaintext, &aad, &key, &iv).unwrap();
        prop_assert_eq!(ciphertext.len(), plaintext.len());
        prop_assert_eq!(gcm::decrypt(&ciphertext, &aad, &key, &iv, &tag).unwrap(), plaintext);
    }

    #[test]
    fn otp_is_its_own_inverse(
        (data, pad) in (0..200usize).prop_flat_map(|n| (
            prop::collection::vec(any::<u8>(), n),
            prop::collection::vec(any::<u8>(), n..n + 16),
        )),
    ) {
        let ciphertext = otp::xor(&data, &pad).unwrap();
        prop_assert_eq!(otp::decrypt(&ciphertext, &pad).unwrap(), data);
    }

    #[test]
    fn envelopes_round_trip(body in ".{0,200}", pqc in "[A-Za-z0-9+/]{0,64}") {
        let protocol = EnvelopeProtocol::new(
            KeyLedger::in_memory(ReusePolicy::Refuse),
            ProtocolConfig { algorithm: AesAlgorithm::Aes128Gcm, aad: Vec::new() },
        );
        let inner = serde_json::json!({ "encryptedBody": body, "pqcCiphertext": pqc }).to_string();
        let outer = protocol.wrap(&inner).unwrap();
        prop_assert_eq!(protocol.unwrap(&outer).unwrap(), inner);
    }
}
