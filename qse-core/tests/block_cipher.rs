#![allow(missing_docs)]
use qse_core::Error;
use qse_core::block::{INV_SBOX, KeySchedule, SBOX, gf_mul};

fn block(hex_str: &str) -> [u8; 16] {
    hex::decode(hex_str).unwrap().try_into().unwrap()
}

#[test]
fn test_sbox_matches_published_entries() {
    assert_eq!(SBOX[0x00], 0x63);
    assert_eq!(SBOX[0x01], 0x7c);
    assert_eq!(SBOX[0x53], 0xed);
    assert_eq!(SBOX[0xff], 0x16);
    for i in 0..=255u8 {
        assert_eq!(INV_SBOX[SBOX[i as usize] as usize], i);
    }
}

#[test]
fn test_field_multiplication_examples() {
    // FIPS-197 section 4.2
    assert_eq!(gf_mul(0x57, 0x83), 0xc1);
    assert_eq!(gf_mul(0x57, 0x13), 0xfe);
    assert_eq!(gf_mul(0x57, 0x01), 0x57);
    assert_eq!(gf_mul(0x00, 0xff), 0x00);
}

#[test]
fn test_key_expansion_last_round_key() {
    // FIPS-197 appendix A.1
    let schedule = KeySchedule::derive(&hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap())
        .unwrap();
    assert_eq!(schedule.rounds(), 10);
    assert_eq!(
        schedule.round_key(0).unwrap(),
        &block("2b7e151628aed2a6abf7158809cf4f3c")
    );
    assert_eq!(
        schedule.round_key(10).unwrap(),
        &block("d014f9a8c9ee2589e13f0cc8b6630ca6")
    );
    assert!(schedule.round_key(11).is_none());
}

#[test]
fn test_fips197_appendix_c_vectors() {
    let plaintext = block("00112233445566778899aabbccddeeff");
    let cases = [
        (
            "000102030405060708090a0b0c0d0e0f",
            10,
            "69c4e0d86a7b0430d8cdb78070b4c55a",
        ),
        (
            "000102030405060708090a0b0c0d0e0f1011121314151617",
            12,
            "dda97ca4864cdfe06eaf70a0ec0d7191",
        ),
        (
            "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
            14,
            "8ea2b7ca516745bfeafc49904b496089",
        ),
    ];

    for (key_hex, rounds, expected_hex) in cases {
        let schedule = KeySchedule::derive(&hex::decode(key_hex).unwrap()).unwrap();
        assert_eq!(schedule.rounds(), rounds);

        let ciphertext = schedule.encrypt_block(&plaintext);
        assert_eq!(ciphertext, block(expected_hex), "encrypt with key {key_hex}");
        assert_eq!(schedule.decrypt_block(&ciphertext), plaintext, "decrypt with key {key_hex}");
    }
}

#[test]
fn test_unsupported_key_sizes_are_rejected() {
    for len in [0, 8, 15, 17, 20, 31, 33, 64] {
        let err = KeySchedule::derive(&vec![0u8; len]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedKeySize(n) if n == len));
        assert!(err.is_length());
    }
}

#[test]
fn test_schedules_are_independent_across_threads() {
    let handles: Vec<_> = (0..4u8)
        .map(|seed| {
            std::thread::spawn(move || {
                let schedule = KeySchedule::derive(&[seed; 16]).unwrap();
                let block = [seed.wrapping_mul(3); 16];
                let ciphertext = schedule.encrypt_block(&block);
                schedule.decrypt_block(&ciphertext) == block
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

#[test]
fn test_debug_output_hides_round_keys() {
    let schedule = KeySchedule::derive(&[0x42; 32]).unwrap();
    let debug = format!("{schedule:?}");
    assert!(debug.contains("REDACTED"));
    assert!(!debug.contains("42, 42"));
}
