#![allow(missing_docs)]
use qse_core::Error;
use qse_core::gcm::{TAG_LEN, decrypt, encrypt, gf128_mul, increment_counter};

fn h(s: &str) -> Vec<u8> {
    hex::decode(s).unwrap()
}

const TC3_KEY: &str = "feffe9928665731c6d6a8f9467308308";
const TC3_IV: &str = "cafebabefacedbaddecaf888";
const TC4_AAD: &str = "feedfacedeadbeeffeedfacedeadbeefabaddad2";
const TC3_PLAINTEXT: &str = "d9313225f88406e5a55909c5aff5269a\
                             86a7a9531534f7da2e4c303d8a318a72\
                             1c3c0c95956809532fcf0e2449a6b525\
                             b16aedf5aa0de657ba637b391aafd255";
const TC3_CIPHERTEXT: &str = "42831ec2217774244b7221b784d0d49c\
                              e3aa212f2c02a4e035c17e2329aca12e\
                              21d514b25466931c7d8f6a5aac84aa05\
                              1ba30b396a0aac973d58e091473f5985";

fn tc4() -> (Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>) {
    let plaintext = h(TC3_PLAINTEXT)[..60].to_vec();
    (h(TC3_KEY), h(TC3_IV), h(TC4_AAD), plaintext)
}

#[test]
fn test_case_1_empty_everything() {
    let (ciphertext, tag) = encrypt(b"", b"", &[0u8; 16], &[0u8; 12]).unwrap();
    assert!(ciphertext.is_empty());
    assert_eq!(tag.to_vec(), h("58e2fccefa7e3061367f1d57a4e7455a"));
}

#[test]
fn test_case_2_single_zero_block() {
    let (ciphertext, tag) = encrypt(&[0u8; 16], b"", &[0u8; 16], &[0u8; 12]).unwrap();
    assert_eq!(ciphertext, h("0388dace60b6a392f328c2b971b2fe78"));
    assert_eq!(tag.to_vec(), h("ab6e47d42cec13bdf53a67b21257bddf"));
}

#[test]
fn test_case_3_four_blocks() {
    let (ciphertext, tag) = encrypt(&h(TC3_PLAINTEXT), b"", &h(TC3_KEY), &h(TC3_IV)).unwrap();
    assert_eq!(ciphertext, h(TC3_CIPHERTEXT));
    assert_eq!(tag.to_vec(), h("4d5c2af327cd64a62cf35abd2ba6fab4"));
}

#[test]
fn test_case_4_partial_block_with_aad() {
    let (key, iv, aad, plaintext) = tc4();
    let (ciphertext, tag) = encrypt(&plaintext, &aad, &key, &iv).unwrap();
    assert_eq!(ciphertext, h(TC3_CIPHERTEXT)[..60].to_vec());
    assert_eq!(tag.to_vec(), h("5bc94fbc3221a5db94fae95ae7121a47"));

    let decrypted = decrypt(&ciphertext, &aad, &key, &iv, &tag).unwrap();
    assert_eq!(decrypted, plaintext);
}

#[test]
fn test_case_5_short_nonce_goes_through_ghash() {
    let (key, _, aad, plaintext) = tc4();
    let iv = h("cafebabefacedbad");
    let (ciphertext, tag) = encrypt(&plaintext, &aad, &key, &iv).unwrap();
    assert_eq!(tag.to_vec(), h("3612d2e79e3b0785561be14aaca2fccb"));
    assert_eq!(decrypt(&ciphertext, &aad, &key, &iv, &tag).unwrap(), plaintext);
}

#[test]
fn test_cases_13_and_14_aes256() {
    let key = [0u8; 32];
    let (ciphertext, tag) = encrypt(b"", b"", &key, &[0u8; 12]).unwrap();
    assert!(ciphertext.is_empty());
    assert_eq!(tag.to_vec(), h("530f8afbc74536b9a963b4f1c4cb738b"));

    let (ciphertext, tag) = encrypt(&[0u8; 16], b"", &key, &[0u8; 12]).unwrap();
    assert_eq!(ciphertext, h("cea7403d4d606b6e074ec5d3baf39d18"));
    assert_eq!(tag.to_vec(), h("d0d1c8a799996bf0265b98b5d48ab919"));
}

#[test]
fn test_empty_plaintext_with_twelve_byte_nonce() {
    let key = h(TC3_KEY);
    let iv = h(TC3_IV);
    let (ciphertext, tag) = encrypt(b"", b"", &key, &iv).unwrap();
    assert!(ciphertext.is_empty());
    assert_eq!(tag.len(), TAG_LEN);

    assert!(decrypt(&ciphertext, b"", &key, &iv, &tag).unwrap().is_empty());

    let mut wrong = tag;
    wrong[0] ^= 0x01;
    assert!(matches!(
        decrypt(&ciphertext, b"", &key, &iv, &wrong),
        Err(Error::Authentication)
    ));
    assert!(matches!(
        decrypt(&ciphertext, b"", &key, &iv, &[0u8; 16]),
        Err(Error::Authentication)
    ));
}

#[test]
fn test_every_ciphertext_bit_flip_is_detected() {
    let (key, iv, aad, plaintext) = tc4();
    let (ciphertext, tag) = encrypt(&plaintext, &aad, &key, &iv).unwrap();
    for byte in 0..ciphertext.len() {
        for bit in 0..8 {
            let mut tampered = ciphertext.clone();
            tampered[byte] ^= 1 << bit;
            assert!(matches!(
                decrypt(&tampered, &aad, &key, &iv, &tag),
                Err(Error::Authentication)
            ));
        }
    }
}

#[test]
fn test_aad_and_tag_bit_flips_are_detected() {
    let (key, iv, aad, plaintext) = tc4();
    let (ciphertext, tag) = encrypt(&plaintext, &aad, &key, &iv).unwrap();

    for byte in 0..aad.len() {
        let mut tampered = aad.clone();
        tampered[byte] ^= 0x80;
        assert!(matches!(
            decrypt(&ciphertext, &tampered, &key, &iv, &tag),
            Err(Error::Authentication)
        ));
    }
    for byte in 0..TAG_LEN {
        for bit in 0..8 {
            let mut tampered = tag;
            tampered[byte] ^= 1 << bit;
            assert!(matches!(
                decrypt(&ciphertext, &aad, &key, &iv, &tampered),
                Err(Error::Authentication)
            ));
        }
    }
    // Dropping the AAD entirely is also a mismatch.
    assert!(matches!(
        decrypt(&ciphertext, b"", &key, &iv, &tag),
        Err(Error::Authentication)
    ));
}

#[test]
fn test_length_errors() {
    let key = [0u8; 16];
    let err = encrypt(b"x", b"", &key, b"").unwrap_err();
    assert!(err.is_length());

    let err = decrypt(b"x", b"", &key, &[0u8; 12], &[0u8; 12]).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidLength {
            expected: 16,
            actual: 12,
            ..
        }
    ));

    assert!(matches!(
        encrypt(b"x", b"", &[0u8; 10], &[0u8; 12]),
        Err(Error::UnsupportedKeySize(10))
    ));
}

#[test]
fn test_counter_wraps_within_low_word() {
    let mut block = [0xabu8; 16];
    block[12..].copy_from_slice(&[0xff; 4]);
    let next = increment_counter(&block);
    assert_eq!(&next[..12], &[0xab; 12]);
    assert_eq!(&next[12..], &[0, 0, 0, 0]);

    let mut block = [0u8; 16];
    block[15] = 0x01;
    let next = increment_counter(&block);
    assert_eq!(next[15], 0x02);
    assert!(next[..15].iter().all(|&b| b == 0));
}

#[test]
fn test_field_multiplication_identity_and_symmetry() {
    let one = 1u128 << 127;
    let x = 0x66e9_4bd4_ef8a_2c3b_884c_fa59_ca34_2b2e_u128;
    let y = 0x0388_dace_60b6_a392_f328_c2b9_71b2_fe78_u128;
    assert_eq!(gf128_mul(x, one), x);
    assert_eq!(gf128_mul(one, y), y);
    assert_eq!(gf128_mul(x, y), gf128_mul(y, x));
    assert_eq!(gf128_mul(x, 0), 0);
}

#[test]
fn test_long_message_round_trip() {
    let key = [0x11u8; 24];
    let iv = [0x22u8; 12];
    let plaintext: Vec<u8> = (0..4099u32).map(|i| (i % 251) as u8).collect();
    let (ciphertext, tag) = encrypt(&plaintext, b"header", &key, &iv).unwrap();
    assert_eq!(ciphertext.len(), plaintext.len());
    assert_eq!(decrypt(&ciphertext, b"header", &key, &iv, &tag).unwrap(), plaintext);
}
