//! Property-based tests for the codec and URL building
//!
//! These tests verify invariants that must hold for every input:
//!
//! 1. **Round-trip**: decrypt(K, encrypt(K, p)) == p for all plaintexts and key sizes
//! 2. **Totality**: encrypt and decrypt never panic, whatever the key or input
//! 3. **Last write wins**: a query name appears once, carrying its latest value

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use proptest::prelude::*;
use url::Url;
use zpw_core::{build_url, crypto, QueryValue};

fn key_of(size: usize, bytes: &[u8]) -> String {
    STANDARD.encode(&bytes[..size])
}

/// Every value carried under `name` in `url`.
fn values_of(url: &str, name: &str) -> Vec<String> {
    Url::parse(url)
        .unwrap()
        .query_pairs()
        .filter(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_encrypt_decrypt_roundtrip(
        plaintext in any::<String>(),
        size in prop::sample::select(vec![16usize, 24, 32]),
        bytes in prop::collection::vec(any::<u8>(), 32),
    ) {
        let key = key_of(size, &bytes);
        let ciphertext = crypto::encrypt(&key, &plaintext).unwrap();
        prop_assert_eq!(crypto::decrypt(&key, &ciphertext), Some(plaintext));
    }

    #[test]
    fn prop_ciphertext_is_whole_blocks(
        plaintext in any::<String>(),
        bytes in prop::collection::vec(any::<u8>(), 32),
    ) {
        let ciphertext = crypto::encrypt(&key_of(16, &bytes), &plaintext).unwrap();
        let raw = STANDARD.decode(ciphertext).unwrap();
        prop_assert_eq!(raw.len() % 16, 0);
        prop_assert!(raw.len() > plaintext.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_arbitrary_keys_never_panic(
        key in any::<String>(),
        plaintext in any::<String>(),
        junk in any::<String>(),
    ) {
        // Absent or present are both fine; a usable key must still round-trip.
        if let Some(ciphertext) = crypto::encrypt(&key, &plaintext) {
            prop_assert!(crypto::is_valid_key(&key));
            prop_assert_eq!(crypto::decrypt(&key, &ciphertext), Some(plaintext));
        } else {
            prop_assert!(!crypto::is_valid_key(&key));
        }
        let _ = crypto::decrypt(&key, &junk);
    }

    #[test]
    fn prop_arbitrary_key_bytes_never_panic(
        bytes in prop::collection::vec(any::<u8>(), 0..64),
        plaintext in any::<String>(),
    ) {
        let key = STANDARD.encode(&bytes);
        let usable = matches!(bytes.len(), 16 | 24 | 32);
        prop_assert_eq!(crypto::encrypt(&key, &plaintext).is_some(), usable);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_build_url_last_write_wins(
        name in "[a-j_]{1,8}",
        first in any::<String>(),
        second in any::<String>(),
    ) {
        let base = "https://h/api/x?zz=keep";

        let once = build_url(base, &[(name.as_str(), QueryValue::from(first.as_str()))]).unwrap();
        let twice = build_url(&once, &[(name.as_str(), QueryValue::from(second.as_str()))]).unwrap();
        prop_assert_eq!(values_of(&twice, &name), vec![second.clone()]);
        prop_assert_eq!(values_of(&twice, "zz"), vec!["keep".to_string()]);

        let single_call = build_url(
            base,
            &[
                (name.as_str(), QueryValue::from(first.as_str())),
                (name.as_str(), QueryValue::from(second.as_str())),
            ],
        )
        .unwrap();
        prop_assert_eq!(values_of(&single_call, &name), vec![second]);
    }

    #[test]
    fn prop_build_url_is_idempotent(
        name in "[a-j_]{1,8}",
        value in any::<i64>(),
    ) {
        let params = [(name.as_str(), QueryValue::Int(value))];
        let once = build_url("https://h/api/x", &params).unwrap();
        let twice = build_url(&once, &params).unwrap();
        prop_assert_eq!(once, twice);
    }
}
