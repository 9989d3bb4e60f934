//! Symmetric codec for request parameters and encrypted reply payloads.
//!
//! # Design
//! The session secret key arrives from the login handshake as base64. Its
//! decoded length selects the cipher (16, 24 or 32 bytes for AES-128, -192,
//! -256). Payloads are AES-CBC with an all-zero IV and PKCS#7 padding, and
//! the ciphertext travels as standard base64.
//!
//! Neither function panics or returns an error type. Any failure yields
//! `None`, and the caller decides which pipeline error that becomes.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

const ZERO_IV: [u8; 16] = [0u8; 16];

/// Encrypt UTF-8 `plaintext` with the base64 `key`, returning base64 output.
///
/// Returns `None` if the key is not valid base64 or has an unsupported length.
pub fn encrypt(key: &str, plaintext: &str) -> Option<String> {
    let key = STANDARD.decode(key.trim()).ok()?;
    let data = plaintext.as_bytes();

    let ciphertext = match key.len() {
        16 => cbc_encrypt::<aes::Aes128>(&key, data),
        24 => cbc_encrypt::<aes::Aes192>(&key, data),
        32 => cbc_encrypt::<aes::Aes256>(&key, data),
        _ => None,
    }?;

    Some(STANDARD.encode(ciphertext))
}

/// Decrypt base64 `ciphertext` with the base64 `key`.
///
/// Returns `None` on a bad key, bad base64, bad padding, or a plaintext that
/// is not UTF-8.
pub fn decrypt(key: &str, ciphertext: &str) -> Option<String> {
    let key = STANDARD.decode(key.trim()).ok()?;
    let data = STANDARD.decode(ciphertext.trim()).ok()?;

    let plaintext = match key.len() {
        16 => cbc_decrypt::<aes::Aes128>(&key, &data),
        24 => cbc_decrypt::<aes::Aes192>(&key, &data),
        32 => cbc_decrypt::<aes::Aes256>(&key, &data),
        _ => None,
    }?;

    String::from_utf8(plaintext).ok()
}

/// Whether `key` is usable by this codec at all.
pub fn is_valid_key(key: &str) -> bool {
    STANDARD
        .decode(key.trim())
        .map(|bytes| matches!(bytes.len(), 16 | 24 | 32))
        .unwrap_or(false)
}

fn cbc_encrypt<C>(key: &[u8], data: &[u8]) -> Option<Vec<u8>>
where
    C: BlockEncryptMut + BlockCipher,
    cbc::Encryptor<C>: KeyIvInit + BlockEncryptMut,
{
    let cipher = cbc::Encryptor::<C>::new_from_slices(key, &ZERO_IV).ok()?;
    Some(cipher.encrypt_padded_vec_mut::<Pkcs7>(data))
}

fn cbc_decrypt<C>(key: &[u8], data: &[u8]) -> Option<Vec<u8>>
where
    C: BlockDecryptMut + BlockCipher,
    cbc::Decryptor<C>: KeyIvInit + BlockDecryptMut,
{
    let cipher = cbc::Decryptor::<C>::new_from_slices(key, &ZERO_IV).ok()?;
    cipher.decrypt_padded_vec_mut::<Pkcs7>(data).ok()
}
