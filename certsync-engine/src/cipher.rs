//! ChaCha20-Poly1305 seal/open for certificate files.
//!
//! Encrypted object layout:
//!
//! ```text
//! [version: 1 byte = 0x01][nonce: 12 bytes][ciphertext || tag: len + 16 bytes]
//! ```
//!
//! Every seal draws a fresh random nonce, so sealing the same plaintext twice
//! yields different objects. Change detection therefore hashes plaintext,
//! never ciphertext.

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Nonce,
};

use certsync_core::EncryptionKey;

use crate::error::CipherError;

const FORMAT_VERSION: u8 = 0x01;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + NONCE_LEN;

/// Encrypt `plaintext` under `key`.
pub fn seal(plaintext: &[u8], key: &EncryptionKey) -> Result<Vec<u8>, CipherError> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CipherError::Seal)?;

    let mut sealed = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    sealed.push(FORMAT_VERSION);
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt an object produced by [`seal`].
///
/// Fails with [`CipherError::Authentication`] when `key` is not the key the
/// object was sealed with, or the bytes were altered.
pub fn open(sealed: &[u8], key: &EncryptionKey) -> Result<Vec<u8>, CipherError> {
    if sealed.len() < HEADER_LEN + TAG_LEN {
        return Err(CipherError::Truncated { len: sealed.len() });
    }
    let (header, ciphertext) = sealed.split_at(HEADER_LEN);
    if header[0] != FORMAT_VERSION {
        return Err(CipherError::UnsupportedVersion(header[0]));
    }
    let nonce = Nonce::from_slice(&header[1..]);

    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CipherError::Authentication)
}
