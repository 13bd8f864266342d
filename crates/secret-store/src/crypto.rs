//! Authenticated symmetric encryption for the sealed secret file.
//!
//! Wire format of the ciphertext blob: `nonce (12 bytes) || ciphertext ||
//! tag (16 bytes)`, the standard AEAD convention — `chacha20poly1305`
//! appends the tag to the ciphertext itself, so "ciphertext" below already
//! includes it.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const HKDF_INFO: &[u8] = b"cachekeeper-secret-store-v1";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decryption failed: ciphertext or authentication tag invalid")]
    DecryptionFailed,

    #[error("key seed file is the wrong length ({0} bytes, expected 32)")]
    BadSeed(usize),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// 32 random bytes, persisted once and reused as HKDF input key material.
pub fn generate_seed() -> [u8; KEY_SIZE] {
    let mut seed = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut seed);
    seed
}

/// Expand a process-local seed into the ChaCha20-Poly1305 key.
pub fn derive_key(seed: &[u8]) -> StorageResult<[u8; KEY_SIZE]> {
    if seed.len() != KEY_SIZE {
        return Err(StorageError::BadSeed(seed.len()));
    }
    let hk = Hkdf::<Sha256>::new(None, seed);
    let mut key = [0u8; KEY_SIZE];
    hk.expand(HKDF_INFO, &mut key)
        .map_err(|_| StorageError::DecryptionFailed)?;
    Ok(key)
}

/// Seal `plaintext` under `key`, returning `(nonce, ciphertext+tag)`.
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> StorageResult<(Vec<u8>, Vec<u8>)> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| StorageError::DecryptionFailed)?;

    Ok((nonce_bytes.to_vec(), ciphertext))
}

/// Open a blob produced by [`seal`]. Fails if the nonce, ciphertext or tag
/// have been tampered with.
pub fn open(key: &[u8; KEY_SIZE], nonce: &[u8], ciphertext: &[u8]) -> StorageResult<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return Err(StorageError::DecryptionFailed);
    }
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = Nonce::from_slice(nonce);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| StorageError::DecryptionFailed)
}
