//! AES-256-CBC payload encryption
//!
//! Encrypted form payloads use the layout `IV (16 bytes) || ciphertext`,
//! with the plaintext padded to the block size using PKCS#7. A fresh IV is
//! drawn from the OS random source on every call.

use aes::Aes256;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use thiserror::Error;

use crate::types::{AesKey, Iv, AES_KEY_LEN, IV_LEN};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("Empty payload")]
    EmptyPayload,

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Secure random source unavailable: {0}")]
    RandomSource(#[from] rand::Error),

    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("Invalid padding")]
    InvalidPadding,

    #[error("Invalid block size: {0} (must be 1..=255)")]
    InvalidBlockSize(usize),
}

fn check_block_size(block_size: usize) -> Result<(), EncryptionError> {
    if (1..=255).contains(&block_size) {
        Ok(())
    } else {
        Err(EncryptionError::InvalidBlockSize(block_size))
    }
}

/// Pad `data` to a multiple of `block_size` using PKCS#7
///
/// Padding is always added: aligned input gets a full block of
/// `block_size` bytes, each with value `block_size`.
pub fn pkcs7_pad(data: &[u8], block_size: usize) -> Result<Vec<u8>, EncryptionError> {
    check_block_size(block_size)?;
    let n = block_size - (data.len() % block_size);
    let mut padded = Vec::with_capacity(data.len() + n);
    padded.extend_from_slice(data);
    padded.resize(data.len() + n, n as u8);
    Ok(padded)
}

/// Strip PKCS#7 padding, checking every padding byte
pub fn pkcs7_unpad(data: &[u8], block_size: usize) -> Result<&[u8], EncryptionError> {
    check_block_size(block_size)?;
    if data.is_empty() || data.len() % block_size != 0 {
        return Err(EncryptionError::InvalidPadding);
    }
    let n = data[data.len() - 1] as usize;
    if n == 0 || n > block_size {
        return Err(EncryptionError::InvalidPadding);
    }
    let (body, padding) = data.split_at(data.len() - n);
    if padding.iter().any(|&b| b as usize != n) {
        return Err(EncryptionError::InvalidPadding);
    }
    Ok(body)
}

/// Generate a random 128-bit IV
///
/// Fails rather than falling back when the OS random source is unavailable.
pub fn generate_iv() -> Result<Iv, EncryptionError> {
    generate_iv_with(&mut OsRng)
}

pub(crate) fn generate_iv_with<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Iv, EncryptionError> {
    let mut iv = Iv::default();
    rng.try_fill_bytes(iv.as_mut_slice())?;
    Ok(iv)
}

fn aes_key(key: &[u8]) -> Result<AesKey, EncryptionError> {
    AesKey::from_slice(key).map_err(|_| EncryptionError::InvalidKeyLength {
        expected: AES_KEY_LEN,
        got: key.len(),
    })
}

/// Encrypt `plaintext` with AES-256-CBC under a fresh IV
///
/// Returns `IV || ciphertext`.
///
/// # Example
///
/// ```
/// use solidgate::crypto::{decrypt_cbc, encrypt_cbc};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let key = [1u8; 32];
/// let blob = encrypt_cbc(&key, b"card data")?;
/// assert_eq!(blob.len(), 16 + 16);
/// assert_eq!(decrypt_cbc(&key, &blob)?, b"card data");
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub fn encrypt_cbc(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    encrypt_cbc_with(&mut OsRng, key, plaintext)
}

fn encrypt_cbc_with<R: RngCore + CryptoRng>(
    rng: &mut R,
    key: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    if plaintext.is_empty() {
        return Err(EncryptionError::EmptyPayload);
    }
    let key = aes_key(key)?;
    let iv = generate_iv_with(rng)?;

    let padded = pkcs7_pad(plaintext, BLOCK_SIZE)?;
    let mut output = Vec::with_capacity(IV_LEN + padded.len());
    output.extend_from_slice(iv.as_slice());
    output.extend_from_slice(&padded);

    let padded_len = padded.len();
    Aes256CbcEnc::new_from_slices(key.as_slice(), iv.as_slice())
        .map_err(|_| EncryptionError::InvalidKeyLength {
            expected: AES_KEY_LEN,
            got: key.as_slice().len(),
        })?
        .encrypt_padded_mut::<NoPadding>(&mut output[IV_LEN..], padded_len)
        .map_err(|_| EncryptionError::MalformedCiphertext("unaligned plaintext".to_string()))?;

    Ok(output)
}

/// Decrypt an `IV || ciphertext` blob produced by [`encrypt_cbc`]
pub fn decrypt_cbc(key: &[u8], blob: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let key = aes_key(key)?;
    if blob.len() < IV_LEN + BLOCK_SIZE {
        return Err(EncryptionError::MalformedCiphertext(format!(
            "expected at least {} bytes, got {}",
            IV_LEN + BLOCK_SIZE,
            blob.len()
        )));
    }
    let (iv, ciphertext) = blob.split_at(IV_LEN);
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(EncryptionError::MalformedCiphertext(format!(
            "ciphertext length {} is not a multiple of {}",
            ciphertext.len(),
            BLOCK_SIZE
        )));
    }

    let mut buf = ciphertext.to_vec();
    let padded = Aes256CbcDec::new_from_slices(key.as_slice(), iv)
        .map_err(|_| EncryptionError::MalformedCiphertext("invalid IV".to_string()))?
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| EncryptionError::InvalidPadding)?;

    Ok(pkcs7_unpad(padded, BLOCK_SIZE)?.to_vec())
}
