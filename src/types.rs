//! Zeroizing key material and merchant credentials
//!
//! The private key issued to a merchant does double duty: the full key is the
//! HMAC secret for request signatures, and its first 32 bytes are the AES-256
//! key for encrypted form payloads. Both are wiped from memory on drop.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Length of the AES-256 key derived from the private key
pub const AES_KEY_LEN: usize = 32;

/// Length of the CBC initialization vector (one AES block)
pub const IV_LEN: usize = 16;

/// AES-256 key (32 bytes) that zeroizes on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AesKey(pub(crate) [u8; AES_KEY_LEN]);

impl AesKey {
    /// Create a new AES key from a 32-byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != AES_KEY_LEN {
            return Err(KeyError::InvalidLength {
                expected: AES_KEY_LEN,
                got: bytes.len(),
            });
        }
        let mut key = [0u8; AES_KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(AesKey(key))
    }

    /// Get a reference to the key bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

/// CBC initialization vector
///
/// Not secret, but must never repeat under the same key.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Iv(pub(crate) [u8; IV_LEN]);

impl Iv {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != IV_LEN {
            return Err(KeyError::InvalidLength {
                expected: IV_LEN,
                got: bytes.len(),
            });
        }
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(bytes);
        Ok(Iv(iv))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl fmt::Debug for Iv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Iv({})", hex::encode(self.0))
    }
}

/// Merchant private key, at least 32 bytes
#[derive(Clone)]
pub struct PrivateKey(Zeroizing<Vec<u8>>);

impl PrivateKey {
    /// Wrap raw key bytes, rejecting keys too short to derive an AES-256 key
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, KeyError> {
        let bytes = Zeroizing::new(bytes.into());
        if bytes.len() < AES_KEY_LEN {
            return Err(KeyError::InvalidLength {
                expected: AES_KEY_LEN,
                got: bytes.len(),
            });
        }
        Ok(PrivateKey(bytes))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// The AES-256 key: the first 32 bytes of the private key
    pub fn aes_key(&self) -> AesKey {
        // Length is checked in `new`.
        let mut key = [0u8; AES_KEY_LEN];
        key.copy_from_slice(&self.0[..AES_KEY_LEN]);
        AesKey(key)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED; {}])", self.0.len())
    }
}

/// Merchant identity and shared secret
///
/// Built once and never mutated; share it by reference or clone it into
/// each [`EnvelopeBuilder`](crate::EnvelopeBuilder).
#[derive(Clone, Debug)]
pub struct Credentials {
    merchant_id: String,
    private_key: PrivateKey,
}

impl Credentials {
    /// Create credentials, failing fast when the key is shorter than 32 bytes
    ///
    /// # Example
    ///
    /// ```
    /// use solidgate::Credentials;
    ///
    /// let creds = Credentials::new("merchant-1", [7u8; 32]).unwrap();
    /// assert_eq!(creds.merchant_id(), "merchant-1");
    /// assert!(Credentials::new("merchant-1", [7u8; 16]).is_err());
    /// ```
    pub fn new(
        merchant_id: impl Into<String>,
        private_key: impl Into<Vec<u8>>,
    ) -> Result<Self, KeyError> {
        Ok(Self {
            merchant_id: merchant_id.into(),
            private_key: PrivateKey::new(private_key)?,
        })
    }

    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    /// Full private key, used as the HMAC secret
    pub fn signing_key(&self) -> &[u8] {
        self.private_key.as_slice()
    }

    pub fn aes_key(&self) -> AesKey {
        self.private_key.aes_key()
    }
}

/// Key-related errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },
}
