//! Request signatures
//!
//! Every request to the gateway carries a signature computed as:
//! Base64(Hex(HMAC-SHA512(privateKey, merchantId || data || merchantId)))
//!
//! The hex-then-base64 double encoding is what the server recomputes and
//! compares against, so it has to be reproduced byte for byte.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Signature verification failed")]
    VerificationFailed,
}

/// Encoded request signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Calculate the raw HMAC-SHA512 over the merchant-bracketed data
fn calculate_hmac(merchant_id: &str, key: &[u8], data: &[u8]) -> Vec<u8> {
    // new_from_slice only rejects keys for fixed-key MACs; HMAC hashes or
    // zero-pads keys of every length, including empty ones.
    let mut mac = HmacSha512::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(merchant_id.as_bytes());
    mac.update(data);
    mac.update(merchant_id.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Sign `data` on behalf of `merchant_id`
///
/// Deterministic and infallible. An empty `data` is accepted here; payload
/// emptiness is enforced by the envelope builders.
///
/// # Example
///
/// ```
/// use solidgate::generate_signature;
///
/// let sig = generate_signature("m1", &[1u8; 32], br#"{"order":"1"}"#);
/// assert_eq!(sig, generate_signature("m1", &[1u8; 32], br#"{"order":"1"}"#));
/// ```
pub fn generate_signature(merchant_id: &str, key: &[u8], data: &[u8]) -> Signature {
    let hex_digest = hex::encode(calculate_hmac(merchant_id, key, data));
    Signature(BASE64.encode(hex_digest.as_bytes()))
}

/// Verify a signature received alongside `data`, e.g. on a callback
///
/// The comparison runs in constant time over the decoded digests.
pub fn verify_signature(
    merchant_id: &str,
    key: &[u8],
    data: &[u8],
    expected: &str,
) -> Result<(), SignatureError> {
    let calculated = hex::encode(calculate_hmac(merchant_id, key, data));

    let expected_hex = BASE64
        .decode(expected.trim())
        .map_err(|_| SignatureError::VerificationFailed)?;

    if calculated.as_bytes().ct_eq(&expected_hex).into() {
        Ok(())
    } else {
        Err(SignatureError::VerificationFailed)
    }
}
