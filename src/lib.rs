//! Request signing and payload encryption for the Solidgate payment API
//!
//! Every call to the gateway is authenticated with an HMAC-SHA512 signature
//! over the exact bytes sent. Payment form flows additionally encrypt the
//! request with AES-256-CBC, keyed by the first 32 bytes of the merchant's
//! private key, so card and token data never travel or land in a redirect
//! URL in plaintext.
//!
//! - [`signature`]: signature generation and verification
//! - [`crypto`]: PKCS#7 padding and AES-256-CBC with random IVs
//! - [`envelope`]: direct requests, form intent DTOs and the resign URL
//! - [`api`]: reqwest transport for the passthrough endpoints (feature `http`)

pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod signature;
pub mod types;

#[cfg(feature = "http")]
pub mod api;

#[cfg(feature = "http")]
pub use api::{ApiClient, Endpoint};
pub use config::{ClientConfig, ConfigError, DEFAULT_API_URL};
pub use crypto::{decrypt_cbc, encrypt_cbc, EncryptionError};
pub use envelope::{DirectEnvelope, EnvelopeBuilder, FormInitDto, FormResignDto, FormUpdateDto};
pub use error::SolidgateError;
pub use signature::{generate_signature, verify_signature, Signature, SignatureError};
pub use types::{AesKey, Credentials, Iv, KeyError, PrivateKey};
