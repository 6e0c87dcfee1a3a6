//! Unified error type for the public API
//!
//! Internal modules keep their own error enums for precise handling; this
//! type is what the envelope builders and the API client return.
//!
//! # Example
//!
//! ```
//! use solidgate::{Credentials, EnvelopeBuilder, SolidgateError};
//!
//! let builder = EnvelopeBuilder::with_default_uri(Credentials::new("m1", [1u8; 32]).unwrap());
//! let err = builder.build_form_init(b"").unwrap_err();
//! assert!(err.is_empty_payload());
//! assert!(!err.is_retryable());
//! ```

use thiserror::Error;

/// Unified error type for all signing, encryption and transport operations
///
/// # Error Categories
///
/// - **EmptyPayload**: the caller passed a zero-length payload
/// - **Key / Encryption / Signature**: cryptographic or key configuration errors
/// - **Config**: missing or invalid client configuration
/// - **Http**: transport failures, passed through unchanged
///
/// Only transport failures can ever be retryable; everything else points at a
/// programming or configuration defect.
#[derive(Debug, Error)]
pub enum SolidgateError {
    #[error("Empty payload")]
    EmptyPayload,

    #[error("Key error: {0}")]
    Key(#[from] crate::types::KeyError),

    #[error("Encryption error: {0}")]
    Encryption(#[from] crate::crypto::EncryptionError),

    #[error("Signature error: {0}")]
    Signature(#[from] crate::signature::SignatureError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SolidgateError {
    /// Returns true if the error is potentially retryable
    ///
    /// The crate itself never retries; this is a hint for callers that wrap
    /// the transport in their own retry policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            #[cfg(feature = "http")]
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Returns a suggestion for resolving this error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::EmptyPayload => Some("Serialize the request body before signing it"),
            Self::Key(_) => Some("The merchant private key must be at least 32 bytes"),
            Self::Config(e) => e.suggestion(),
            _ => None,
        }
    }

    /// Returns true if the payload was rejected for being empty
    ///
    /// Covers both the envelope-level check and the encryptor's own check.
    pub fn is_empty_payload(&self) -> bool {
        matches!(
            self,
            Self::EmptyPayload | Self::Encryption(crate::crypto::EncryptionError::EmptyPayload)
        )
    }

    /// Returns true if this is a cryptographic or key error
    pub fn is_crypto_error(&self) -> bool {
        matches!(self, Self::Key(_) | Self::Encryption(_) | Self::Signature(_))
    }
}
