//! Client configuration
//!
//! Configuration can be built in code, deserialized with serde, or read from
//! the environment:
//!
//! - `SOLIDGATE_MERCHANT_ID` (required)
//! - `SOLIDGATE_PRIVATE_KEY` (required, at least 32 bytes)
//! - `SOLIDGATE_BASE_URI` (optional, defaults to [`DEFAULT_API_URL`])

use std::fmt;

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::types::{Credentials, KeyError};

/// Production API base URI
pub const DEFAULT_API_URL: &str = "https://pay.solidgate.com/api/v1/";

pub const ENV_MERCHANT_ID: &str = "SOLIDGATE_MERCHANT_ID";
pub const ENV_PRIVATE_KEY: &str = "SOLIDGATE_PRIVATE_KEY";
pub const ENV_BASE_URI: &str = "SOLIDGATE_BASE_URI";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid base URI: {0}")]
    InvalidBaseUri(String),

    #[error("Invalid private key: {0}")]
    Key(#[from] KeyError),
}

impl ConfigError {
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::MissingVar(_) => {
                Some("Set SOLIDGATE_MERCHANT_ID and SOLIDGATE_PRIVATE_KEY before starting")
            }
            Self::InvalidBaseUri(_) => {
                Some("Use an absolute http(s) URI such as https://pay.solidgate.com/api/v1/")
            }
            Self::Key(_) => Some("Use the full private key issued in the merchant dashboard"),
        }
    }
}

/// Merchant credentials plus the API base URI
///
/// The private key is only reachable through [`ClientConfig::credentials`]
/// and is wiped from memory when the config is dropped.
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    pub merchant_id: String,
    #[serde(deserialize_with = "deserialize_secret")]
    private_key: Zeroizing<String>,
    #[serde(default = "default_base_uri")]
    pub base_uri: String,
}

fn default_base_uri() -> String {
    DEFAULT_API_URL.to_string()
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Zeroizing<String>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(Zeroizing::new)
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("merchant_id", &self.merchant_id)
            .field("private_key", &"[REDACTED]")
            .field("base_uri", &self.base_uri)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(merchant_id: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            private_key: Zeroizing::new(private_key.into()),
            base_uri: default_base_uri(),
        }
    }

    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());

        let merchant_id =
            non_empty(ENV_MERCHANT_ID).ok_or(ConfigError::MissingVar(ENV_MERCHANT_ID))?;
        let private_key =
            non_empty(ENV_PRIVATE_KEY).ok_or(ConfigError::MissingVar(ENV_PRIVATE_KEY))?;
        let base_uri = non_empty(ENV_BASE_URI).unwrap_or_else(default_base_uri);

        let config = Self {
            merchant_id: merchant_id.trim().to_string(),
            private_key: Zeroizing::new(private_key),
            base_uri,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the key length and base URI shape
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.credentials()?;
        self.normalized_base_uri()?;
        Ok(())
    }

    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        Ok(Credentials::new(
            self.merchant_id.clone(),
            self.private_key.as_bytes(),
        )?)
    }

    /// Base URI with a guaranteed trailing slash
    pub fn normalized_base_uri(&self) -> Result<String, ConfigError> {
        let uri = self.base_uri.trim();
        let has_scheme = uri.starts_with("https://") || uri.starts_with("http://");
        if !has_scheme || uri.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidBaseUri(self.base_uri.clone()));
        }
        if uri.ends_with('/') {
            Ok(uri.to_string())
        } else {
            Ok(format!("{}/", uri))
        }
    }
}
