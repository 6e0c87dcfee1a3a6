//! HTTP client for the gateway API
//!
//! Each passthrough operation POSTs the caller's JSON body, signed as a
//! [`DirectEnvelope`](crate::DirectEnvelope), to `<base_uri><endpoint>` and
//! hands back the raw response body.
//!
//! The client does **not** interpret HTTP status codes. A returned body is
//! not proof that the server accepted the request; callers must inspect the
//! response content themselves. Non-2xx responses are only logged.
//!
//! # Example
//!
//! ```no_run
//! use solidgate::{ApiClient, ClientConfig};
//!
//! # async fn example() -> Result<(), solidgate::SolidgateError> {
//! let config = ClientConfig::new("merchant-1", "0123456789abcdef0123456789abcdef");
//! let client = ApiClient::new(&config)?;
//!
//! let response = client.charge(br#"{"order_id":"42","amount":1000}"#).await?;
//! println!("{}", String::from_utf8_lossy(&response));
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::envelope::{EnvelopeBuilder, FormInitDto, FormResignDto, FormUpdateDto};
use crate::error::SolidgateError;

/// Passthrough API endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Charge,
    Recurring,
    Refund,
    Status,
    Resign,
    Auth,
    Settle,
    Void,
    ArnCode,
    ApplePay,
    GooglePay,
}

impl Endpoint {
    pub const ALL: [Endpoint; 11] = [
        Endpoint::Charge,
        Endpoint::Recurring,
        Endpoint::Refund,
        Endpoint::Status,
        Endpoint::Resign,
        Endpoint::Auth,
        Endpoint::Settle,
        Endpoint::Void,
        Endpoint::ArnCode,
        Endpoint::ApplePay,
        Endpoint::GooglePay,
    ];

    /// Path relative to the API base URI
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Charge => "charge",
            Endpoint::Recurring => "recurring",
            Endpoint::Refund => "refund",
            Endpoint::Status => "status",
            Endpoint::Resign => "resign",
            Endpoint::Auth => "auth",
            Endpoint::Settle => "settle",
            Endpoint::Void => "void",
            Endpoint::ArnCode => "arn-code",
            Endpoint::ApplePay => "apple-pay",
            Endpoint::GooglePay => "google-pay",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .into_iter()
            .find(|e| e.path() == s)
            .ok_or_else(|| format!("Unknown endpoint: {}", s))
    }
}

/// Gateway API client
///
/// Cheap to clone; clones share the connection pool and credentials.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: Client,
    envelopes: EnvelopeBuilder,
}

impl ApiClient {
    /// Create a client from validated configuration
    pub fn new(config: &ClientConfig) -> Result<Self, SolidgateError> {
        Self::with_builder(EnvelopeBuilder::from_config(config)?)
    }

    pub fn with_builder(envelopes: EnvelopeBuilder) -> Result<Self, SolidgateError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            envelopes,
        })
    }

    pub fn envelopes(&self) -> &EnvelopeBuilder {
        &self.envelopes
    }

    /// Sign `payload` and POST it to `endpoint`, returning the raw body
    pub async fn request(
        &self,
        endpoint: Endpoint,
        payload: &[u8],
    ) -> Result<Vec<u8>, SolidgateError> {
        let envelope = self.envelopes.build_direct_envelope(payload)?;
        let url = self.envelopes.endpoint_url(endpoint.path());

        debug!(%endpoint, %url, "Sending signed request");

        let mut request = self.http_client.post(&url);
        for (name, value) in envelope.headers() {
            request = request.header(name, value);
        }
        let response = request.body(envelope.body).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%endpoint, status = status.as_u16(), "Gateway returned non-success status");
        }

        Ok(response.bytes().await?.to_vec())
    }

    pub async fn charge(&self, payload: &[u8]) -> Result<Vec<u8>, SolidgateError> {
        self.request(Endpoint::Charge, payload).await
    }

    pub async fn recurring(&self, payload: &[u8]) -> Result<Vec<u8>, SolidgateError> {
        self.request(Endpoint::Recurring, payload).await
    }

    pub async fn refund(&self, payload: &[u8]) -> Result<Vec<u8>, SolidgateError> {
        self.request(Endpoint::Refund, payload).await
    }

    pub async fn status(&self, payload: &[u8]) -> Result<Vec<u8>, SolidgateError> {
        self.request(Endpoint::Status, payload).await
    }

    pub async fn resign(&self, payload: &[u8]) -> Result<Vec<u8>, SolidgateError> {
        self.request(Endpoint::Resign, payload).await
    }

    pub async fn auth(&self, payload: &[u8]) -> Result<Vec<u8>, SolidgateError> {
        self.request(Endpoint::Auth, payload).await
    }

    pub async fn settle(&self, payload: &[u8]) -> Result<Vec<u8>, SolidgateError> {
        self.request(Endpoint::Settle, payload).await
    }

    pub async fn void(&self, payload: &[u8]) -> Result<Vec<u8>, SolidgateError> {
        self.request(Endpoint::Void, payload).await
    }

    pub async fn arn_code(&self, payload: &[u8]) -> Result<Vec<u8>, SolidgateError> {
        self.request(Endpoint::ArnCode, payload).await
    }

    pub async fn apple_pay(&self, payload: &[u8]) -> Result<Vec<u8>, SolidgateError> {
        self.request(Endpoint::ApplePay, payload).await
    }

    pub async fn google_pay(&self, payload: &[u8]) -> Result<Vec<u8>, SolidgateError> {
        self.request(Endpoint::GooglePay, payload).await
    }

    /// Encrypted intent for initializing the payment form
    pub fn form_merchant_data(&self, payload: &[u8]) -> Result<FormInitDto, SolidgateError> {
        self.envelopes.build_form_init(payload)
    }

    pub fn form_update(&self, payload: &[u8]) -> Result<FormUpdateDto, SolidgateError> {
        self.envelopes.build_form_update(payload)
    }

    pub fn form_resign(&self, payload: &[u8]) -> Result<FormResignDto, SolidgateError> {
        self.envelopes.build_form_resign(payload)
    }

    pub fn resign_form_url(&self, payload: &[u8]) -> Result<String, SolidgateError> {
        self.envelopes.build_resign_form_url(payload)
    }
}
