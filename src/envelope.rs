//! Signed and encrypted request envelopes
//!
//! Three shapes go to the gateway:
//!
//! - **Direct**: the caller's JSON body as-is, signed, with `Signature` and
//!   `Merchant` headers.
//! - **Form intents**: the body is encrypted with AES-256-CBC, base64url
//!   encoded, and the *encoded string* is signed. These are returned as DTOs
//!   for the payment form.
//! - **Resign form URL**: the same encrypted intent embedded as query
//!   parameters of a redirect URL.
//!
//! # Example
//!
//! ```
//! use solidgate::{Credentials, EnvelopeBuilder};
//!
//! # fn example() -> Result<(), solidgate::SolidgateError> {
//! let creds = Credentials::new("m1", [1u8; 32])?;
//! let builder = EnvelopeBuilder::new(creds, "https://x/api/v1/");
//!
//! let envelope = builder.build_direct_envelope(br#"{"order":"1"}"#)?;
//! assert_eq!(envelope.merchant, "m1");
//!
//! let url = builder.build_resign_form_url(br#"{"order":"1"}"#)?;
//! assert!(url.starts_with("https://x/api/v1/form/resign?merchant=m1&form_data="));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use base64::{engine::general_purpose::URL_SAFE as BASE64_URL, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ClientConfig, DEFAULT_API_URL};
use crate::crypto::encrypt_cbc;
use crate::error::SolidgateError;
use crate::signature::{generate_signature, verify_signature, Signature};
use crate::types::Credentials;

/// Path of the resign redirect, relative to the base URI
pub const RESIGN_FORM_PATH: &str = "form/resign";

/// A signed plaintext API request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectEnvelope {
    /// Request body, byte-identical to the caller's payload
    pub body: Vec<u8>,
    pub signature: Signature,
    pub merchant: String,
}

impl DirectEnvelope {
    /// Transport headers, in the order they are sent
    pub fn headers(&self) -> [(&'static str, &str); 4] {
        [
            ("Signature", self.signature.as_str()),
            ("Merchant", self.merchant.as_str()),
            ("Content-Type", "application/json"),
            ("Accept", "application/json"),
        ]
    }
}

/// Payment form initialization intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormInitDto {
    #[serde(rename = "PaymentIntent")]
    pub payment_intent: String,
    #[serde(rename = "Merchant")]
    pub merchant: String,
    #[serde(rename = "Signature")]
    pub signature: Signature,
}

/// Partial update of an already initialized payment form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormUpdateDto {
    #[serde(rename = "PartialIntent")]
    pub partial_intent: String,
    #[serde(rename = "Signature")]
    pub signature: Signature,
}

/// Resign form intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormResignDto {
    // Older API revisions name this field ResignIntent.
    #[serde(rename = "PaymentIntent", alias = "ResignIntent")]
    pub payment_intent: String,
    #[serde(rename = "Merchant")]
    pub merchant: String,
    #[serde(rename = "Signature")]
    pub signature: Signature,
}

/// Builds every envelope shape from one set of credentials
///
/// Holds no mutable state; clone it or share it across threads freely.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    credentials: Credentials,
    base_uri: String,
}

impl EnvelopeBuilder {
    /// Create a builder; `base_uri` is used verbatim as the URL prefix
    pub fn new(credentials: Credentials, base_uri: impl Into<String>) -> Self {
        Self {
            credentials,
            base_uri: base_uri.into(),
        }
    }

    /// Create a builder against the production API
    pub fn with_default_uri(credentials: Credentials) -> Self {
        Self::new(credentials, DEFAULT_API_URL)
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, SolidgateError> {
        Ok(Self::new(
            config.credentials()?,
            config.normalized_base_uri()?,
        ))
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn merchant_id(&self) -> &str {
        self.credentials.merchant_id()
    }

    /// Resolve an API path such as `charge` against the base URI
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.base_uri, path)
    }

    /// Sign arbitrary bytes with the merchant credentials
    pub fn sign(&self, data: &[u8]) -> Signature {
        generate_signature(
            self.credentials.merchant_id(),
            self.credentials.signing_key(),
            data,
        )
    }

    /// Check a signature received for `data`, such as a webhook body
    pub fn verify(&self, data: &[u8], signature: &str) -> Result<(), SolidgateError> {
        verify_signature(
            self.credentials.merchant_id(),
            self.credentials.signing_key(),
            data,
            signature,
        )?;
        Ok(())
    }

    /// Sign a plaintext request body
    pub fn build_direct_envelope(&self, payload: &[u8]) -> Result<DirectEnvelope, SolidgateError> {
        ensure_non_empty(payload)?;

        let signature = self.sign(payload);
        debug!(
            merchant = self.merchant_id(),
            body_len = payload.len(),
            "Built direct envelope"
        );

        Ok(DirectEnvelope {
            body: payload.to_vec(),
            signature,
            merchant: self.merchant_id().to_string(),
        })
    }

    pub fn build_form_init(&self, payload: &[u8]) -> Result<FormInitDto, SolidgateError> {
        let (intent, signature) = self.encrypt_and_sign(payload)?;
        Ok(FormInitDto {
            payment_intent: intent,
            merchant: self.merchant_id().to_string(),
            signature,
        })
    }

    pub fn build_form_update(&self, payload: &[u8]) -> Result<FormUpdateDto, SolidgateError> {
        let (intent, signature) = self.encrypt_and_sign(payload)?;
        Ok(FormUpdateDto {
            partial_intent: intent,
            signature,
        })
    }

    pub fn build_form_resign(&self, payload: &[u8]) -> Result<FormResignDto, SolidgateError> {
        let (intent, signature) = self.encrypt_and_sign(payload)?;
        Ok(FormResignDto {
            payment_intent: intent,
            merchant: self.merchant_id().to_string(),
            signature,
        })
    }

    /// Build the resign redirect URL
    ///
    /// `<base>form/resign?merchant=..&form_data=..&signature=..`, with every
    /// query value percent-encoded. The signature uses the standard base64
    /// alphabet, so its `+`, `/` and `=` are escaped.
    pub fn build_resign_form_url(&self, payload: &[u8]) -> Result<String, SolidgateError> {
        let (form_data, signature) = self.encrypt_and_sign(payload)?;
        Ok(format!(
            "{}{}?merchant={}&form_data={}&signature={}",
            self.base_uri,
            RESIGN_FORM_PATH,
            urlencoding::encode(self.merchant_id()),
            urlencoding::encode(&form_data),
            urlencoding::encode(signature.as_str()),
        ))
    }

    /// Encrypt under the derived AES key, base64url-encode, and sign the encoding
    fn encrypt_and_sign(&self, payload: &[u8]) -> Result<(String, Signature), SolidgateError> {
        ensure_non_empty(payload)?;

        let aes_key = self.credentials.aes_key();
        let encrypted = encrypt_cbc(aes_key.as_slice(), payload)?;
        let encoded = BASE64_URL.encode(&encrypted);
        let signature = self.sign(encoded.as_bytes());

        debug!(
            merchant = self.merchant_id(),
            plaintext_len = payload.len(),
            encoded_len = encoded.len(),
            "Built encrypted intent"
        );

        Ok((encoded, signature))
    }
}

fn ensure_non_empty(payload: &[u8]) -> Result<(), SolidgateError> {
    if payload.is_empty() {
        return Err(SolidgateError::EmptyPayload);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::decrypt_cbc;

    const PAYLOAD: &[u8] = br#"{"order":"1"}"#;

    fn builder() -> EnvelopeBuilder {
        let creds = Credentials::new("m1", vec![1u8; 32]).unwrap();
        EnvelopeBuilder::new(creds, "https://x/api/v1/")
    }

    fn decrypt_intent(builder: &EnvelopeBuilder, intent: &str) -> Vec<u8> {
        let blob = BASE64_URL.decode(intent).unwrap();
        decrypt_cbc(builder.credentials().aes_key().as_slice(), &blob).unwrap()
    }

    #[test]
    fn test_verify_maps_into_unified_error() {
        let b = builder();
        let signature = b.sign(PAYLOAD);
        assert!(b.verify(PAYLOAD, signature.as_str()).is_ok());

        let err = b.verify(br#"{"order":"2"}"#, signature.as_str()).unwrap_err();
        assert!(matches!(err, SolidgateError::Signature(_)));
        assert!(err.is_crypto_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_direct_envelope() {
        let b = builder();
        let envelope = b.build_direct_envelope(PAYLOAD).unwrap();

        assert_eq!(envelope.body, PAYLOAD);
        assert_eq!(envelope.merchant, "m1");
        assert_eq!(envelope.signature, generate_signature("m1", &[1u8; 32], PAYLOAD));
        assert_eq!(envelope.signature.as_str().len(), 172);

        let headers = envelope.headers();
        assert_eq!(headers[0], ("Signature", envelope.signature.as_str()));
        assert_eq!(headers[1], ("Merchant", "m1"));
        assert_eq!(headers[2], ("Content-Type", "application/json"));
        assert_eq!(headers[3], ("Accept", "application/json"));
    }

    #[test]
    fn test_form_init_signs_encoded_ciphertext() {
        let b = builder();
        let dto = b.build_form_init(PAYLOAD).unwrap();

        assert_eq!(dto.merchant, "m1");
        assert_eq!(dto.signature, b.sign(dto.payment_intent.as_bytes()));
        assert_ne!(dto.signature, b.sign(PAYLOAD));
        assert_eq!(decrypt_intent(&b, &dto.payment_intent), PAYLOAD);
    }

    #[test]
    fn test_form_update_and_resign() {
        let b = builder();

        let update = b.build_form_update(PAYLOAD).unwrap();
        assert_eq!(update.signature, b.sign(update.partial_intent.as_bytes()));
        assert_eq!(decrypt_intent(&b, &update.partial_intent), PAYLOAD);

        let resign = b.build_form_resign(PAYLOAD).unwrap();
        assert_eq!(resign.merchant, "m1");
        assert_eq!(resign.signature, b.sign(resign.payment_intent.as_bytes()));
        assert_eq!(decrypt_intent(&b, &resign.payment_intent), PAYLOAD);
    }

    #[test]
    fn test_intents_are_url_safe() {
        let b = builder();
        for _ in 0..16 {
            let dto = b.build_form_init(PAYLOAD).unwrap();
            assert!(!dto.payment_intent.contains('+'));
            assert!(!dto.payment_intent.contains('/'));
        }
    }

    #[test]
    fn test_empty_payload_rejected_everywhere() {
        let b = builder();
        assert!(matches!(b.build_direct_envelope(b""), Err(SolidgateError::EmptyPayload)));
        assert!(matches!(b.build_form_init(b""), Err(SolidgateError::EmptyPayload)));
        assert!(matches!(b.build_form_update(b""), Err(SolidgateError::EmptyPayload)));
        assert!(matches!(b.build_form_resign(b""), Err(SolidgateError::EmptyPayload)));
        assert!(matches!(b.build_resign_form_url(b""), Err(SolidgateError::EmptyPayload)));
    }

    #[test]
    fn test_dto_field_names() {
        let b = builder();

        let init = serde_json::to_value(b.build_form_init(PAYLOAD).unwrap()).unwrap();
        let mut keys: Vec<_> = init.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["Merchant", "PaymentIntent", "Signature"]);

        let update = serde_json::to_value(b.build_form_update(PAYLOAD).unwrap()).unwrap();
        let mut keys: Vec<_> = update.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["PartialIntent", "Signature"]);

        let resign = serde_json::to_value(b.build_form_resign(PAYLOAD).unwrap()).unwrap();
        assert!(resign.get("PaymentIntent").is_some());
        assert!(resign.get("Merchant").is_some());
    }

    #[test]
    fn test_resign_dto_accepts_legacy_field_name() {
        let json = r#"{"ResignIntent":"abc","Merchant":"m1","Signature":"sig"}"#;
        let dto: FormResignDto = serde_json::from_str(json).unwrap();
        assert_eq!(dto.payment_intent, "abc");
    }

    #[test]
    fn test_resign_form_url_escapes_signature() {
        let b = builder();
        let url = b.build_resign_form_url(PAYLOAD).unwrap();

        let (_, signature) = url.split_once("&signature=").unwrap();
        assert!(!signature.contains('+'));
        assert!(!signature.contains('/'));
        assert!(!signature.contains('='));

        let decoded = urlencoding::decode(signature).unwrap();
        let (_, rest) = url.split_once("&form_data=").unwrap();
        let (form_data, _) = rest.split_once("&signature=").unwrap();
        let form_data = urlencoding::decode(form_data).unwrap();
        assert_eq!(decoded, b.sign(form_data.as_bytes()).as_str());
    }

    #[test]
    fn test_from_config() {
        let config = ClientConfig::new("m1", "0123456789abcdef0123456789abcdef")
            .with_base_uri("https://x/api/v1");
        let b = EnvelopeBuilder::from_config(&config).unwrap();

        assert_eq!(b.base_uri(), "https://x/api/v1/");
        assert_eq!(b.endpoint_url("charge"), "https://x/api/v1/charge");
    }

    #[test]
    fn test_builder_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EnvelopeBuilder>();
        assert_send_sync::<Credentials>();
    }
}
