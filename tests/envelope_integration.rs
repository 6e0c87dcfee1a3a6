use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE as BASE64_URL},
    Engine as _,
};
use solidgate::{
    decrypt_cbc, generate_signature, verify_signature, ClientConfig, Credentials, EnvelopeBuilder,
    SolidgateError,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

const PAYLOAD: &[u8] = br#"{"order":"1"}"#;

fn builder(base_uri: &str) -> EnvelopeBuilder {
    let creds = Credentials::new("m1", vec![0x01u8; 32]).expect("valid key");
    EnvelopeBuilder::new(creds, base_uri)
}

#[test]
fn test_direct_envelope_scenario() -> Result<(), Box<dyn std::error::Error>> {
    let envelope = builder("https://x/api/v1/").build_direct_envelope(PAYLOAD)?;

    assert_eq!(envelope.body, PAYLOAD);
    assert_eq!(envelope.merchant, "m1");

    // Base64 over the 128-char hex digest of HMAC-SHA512
    let signature = envelope.signature.as_str();
    assert_eq!(signature.len(), 172);
    let hex_digest = String::from_utf8(BASE64.decode(signature)?)?;
    assert_eq!(hex::decode(&hex_digest)?.len(), 64);

    assert!(verify_signature("m1", &[0x01u8; 32], PAYLOAD, signature).is_ok());
    Ok(())
}

#[test]
fn test_resign_form_url_scenario() -> Result<(), Box<dyn std::error::Error>> {
    let b = builder("https://x/api/v1/");
    let url = b.build_resign_form_url(PAYLOAD)?;

    let prefix = "https://x/api/v1/form/resign?merchant=m1&form_data=";
    assert!(url.starts_with(prefix), "unexpected url: {}", url);

    let rest = &url[prefix.len()..];
    let (form_data, signature) = rest.split_once("&signature=").expect("signature param");
    let form_data = urlencoding::decode(form_data)?;
    let signature = urlencoding::decode(signature)?;

    assert!(form_data
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '='));
    assert_eq!(signature, b.sign(form_data.as_bytes()).as_str());

    let blob = BASE64_URL.decode(form_data.as_bytes())?;
    assert_eq!(decrypt_cbc(&[0x01u8; 32], &blob)?, PAYLOAD);
    Ok(())
}

#[test]
fn test_signature_binds_encoded_ciphertext_not_plaintext() -> Result<(), Box<dyn std::error::Error>> {
    let b = builder("https://x/api/v1/");
    let dto = b.build_form_init(PAYLOAD)?;

    // The signature is a function of the wire string alone
    let wire = dto.payment_intent.clone();
    assert_eq!(dto.signature, generate_signature("m1", &[0x01u8; 32], wire.as_bytes()));

    // A different plaintext yields a different intent, but signing the
    // original wire string still reproduces the original signature.
    let other = b.build_form_init(br#"{"order":"2"}"#)?;
    assert_ne!(other.payment_intent, wire);
    assert_eq!(b.sign(wire.as_bytes()), dto.signature);

    // One changed character in the wire string changes the signature
    let mut tampered = wire.into_bytes();
    tampered[20] = if tampered[20] == b'A' { b'B' } else { b'A' };
    assert_ne!(b.sign(&tampered), dto.signature);
    Ok(())
}

#[test]
fn test_every_envelope_rejects_empty_payload() {
    let b = builder("https://x/api/v1/");

    let results: Vec<SolidgateError> = vec![
        b.build_direct_envelope(b"").unwrap_err(),
        b.build_form_init(b"").unwrap_err(),
        b.build_form_update(b"").unwrap_err(),
        b.build_form_resign(b"").unwrap_err(),
        b.build_resign_form_url(b"").unwrap_err(),
    ];

    for err in results {
        assert!(err.is_empty_payload(), "unexpected error: {}", err);
    }
}

#[test]
fn test_short_private_key_fails_at_construction() {
    let err = EnvelopeBuilder::from_config(&ClientConfig::new("m1", "0123456789")).unwrap_err();
    assert!(matches!(err, SolidgateError::Config(_)));
    assert!(err.suggestion().is_some());
}

#[test]
fn test_concurrent_encryption_uses_distinct_ivs() {
    let b = Arc::new(builder("https://x/api/v1/"));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let b = Arc::clone(&b);
            thread::spawn(move || {
                (0..16)
                    .map(|_| b.build_form_update(PAYLOAD).expect("encrypt").partial_intent)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ivs = HashSet::new();
    for handle in handles {
        for intent in handle.join().expect("worker panicked") {
            let blob = BASE64_URL.decode(intent).expect("base64url");
            assert!(ivs.insert(blob[..16].to_vec()), "IV reused");
        }
    }
    assert_eq!(ivs.len(), 8 * 16);
}
