//! Verification of the `Upstash-Signature` header on queue deliveries.
//!
//! The header is an HS256 JWT signed with the current or next signing key.
//! Its `body` claim is the URL-safe base64 SHA-256 of the raw request body.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "upstash-signature";
const ISSUER: &str = "Upstash";
/// Allowed clock drift when checking `exp` and `nbf`.
const CLOCK_TOLERANCE_SECS: i64 = 5;

#[derive(Debug, Error, PartialEq)]
pub enum SignatureError {
    #[error("missing signature header")]
    Missing,
    #[error("malformed signature token")]
    Malformed,
    #[error("signature does not match any signing key")]
    BadSignature,
    #[error("invalid claim: {0}")]
    InvalidClaim(&'static str),
}

#[derive(Debug, Deserialize)]
struct Claims {
    iss: String,
    #[serde(default)]
    sub: String,
    exp: i64,
    #[serde(default)]
    nbf: i64,
    body: String,
}

#[derive(Clone)]
pub struct SignatureVerifier {
    current_key: String,
    next_key: Option<String>,
    /// Expected `sub` claim. Unchecked when `None`.
    url: Option<String>,
}

impl SignatureVerifier {
    pub fn new(current_key: String, next_key: Option<String>, url: Option<String>) -> Self {
        Self {
            current_key,
            next_key: next_key.filter(|k| !k.is_empty()),
            url,
        }
    }

    pub fn verify(&self, token: Option<&str>, body: &[u8]) -> Result<(), SignatureError> {
        let token = token.ok_or(SignatureError::Missing)?;
        match verify_with_key(&self.current_key, token, body, self.url.as_deref()) {
            Err(SignatureError::BadSignature) => match &self.next_key {
                Some(next) => verify_with_key(next, token, body, self.url.as_deref()),
                None => Err(SignatureError::BadSignature),
            },
            other => other,
        }
    }
}

fn verify_with_key(
    key: &str,
    token: &str,
    body: &[u8],
    url: Option<&str>,
) -> Result<(), SignatureError> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(SignatureError::Malformed);
    };

    let signature = URL_SAFE_NO_PAD
        .decode(signature.trim_end_matches('='))
        .map_err(|_| SignatureError::Malformed)?;
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).map_err(|_| SignatureError::BadSignature)?;
    mac.update(header.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| SignatureError::BadSignature)?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| SignatureError::Malformed)?;
    let claims: Claims = serde_json::from_slice(&payload).map_err(|_| SignatureError::Malformed)?;

    if claims.iss != ISSUER {
        return Err(SignatureError::InvalidClaim("iss"));
    }
    if let Some(url) = url {
        if claims.sub != url {
            return Err(SignatureError::InvalidClaim("sub"));
        }
    }
    let now = Utc::now().timestamp();
    if now > claims.exp + CLOCK_TOLERANCE_SECS {
        return Err(SignatureError::InvalidClaim("exp"));
    }
    if now + CLOCK_TOLERANCE_SECS < claims.nbf {
        return Err(SignatureError::InvalidClaim("nbf"));
    }

    let body_hash = URL_SAFE_NO_PAD.encode(Sha256::digest(body));
    if claims.body.trim_end_matches('=') != body_hash {
        return Err(SignatureError::InvalidClaim("body"));
    }
    Ok(())
}
