//! HMAC-signed envelope for state carried through browser cookies.
//!
//! Both legs of the authorization flow cross a redirect boundary, and the
//! server keeps no session table: whatever must survive the redirect is
//! serialized to JSON, authenticated with HMAC-SHA-256 and handed to the
//! browser. Wire format: `base64url( json_bytes || mac_bytes )`.

mod cookies;

pub use cookies::{
    cross_site_cookie, read_cookie, removal_cookie, strict_cookie, CookieReadError,
    COOKIE_AUTH_DATA, COOKIE_CONNECTOR_STATE, COOKIE_OAUTH_PARAMS,
};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const MAC_LEN: usize = 32;

/// Process-wide secret used to authenticate every envelope.
#[derive(Clone)]
pub struct EnvelopeKey(Vec<u8>);

impl EnvelopeKey {
    /// Decodes the secret from its standard-base64 configuration form.
    /// An empty secret would make every envelope forgeable, so it is refused.
    pub fn from_base64(encoded: &str) -> anyhow::Result<Self> {
        use base64::engine::general_purpose::STANDARD;
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|err| anyhow::anyhow!("HMAC secret is not valid base64: {}", err))?;
        if bytes.is_empty() {
            anyhow::bail!("HMAC secret must not be empty");
        }
        Ok(Self(bytes))
    }

    #[doc(hidden)]
    pub fn from_raw(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Not base64, or too short to carry a MAC.
    #[error("invalid format")]
    InvalidFormat,
    /// MAC did not match the payload.
    #[error("invalid signature")]
    InvalidSignature,
    #[error("payload encoding failed: {0}")]
    Payload(String),
}

pub fn encode<T: Serialize>(key: &EnvelopeKey, data: &T) -> Result<String, EnvelopeError> {
    let json = serde_json::to_vec(data).map_err(|err| EnvelopeError::Payload(err.to_string()))?;

    let mut mac = HmacSha256::new_from_slice(&key.0).expect("HMAC accepts any key length");
    mac.update(&json);
    let signature = mac.finalize().into_bytes();

    let mut payload = json;
    payload.extend_from_slice(&signature);
    Ok(URL_SAFE.encode(payload))
}

pub fn decode<T: DeserializeOwned>(key: &EnvelopeKey, value: &str) -> Result<T, EnvelopeError> {
    let bytes = URL_SAFE
        .decode(value)
        .map_err(|_| EnvelopeError::InvalidFormat)?;
    if bytes.len() < MAC_LEN {
        return Err(EnvelopeError::InvalidFormat);
    }

    let (message, signature) = bytes.split_at(bytes.len() - MAC_LEN);

    let mut mac = HmacSha256::new_from_slice(&key.0).expect("HMAC accepts any key length");
    mac.update(message);
    mac.verify_slice(signature)
        .map_err(|_| EnvelopeError::InvalidSignature)?;

    serde_json::from_slice(message).map_err(|err| EnvelopeError::Payload(err.to_string()))
}
