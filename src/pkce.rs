//! PKCE challenge computation (RFC 7636). Only `S256` is supported.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const METHOD_S256: &str = "S256";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported code challenge method '{0}'")]
pub struct UnsupportedMethod(pub String);

/// Derives the code challenge a verifier should hash to.
pub fn compute_code_challenge(method: &str, verifier: &str) -> Result<String, UnsupportedMethod> {
    match method {
        METHOD_S256 => Ok(URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))),
        other => Err(UnsupportedMethod(other.to_string())),
    }
}
