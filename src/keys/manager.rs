//! Key manager: loads (or generates) the RSA signing keys at startup,
//! publishes the public JWKS and signs every token the server issues.

use std::sync::RwLock;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{KeyStore, PrivateKey, TokenClaims};
use crate::random;

const RSA_BITS: usize = 4096;

/// Public half of a signing key, as served by `/.well-known/jwks.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub alg: String,
    pub kid: String,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

struct LoadedKey {
    kid: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    jwk: Jwk,
}

impl LoadedKey {
    fn parse(key: &PrivateKey) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs1_pem(&key.private_key_pem)
            .with_context(|| format!("Failed to parse PEM for key {}", key.kid))?;
        let public = RsaPublicKey::from(&private);

        let n = URL_SAFE_NO_PAD.encode(public.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(public.e().to_bytes_be());

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key_pem.as_bytes())
            .with_context(|| format!("Failed to build signing key {}", key.kid))?;
        let decoding_key = DecodingKey::from_rsa_components(&n, &e)
            .with_context(|| format!("Failed to build verification key {}", key.kid))?;

        Ok(Self {
            kid: key.kid.clone(),
            encoding_key,
            decoding_key,
            jwk: Jwk {
                kty: "RSA".to_string(),
                use_: "sig".to_string(),
                alg: "RS256".to_string(),
                kid: key.kid.clone(),
                n,
                e,
            },
        })
    }
}

/// Holds every loaded signing key. The set is append-only and the first key
/// signs; there is no rotation or expiry.
pub struct KeyManager {
    keys: RwLock<Vec<LoadedKey>>,
}

impl KeyManager {
    /// Must complete before the server accepts traffic: loads all stored
    /// keys and, when none exist, generates and persists a fresh RSA key.
    pub fn init(store: &dyn KeyStore) -> Result<Self> {
        let mut stored = store.all()?;

        if stored.is_empty() {
            info!("No private keys found, generating a new RSA key");
            let private = RsaPrivateKey::new(&mut OsRng, RSA_BITS)
                .context("Failed to generate RSA key")?;
            let pem = private
                .to_pkcs1_pem(LineEnding::LF)
                .context("Failed to encode RSA key")?
                .to_string();
            let key = PrivateKey {
                kid: random::token(),
                private_key_pem: pem,
                created_at: Utc::now(),
            };
            store.put(&key).context("Failed to save RSA key")?;
            stored.push(key);
        }

        let mut keys = Vec::with_capacity(stored.len());
        for key in &stored {
            info!("Using JWK kid={}", key.kid);
            keys.push(LoadedKey::parse(key)?);
        }

        Ok(Self {
            keys: RwLock::new(keys),
        })
    }

    /// Serialized public JWKS, suitable for `/.well-known/jwks.json`.
    pub fn public_jwks(&self) -> Result<String> {
        let keys = self.keys.read().unwrap();
        let set = JwkSet {
            keys: keys.iter().map(|k| k.jwk.clone()).collect(),
        };
        Ok(serde_json::to_string(&set)?)
    }

    /// Signs the claims with the first key, RS256, `kid` in the header.
    /// Returns the compact JWT and the kid that signed it.
    pub fn sign(&self, claims: &TokenClaims) -> Result<(String, String)> {
        let keys = self.keys.read().unwrap();
        let key = keys
            .first()
            .ok_or_else(|| anyhow!("No signing keys available"))?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(key.kid.clone());

        let token = jsonwebtoken::encode(&header, claims, &key.encoding_key)
            .context("Failed to sign JWT")?;
        Ok((token, key.kid.clone()))
    }

    /// Verifies a token we issued ourselves and returns its subject.
    /// Signature and temporal claims are checked; audience is not.
    pub fn verify_own_token(&self, token: &str) -> Result<String> {
        let header = jsonwebtoken::decode_header(token).context("Failed to parse JWT header")?;
        let kid = header.kid.ok_or_else(|| anyhow!("JWT has no kid"))?;

        let keys = self.keys.read().unwrap();
        let key = keys
            .iter()
            .find(|k| k.kid == kid)
            .ok_or_else(|| anyhow!("Unknown kid {}", kid))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        validation.validate_nbf = true;

        let data = jsonwebtoken::decode::<BearerClaims>(token, &key.decoding_key, &validation)
            .context("JWT verification failed")?;
        Ok(data.claims.sub)
    }
}

#[derive(Debug, Deserialize)]
struct BearerClaims {
    sub: String,
    #[allow(dead_code)]
    exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::MemoryKeyStore;
    use chrono::{DateTime, Duration};

    // 2048-bit key so the test suite does not pay for a 4096-bit generation.
    const TEST_PEM: &str = include_str!("test_signing_key.pem");

    fn seeded_manager(kids: &[&str]) -> KeyManager {
        let keys = kids
            .iter()
            .enumerate()
            .map(|(i, kid)| PrivateKey {
                kid: kid.to_string(),
                private_key_pem: TEST_PEM.to_string(),
                created_at: DateTime::<Utc>::from_timestamp(100 + i as i64, 0).unwrap(),
            })
            .collect();
        KeyManager::init(&MemoryKeyStore::seeded(keys)).unwrap()
    }

    fn claims(exp_offset_hours: i64) -> TokenClaims {
        let now = Utc::now();
        TokenClaims {
            iss: "https://issuer".to_string(),
            aud: "c1".to_string(),
            sub: "acc-1".to_string(),
            iat: now.timestamp(),
            auth_time: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::hours(exp_offset_hours)).timestamp(),
            email: "alice@x.com".to_string(),
            email_verified: true,
            name: "Alice".to_string(),
            picture: String::new(),
            roles: vec![],
        }
    }

    #[test]
    fn signed_token_carries_kid_published_in_jwks() {
        let manager = seeded_manager(&["kid-1"]);

        let (token, kid) = manager.sign(&claims(24)).unwrap();
        assert_eq!(kid, "kid-1");

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("kid-1"));
        assert_eq!(header.alg, Algorithm::RS256);

        let jwks: JwkSet = serde_json::from_str(&manager.public_jwks().unwrap()).unwrap();
        assert!(jwks.keys.iter().any(|k| k.kid == "kid-1"));
        assert_eq!(jwks.keys[0].kty, "RSA");
        assert_eq!(jwks.keys[0].alg, "RS256");
    }

    #[test]
    fn first_key_signs_when_several_exist() {
        let manager = seeded_manager(&["kid-a", "kid-b"]);
        let (_, kid) = manager.sign(&claims(24)).unwrap();
        assert_eq!(kid, "kid-a");

        let jwks: JwkSet = serde_json::from_str(&manager.public_jwks().unwrap()).unwrap();
        assert_eq!(jwks.keys.len(), 2);
    }

    #[test]
    fn own_token_round_trip() {
        let manager = seeded_manager(&["kid-1"]);
        let (token, _) = manager.sign(&claims(24)).unwrap();
        assert_eq!(manager.verify_own_token(&token).unwrap(), "acc-1");
    }

    #[test]
    fn expired_token_is_rejected() {
        let manager = seeded_manager(&["kid-1"]);
        let (token, _) = manager.sign(&claims(-1)).unwrap();
        assert!(manager.verify_own_token(&token).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let manager = seeded_manager(&["kid-1"]);
        let (token, _) = manager.sign(&claims(24)).unwrap();
        let mut parts: Vec<String> = token.split('.').map(|s| s.to_string()).collect();
        parts[1] = URL_SAFE_NO_PAD.encode(b"{\"sub\":\"somebody-else\",\"exp\":9999999999}");
        assert!(manager.verify_own_token(&parts.join(".")).is_err());
    }

    #[test]
    fn unknown_kid_is_rejected() {
        let signer = seeded_manager(&["kid-1"]);
        let other = seeded_manager(&["kid-2"]);
        let (token, _) = signer.sign(&claims(24)).unwrap();
        assert!(other.verify_own_token(&token).is_err());
    }

    #[test]
    fn jwk_components_are_base64url_without_padding() {
        let manager = seeded_manager(&["kid-1"]);
        let jwks: JwkSet = serde_json::from_str(&manager.public_jwks().unwrap()).unwrap();
        let jwk = &jwks.keys[0];
        assert!(!jwk.n.contains('='));
        assert!(!jwk.n.contains('+'));
        assert!(!jwk.n.contains('/'));
        assert_eq!(jwk.e, "AQAB");
    }
}
