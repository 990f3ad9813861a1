//! The static `openid-configuration` document, assembled once at startup.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenIdConfiguration {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub scopes_supported: Vec<String>,
    pub response_types_supported: Vec<String>,
    pub response_modes_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub claims_supported: Vec<String>,
}

impl OpenIdConfiguration {
    pub fn new(issuer: &str, base_url: &str) -> Self {
        Self {
            issuer: issuer.to_string(),
            authorization_endpoint: format!("{}/authorize", base_url),
            token_endpoint: format!("{}/token", base_url),
            userinfo_endpoint: format!("{}/userinfo", base_url),
            jwks_uri: format!("{}/.well-known/jwks.json", base_url),
            scopes_supported: vec!["openid".to_string(), "email".to_string()],
            response_types_supported: vec![
                "code".to_string(),
                "id_token".to_string(),
                "id_token token".to_string(),
            ],
            response_modes_supported: vec!["query".to_string(), "fragment".to_string()],
            grant_types_supported: vec![
                "authorization_code".to_string(),
                "implicit".to_string(),
            ],
            subject_types_supported: vec!["public".to_string()],
            id_token_signing_alg_values_supported: vec!["RS256".to_string()],
            claims_supported: vec![
                "sub", "iss", "aud", "exp", "iat", "nbf", "auth_time", "email",
                "email_verified", "name", "picture",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}
