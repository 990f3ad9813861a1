//! Bearer-token guard for account management endpoints.
//!
//! Tokens are self-issued: the signing key is resolved from the server's own
//! key set via the JWT `kid` header. Signature and temporal claims are
//! verified; audience is not, since our own signature is the trust anchor.

use super::state::ServerState;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::IntoResponse,
};
use tracing::debug;

#[derive(Debug)]
pub struct BearerIdentity {
    /// The `sub` claim of the verified token.
    pub subject: String,
}

pub enum BearerExtractionError {
    Unauthorized,
}

impl IntoResponse for BearerExtractionError {
    fn into_response(self) -> axum::response::Response {
        match self {
            BearerExtractionError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

impl FromRequestParts<ServerState> for BearerIdentity {
    type Rejection = BearerExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts).ok_or(BearerExtractionError::Unauthorized)?;

        match ctx.key_manager.verify_own_token(token) {
            Ok(subject) => Ok(BearerIdentity { subject }),
            Err(err) => {
                debug!("Bearer token rejected: {}", err);
                Err(BearerExtractionError::Unauthorized)
            }
        }
    }
}
