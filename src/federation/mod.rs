//! Federated authentication against upstream OIDC providers.
//!
//! Drives the two upstream legs (redirect out, callback in) and reconciles
//! the verified upstream identity with the local account directory.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use openidconnect::core::{
    CoreAuthenticationFlow, CoreClient, CoreIdTokenClaims, CoreProviderMetadata,
};
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce, RedirectUrl, Scope,
    TokenResponse,
};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::account::{Account, AccountStatus, ExternalRef};
use crate::connector::Connector;
use crate::random;

/// Upstream calls are capped well below the slowest acceptable request.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Rediscovering the provider document on every callback is wasteful; cache
/// it per issuer for an hour.
const DISCOVERY_TTL: Duration = Duration::from_secs(3600);

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(UPSTREAM_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

struct CachedProvider {
    metadata: CoreProviderMetadata,
    fetched_at: Instant,
}

/// Discovers upstream providers and runs the upstream OAuth2 legs.
pub struct Federation {
    http: reqwest::Client,
    providers: RwLock<HashMap<String, CachedProvider>>,
}

/// Claims extracted from a verified upstream ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamClaims {
    pub subject: String,
    pub name: String,
    pub picture: String,
    pub email: String,
    pub email_verified: bool,
}

impl Federation {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            providers: RwLock::new(HashMap::new()),
        })
    }

    async fn discover(&self, issuer: &str) -> Result<CoreProviderMetadata> {
        {
            let cache = self.providers.read().await;
            if let Some(entry) = cache.get(issuer) {
                if entry.fetched_at.elapsed() < DISCOVERY_TTL {
                    return Ok(entry.metadata.clone());
                }
            }
        }

        debug!("Discovering OIDC provider metadata for {}", issuer);
        let issuer_url = IssuerUrl::new(issuer.to_string()).context("Invalid issuer URL")?;
        let metadata = CoreProviderMetadata::discover_async(issuer_url, &self.http)
            .await
            .map_err(|e| anyhow!("Failed to discover provider {}: {}", issuer, e))?;

        let mut cache = self.providers.write().await;
        cache.insert(
            issuer.to_string(),
            CachedProvider {
                metadata: metadata.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(metadata)
    }

    /// Starts the upstream login leg: discovers the provider and builds the
    /// authorization URL. Returns the URL and the random `state` bound to it.
    pub async fn begin_login(
        &self,
        connector: &Connector,
        base_url: &str,
    ) -> Result<(String, String)> {
        info!(
            "Starting upstream login flow issuer={} client_id={}",
            connector.config.issuer, connector.config.client_id
        );

        let metadata = self.discover(&connector.config.issuer).await?;
        let client = CoreClient::from_provider_metadata(
            metadata,
            ClientId::new(connector.config.client_id.clone()),
            Some(ClientSecret::new(connector.config.client_secret.clone())),
        )
        .set_redirect_uri(redirect_url(base_url, &connector.id)?);

        let state = random::token();
        let state_for_url = state.clone();

        let (auth_url, _csrf, _nonce) = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                move || CsrfToken::new(state_for_url),
                Nonce::new_random,
            )
            .add_scope(Scope::new("profile".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .url();

        Ok((auth_url.to_string(), state))
    }

    /// Completes the callback leg: exchanges the upstream code and verifies
    /// the returned ID token against the provider's JWKS with the
    /// connector's client_id as audience. The nonce is not persisted across
    /// the redirect, so it is not enforced.
    pub async fn complete_login(
        &self,
        connector: &Connector,
        base_url: &str,
        code: &str,
    ) -> Result<UpstreamClaims> {
        let metadata = self.discover(&connector.config.issuer).await?;
        let client = CoreClient::from_provider_metadata(
            metadata,
            ClientId::new(connector.config.client_id.clone()),
            Some(ClientSecret::new(connector.config.client_secret.clone())),
        )
        .set_redirect_uri(redirect_url(base_url, &connector.id)?);

        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))?
            .request_async(&self.http)
            .await
            .map_err(|e| anyhow!("Failed to exchange code for token: {}", e))?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| anyhow!("No id_token in upstream token response"))?;

        let verifier = client.id_token_verifier();
        let claims: &CoreIdTokenClaims = id_token
            .claims(&verifier, |_: Option<&Nonce>| Ok(()))
            .map_err(|e| anyhow!("Failed to verify ID token: {}", e))?;

        let upstream = UpstreamClaims {
            subject: claims.subject().to_string(),
            name: claims
                .name()
                .and_then(|n| n.get(None))
                .map(|n| n.to_string())
                .unwrap_or_default(),
            picture: claims
                .picture()
                .and_then(|p| p.get(None))
                .map(|p| p.to_string())
                .unwrap_or_default(),
            email: claims.email().map(|e| e.to_string()).unwrap_or_default(),
            email_verified: claims.email_verified().unwrap_or(false),
        };

        debug!("Upstream user authenticated subject={}", upstream.subject);
        Ok(upstream)
    }
}

fn redirect_url(base_url: &str, connector_id: &str) -> Result<RedirectUrl> {
    RedirectUrl::new(format!("{}/{}/callback", base_url, connector_id))
        .context("Invalid connector redirect URL")
}

/// Outcome of matching a verified upstream identity against the directory.
#[derive(Debug, PartialEq)]
pub enum Reconciliation {
    /// No account held the external ref; a fresh one was minted.
    Created(Account),
    /// Profile claims diverged from the stored account.
    Updated(Account),
    /// Claims matched what is stored; nothing to persist.
    Unchanged(Account),
}

impl Reconciliation {
    pub fn account(&self) -> &Account {
        match self {
            Reconciliation::Created(a)
            | Reconciliation::Updated(a)
            | Reconciliation::Unchanged(a) => a,
        }
    }

    pub fn needs_persist(&self) -> Option<&Account> {
        match self {
            Reconciliation::Created(a) | Reconciliation::Updated(a) => Some(a),
            Reconciliation::Unchanged(_) => None,
        }
    }
}

/// Matches upstream claims with the directory. New identities get an active
/// account with an opaque id and a single external ref; known identities are
/// updated only when a profile claim diverged, bumping `updated_at`.
pub fn reconcile_account(
    existing: Option<Account>,
    connector_id: &str,
    claims: &UpstreamClaims,
    now: DateTime<Utc>,
) -> Reconciliation {
    match existing {
        None => Reconciliation::Created(Account {
            id: Uuid::new_v4().to_string(),
            email: claims.email.clone(),
            name: claims.name.clone(),
            picture: claims.picture.clone(),
            status: AccountStatus::Active,
            roles: vec![],
            password_hash: None,
            external_refs: vec![ExternalRef {
                connector_id: connector_id.to_string(),
                subject: claims.subject.clone(),
            }],
            created_at: now,
            updated_at: now,
        }),
        Some(mut account) => {
            let mut update_needed = false;
            if account.email != claims.email {
                account.email = claims.email.clone();
                update_needed = true;
            }
            if account.name != claims.name {
                account.name = claims.name.clone();
                update_needed = true;
            }
            if account.picture != claims.picture {
                account.picture = claims.picture.clone();
                update_needed = true;
            }

            if update_needed {
                account.updated_at = now;
                Reconciliation::Updated(account)
            } else {
                Reconciliation::Unchanged(account)
            }
        }
    }
}
