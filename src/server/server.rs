//! HTTP server implementation with route handlers for the OIDC flows.

use std::net::SocketAddr;

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Form, Json, Router,
};
use axum_extra::extract::cookie::{CookieJar, SameSite};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::account::Account;
use crate::csrf;
use crate::federation::reconcile_account;
use crate::keys::TokenClaims;
use crate::pkce;
use crate::random;
use crate::signed::{
    cross_site_cookie, read_cookie, removal_cookie, strict_cookie, COOKIE_AUTH_DATA,
    COOKIE_CONNECTOR_STATE, COOKIE_OAUTH_PARAMS,
};

use super::bearer::BearerIdentity;
use super::login_page;
use super::state::*;
use super::log_requests;

/// OAuth request parameters, carried in a signed cookie across the login
/// pages. Absent query parameters decode as empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthParams {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub response_type: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub code_challenge: String,
    #[serde(default)]
    pub code_challenge_method: String,
}

/// Issued at login success, consumed once at the token exchange. Lives only
/// in the signed `auth_data` cookie; the browser is the code store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationData {
    pub client_id: String,
    pub code: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub granted_scopes: Vec<String>,
    pub account_id: String,
}

#[derive(Deserialize, Debug)]
struct LoginForm {
    #[serde(default)]
    csrf_token: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize, Debug)]
struct TokenForm {
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    grant_type: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    code_verifier: String,
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

// ============================================================================
// Discovery
// ============================================================================

async fn openid_configuration(State(discovery): State<SharedDiscovery>) -> Response {
    Json(discovery.as_ref().clone()).into_response()
}

async fn jwks(State(key_manager): State<GuardedKeyManager>) -> Response {
    match key_manager.public_jwks() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!("Failed to serialize JWKS: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ============================================================================
// Authorization endpoint
// ============================================================================

async fn get_authorize(
    State(state): State<ServerState>,
    Query(oauth_params): Query<OAuthParams>,
) -> Response {
    if oauth_params.response_type != "code" {
        warn!(
            "Unsupported response_type client_id={} response_type={}",
            oauth_params.client_id, oauth_params.response_type
        );
        return StatusCode::BAD_REQUEST.into_response();
    }

    let client = match state.client(&oauth_params.client_id) {
        Some(client) => client,
        None => {
            warn!("Client not found client_id={}", oauth_params.client_id);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    if !client.allows_redirect(&oauth_params.redirect_uri) {
        warn!(
            "Invalid redirect URI client_id={} redirect_uri={}",
            oauth_params.client_id, oauth_params.redirect_uri
        );
        return StatusCode::BAD_REQUEST.into_response();
    }

    let csrf_token = csrf::new_token();

    let params_cookie = match strict_cookie(&state.envelope_key, COOKIE_OAUTH_PARAMS, &oauth_params)
    {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to encode oauth_params cookie: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let jar = CookieJar::new()
        .add(params_cookie)
        .add(csrf::cookie(&csrf_token));
    (jar, Html(login_page::render(client, &csrf_token))).into_response()
}

async fn post_authorize(
    State(state): State<ServerState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    if !csrf::validate(&jar, Some(&form.csrf_token)) {
        warn!("CSRF token validation failed");
        return StatusCode::FORBIDDEN.into_response();
    }

    let oauth_params: OAuthParams =
        match read_cookie(&jar, &state.envelope_key, COOKIE_OAUTH_PARAMS) {
            Ok(params) => params,
            Err(err) => {
                warn!("Failed to decode OAuth params: {}", err);
                return StatusCode::BAD_REQUEST.into_response();
            }
        };

    if form.email.is_empty() {
        warn!("Email is required for authorization");
        return StatusCode::BAD_REQUEST.into_response();
    }
    if form.password.is_empty() {
        warn!("Password is required for authorization");
        return StatusCode::BAD_REQUEST.into_response();
    }

    let account = match state.accounts.get_by_email(&form.email) {
        Ok(Some(account)) => account,
        Ok(None) => {
            warn!(
                "Unauthorized client_id={} email={}",
                oauth_params.client_id, form.email
            );
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Err(err) => {
            error!("Failed to look up account email={}: {}", form.email, err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if !account.check_password(&form.password) {
        warn!(
            "Invalid password client_id={} email={}",
            oauth_params.client_id, form.email
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    redirect_with_code(&state, oauth_params, &account)
}

/// Shared final leg of both authentication paths: binds a fresh code to the
/// browser via the signed `auth_data` cookie and sends the user back to the
/// relying party.
fn redirect_with_code(
    state: &ServerState,
    oauth_params: OAuthParams,
    account: &Account,
) -> Response {
    let auth_data = AuthorizationData {
        client_id: oauth_params.client_id.clone(),
        code: random::token(),
        code_challenge: oauth_params.code_challenge.clone(),
        code_challenge_method: oauth_params.code_challenge_method.clone(),
        granted_scopes: oauth_params.scope.split(' ').map(String::from).collect(),
        account_id: account.id.clone(),
    };

    let cookie = match strict_cookie(&state.envelope_key, COOKIE_AUTH_DATA, &auth_data) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to encode auth_data cookie: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let redirect_url = format!(
        "{}?code={}&state={}",
        oauth_params.redirect_uri,
        urlencoding::encode(&auth_data.code),
        urlencoding::encode(&oauth_params.state)
    );
    info!("Redirecting to client redirect_uri={}", oauth_params.redirect_uri);

    (
        CookieJar::new().add(cookie),
        Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, redirect_url)
            .body(Body::empty())
            .unwrap(),
    )
        .into_response()
}

// ============================================================================
// Federated authentication
// ============================================================================

#[derive(Deserialize, Debug)]
struct CallbackQuery {
    #[serde(default)]
    code: String,
    #[serde(default)]
    state: String,
}

async fn connector_login(
    Path(connector_id): Path<String>,
    State(state): State<ServerState>,
    jar: CookieJar,
) -> Response {
    let oauth_params: OAuthParams =
        match read_cookie(&jar, &state.envelope_key, COOKIE_OAUTH_PARAMS) {
            Ok(params) => params,
            Err(err) => {
                warn!("Failed to decode OAuth params: {}", err);
                return StatusCode::BAD_REQUEST.into_response();
            }
        };

    let client = match state.client(&oauth_params.client_id) {
        Some(client) => client,
        None => {
            warn!("Client not found client_id={}", oauth_params.client_id);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    let connector = match client.connector(&connector_id) {
        Some(connector) => connector,
        None => {
            error!(
                "Connector not found client_id={} connector_id={}",
                oauth_params.client_id, connector_id
            );
            return (StatusCode::NOT_FOUND, "Connector not found").into_response();
        }
    };

    let (auth_url, upstream_state) = match state
        .federation
        .begin_login(connector, &state.config.base_url)
        .await
    {
        Ok(result) => result,
        Err(err) => {
            error!(
                "Failed to start upstream login issuer={}: {}",
                connector.config.issuer, err
            );
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let state_cookie = cross_site_cookie(
        &state.envelope_key,
        COOKIE_CONNECTOR_STATE,
        &upstream_state,
    );
    let params_cookie =
        cross_site_cookie(&state.envelope_key, COOKIE_OAUTH_PARAMS, &oauth_params);
    let (state_cookie, params_cookie) = match (state_cookie, params_cookie) {
        (Ok(s), Ok(p)) => (s, p),
        _ => {
            error!("Failed to encode federation cookies");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    (
        CookieJar::new().add(state_cookie).add(params_cookie),
        Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, auth_url)
            .body(Body::empty())
            .unwrap(),
    )
        .into_response()
}

async fn connector_callback(
    Path(connector_id): Path<String>,
    State(state): State<ServerState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let oauth_params: OAuthParams =
        match read_cookie(&jar, &state.envelope_key, COOKIE_OAUTH_PARAMS) {
            Ok(params) => params,
            Err(err) => {
                warn!("Failed to decode OAuth params: {}", err);
                return StatusCode::BAD_REQUEST.into_response();
            }
        };

    let client = match state.client(&oauth_params.client_id) {
        Some(client) => client,
        None => {
            warn!("Client not found client_id={}", oauth_params.client_id);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    let connector = match client.connector(&connector_id) {
        Some(connector) => connector,
        None => {
            error!(
                "Connector not found client_id={} connector_id={}",
                oauth_params.client_id, connector_id
            );
            return (StatusCode::NOT_FOUND, "Connector not found").into_response();
        }
    };

    let expected_state: String =
        match read_cookie(&jar, &state.envelope_key, COOKIE_CONNECTOR_STATE) {
            Ok(value) => value,
            Err(err) => {
                warn!("Failed to decode connector state: {}", err);
                return StatusCode::BAD_REQUEST.into_response();
            }
        };
    if expected_state != query.state {
        warn!("Upstream state mismatch connector_id={}", connector_id);
        return StatusCode::BAD_REQUEST.into_response();
    }

    let claims = match state
        .federation
        .complete_login(connector, &state.config.base_url, &query.code)
        .await
    {
        Ok(claims) => claims,
        Err(err) => {
            error!(
                "Upstream authentication failed issuer={}: {}",
                connector.config.issuer, err
            );
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let existing = match state
        .accounts
        .get_by_external_ref(&connector_id, &claims.subject)
    {
        Ok(existing) => existing,
        Err(err) => {
            error!(
                "Failed to look up account connector_id={} subject={}: {}",
                connector_id, claims.subject, err
            );
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let reconciliation = reconcile_account(existing, &connector_id, &claims, Utc::now());
    if let Some(account) = reconciliation.needs_persist() {
        info!(
            "Persisting account account_id={} email={}",
            account.id, account.email
        );
        if let Err(err) = state.accounts.put(account) {
            error!("Failed to persist account {}: {}", account.id, err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    redirect_with_code(&state, oauth_params, reconciliation.account())
}

// ============================================================================
// Token endpoint
// ============================================================================

async fn token(
    State(state): State<ServerState>,
    jar: CookieJar,
    Form(form): Form<TokenForm>,
) -> Response {
    if form.grant_type != "authorization_code" {
        warn!(
            "Unsupported grant_type client_id={} grant_type={}",
            form.client_id, form.grant_type
        );
        return StatusCode::BAD_REQUEST.into_response();
    }

    let auth_data: AuthorizationData =
        match read_cookie(&jar, &state.envelope_key, COOKIE_AUTH_DATA) {
            Ok(data) => data,
            Err(err) => {
                error!(
                    "Failed to retrieve authorization data client_id={} code={}: {}",
                    form.client_id, form.code, err
                );
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

    // The code is single-use: every response from here on carries the
    // deletion cookie, whether the exchange succeeds or not.
    let jar_out = CookieJar::new().add(removal_cookie(COOKIE_AUTH_DATA, SameSite::Strict));

    if auth_data.client_id != form.client_id {
        warn!(
            "Incorrect client id client_id={} bound_client_id={}",
            form.client_id, auth_data.client_id
        );
        return (jar_out, StatusCode::BAD_REQUEST).into_response();
    }

    let challenge =
        match pkce::compute_code_challenge(&auth_data.code_challenge_method, &form.code_verifier) {
            Ok(challenge) => challenge,
            Err(err) => {
                warn!("Failed to compute code challenge: {}", err);
                return (jar_out, StatusCode::BAD_REQUEST).into_response();
            }
        };
    if challenge != auth_data.code_challenge {
        warn!("Incorrect code challenge client_id={}", form.client_id);
        return (jar_out, StatusCode::BAD_REQUEST).into_response();
    }

    let account = match state.accounts.get_by_id(&auth_data.account_id) {
        Ok(Some(account)) => account,
        Ok(None) => {
            warn!("Account not found account_id={}", auth_data.account_id);
            return (jar_out, StatusCode::UNAUTHORIZED).into_response();
        }
        Err(err) => {
            error!(
                "Failed to retrieve account account_id={}: {}",
                auth_data.account_id, err
            );
            return (jar_out, StatusCode::INTERNAL_SERVER_ERROR).into_response();
        }
    };
    if account.status != crate::account::AccountStatus::Active {
        warn!(
            "Account not active account_id={} status={:?}",
            account.id, account.status
        );
        return (jar_out, StatusCode::FORBIDDEN).into_response();
    }

    let client = match state.client(&form.client_id) {
        Some(client) => client,
        None => {
            error!("Client not found client_id={}", form.client_id);
            return (jar_out, StatusCode::INTERNAL_SERVER_ERROR).into_response();
        }
    };

    let now = Utc::now();
    let access_claims = TokenClaims::for_account(
        &state.config.issuer,
        &client.default_resource_indicator,
        &account,
        now,
    );
    let access_token = match state.key_manager.sign(&access_claims) {
        Ok((token, _)) => token,
        Err(err) => {
            error!("Failed to sign access token: {}", err);
            return (jar_out, StatusCode::INTERNAL_SERVER_ERROR).into_response();
        }
    };

    let id_claims = TokenClaims::for_account(&state.config.issuer, &form.client_id, &account, now);
    let id_token = match state.key_manager.sign(&id_claims) {
        Ok((token, _)) => token,
        Err(err) => {
            error!("Failed to sign id token: {}", err);
            return (jar_out, StatusCode::INTERNAL_SERVER_ERROR).into_response();
        }
    };

    let response = TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: 3600,
        id_token: Some(id_token),
        refresh_token: None,
    };
    (jar_out, Json(response)).into_response()
}

// ============================================================================
// Account self-service
// ============================================================================

async fn delete_my_account(
    identity: BearerIdentity,
    State(accounts): State<GuardedAccountStore>,
) -> Response {
    match accounts.delete(&identity.subject) {
        Ok(()) => {
            info!("Account deleted account_id={}", identity.subject);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => {
            error!("Failed to delete account {}: {}", identity.subject, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn make_app(state: ServerState) -> Router {
    Router::new()
        // Standard OIDC endpoints
        .route(
            "/.well-known/openid-configuration",
            get(openid_configuration),
        )
        .route("/.well-known/jwks.json", get(jwks))
        .route("/authorize", get(get_authorize))
        .route("/authorize", post(post_authorize))
        .route("/token", post(token))
        // Connector endpoints
        .route("/{connector}/login", get(connector_login))
        .route("/{connector}/callback", get(connector_callback))
        // Account self-service
        .route("/accounts/me", delete(delete_my_account))
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .with_state(state)
}

pub async fn run_server(state: ServerState, port: u16) -> Result<()> {
    let app = make_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
