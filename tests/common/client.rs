//! HTTP client for end-to-end tests.
//!
//! Cookies are managed explicitly instead of through a cookie store: the
//! flows under test hinge on which cookies the browser holds (the signed
//! `auth_data` envelope IS the authorization code), and tests need to
//! inspect, keep or drop them deliberately.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::header;
use reqwest::Response;

use super::constants::*;

pub struct TestClient {
    pub client: reqwest::Client,
    pub base_url: String,
    cookies: Mutex<HashMap<String, String>>,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            cookies: Mutex::new(HashMap::new()),
        }
    }

    // ========================================================================
    // Cookie handling
    // ========================================================================

    fn cookie_header(&self) -> Option<String> {
        let cookies = self.cookies.lock().unwrap();
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    fn absorb_cookies(&self, response: &Response) {
        let mut cookies = self.cookies.lock().unwrap();
        for header_value in response.headers().get_all(header::SET_COOKIE) {
            let Ok(raw) = header_value.to_str() else {
                continue;
            };
            let mut parts = raw.split(';');
            let Some((name, value)) = parts.next().and_then(|nv| nv.split_once('=')) else {
                continue;
            };
            let name = name.trim().to_string();
            let value = value.trim().to_string();

            let expired = value.is_empty()
                || parts.any(|attr| {
                    let attr = attr.trim();
                    attr.eq_ignore_ascii_case("Max-Age=-1") || attr.eq_ignore_ascii_case("Max-Age=0")
                });
            if expired {
                cookies.remove(&name);
            } else {
                cookies.insert(name, value);
            }
        }
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookies.lock().unwrap().contains_key(name)
    }

    pub fn cookie_count(&self) -> usize {
        self.cookies.lock().unwrap().len()
    }

    pub fn drop_cookie(&self, name: &str) {
        self.cookies.lock().unwrap().remove(name);
    }

    // ========================================================================
    // Authorization endpoint
    // ========================================================================

    /// GET /authorize with the standard S1 query parameters.
    pub async fn authorize_page(&self) -> Response {
        self.authorize_page_with(&[
            ("response_type", "code"),
            ("client_id", TEST_CLIENT_ID),
            ("redirect_uri", TEST_REDIRECT_URI),
            ("scope", "openid email"),
            ("state", "xyz"),
            ("code_challenge", TEST_CODE_CHALLENGE),
            ("code_challenge_method", "S256"),
        ])
        .await
    }

    pub async fn authorize_page_with(&self, query: &[(&str, &str)]) -> Response {
        let mut request = self
            .client
            .get(format!("{}/authorize", self.base_url))
            .query(query);
        if let Some(cookie) = self.cookie_header() {
            request = request.header(header::COOKIE, cookie);
        }
        let response = request.send().await.expect("GET /authorize failed");
        self.absorb_cookies(&response);
        response
    }

    /// POST /authorize with the login form.
    pub async fn post_authorize(&self, csrf_token: &str, email: &str, password: &str) -> Response {
        let mut request = self
            .client
            .post(format!("{}/authorize", self.base_url))
            .form(&[
                ("csrf_token", csrf_token),
                ("email", email),
                ("password", password),
            ]);
        if let Some(cookie) = self.cookie_header() {
            request = request.header(header::COOKIE, cookie);
        }
        let response = request.send().await.expect("POST /authorize failed");
        self.absorb_cookies(&response);
        response
    }

    /// Runs the full login leg and returns the `(code, state)` the relying
    /// party would receive.
    pub async fn login(&self, email: &str, password: &str) -> (String, String) {
        let response = self.authorize_page().await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let csrf_token = extract_csrf_token(&response.text().await.unwrap());

        let response = self.post_authorize(&csrf_token, email, password).await;
        assert_eq!(response.status(), reqwest::StatusCode::FOUND);
        redirect_params(&response)
    }

    // ========================================================================
    // Token endpoint
    // ========================================================================

    pub async fn token(&self, client_id: &str, code: &str, code_verifier: &str) -> Response {
        self.token_with(&[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("code", code),
            ("code_verifier", code_verifier),
        ])
        .await
    }

    pub async fn token_with(&self, form: &[(&str, &str)]) -> Response {
        let mut request = self
            .client
            .post(format!("{}/token", self.base_url))
            .form(form);
        if let Some(cookie) = self.cookie_header() {
            request = request.header(header::COOKIE, cookie);
        }
        let response = request.send().await.expect("POST /token failed");
        self.absorb_cookies(&response);
        response
    }

    // ========================================================================
    // Discovery & account endpoints
    // ========================================================================

    pub async fn openid_configuration(&self) -> Response {
        self.client
            .get(format!(
                "{}/.well-known/openid-configuration",
                self.base_url
            ))
            .send()
            .await
            .expect("GET openid-configuration failed")
    }

    pub async fn jwks(&self) -> Response {
        self.client
            .get(format!("{}/.well-known/jwks.json", self.base_url))
            .send()
            .await
            .expect("GET jwks failed")
    }

    pub async fn delete_account(&self, bearer: Option<&str>) -> Response {
        let mut request = self
            .client
            .delete(format!("{}/accounts/me", self.base_url));
        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        request.send().await.expect("DELETE /accounts/me failed")
    }
}

/// Pulls the CSRF token out of the rendered login page.
pub fn extract_csrf_token(html: &str) -> String {
    let marker = r#"name="csrf_token" value=""#;
    let start = html
        .find(marker)
        .expect("login page has no CSRF field")
        + marker.len();
    let end = html[start..].find('"').expect("unterminated CSRF value") + start;
    html[start..end].to_string()
}

/// Extracts `(code, state)` from a 302 Location header.
pub fn redirect_params(response: &Response) -> (String, String) {
    let location = response
        .headers()
        .get(header::LOCATION)
        .expect("redirect has no Location header")
        .to_str()
        .unwrap();
    let url = reqwest::Url::parse(location).expect("Location is not a valid URL");

    let get = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default()
    };
    (get("code"), get("state"))
}

/// Decodes a JWT payload without verifying the signature. Tests verify
/// signatures through the server's own JWKS endpoint instead.
pub fn decode_jwt_payload(token: &str) -> serde_json::Value {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;

    let payload = token.split('.').nth(1).expect("not a compact JWT");
    let bytes = URL_SAFE_NO_PAD.decode(payload).expect("payload not base64url");
    serde_json::from_slice(&bytes).expect("payload not JSON")
}

/// Decodes a JWT header.
pub fn decode_jwt_header(token: &str) -> serde_json::Value {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;

    let header = token.split('.').next().expect("not a compact JWT");
    let bytes = URL_SAFE_NO_PAD.decode(header).expect("header not base64url");
    serde_json::from_slice(&bytes).expect("header not JSON")
}
