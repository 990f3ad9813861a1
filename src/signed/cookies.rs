//! Cookie profiles for signed envelopes.
//!
//! Two profiles exist: same-site strict for cookies set and read on our own
//! origin (login pages, `auth_data`), and cross-site lax for cookies that
//! must survive the top-level redirect back from an upstream provider.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use super::{decode, encode, EnvelopeError, EnvelopeKey};

pub const COOKIE_OAUTH_PARAMS: &str = "oauth_params";
pub const COOKIE_AUTH_DATA: &str = "auth_data";
pub const COOKIE_CONNECTOR_STATE: &str = "connector_state";

const COOKIE_TTL: Duration = Duration::minutes(15);

fn host_name(name: &str) -> String {
    format!("__Host-{}", name)
}

fn build(name: &str, value: String, same_site: SameSite) -> Cookie<'static> {
    Cookie::build((host_name(name), value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(same_site)
        .expires(OffsetDateTime::now_utc() + COOKIE_TTL)
        .build()
}

/// Signed cookie for our own origin.
pub fn strict_cookie<T: Serialize>(
    key: &EnvelopeKey,
    name: &str,
    data: &T,
) -> Result<Cookie<'static>, EnvelopeError> {
    Ok(build(name, encode(key, data)?, SameSite::Strict))
}

/// Signed cookie that survives the redirect back from an upstream provider.
pub fn cross_site_cookie<T: Serialize>(
    key: &EnvelopeKey,
    name: &str,
    data: &T,
) -> Result<Cookie<'static>, EnvelopeError> {
    Ok(build(name, encode(key, data)?, SameSite::Lax))
}

/// Expired cookie that makes the browser drop the named envelope.
pub fn removal_cookie(name: &str, same_site: SameSite) -> Cookie<'static> {
    Cookie::build((host_name(name), ""))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(same_site)
        .max_age(Duration::seconds(-1))
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

#[derive(Debug, Error)]
pub enum CookieReadError {
    #[error("cookie {0} is missing or empty")]
    Missing(String),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

pub fn read_cookie<T: DeserializeOwned>(
    jar: &CookieJar,
    key: &EnvelopeKey,
    name: &str,
) -> Result<T, CookieReadError> {
    let cookie = jar
        .get(&host_name(name))
        .filter(|c| !c.value().is_empty())
        .ok_or_else(|| CookieReadError::Missing(name.to_string()))?;
    Ok(decode(key, cookie.value())?)
}
