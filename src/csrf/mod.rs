//! CSRF double-submit token for the login form.
//!
//! The same random value is set as a same-site-strict cookie and embedded as
//! a hidden form field; validation compares the two in constant time and
//! fails closed when either side is missing.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use subtle::ConstantTimeEq;
use time::{Duration, OffsetDateTime};

use crate::random;

pub const COOKIE_CSRF_TOKEN: &str = "__Host-csrf_token";

pub fn new_token() -> String {
    random::token()
}

pub fn cookie(token: &str) -> Cookie<'static> {
    Cookie::build((COOKIE_CSRF_TOKEN, token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .expires(OffsetDateTime::now_utc() + Duration::minutes(15))
        .build()
}

pub fn validate(jar: &CookieJar, form_token: Option<&str>) -> bool {
    let cookie_token = match jar.get(COOKIE_CSRF_TOKEN) {
        Some(c) if !c.value().is_empty() => c.value(),
        _ => return false,
    };
    let form_token = match form_token {
        Some(t) if !t.is_empty() => t,
        _ => return false,
    };
    cookie_token
        .as_bytes()
        .ct_eq(form_token.as_bytes())
        .into()
}
