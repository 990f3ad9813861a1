//! Relying-party clients. The set is loaded at startup and immutable for
//! the lifetime of the process.

use crate::connector::Connector;

/// Labels rendered on the login page for a client.
#[derive(Debug, Clone)]
pub struct LoginPage {
    pub title: String,
    pub email: String,
    pub password: String,
    pub submit: String,
    pub connect_with: String,
}

impl LoginPage {
    pub fn default_for(client_id: &str) -> Self {
        Self {
            title: format!("Sign in to {}", client_id),
            email: "Email".to_string(),
            password: "Password".to_string(),
            submit: "Sign in".to_string(),
            connect_with: "Continue with".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Client {
    pub client_id: String,
    /// Exact-match whitelist; anything else is rejected before cookies are set.
    pub redirect_uris: Vec<String>,
    /// Audience written into access tokens issued for this client.
    pub default_resource_indicator: String,
    pub connectors: Vec<Connector>,
    pub login_page: LoginPage,
}

impl Client {
    pub fn allows_redirect(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }

    pub fn connector(&self, connector_id: &str) -> Option<&Connector> {
        self.connectors.iter().find(|c| c.id == connector_id)
    }
}
