//! Upstream OIDC providers this server can federate to.
//!
//! A connector is enabled by setting its full environment triple
//! (`CONNECTOR_<NAME>_ISSUER`, `_CLIENT_ID`, `_CLIENT_SECRET`); a missing
//! value disables the connector entirely.

#[derive(Clone)]
pub struct ConnectorConfig {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Upstream provider descriptor, including the chrome the login page needs
/// to render its button.
#[derive(Clone)]
pub struct Connector {
    pub id: String,
    pub name: String,
    pub color: String,
    pub color_hover: String,
    pub icon_html: String,
    pub config: ConnectorConfig,
}

fn env_triple(name: &str) -> Option<ConnectorConfig> {
    let get = |suffix: &str| {
        std::env::var(format!("CONNECTOR_{}_{}", name, suffix))
            .ok()
            .filter(|v| !v.is_empty())
    };
    Some(ConnectorConfig {
        issuer: get("ISSUER")?,
        client_id: get("CLIENT_ID")?,
        client_secret: get("CLIENT_SECRET")?,
    })
}

fn google_connector(config: ConnectorConfig) -> Connector {
    Connector {
        id: "google".to_string(),
        name: "Google".to_string(),
        color: "hsl(217, 89%, 61%)".to_string(),
        color_hover: "hsl(217, 89%, 45%)".to_string(),
        icon_html: r#"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16" fill="currentColor" class="bi bi-google" viewBox="0 0 16 16">
  <path d="M15.545 6.558a9.4 9.4 0 0 1 .139 1.626c0 2.434-.87 4.492-2.384 5.885h.002C11.978 15.292 10.158 16 8 16A8 8 0 1 1 8 0a7.7 7.7 0 0 1 5.352 2.082l-2.284 2.284A4.35 4.35 0 0 0 8 3.166c-2.087 0-3.86 1.408-4.492 3.304a4.8 4.8 0 0 0 0 3.063h.003c.635 1.893 2.405 3.301 4.492 3.301 1.078 0 2.004-.276 2.722-.764h-.003a3.7 3.7 0 0 0 1.599-2.431H8v-3.08z"/>
</svg>"#
            .to_string(),
        config,
    }
}

fn microsoft_connector(config: ConnectorConfig) -> Connector {
    Connector {
        id: "microsoft".to_string(),
        name: "Microsoft".to_string(),
        color: "hsl(50, 100%, 40%)".to_string(),
        color_hover: "hsl(50, 100%, 25%)".to_string(),
        icon_html: r#"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16" fill="currentColor" class="bi bi-microsoft" viewBox="0 0 16 16">
  <path d="M7.462 0H0v7.19h7.462zM16 0H8.538v7.19H16zM7.462 8.211H0V16h7.462zm8.538 0H8.538V16H16z"/>
</svg>"#
            .to_string(),
        config,
    }
}

/// Builds the list of enabled connectors from the process environment.
pub fn from_env() -> Vec<Connector> {
    let mut connectors = Vec::new();
    if let Some(config) = env_triple("GOOGLE") {
        connectors.push(google_connector(config));
    }
    if let Some(config) = env_triple("MICROSOFT") {
        connectors.push(microsoft_connector(config));
    }
    connectors
}
