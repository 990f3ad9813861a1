use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub port: Option<u16>,
    pub base_url: Option<String>,
    pub issuer: Option<String>,
    pub db_dir: Option<String>,
    pub logging_level: Option<String>,

    /// Relying parties served by this provider.
    pub clients: Vec<ClientConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub redirect_uris: Vec<String>,
    pub default_resource_indicator: Option<String>,
    #[serde(default)]
    pub login_page: LoginPageConfig,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct LoginPageConfig {
    pub title: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub submit: Option<String>,
    pub connect_with: Option<String>,
}

impl FileConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {:?}", path.as_ref()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path.as_ref()))
    }
}
