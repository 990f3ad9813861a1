mod file_config;

pub use file_config::{ClientConfig, FileConfig, LoginPageConfig};

use anyhow::{bail, Result};
use clap::ValueEnum;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::clients::{Client, LoginPage};
use crate::connector::Connector;
use crate::server::RequestsLoggingLevel;
use crate::signed::EnvelopeKey;

const DEFAULT_BASE_URL: &str = "http://localhost:9021";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub port: Option<u16>,
    pub base_url: Option<String>,
    pub issuer: Option<String>,
    pub db_dir: Option<PathBuf>,
    pub logging_level: RequestsLoggingLevel,
}

/// Values only ever read from the process environment (secrets and the
/// single env-defined client kept for TOML-less deployments).
#[derive(Default)]
pub struct EnvConfig {
    pub hmac_secret: Option<String>,
    pub connectors: Vec<Connector>,
    pub env_client: Option<ClientConfig>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        let env_client = std::env::var("PORTIERE_CLIENT_ID")
            .ok()
            .filter(|v| !v.is_empty())
            .map(|client_id| ClientConfig {
                client_id,
                redirect_uris: std::env::var("PORTIERE_REDIRECT_URIS")
                    .unwrap_or_default()
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
                default_resource_indicator: std::env::var("PORTIERE_DEFAULT_RESOURCE_INDICATOR")
                    .ok(),
                login_page: Default::default(),
            });

        Self {
            hmac_secret: std::env::var("HMAC_SECRET").ok(),
            connectors: crate::connector::from_env(),
            env_client,
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    pub base_url: String,
    pub issuer: String,
    pub db_dir: Option<PathBuf>,
    pub logging_level: RequestsLoggingLevel,
    pub envelope_key: EnvelopeKey,
    pub clients: HashMap<String, Client>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments, optional TOML file config
    /// and the environment. TOML values override CLI values where present.
    /// Startup fails when the HMAC secret is missing or empty: a forgeable
    /// envelope key would make every cookie in the flow forgeable.
    pub fn resolve(
        cli: &CliConfig,
        file_config: Option<FileConfig>,
        env: EnvConfig,
    ) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.or(cli.port).unwrap_or(9021);
        let base_url = file
            .base_url
            .or_else(|| cli.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = base_url.trim_end_matches('/').to_string();
        let issuer = file
            .issuer
            .or_else(|| cli.issuer.clone())
            .unwrap_or_else(|| base_url.clone());

        let db_dir = file.db_dir.map(PathBuf::from).or_else(|| cli.db_dir.clone());
        if let Some(dir) = &db_dir {
            if !dir.is_dir() {
                bail!("db_dir is not a directory: {:?}", dir);
            }
        }

        let logging_level = file
            .logging_level
            .and_then(|s| RequestsLoggingLevel::from_str(&s, true).ok())
            .unwrap_or_else(|| cli.logging_level.clone());

        let envelope_key = match env.hmac_secret.as_deref() {
            None | Some("") => bail!("HMAC_SECRET must be set to a non-empty base64 value"),
            Some(secret) => EnvelopeKey::from_base64(secret)?,
        };

        let mut client_configs = file.clients;
        if client_configs.is_empty() {
            if let Some(env_client) = env.env_client {
                client_configs.push(env_client);
            }
        }
        if client_configs.is_empty() {
            bail!("No clients configured: add a [[clients]] section or set PORTIERE_CLIENT_ID");
        }

        let mut clients = HashMap::new();
        for config in client_configs {
            if config.redirect_uris.is_empty() {
                bail!("Client {} has no redirect_uris", config.client_id);
            }
            let client = build_client(config, &env.connectors);
            clients.insert(client.client_id.clone(), client);
        }

        Ok(Self {
            port,
            base_url,
            issuer,
            db_dir,
            logging_level,
            envelope_key,
            clients,
        })
    }

    pub fn account_db_path(&self) -> Option<PathBuf> {
        self.db_dir.as_ref().map(|d| d.join("account.db"))
    }

    pub fn keys_db_path(&self) -> Option<PathBuf> {
        self.db_dir.as_ref().map(|d| d.join("keys.db"))
    }
}

fn build_client(config: ClientConfig, connectors: &[Connector]) -> Client {
    let defaults = LoginPage::default_for(&config.client_id);
    let labels = config.login_page;
    Client {
        client_id: config.client_id,
        redirect_uris: config.redirect_uris,
        default_resource_indicator: config.default_resource_indicator.unwrap_or_default(),
        connectors: connectors.to_vec(),
        login_page: LoginPage {
            title: labels.title.unwrap_or(defaults.title),
            email: labels.email.unwrap_or(defaults.email),
            password: labels.password.unwrap_or(defaults.password),
            submit: labels.submit.unwrap_or(defaults.submit),
            connect_with: labels.connect_with.unwrap_or(defaults.connect_with),
        },
    }
}
