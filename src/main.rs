use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use portiere::account::{AccountStore, MemoryAccountStore, SqliteAccountStore};
use portiere::config::{AppConfig, CliConfig, EnvConfig, FileConfig};
use portiere::federation::Federation;
use portiere::keys::{KeyManager, KeyStore, MemoryKeyStore, SqliteKeyStore};
use portiere::server::{run_server, RequestsLoggingLevel, ServerState};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Public base URL of this server, used in redirects and discovery.
    #[clap(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Issuer written into every token. Defaults to the base URL.
    #[clap(long, env = "ISSUER")]
    pub issuer: Option<String>,

    /// Directory for the SQLite databases. Without it everything is held in
    /// memory and lost on restart.
    #[clap(long, env = "DB_DIR")]
    pub db_dir: Option<PathBuf>,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            port: args.port,
            base_url: args.base_url.clone(),
            issuer: args.issuer.clone(),
            db_dir: args.db_dir.clone(),
            logging_level: args.logging_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI, secrets from env)
    let cli_config: CliConfig = (&cli_args).into();
    let app_config = AppConfig::resolve(&cli_config, file_config, EnvConfig::from_env())?;

    info!("Configuration loaded:");
    info!("  base_url: {}", app_config.base_url);
    info!("  issuer: {}", app_config.issuer);
    info!("  port: {}", app_config.port);
    info!("  clients: {}", app_config.clients.len());
    info!("  db_dir: {:?}", app_config.db_dir);

    let (accounts, key_store): (Arc<dyn AccountStore>, Arc<dyn KeyStore>) =
        match (app_config.account_db_path(), app_config.keys_db_path()) {
            (Some(account_db), Some(keys_db)) => (
                Arc::new(SqliteAccountStore::new(account_db)?),
                Arc::new(SqliteKeyStore::new(keys_db)?),
            ),
            _ => {
                warn!("Using in-memory stores, all data will be lost on restart");
                (
                    Arc::new(MemoryAccountStore::new()),
                    Arc::new(MemoryKeyStore::new()),
                )
            }
        };

    // Signing keys must be ready before the server accepts traffic.
    let key_manager = Arc::new(KeyManager::init(key_store.as_ref())?);
    let federation = Arc::new(Federation::new()?);

    let state = ServerState::new(&app_config, accounts, key_manager, federation);
    let port = app_config.port;

    info!("Ready to serve at port {}!", port);

    tokio::select! {
        result = run_server(state, port) => {
            info!("HTTP server stopped: {:?}", result);
            result
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}
