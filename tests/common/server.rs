//! Test server lifecycle management.
//!
//! Each test gets an isolated server on a random port, backed by in-memory
//! stores seeded from `fixtures`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use portiere::account::{AccountStore, MemoryAccountStore};
use portiere::config::{AppConfig, CliConfig, ClientConfig, EnvConfig, FileConfig};
use portiere::federation::Federation;
use portiere::keys::{KeyManager, TokenClaims};
use portiere::server::{make_app, ServerState};

use super::constants::*;
use super::fixtures::{seeded_account_store, seeded_key_store};

pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Account store for direct seeding and assertions in tests
    pub accounts: Arc<MemoryAccountStore>,

    /// Key manager, lets tests mint bearer tokens signed with the server key
    pub key_manager: Arc<KeyManager>,

    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let accounts = Arc::new(seeded_account_store());
        let key_manager =
            Arc::new(KeyManager::init(&seeded_key_store()).expect("Failed to init key manager"));
        let federation = Arc::new(Federation::new().expect("Failed to init federation"));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let file_config = FileConfig {
            port: Some(port),
            base_url: Some(base_url.clone()),
            issuer: Some(base_url.clone()),
            clients: vec![ClientConfig {
                client_id: TEST_CLIENT_ID.to_string(),
                redirect_uris: vec![TEST_REDIRECT_URI.to_string()],
                default_resource_indicator: Some(TEST_RESOURCE_INDICATOR.to_string()),
                login_page: Default::default(),
            }],
            ..Default::default()
        };
        let env = EnvConfig {
            hmac_secret: Some(TEST_HMAC_SECRET.to_string()),
            connectors: vec![],
            env_client: None,
        };
        let config = AppConfig::resolve(&CliConfig::default(), Some(file_config), env)
            .expect("Failed to resolve test config");

        let state = ServerState::new(
            &config,
            accounts.clone() as Arc<dyn AccountStore>,
            key_manager.clone(),
            federation,
        );
        let app = make_app(state);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            accounts,
            key_manager,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    /// Signs a bearer token for `sub` with the server's own signing key.
    pub fn sign_bearer(&self, sub: &str) -> String {
        let account = portiere::account::Account {
            id: sub.to_string(),
            email: TEST_EMAIL.to_string(),
            name: "Alice Example".to_string(),
            picture: String::new(),
            status: portiere::account::AccountStatus::Active,
            roles: vec![],
            password_hash: None,
            external_refs: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let claims = TokenClaims::for_account(&self.base_url, TEST_CLIENT_ID, &account, Utc::now());
        let (token, _) = self.key_manager.sign(&claims).expect("Failed to sign");
        token
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            let url = format!("{}/.well-known/openid-configuration", self.base_url);
            match client.get(url).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
