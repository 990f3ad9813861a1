use axum::extract::FromRef;

use crate::account::AccountStore;
use crate::clients::Client;
use crate::config::AppConfig;
use crate::discovery::OpenIdConfiguration;
use crate::federation::Federation;
use crate::keys::KeyManager;
use crate::signed::EnvelopeKey;
use std::collections::HashMap;
use std::sync::Arc;

use super::ServerConfig;

pub type GuardedAccountStore = Arc<dyn AccountStore>;
pub type GuardedKeyManager = Arc<KeyManager>;
pub type GuardedFederation = Arc<Federation>;
pub type SharedClients = Arc<HashMap<String, Client>>;
pub type SharedDiscovery = Arc<OpenIdConfiguration>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub clients: SharedClients,
    pub discovery: SharedDiscovery,
    pub envelope_key: EnvelopeKey,
    pub key_manager: GuardedKeyManager,
    pub accounts: GuardedAccountStore,
    pub federation: GuardedFederation,
}

impl ServerState {
    pub fn new(
        config: &AppConfig,
        accounts: GuardedAccountStore,
        key_manager: GuardedKeyManager,
        federation: GuardedFederation,
    ) -> Self {
        Self {
            config: ServerConfig {
                base_url: config.base_url.clone(),
                issuer: config.issuer.clone(),
                requests_logging_level: config.logging_level.clone(),
            },
            clients: Arc::new(config.clients.clone()),
            discovery: Arc::new(OpenIdConfiguration::new(&config.issuer, &config.base_url)),
            envelope_key: config.envelope_key.clone(),
            key_manager,
            accounts,
            federation,
        }
    }

    pub fn client(&self, client_id: &str) -> Option<&Client> {
        self.clients.get(client_id)
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for SharedClients {
    fn from_ref(input: &ServerState) -> Self {
        input.clients.clone()
    }
}

impl FromRef<ServerState> for SharedDiscovery {
    fn from_ref(input: &ServerState) -> Self {
        input.discovery.clone()
    }
}

impl FromRef<ServerState> for EnvelopeKey {
    fn from_ref(input: &ServerState) -> Self {
        input.envelope_key.clone()
    }
}

impl FromRef<ServerState> for GuardedKeyManager {
    fn from_ref(input: &ServerState) -> Self {
        input.key_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedAccountStore {
    fn from_ref(input: &ServerState) -> Self {
        input.accounts.clone()
    }
}

impl FromRef<ServerState> for GuardedFederation {
    fn from_ref(input: &ServerState) -> Self {
        input.federation.clone()
    }
}
