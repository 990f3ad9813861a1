mod bearer;
mod config;
mod http_layers;
mod login_page;
mod server;
mod state;

pub(crate) use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};
pub use state::ServerState;
