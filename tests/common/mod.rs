//! Shared end-to-end test infrastructure.
#![allow(dead_code)] // Not every test binary uses every helper

pub mod client;
pub mod constants;
pub mod fixtures;
pub mod server;

pub use client::{
    decode_jwt_header, decode_jwt_payload, extract_csrf_token, redirect_params, TestClient,
};
pub use constants::*;
pub use server::TestServer;
