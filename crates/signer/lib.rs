//! The remote signing service: a dual REST + JSON-RPC 2.0 key-custody server.

use std::sync::Arc;

use rb_keystore::Keystore;

pub mod authentication;
pub mod encoding;
pub mod errors;
pub mod rest;
pub mod rpc;
pub mod server;

pub use errors::SignerError;

/// Shared application state. Cloned once per request by axum's `State`
/// extractor; cheap because everything inside is an `Arc`.
pub struct SignerContext {
    pub keystore: Arc<Keystore>,
    pub chain_id: u64,
    pub api_key: Option<String>,
}

impl SignerContext {
    pub fn new(keystore: Arc<Keystore>, chain_id: u64, api_key: Option<String>) -> Self {
        Self { keystore, chain_id, api_key }
    }
}
