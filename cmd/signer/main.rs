use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use cli::SignerOptions;
use rb_keystore::{deterministic::load_deterministic_keys, Keystore};
use rb_signer::{server::start_api, SignerContext};
use tracing::{info, Level};

mod cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let opts = SignerOptions::parse();
    let keystore = Arc::new(Keystore::new());

    if opts.load_dev_keys {
        load_deterministic_keys(&keystore, opts.chain_id)
            .expect("refusing to start: dev key preload rejected for this chain ID");
    }

    let api_key_configured = opts.api_key.is_some();
    let ctx = Arc::new(SignerContext::new(keystore, opts.chain_id, opts.api_key));

    let rpc_addr = SocketAddr::from(([0, 0, 0, 0], opts.jsonrpc_port));
    let rest_addr = SocketAddr::from(([0, 0, 0, 0], opts.rest_api_port));

    info!(chain_id = opts.chain_id, api_key_configured, "starting signer");
    start_api(rpc_addr, rest_addr, ctx).await;
}
