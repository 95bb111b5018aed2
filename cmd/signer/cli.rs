use clap::Parser;

#[derive(Parser)]
#[command(name = "signer", about = "Remote signing service for L2 contract deployment")]
pub struct SignerOptions {
    #[arg(
        long = "jsonrpc-port",
        default_value = "8545",
        value_name = "PORT",
        env = "JSONRPC_PORT",
        help_heading = "Signer options"
    )]
    pub jsonrpc_port: u16,
    #[arg(
        long = "rest-api-port",
        default_value = "3000",
        value_name = "PORT",
        env = "REST_API_PORT",
        help_heading = "Signer options"
    )]
    pub rest_api_port: u16,
    #[arg(
        long = "chain-id",
        default_value = "31337",
        value_name = "UINT64",
        env = "CHAIN_ID",
        help_heading = "Signer options",
        help = "Chain ID this signer is configured for. eth_signTransaction refuses requests for any other chain."
    )]
    pub chain_id: u64,
    #[arg(
        long = "load-dev-keys",
        default_value = "false",
        value_name = "BOOLEAN",
        env = "SIGNER_LOAD_DEV_KEYS",
        action = clap::ArgAction::SetTrue,
        help_heading = "Signer options",
        help = "Load the ten deterministic Anvil dev keys at startup. Refused on known production L1 chain IDs."
    )]
    pub load_dev_keys: bool,
    #[arg(
        long = "api-key",
        value_name = "TOKEN",
        env = "SIGNER_API_KEY",
        help_heading = "Signer options",
        help = "Required X-API-Key header value. Unset disables authentication (development mode)."
    )]
    pub api_key: Option<String>,
}
