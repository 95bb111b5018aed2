//! A minimal JSON-RPC execution-client caller, scaled down from the
//! reference's `EthClient` to exactly what the orchestrator needs:
//! chain ID, balance, nonce and broadcasting a signed transaction.

use ethereum_types::{Address, H256, U256};
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum L1ClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("L1 RPC error {code}: {message}")]
    Rpc { code: i32, message: String },
    #[error("malformed L1 RPC response: {0}")]
    MalformedResponse(String),
}

impl L1ClientError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(err) => err.status().map(|s| s.is_server_error()).unwrap_or(true),
            Self::Rpc { code, .. } => (-32099..=-32000).contains(code),
            Self::MalformedResponse(_) => false,
        }
    }
}

#[async_trait::async_trait]
pub trait L1Client: Send + Sync {
    async fn chain_id(&self) -> Result<u64, L1ClientError>;
    async fn balance(&self, address: Address) -> Result<U256, L1ClientError>;
    async fn nonce(&self, address: Address) -> Result<u64, L1ClientError>;
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256, L1ClientError>;
}

#[derive(Debug, Clone)]
pub struct JsonRpcL1Client {
    http: reqwest::Client,
    endpoint: String,
}

impl JsonRpcL1Client {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), endpoint: endpoint.into() }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, L1ClientError> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let response: Value = self.http.post(&self.endpoint).json(&body).send().await?.json().await?;
        if let Some(error) = response.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32603) as i32;
            let message = error.get("message").and_then(Value::as_str).unwrap_or_default().to_string();
            return Err(L1ClientError::Rpc { code, message });
        }
        response.get("result").cloned().ok_or_else(|| L1ClientError::MalformedResponse("missing result".to_string()))
    }
}

fn parse_hex_u64(value: &Value) -> Result<u64, L1ClientError> {
    let text = value.as_str().ok_or_else(|| L1ClientError::MalformedResponse("expected hex string".to_string()))?;
    u64::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|err| L1ClientError::MalformedResponse(err.to_string()))
}

fn parse_hex_u256(value: &Value) -> Result<U256, L1ClientError> {
    let text = value.as_str().ok_or_else(|| L1ClientError::MalformedResponse("expected hex string".to_string()))?;
    U256::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|err| L1ClientError::MalformedResponse(err.to_string()))
}

/// A deterministic in-memory test double, used by the orchestrator's own
/// tests and by the local devnet orchestrator's dry-run mode.
pub struct FakeL1Client {
    chain_id: u64,
    balances: std::sync::Mutex<std::collections::HashMap<Address, U256>>,
    nonces: std::sync::Mutex<std::collections::HashMap<Address, u64>>,
    sent: std::sync::Mutex<Vec<Vec<u8>>>,
}

impl FakeL1Client {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id, balances: Default::default(), nonces: Default::default(), sent: Default::default() }
    }

    pub fn fund(&self, address: Address, amount: U256) {
        self.balances.lock().expect("lock poisoned").insert(address, amount);
    }

    pub fn sent_transactions(&self) -> Vec<Vec<u8>> {
        self.sent.lock().expect("lock poisoned").clone()
    }
}

#[async_trait::async_trait]
impl L1Client for FakeL1Client {
    async fn chain_id(&self) -> Result<u64, L1ClientError> {
        Ok(self.chain_id)
    }

    async fn balance(&self, address: Address) -> Result<U256, L1ClientError> {
        Ok(self.balances.lock().expect("lock poisoned").get(&address).copied().unwrap_or_default())
    }

    async fn nonce(&self, address: Address) -> Result<u64, L1ClientError> {
        Ok(*self.nonces.lock().expect("lock poisoned").entry(address).or_insert(0))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256, L1ClientError> {
        let hash = rb_crypto::keccak256(raw);
        self.sent.lock().expect("lock poisoned").push(raw.to_vec());
        Ok(hash)
    }
}

#[async_trait::async_trait]
impl L1Client for JsonRpcL1Client {
    async fn chain_id(&self) -> Result<u64, L1ClientError> {
        parse_hex_u64(&self.call("eth_chainId", json!([])).await?)
    }

    async fn balance(&self, address: Address) -> Result<U256, L1ClientError> {
        parse_hex_u256(&self.call("eth_getBalance", json!([format!("{address:#x}"), "latest"])).await?)
    }

    async fn nonce(&self, address: Address) -> Result<u64, L1ClientError> {
        parse_hex_u64(&self.call("eth_getTransactionCount", json!([format!("{address:#x}"), "latest"])).await?)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256, L1ClientError> {
        let result = self.call("eth_sendRawTransaction", json!([format!("0x{}", hex::encode(raw))])).await?;
        let text = result.as_str().ok_or_else(|| L1ClientError::MalformedResponse("expected tx hash".to_string()))?;
        text.parse::<H256>().map_err(|err| L1ClientError::MalformedResponse(err.to_string()))
    }
}
