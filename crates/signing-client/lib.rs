//! HTTP client the Deployer uses to hand transactions to the Signer over
//! JSON-RPC: a single `sign` call with classified retry/backoff, modeled on
//! the reference `EthClient`'s URL-request plumbing but pointed at one
//! endpoint instead of a pool.

use std::time::Duration;

use ethereum_types::Address;
use rb_tx::{FeeModel, TransactionRequest};
use reqwest::Client;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub mod errors;

pub use errors::EthClientError;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SigningClientConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl SigningClientConfig {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SigningClient {
    http: Client,
    config: SigningClientConfig,
}

fn tx_kind_params(params: &mut serde_json::Map<String, Value>, req: &TransactionRequest) {
    if let Some(to) = req.to {
        params.insert("to".to_string(), json!(format!("{to:#x}")));
    }
    match req.fees {
        FeeModel::Legacy { gas_price } => {
            params.insert("gasPrice".to_string(), json!(format!("0x{gas_price:x}")));
        }
        FeeModel::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => {
            params.insert("maxFeePerGas".to_string(), json!(format!("0x{max_fee_per_gas:x}")));
            params.insert(
                "maxPriorityFeePerGas".to_string(),
                json!(format!("0x{max_priority_fee_per_gas:x}")),
            );
        }
    }
}

fn build_params(from: Address, chain_id: u64, req: &TransactionRequest) -> Value {
    let mut params = serde_json::Map::new();
    params.insert("from".to_string(), json!(format!("{from:#x}")));
    params.insert("chainId".to_string(), json!(format!("0x{chain_id:x}")));
    params.insert("nonce".to_string(), json!(format!("0x{:x}", req.nonce)));
    params.insert("gas".to_string(), json!(format!("0x{:x}", req.gas_limit)));
    params.insert("value".to_string(), json!(format!("0x{:x}", req.value)));
    params.insert("input".to_string(), json!(format!("0x{}", hex::encode(&req.data))));
    tx_kind_params(&mut params, req);
    Value::Object(params)
}

impl SigningClient {
    pub fn new(config: SigningClientConfig) -> Self {
        Self { http: Client::new(), config }
    }

    /// Signs `req` as `from` for `chain_id` against the remote signer,
    /// returning the binary-encoded signed transaction. Retries up to
    /// `config.max_retries` times with doubling backoff, observing
    /// `cancel` between attempts.
    pub async fn sign(
        &self,
        from: Address,
        chain_id: u64,
        req: &TransactionRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, EthClientError> {
        let params = build_params(from, chain_id, req);
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.call_eth_sign_transaction(&params).await {
                Ok(signed) => return Ok(signed),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= self.config.max_retries => {
                    warn!(attempt, %err, "exhausted retries signing transaction");
                    return Err(EthClientError::TimeoutError { attempts: attempt });
                }
                Err(err) => {
                    warn!(attempt, max_retries = self.config.max_retries, %err, "signing request failed, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = cancel.cancelled() => return Err(EthClientError::Cancelled),
                    }
                    backoff = (backoff * 2).min(self.config.max_backoff);
                }
            }
        }
    }

    async fn call_eth_sign_transaction(&self, params: &Value) -> Result<Vec<u8>, EthClientError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": uuid::Uuid::new_v4().to_string(),
            "method": "eth_signTransaction",
            "params": [params],
        });
        let body_str =
            serde_json::to_string(&body).map_err(|err| EthClientError::FailedToSerializeRequestBody(err.to_string()))?;

        debug!(endpoint = %self.config.endpoint, "sending eth_signTransaction");
        let mut request = self.http.post(&self.config.endpoint).header("content-type", "application/json");
        if let Some(api_key) = &self.config.api_key {
            request = request.header("X-API-Key", api_key);
        }
        let response = request.body(body_str).send().await?;
        let status = response.status();
        if status.is_client_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(EthClientError::ClientError(format!("{status}: {text}")));
        }
        let response = response.error_for_status()?.json::<Value>().await?;

        if let Some(error) = response.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32603) as i32;
            let message = error.get("message").and_then(Value::as_str).unwrap_or_default().to_string();
            return Err(EthClientError::RpcError { code, message });
        }
        let result = response
            .get("result")
            .and_then(Value::as_str)
            .ok_or_else(|| EthClientError::InternalError("missing result field".to_string()))?;
        let stripped = result.strip_prefix("0x").unwrap_or(result);
        Ok(hex::decode(stripped)?)
    }
}
