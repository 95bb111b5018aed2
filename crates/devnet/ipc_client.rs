//! A thin JSON-RPC client over the L1 node's IPC socket, used in place of
//! [`rb_deployer::JsonRpcL1Client`] (HTTP) when talking to the ephemeral
//! devnet node, which only exposes its RPC surface over a unix socket.

use std::path::PathBuf;

use ethereum_types::{Address, H256, U256};
use rb_deployer::{L1Client, L1ClientError};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

#[derive(Debug, Clone)]
pub struct IpcL1Client {
    socket_path: PathBuf,
}

impl IpcL1Client {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self { socket_path: socket_path.into() }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, L1ClientError> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|err| L1ClientError::MalformedResponse(format!("ipc connect failed: {err}")))?;
        stream
            .write_all(serde_json::to_vec(&body).expect("request always serializes").as_slice())
            .await
            .map_err(|err| L1ClientError::MalformedResponse(format!("ipc write failed: {err}")))?;
        stream.flush().await.map_err(|err| L1ClientError::MalformedResponse(format!("ipc flush failed: {err}")))?;

        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];
        let response: Value = loop {
            let read = stream
                .read(&mut chunk)
                .await
                .map_err(|err| L1ClientError::MalformedResponse(format!("ipc read failed: {err}")))?;
            if read == 0 {
                return Err(L1ClientError::MalformedResponse("ipc socket closed before a full response".to_string()));
            }
            buffer.extend_from_slice(&chunk[..read]);
            if let Ok(value) = serde_json::from_slice(&buffer) {
                break value;
            }
        };

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
    u64::from_str_radix(text.trim_start_matches("0x"), 16).map_err(|err| L1ClientError::MalformedResponse(err.to_string()))
}

fn parse_hex_u256(value: &Value) -> Result<U256, L1ClientError> {
    let text = value.as_str().ok_or_else(|| L1ClientError::MalformedResponse("expected hex string".to_string()))?;
    U256::from_str_radix(text.trim_start_matches("0x"), 16).map_err(|err| L1ClientError::MalformedResponse(err.to_string()))
}

#[async_trait::async_trait]
impl L1Client for IpcL1Client {
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

#[cfg(test)]
mod test {
    use tempfile::tempdir;
    use tokio::net::UnixListener;

    use super::*;

    #[tokio::test]
    async fn chain_id_parses_a_hex_result_over_the_socket() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("l1.ipc");
        let listener = UnixListener::bind(&socket_path).unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buffer = [0u8; 4096];
            let _ = stream.read(&mut buffer).await.unwrap();
            stream.write_all(br#"{"jsonrpc":"2.0","id":1,"result":"0x7a69"}"#).await.unwrap();
        });

        let client = IpcL1Client::new(socket_path);
        assert_eq!(client.chain_id().await.unwrap(), 31337);
    }

    #[tokio::test]
    async fn rpc_error_response_surfaces_as_l1_client_error() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("l1.ipc");
        let listener = UnixListener::bind(&socket_path).unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buffer = [0u8; 4096];
            let _ = stream.read(&mut buffer).await.unwrap();
            stream.write_all(br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"nope"}}"#).await.unwrap();
        });

        let client = IpcL1Client::new(socket_path);
        let err = client.chain_id().await.unwrap_err();
        assert!(matches!(err, L1ClientError::Rpc { code: -32000, .. }));
    }
}
