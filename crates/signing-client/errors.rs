#[derive(Debug, thiserror::Error)]
pub enum EthClientError {
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("failed to serialize request body: {0}")]
    FailedToSerializeRequestBody(String),
    #[error("RPC error {code}: {message}")]
    RpcError { code: i32, message: String },
    #[error("client error: {0}")]
    ClientError(String),
    #[error("max number of retries reached when signing: failed after {attempts} attempts")]
    TimeoutError { attempts: u32 },
    #[error("signing request cancelled")]
    Cancelled,
    #[error("failed to parse hex string: {0}")]
    HexError(#[from] hex::FromHexError),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl EthClientError {
    /// Whether retrying the same request is worth attempting: HTTP 5xx (or a
    /// transport-level failure with no status) and the JSON-RPC server-error
    /// band −32099…−32000. Everything else is a client-shaped failure that
    /// will not be fixed by trying again.
    pub fn is_retryable(&self) -> bool {
        match self {
            EthClientError::ReqwestError(err) => {
                err.status().map(|status| status.is_server_error()).unwrap_or(true)
            }
            EthClientError::RpcError { code, .. } => (-32099..=-32000).contains(code),
            _ => false,
        }
    }
}
