use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use rb_jsonrpc::RpcErr;
use rb_keystore::KeystoreError;
use rb_tx::TxError;

/// The signer's own error type, bridging keystore/crypto/tx failures into
/// both JSON-RPC error metadata and REST status codes.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error(transparent)]
    Keystore(#[from] KeystoreError),
    #[error(transparent)]
    Crypto(#[from] rb_crypto::CryptoError),
    #[error(transparent)]
    Tx(#[from] TxError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl From<KeystoreError> for RpcErr {
    fn from(err: KeystoreError) -> Self {
        SignerError::from(err).into()
    }
}

impl From<SignerError> for RpcErr {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::Keystore(KeystoreError::NotFound(id)) => RpcErr::KeyNotFound(id),
            SignerError::Keystore(KeystoreError::Conflict(addr)) => {
                RpcErr::InvalidParams(format!("key for {addr:#x} already exists"))
            }
            SignerError::Keystore(KeystoreError::UnsafeNetwork(net)) => {
                RpcErr::Server(format!("refusing to operate on {net}"))
            }
            SignerError::Crypto(err) => RpcErr::SigningFailed(err.to_string()),
            SignerError::Tx(err) => RpcErr::InvalidParams(err.to_string()),
            SignerError::InvalidRequest(msg) => RpcErr::InvalidParams(msg),
            SignerError::InvalidAddress(msg) => RpcErr::InvalidAddress(msg),
        }
    }
}

impl IntoResponse for SignerError {
    fn into_response(self) -> Response {
        let status = match &self {
            SignerError::Keystore(KeystoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            SignerError::Keystore(KeystoreError::Conflict(_)) => StatusCode::CONFLICT,
            SignerError::Keystore(KeystoreError::UnsafeNetwork(_)) => StatusCode::FORBIDDEN,
            SignerError::InvalidRequest(_) | SignerError::InvalidAddress(_) | SignerError::Tx(_) => {
                StatusCode::BAD_REQUEST
            }
            SignerError::Crypto(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
