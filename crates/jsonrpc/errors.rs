use crate::types::RpcErrorMetadata;

/// JSON-RPC 2.0 error taxonomy, plus the application-defined codes this
/// signer needs (−32001…−32005).
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcErr {
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("signing failed: {0}")]
    SigningFailed(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("key not found: {0}")]
    KeyNotFound(String),
}

impl From<RpcErr> for RpcErrorMetadata {
    fn from(value: RpcErr) -> Self {
        match value {
            RpcErr::ParseError(msg) => RpcErrorMetadata { code: -32700, data: None, message: msg },
            RpcErr::InvalidRequest(msg) => RpcErrorMetadata { code: -32600, data: None, message: msg },
            RpcErr::MethodNotFound(method) => RpcErrorMetadata {
                code: -32601,
                data: Some(method.clone()),
                message: format!("Method not found: {method}"),
            },
            RpcErr::InvalidParams(msg) => RpcErrorMetadata { code: -32602, data: None, message: msg },
            RpcErr::Internal(msg) => RpcErrorMetadata {
                code: -32603,
                data: None,
                message: format!("Internal error: {msg}"),
            },
            RpcErr::Server(msg) => RpcErrorMetadata { code: -32000, data: None, message: msg },
            RpcErr::Unauthorized(msg) => RpcErrorMetadata { code: -32001, data: None, message: msg },
            RpcErr::ResourceNotFound(msg) => RpcErrorMetadata { code: -32002, data: None, message: msg },
            RpcErr::SigningFailed(msg) => RpcErrorMetadata {
                code: -32003,
                data: None,
                message: format!("signing failed: {msg}"),
            },
            RpcErr::InvalidAddress(msg) => RpcErrorMetadata {
                code: -32004,
                data: None,
                message: format!("invalid address: {msg}"),
            },
            RpcErr::KeyNotFound(id) => RpcErrorMetadata {
                code: -32005,
                data: None,
                message: format!("key not found: {id}"),
            },
        }
    }
}

impl From<serde_json::Error> for RpcErr {
    fn from(err: serde_json::Error) -> Self {
        RpcErr::InvalidParams(err.to_string())
    }
}

/// Whether a caller should retry this error against the same or a
/// different signer instance. Only the −32000…−32099 server-error band
/// (and its catch-all `Server` variant here) is retry-eligible.
pub fn is_retryable_code(code: i32) -> bool {
    (-32099..=-32000).contains(&code)
}

/// The HTTP status a transport should answer with for a dispatched error.
/// Only malformed-request failures (parse error, invalid request) are
/// rejected at the HTTP layer; every other JSON-RPC error is still a
/// successful HTTP exchange carrying an error envelope.
pub fn http_status_code(code: i32) -> u16 {
    match code {
        -32700 | -32600 => 400,
        _ => 200,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn method_not_found_exposes_the_method_name_in_data() {
        let meta: RpcErrorMetadata = RpcErr::MethodNotFound("eth_foo".to_string()).into();
        assert_eq!(meta.code, -32601);
        assert_eq!(meta.data.as_deref(), Some("eth_foo"));
    }

    #[test]
    fn parse_and_invalid_request_map_to_http_400() {
        assert_eq!(http_status_code(-32700), 400);
        assert_eq!(http_status_code(-32600), 400);
    }

    #[test]
    fn other_codes_map_to_http_200() {
        assert_eq!(http_status_code(-32601), 200);
        assert_eq!(http_status_code(-32000), 200);
    }
}
