//! Transport-agnostic JSON-RPC 2.0 framing, method registry and dispatch.
//! Mirrors `ethrex-rpc`'s request/response types and `RpcHandler` trait,
//! generalized over an arbitrary application context instead of a single
//! hardcoded blockchain context.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub mod errors;
pub mod types;

pub use errors::{http_status_code, is_retryable_code, RpcErr};
pub use types::{
    RpcErrorMetadata, RpcErrorResponse, RpcRequest, RpcRequestId, RpcRequestWrapper,
    RpcSuccessResponse,
};

/// Implemented by every JSON-RPC method handler. `Ctx` is the application
/// state the handler needs (keystore, config, ...); it is cloned once per
/// request, mirroring the reference's `RpcApiContext: Clone`.
#[async_trait]
pub trait RpcHandler<Ctx>: Send + Sync {
    async fn handle(&self, params: Option<&[Value]>, ctx: &Ctx) -> Result<Value, RpcErr>;
}

type BoxedHandler<Ctx> = Arc<dyn RpcHandler<Ctx>>;

/// A method-name keyed dispatch table. Registration is idempotent: registering
/// the same name twice replaces the previous handler rather than erroring.
pub struct Router<Ctx> {
    handlers: HashMap<&'static str, BoxedHandler<Ctx>>,
}

impl<Ctx> Default for Router<Ctx> {
    fn default() -> Self {
        Self { handlers: HashMap::new() }
    }
}

impl<Ctx: Send + Sync + 'static> Router<Ctx> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, method: &'static str, handler: impl RpcHandler<Ctx> + 'static) {
        self.handlers.insert(method, Arc::new(handler));
    }

    /// Dispatches a single request, returning the `result` value on success.
    pub async fn dispatch(&self, request: &RpcRequest, ctx: &Ctx) -> Result<Value, RpcErr> {
        let handler = self
            .handlers
            .get(request.method.as_str())
            .ok_or_else(|| RpcErr::MethodNotFound(request.method.clone()))?;
        handler.handle(request.params.as_deref(), ctx).await
    }

    /// Dispatches a single or batch JSON-RPC body, already deserialized into
    /// a [`RpcRequestWrapper`], returning the JSON value to write to the wire.
    pub async fn dispatch_wrapper(&self, wrapper: RpcRequestWrapper, ctx: &Ctx) -> Value {
        match wrapper {
            RpcRequestWrapper::Single(request) => {
                let id = request.id.clone();
                rpc_response(id, self.dispatch(&request, ctx).await)
            }
            RpcRequestWrapper::Multiple(requests) => {
                if requests.is_empty() {
                    return rpc_response(
                        RpcRequestId::String(String::new()),
                        Err(RpcErr::InvalidRequest("batch must not be empty".to_string())),
                    );
                }
                let mut responses = Vec::with_capacity(requests.len());
                for request in requests {
                    let id = request.id.clone();
                    responses.push(rpc_response(id, self.dispatch(&request, ctx).await));
                }
                serde_json::to_value(responses).expect("responses always serialize")
            }
        }
    }

    /// Parses `body` and dispatches it, folding parse failures into the
    /// strict JSON-RPC error envelope rather than propagating a raw error.
    /// Returns the HTTP status a transport should answer with alongside the
    /// body: 400 for a malformed request, 200 for everything else (a
    /// well-formed request whose dispatch failed is still a successful HTTP
    /// exchange carrying a JSON-RPC error envelope).
    pub async fn handle_body(&self, body: &str, ctx: &Ctx) -> (u16, Value) {
        match serde_json::from_str::<RpcRequestWrapper>(body) {
            Ok(wrapper) => {
                let value = self.dispatch_wrapper(wrapper, ctx).await;
                let status = value.get("error").and_then(|error| error.get("code")).and_then(Value::as_i64).map_or(200, |code| http_status_code(code as i32));
                (status, value)
            }
            Err(err) => (
                400,
                rpc_response(RpcRequestId::String(String::new()), Err(RpcErr::ParseError(err.to_string()))),
            ),
        }
    }
}

pub fn rpc_response(id: RpcRequestId, result: Result<Value, RpcErr>) -> Value {
    let value = match result {
        Ok(result) => serde_json::to_value(RpcSuccessResponse { id, jsonrpc: "2.0".to_string(), result }),
        Err(err) => serde_json::to_value(RpcErrorResponse {
            id,
            jsonrpc: "2.0".to_string(),
            error: err.into(),
        }),
    };
    value.expect("rpc envelope always serializes")
}

/// Adapts a plain async function into an [`RpcHandler`], for handlers that
/// don't need their own type — mirrors how most `ethrex-rpc` leaf handlers
/// are free functions rather than structs.
pub struct FnHandler<F>(pub F);

type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, RpcErr>> + Send + 'a>>;

#[async_trait]
impl<Ctx, F> RpcHandler<Ctx> for FnHandler<F>
where
    Ctx: Send + Sync + 'static,
    F: for<'a> Fn(Option<&'a [Value]>, &'a Ctx) -> HandlerFuture<'a> + Send + Sync,
{
    async fn handle(&self, params: Option<&[Value]>, ctx: &Ctx) -> Result<Value, RpcErr> {
        (self.0)(params, ctx).await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Echo;

    #[async_trait]
    impl RpcHandler<()> for Echo {
        async fn handle(&self, params: Option<&[Value]>, _ctx: &()) -> Result<Value, RpcErr> {
            Ok(params.and_then(|p| p.first().cloned()).unwrap_or(Value::Null))
        }
    }

    fn request(method: &str, params: Option<Vec<Value>>) -> RpcRequest {
        RpcRequest {
            id: RpcRequestId::Number(1),
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_handler() {
        let mut router = Router::new();
        router.register("echo", Echo);
        let result = router.dispatch(&request("echo", Some(vec![Value::from(42)])), &()).await.unwrap();
        assert_eq!(result, Value::from(42));
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let router: Router<()> = Router::new();
        let err = router.dispatch(&request("nope", None), &()).await.unwrap_err();
        let meta: RpcErrorMetadata = err.into();
        assert_eq!(meta.code, -32601);
    }

    #[tokio::test]
    async fn empty_batch_is_invalid_request() {
        let router: Router<()> = Router::new();
        let wrapper = RpcRequestWrapper::Multiple(vec![]);
        let value = router.dispatch_wrapper(wrapper, &()).await;
        let error = value.get("error").expect("expected error field");
        assert_eq!(error.get("code").unwrap(), -32600);
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let router: Router<()> = Router::new();
        let (status, value) = router.handle_body("not json", &()).await;
        let error = value.get("error").expect("expected error field");
        assert_eq!(error.get("code").unwrap(), -32700);
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn invalid_request_surfaces_as_http_400() {
        let router: Router<()> = Router::new();
        let (status, value) = router.handle_body("[]", &()).await;
        let error = value.get("error").expect("expected error field");
        assert_eq!(error.get("code").unwrap(), -32600);
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn unknown_method_over_http_is_still_200() {
        let router: Router<()> = Router::new();
        let (status, value) = router.handle_body(r#"{"jsonrpc":"2.0","id":1,"method":"nope"}"#, &()).await;
        let error = value.get("error").expect("expected error field");
        assert_eq!(error.get("code").unwrap(), -32601);
        assert_eq!(status, 200);
    }
}
