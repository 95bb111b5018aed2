use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rb_jsonrpc::{Router as RpcRouter, RpcRequestId};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::authentication::{authenticate, API_KEY_HEADER};
use crate::rest;
use crate::rpc;
use crate::SignerContext;

pub fn build_rpc_router() -> RpcRouter<SignerContext> {
    let mut router = RpcRouter::new();
    rpc::register_all(&mut router);
    router
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

async fn handle_rpc_request(
    State(ctx): State<Arc<(RpcRouter<SignerContext>, Arc<SignerContext>)>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<Value>) {
    let (router, context) = &*ctx;
    if let Err(err) = authenticate(&context.api_key, header_str(&headers, API_KEY_HEADER)) {
        let value = rb_jsonrpc::rpc_response(RpcRequestId::String(String::new()), Err(err));
        return (StatusCode::OK, Json(value));
    }
    let (status, value) = router.handle_body(&body, context.as_ref()).await;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    (status, Json(value))
}

async fn require_api_key(State(ctx): State<Arc<SignerContext>>, request: Request, next: Next) -> Response {
    let header = header_str(request.headers(), API_KEY_HEADER).map(str::to_string);
    if let Err(err) = authenticate(&ctx.api_key, header.as_deref()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": err.to_string() }))).into_response();
    }
    next.run(request).await
}

/// Starts the JSON-RPC listener at `rpc_addr` and the REST listener at
/// `rest_addr`, mirroring the reference's dual-listener `start_api`: two
/// independent `axum::serve` futures joined with `tokio::try_join!`.
pub async fn start_api(rpc_addr: SocketAddr, rest_addr: SocketAddr, ctx: Arc<SignerContext>) {
    let cors = CorsLayer::permissive();

    let rpc_state = Arc::new((build_rpc_router(), ctx.clone()));
    let rpc_router = Router::new()
        .route("/", post(handle_rpc_request))
        .layer(cors.clone())
        .with_state(rpc_state);
    let rpc_listener = tokio::net::TcpListener::bind(rpc_addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind JSON-RPC listener on {rpc_addr}: {err}"));

    let protected_routes = Router::new()
        .route("/v1/keys", get(rest::list_keys).post(rest::create_key))
        .route("/v1/keys/{id}", get(rest::get_key).delete(rest::delete_key))
        .route("/v1/keys/{id}/sign", post(rest::sign_with_key))
        .route("/v1/sign/batch", post(rest::sign_batch))
        .layer(middleware::from_fn_with_state(ctx.clone(), require_api_key));

    let rest_router = Router::new()
        .route("/health", get(rest::health))
        .merge(protected_routes)
        .layer(cors)
        .with_state(ctx);
    let rest_listener = tokio::net::TcpListener::bind(rest_addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind REST listener on {rest_addr}: {err}"));

    let rpc_server = axum::serve(rpc_listener, rpc_router).with_graceful_shutdown(shutdown_signal());
    let rest_server = axum::serve(rest_listener, rest_router).with_graceful_shutdown(shutdown_signal());

    info!("Starting JSON-RPC server at {rpc_addr}");
    info!("Starting REST server at {rest_addr}");

    let _ = tokio::try_join!(rpc_server, rest_server)
        .inspect_err(|err| info!("signer servers shut down with error: {err:?}"));
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
