//! REST key-management and signing routes (§4.6). `:id` path segments are
//! tried first as an opaque key ID, falling back to an address.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use rb_crypto::sha256;
use rb_keystore::{Key, Keystore};
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::encoding::{decode, encode, parse_address};
use crate::errors::SignerError;
use crate::SignerContext;

#[derive(Serialize)]
pub struct KeySummary {
    pub id: String,
    pub name: String,
    pub address: String,
}

impl From<&Key> for KeySummary {
    fn from(key: &Key) -> Self {
        Self { id: key.id.clone(), name: key.name.clone(), address: format!("{:#x}", key.address) }
    }
}

fn lookup(keystore: &Keystore, id_or_address: &str) -> Result<Key, SignerError> {
    if let Ok(key) = keystore.get_by_id(id_or_address) {
        return Ok(key);
    }
    let address = parse_address(id_or_address)?;
    keystore.get_by_address(address).map_err(Into::into)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn list_keys(State(ctx): State<Arc<SignerContext>>) -> Json<Vec<KeySummary>> {
    Json(ctx.keystore.list().iter().map(KeySummary::from).collect())
}

pub async fn get_key(
    State(ctx): State<Arc<SignerContext>>,
    Path(id): Path<String>,
) -> Result<Json<KeySummary>, SignerError> {
    let key = lookup(&ctx.keystore, &id)?;
    Ok(Json(KeySummary::from(&key)))
}

#[derive(Deserialize)]
pub struct CreateKeyRequest {
    pub id: String,
    pub name: String,
    /// Hex-encoded 32-byte secp256k1 private key. Operator-supplied: this
    /// signer never generates key material it doesn't also return.
    pub private_key: String,
}

pub async fn create_key(
    State(ctx): State<Arc<SignerContext>>,
    Json(req): Json<CreateKeyRequest>,
) -> Result<Json<KeySummary>, SignerError> {
    let stripped = req.private_key.strip_prefix("0x").unwrap_or(&req.private_key);
    let bytes = hex::decode(stripped)
        .map_err(|err| SignerError::InvalidRequest(format!("invalid private_key: {err}")))?;
    let secret_key = SecretKey::from_slice(&bytes)
        .map_err(|err| SignerError::InvalidRequest(format!("invalid private_key: {err}")))?;
    let key = Key::new(req.id, req.name, secret_key);
    let summary = KeySummary::from(&key);
    ctx.keystore.add(key)?;
    Ok(Json(summary))
}

pub async fn delete_key(
    State(ctx): State<Arc<SignerContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, SignerError> {
    let key = lookup(&ctx.keystore, &id)?;
    ctx.keystore.delete(key.address)?;
    Ok(Json(json!({ "deleted": format!("{:#x}", key.address) })))
}

#[derive(Deserialize)]
pub struct SignRequest {
    pub data: String,
    #[serde(default)]
    pub prehashed: bool,
}

#[derive(Serialize)]
pub struct SignResponse {
    pub signature: String,
}

/// Hashes `data` per `req.prehashed` (SHA-256 by default — never Keccak,
/// that is this endpoint's documented compatibility contract) and signs it
/// with `key`, returning the signature in the same encoding as the input.
fn sign_one(key: &Key, req: &SignRequest) -> Result<String, SignerError> {
    let (bytes, encoding) = decode(&req.data)?;
    let digest: [u8; 32] = if req.prehashed {
        bytes
            .try_into()
            .map_err(|_| SignerError::InvalidRequest("prehashed data must be 32 bytes".to_string()))?
    } else {
        sha256(&bytes)
    };
    let sig = rb_crypto::sign_hash(&digest, &key.secret_key)?;
    Ok(encode(&sig.to_bytes_legacy(), encoding))
}

pub async fn sign_with_key(
    State(ctx): State<Arc<SignerContext>>,
    Path(id): Path<String>,
    Json(req): Json<SignRequest>,
) -> Result<Json<SignResponse>, SignerError> {
    let key = lookup(&ctx.keystore, &id)?;
    Ok(Json(SignResponse { signature: sign_one(&key, &req)? }))
}

#[derive(Deserialize)]
pub struct BatchSignItem {
    pub key_id: String,
    pub data: String,
    #[serde(default)]
    pub prehashed: bool,
}

#[derive(Serialize)]
pub struct BatchSignResult {
    pub key_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct BatchSignRequest {
    pub items: Vec<BatchSignItem>,
}

#[derive(Serialize)]
pub struct BatchSignResponse {
    pub results: Vec<BatchSignResult>,
}

/// Always returns `200`: per-item failures are reported in-band so one bad
/// key in a batch doesn't fail signatures that would otherwise succeed.
pub async fn sign_batch(
    State(ctx): State<Arc<SignerContext>>,
    Json(req): Json<BatchSignRequest>,
) -> Json<BatchSignResponse> {
    let results = req
        .items
        .into_iter()
        .map(|item| {
            let sign_request = SignRequest { data: item.data, prehashed: item.prehashed };
            match lookup(&ctx.keystore, &item.key_id).and_then(|key| sign_one(&key, &sign_request)) {
                Ok(signature) => BatchSignResult { key_id: item.key_id, signature: Some(signature), error: None },
                Err(err) => BatchSignResult { key_id: item.key_id, signature: None, error: Some(err.to_string()) },
            }
        })
        .collect();
    Json(BatchSignResponse { results })
}
