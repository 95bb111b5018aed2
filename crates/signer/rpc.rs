//! The seven JSON-RPC methods this signer exposes (§4.5). Each handler is a
//! small struct implementing [`RpcHandler`], registered by name in
//! [`crate::server::build_rpc_router`].

use async_trait::async_trait;
use bytes::Bytes;
use ethereum_types::{Address, U256};
use rb_crypto::{keccak256, personal_sign_digest, sign_hash};
use rb_jsonrpc::{RpcErr, RpcHandler};
use rb_tx::{sign_transaction, FeeModel, TransactionRequest};
use serde_json::{json, Value};

use crate::encoding::parse_address;
use crate::SignerContext;

fn params_or_err(params: Option<&[Value]>) -> Result<&[Value], RpcErr> {
    params.ok_or_else(|| RpcErr::InvalidParams("missing params".to_string()))
}

fn param(params: &[Value], index: usize) -> Result<&Value, RpcErr> {
    params
        .get(index)
        .ok_or_else(|| RpcErr::InvalidParams(format!("missing parameter at index {index}")))
}

fn as_str<'a>(value: &'a Value, field: &str) -> Result<&'a str, RpcErr> {
    value
        .as_str()
        .ok_or_else(|| RpcErr::InvalidParams(format!("{field} must be a string")))
}

fn hex_bytes(value: &str, field: &str) -> Result<Vec<u8>, RpcErr> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(stripped).map_err(|err| RpcErr::InvalidParams(format!("{field}: {err}")))
}

fn hex_u64(value: &str, field: &str) -> Result<u64, RpcErr> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(stripped, 16).map_err(|err| RpcErr::InvalidParams(format!("{field}: {err}")))
}

fn hex_u128(value: &str, field: &str) -> Result<u128, RpcErr> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    u128::from_str_radix(stripped, 16).map_err(|err| RpcErr::InvalidParams(format!("{field}: {err}")))
}

fn hex_u256(value: &str, field: &str) -> Result<U256, RpcErr> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    U256::from_str_radix(stripped, 16).map_err(|err| RpcErr::InvalidParams(format!("{field}: {err}")))
}

fn opt_field<'a>(obj: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| obj.get(name)).filter(|v| !v.is_null())
}

fn signer_address(obj: &Value) -> Result<Address, RpcErr> {
    let from = opt_field(obj, &["from"])
        .ok_or_else(|| RpcErr::InvalidParams("missing 'from'".to_string()))?;
    parse_address(as_str(from, "from")?).map_err(Into::into)
}

pub struct HealthStatus;

#[async_trait]
impl RpcHandler<SignerContext> for HealthStatus {
    async fn handle(&self, _params: Option<&[Value]>, _ctx: &SignerContext) -> Result<Value, RpcErr> {
        Ok(json!("ok"))
    }
}

pub struct EthAccounts;

#[async_trait]
impl RpcHandler<SignerContext> for EthAccounts {
    async fn handle(&self, _params: Option<&[Value]>, ctx: &SignerContext) -> Result<Value, RpcErr> {
        let mut addresses: Vec<String> =
            ctx.keystore.list().iter().map(|key| format!("{:#x}", key.address)).collect();
        addresses.sort();
        Ok(json!(addresses))
    }
}

pub struct EthSignTransaction;

#[async_trait]
impl RpcHandler<SignerContext> for EthSignTransaction {
    async fn handle(&self, params: Option<&[Value]>, ctx: &SignerContext) -> Result<Value, RpcErr> {
        let params = params_or_err(params)?;
        let tx_args = param(params, 0)?;

        let from = signer_address(tx_args)?;
        let chain_id = opt_field(tx_args, &["chainId"])
            .ok_or_else(|| RpcErr::InvalidParams("missing 'chainId'".to_string()))
            .and_then(|v| hex_u64(as_str(v, "chainId")?, "chainId"))?;
        if chain_id != ctx.chain_id {
            return Err(RpcErr::InvalidParams(format!(
                "chainId {chain_id} does not match signer's configured chain {}",
                ctx.chain_id
            )));
        }

        let to = match opt_field(tx_args, &["to"]) {
            Some(v) => Some(parse_address(as_str(v, "to")?)?),
            None => None,
        };
        let value = opt_field(tx_args, &["value"])
            .map(|v| hex_u256(as_str(v, "value")?, "value"))
            .transpose()?
            .unwrap_or_default();
        let nonce = opt_field(tx_args, &["nonce"])
            .map(|v| hex_u64(as_str(v, "nonce")?, "nonce"))
            .transpose()?
            .unwrap_or(0);
        let gas_limit = opt_field(tx_args, &["gas"])
            .map(|v| hex_u64(as_str(v, "gas")?, "gas"))
            .transpose()?
            .unwrap_or(21_000);
        let data = opt_field(tx_args, &["input", "data"])
            .map(|v| hex_bytes(as_str(v, "input/data")?, "input/data"))
            .transpose()?
            .unwrap_or_default();

        let fees = if opt_field(tx_args, &["maxFeePerGas"]).is_some() {
            let max_fee_per_gas = hex_u128(
                as_str(opt_field(tx_args, &["maxFeePerGas"]).unwrap(), "maxFeePerGas")?,
                "maxFeePerGas",
            )?;
            let max_priority_fee_per_gas = opt_field(tx_args, &["maxPriorityFeePerGas"])
                .map(|v| hex_u128(as_str(v, "maxPriorityFeePerGas")?, "maxPriorityFeePerGas"))
                .transpose()?
                .unwrap_or(0);
            FeeModel::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas }
        } else {
            let gas_price = opt_field(tx_args, &["gasPrice"])
                .map(|v| hex_u128(as_str(v, "gasPrice")?, "gasPrice"))
                .transpose()?
                .unwrap_or(0);
            FeeModel::Legacy { gas_price }
        };

        let key = ctx.keystore.get_by_address(from)?;
        let request = TransactionRequest { nonce, to, value, gas_limit, data: Bytes::from(data), fees };
        let signed = sign_transaction(&request, &key.secret_key, chain_id)
            .map_err(|err| RpcErr::SigningFailed(err.to_string()))?;
        Ok(json!(format!("0x{}", hex::encode(signed))))
    }
}

pub struct EthSign;

#[async_trait]
impl RpcHandler<SignerContext> for EthSign {
    async fn handle(&self, params: Option<&[Value]>, ctx: &SignerContext) -> Result<Value, RpcErr> {
        let params = params_or_err(params)?;
        let address = parse_address(as_str(param(params, 0)?, "address")?)?;
        let data = hex_bytes(as_str(param(params, 1)?, "data")?, "data")?;
        sign_message_eip191(ctx, address, &data).await
    }
}

pub struct PersonalSign;

#[async_trait]
impl RpcHandler<SignerContext> for PersonalSign {
    async fn handle(&self, params: Option<&[Value]>, ctx: &SignerContext) -> Result<Value, RpcErr> {
        let params = params_or_err(params)?;
        // Parameter order is inverted relative to `eth_sign`.
        let data = hex_bytes(as_str(param(params, 0)?, "data")?, "data")?;
        let address = parse_address(as_str(param(params, 1)?, "address")?)?;
        sign_message_eip191(ctx, address, &data).await
    }
}

async fn sign_message_eip191(ctx: &SignerContext, address: Address, data: &[u8]) -> Result<Value, RpcErr> {
    let key = ctx.keystore.get_by_address(address)?;
    let digest = personal_sign_digest(data);
    let sig = sign_hash(digest.as_bytes(), &key.secret_key)
        .map_err(|err| RpcErr::SigningFailed(err.to_string()))?;
    Ok(json!(format!("0x{}", hex::encode(sig.to_bytes_legacy()))))
}

pub struct OpsignerSignBlockPayload;

#[async_trait]
impl RpcHandler<SignerContext> for OpsignerSignBlockPayload {
    async fn handle(&self, params: Option<&[Value]>, ctx: &SignerContext) -> Result<Value, RpcErr> {
        let params = params_or_err(params)?;
        let obj = param(params, 0)?;
        let address = signer_address(obj)?;
        let data = hex_bytes(
            as_str(opt_field(obj, &["data"]).ok_or_else(|| RpcErr::InvalidParams("missing 'data'".to_string()))?, "data")?,
            "data",
        )?;
        let key = ctx.keystore.get_by_address(address)?;
        let digest = keccak256(&data);
        let sig = sign_hash(digest.as_bytes(), &key.secret_key)
            .map_err(|err| RpcErr::SigningFailed(err.to_string()))?;
        Ok(json!({ "signature": format!("0x{}", hex::encode(sig.to_bytes_legacy())) }))
    }
}

pub struct OpsignerSignBlockPayloadV2;

#[async_trait]
impl RpcHandler<SignerContext> for OpsignerSignBlockPayloadV2 {
    async fn handle(&self, params: Option<&[Value]>, ctx: &SignerContext) -> Result<Value, RpcErr> {
        let params = params_or_err(params)?;
        let obj = param(params, 0)?;
        let address = signer_address(obj)?;
        let block_hash = hex_bytes(
            as_str(
                opt_field(obj, &["blockHash"]).ok_or_else(|| RpcErr::InvalidParams("missing 'blockHash'".to_string()))?,
                "blockHash",
            )?,
            "blockHash",
        )?;

        let digest = match opt_field(obj, &["chainId"]) {
            Some(chain_id_value) => {
                let chain_id = hex_u64(as_str(chain_id_value, "chainId")?, "chainId")?;
                let mut buf = Vec::with_capacity(8 + block_hash.len());
                buf.extend_from_slice(&chain_id.to_be_bytes());
                buf.extend_from_slice(&block_hash);
                keccak256(&buf)
            }
            None => keccak256(&block_hash),
        };

        let key = ctx.keystore.get_by_address(address)?;
        let sig = sign_hash(digest.as_bytes(), &key.secret_key)
            .map_err(|err| RpcErr::SigningFailed(err.to_string()))?;
        Ok(json!({ "signature": format!("0x{}", hex::encode(sig.to_bytes_legacy())) }))
    }
}

/// Registers all seven method handlers into `router`.
pub fn register_all(router: &mut rb_jsonrpc::Router<SignerContext>) {
    router.register("health_status", HealthStatus);
    router.register("eth_accounts", EthAccounts);
    router.register("eth_signTransaction", EthSignTransaction);
    router.register("eth_sign", EthSign);
    router.register("personal_sign", PersonalSign);
    router.register("opsigner_signBlockPayload", OpsignerSignBlockPayload);
    router.register("opsigner_signBlockPayloadV2", OpsignerSignBlockPayloadV2);
}
