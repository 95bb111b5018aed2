//! Building, signing, and decoding legacy and EIP-1559 Ethereum
//! transactions. The binary-encoded output of [`sign_transaction`] is
//! exactly the payload an execution client's `eth_sendRawTransaction`
//! expects.

use bytes::Bytes;
use ethereum_types::{Address, U256};
use rb_crypto::{keccak256, sign_hash, Signature};
use secp256k1::SecretKey;

pub mod errors;
pub mod rlp;

pub use errors::TxError;
use rlp::{decode_list, Encoder, Item, RLPEncode, TxKind};

const EIP1559_TX_TYPE: u8 = 0x02;

/// Fields common to every transaction this signer is willing to sign,
/// independent of fee model (§3: "Transaction fingerprint").
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub nonce: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub gas_limit: u64,
    pub data: Bytes,
    pub fees: FeeModel,
}

#[derive(Debug, Clone)]
pub enum FeeModel {
    Legacy { gas_price: u128 },
    Eip1559 { max_fee_per_gas: u128, max_priority_fee_per_gas: u128 },
}

fn to_tx_kind(to: Option<Address>) -> TxKind {
    match to {
        Some(address) => TxKind::Call(address),
        None => TxKind::Create,
    }
}

/// The decoded form of a signed transaction this crate produced, used by
/// round-trip tests and by anything that needs to recover the sender.
#[derive(Debug, Clone)]
pub struct DecodedTransaction {
    pub is_eip1559: bool,
    pub chain_id: u64,
    pub nonce: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub gas_limit: u64,
    pub data: Bytes,
    pub fees: FeeModel,
    pub signature: Signature,
}

fn encode_unsigned_legacy(req: &TransactionRequest, chain_id: u64, buf: &mut Vec<u8>) {
    let FeeModel::Legacy { gas_price } = req.fees else {
        unreachable!("encode_unsigned_legacy called with non-legacy fees")
    };
    let mut encoder = Encoder::new(buf)
        .encode_field(&req.nonce)
        .encode_field(&gas_price)
        .encode_field(&req.gas_limit)
        .encode_field(&to_tx_kind(req.to))
        .encode_field(&req.value)
        .encode_field(&req.data.to_vec());
    // EIP-155: chainId, 0, 0 appended to the signing payload when chainId != 0.
    if chain_id != 0 {
        encoder = encoder
            .encode_field(&chain_id)
            .encode_field(&0u64)
            .encode_field(&0u64);
    }
    encoder.finish();
}

fn encode_signed_legacy(req: &TransactionRequest, chain_id: u64, sig: Signature) -> Vec<u8> {
    let FeeModel::Legacy { gas_price } = req.fees else {
        unreachable!("encode_signed_legacy called with non-legacy fees")
    };
    let v: u64 = if chain_id != 0 {
        chain_id * 2 + 35 + sig.v as u64
    } else {
        sig.v as u64 + 27
    };
    let mut buf = Vec::new();
    Encoder::new(&mut buf)
        .encode_field(&req.nonce)
        .encode_field(&gas_price)
        .encode_field(&req.gas_limit)
        .encode_field(&to_tx_kind(req.to))
        .encode_field(&req.value)
        .encode_field(&req.data.to_vec())
        .encode_field(&v)
        .encode_field(&U256::from_big_endian(&sig.r))
        .encode_field(&U256::from_big_endian(&sig.s))
        .finish();
    buf
}

fn encode_unsigned_eip1559(req: &TransactionRequest, chain_id: u64, buf: &mut Vec<u8>) {
    let FeeModel::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } = req.fees else {
        unreachable!("encode_unsigned_eip1559 called with non-1559 fees")
    };
    buf.push(EIP1559_TX_TYPE);
    Encoder::new(buf)
        .encode_field(&chain_id)
        .encode_field(&req.nonce)
        .encode_field(&max_priority_fee_per_gas)
        .encode_field(&max_fee_per_gas)
        .encode_field(&req.gas_limit)
        .encode_field(&to_tx_kind(req.to))
        .encode_field(&req.value)
        .encode_field(&req.data.to_vec())
        .encode_empty_list()
        .finish();
}

fn encode_signed_eip1559(req: &TransactionRequest, chain_id: u64, sig: Signature) -> Vec<u8> {
    let FeeModel::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } = req.fees else {
        unreachable!("encode_signed_eip1559 called with non-1559 fees")
    };
    let mut buf = vec![EIP1559_TX_TYPE];
    Encoder::new(&mut buf)
        .encode_field(&chain_id)
        .encode_field(&req.nonce)
        .encode_field(&max_priority_fee_per_gas)
        .encode_field(&max_fee_per_gas)
        .encode_field(&req.gas_limit)
        .encode_field(&to_tx_kind(req.to))
        .encode_field(&req.value)
        .encode_field(&req.data.to_vec())
        .encode_empty_list()
        .encode_field(&(sig.v as u64))
        .encode_field(&U256::from_big_endian(&sig.r))
        .encode_field(&U256::from_big_endian(&sig.s))
        .finish();
    buf
}

/// Signs `req` for `chain_id` with `key`, returning the canonical
/// binary-encoded signed transaction ready for `eth_sendRawTransaction`.
pub fn sign_transaction(
    req: &TransactionRequest,
    key: &SecretKey,
    chain_id: u64,
) -> Result<Vec<u8>, TxError> {
    let mut unsigned = Vec::new();
    match req.fees {
        FeeModel::Legacy { .. } => encode_unsigned_legacy(req, chain_id, &mut unsigned),
        FeeModel::Eip1559 { .. } => encode_unsigned_eip1559(req, chain_id, &mut unsigned),
    }
    let digest = keccak256(&unsigned);
    let sig = sign_hash(digest.as_bytes(), key)?;
    Ok(match req.fees {
        FeeModel::Legacy { .. } => encode_signed_legacy(req, chain_id, sig),
        FeeModel::Eip1559 { .. } => encode_signed_eip1559(req, chain_id, sig),
    })
}

/// Decodes a signed transaction produced by [`sign_transaction`].
pub fn decode_signed_transaction(data: &[u8]) -> Result<DecodedTransaction, TxError> {
    if data.first() == Some(&EIP1559_TX_TYPE) {
        decode_eip1559(&data[1..])
    } else {
        decode_legacy(data)
    }
}

fn decode_legacy(data: &[u8]) -> Result<DecodedTransaction, TxError> {
    let items = decode_list(data)?;
    let [nonce, gas_price, gas_limit, to, value, data_item, v, r, s] = items.as_slice() else {
        return Err(TxError::DecodeError("legacy tx needs 9 fields".into()));
    };
    let v = v.as_u64()?;
    let (chain_id, raw_v) = if v >= 35 {
        ((v - 35) / 2, (v - 35) % 2)
    } else {
        (0, v.saturating_sub(27))
    };
    Ok(DecodedTransaction {
        is_eip1559: false,
        chain_id,
        nonce: nonce.as_u64()?,
        to: to_address(to)?,
        value: value.as_u256()?,
        gas_limit: gas_limit.as_u64()?,
        data: Bytes::from(data_item.as_bytes()?.to_vec()),
        fees: FeeModel::Legacy { gas_price: gas_price.as_u128()? },
        signature: Signature::from_parts(u256_to_32(r.as_u256()?), u256_to_32(s.as_u256()?), raw_v as u8),
    })
}

fn decode_eip1559(payload: &[u8]) -> Result<DecodedTransaction, TxError> {
    let items = decode_list(payload)?;
    let [chain_id, nonce, max_priority_fee, max_fee, gas_limit, to, value, data_item, _access_list, v, r, s] =
        items.as_slice()
    else {
        return Err(TxError::DecodeError("eip1559 tx needs 11 fields".into()));
    };
    Ok(DecodedTransaction {
        is_eip1559: true,
        chain_id: chain_id.as_u64()?,
        nonce: nonce.as_u64()?,
        to: to_address(to)?,
        value: value.as_u256()?,
        gas_limit: gas_limit.as_u64()?,
        data: Bytes::from(data_item.as_bytes()?.to_vec()),
        fees: FeeModel::Eip1559 {
            max_fee_per_gas: max_fee.as_u128()?,
            max_priority_fee_per_gas: max_priority_fee.as_u128()?,
        },
        signature: Signature::from_parts(u256_to_32(r.as_u256()?), u256_to_32(s.as_u256()?), v.as_u64()? as u8),
    })
}

fn to_address(item: &Item) -> Result<Option<Address>, TxError> {
    let bytes = item.as_bytes()?;
    if bytes.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Address::from_slice(bytes)))
    }
}

fn u256_to_32(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

/// Recomputes the signing digest for a decoded transaction and recovers the
/// address that produced its signature.
pub fn recover_sender(decoded: &DecodedTransaction) -> Result<Address, TxError> {
    let req = TransactionRequest {
        nonce: decoded.nonce,
        to: decoded.to,
        value: decoded.value,
        gas_limit: decoded.gas_limit,
        data: decoded.data.clone(),
        fees: decoded.fees.clone(),
    };
    let mut unsigned = Vec::new();
    match decoded.fees {
        FeeModel::Legacy { .. } => encode_unsigned_legacy(&req, decoded.chain_id, &mut unsigned),
        FeeModel::Eip1559 { .. } => encode_unsigned_eip1559(&req, decoded.chain_id, &mut unsigned),
    }
    let digest = keccak256(&unsigned);
    Ok(rb_crypto::recover(digest.as_bytes(), &decoded.signature)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use rb_crypto::{address_from_secret_key, generate_secret_key};

    fn sample_request(fees: FeeModel) -> TransactionRequest {
        TransactionRequest {
            nonce: 7,
            to: Some(Address::repeat_byte(0x11)),
            value: U256::from(1_000u64),
            gas_limit: 21_000,
            data: Bytes::new(),
            fees,
        }
    }

    #[test]
    fn legacy_round_trips_and_recovers_sender() {
        let key = generate_secret_key();
        let address = address_from_secret_key(&key);
        let req = sample_request(FeeModel::Legacy { gas_price: 20_000_000_000 });
        let signed = sign_transaction(&req, &key, 1).unwrap();
        let decoded = decode_signed_transaction(&signed).unwrap();
        assert!(!decoded.is_eip1559);
        assert_eq!(decoded.nonce, 7);
        assert_eq!(recover_sender(&decoded).unwrap(), address);
    }

    #[test]
    fn eip1559_round_trips_and_recovers_sender() {
        let key = generate_secret_key();
        let address = address_from_secret_key(&key);
        let req = sample_request(FeeModel::Eip1559 {
            max_fee_per_gas: 30_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        });
        let signed = sign_transaction(&req, &key, 10).unwrap();
        assert_eq!(signed[0], EIP1559_TX_TYPE);
        let decoded = decode_signed_transaction(&signed).unwrap();
        assert!(decoded.is_eip1559);
        assert_eq!(decoded.chain_id, 10);
        assert_eq!(recover_sender(&decoded).unwrap(), address);
    }

    #[test]
    fn contract_creation_has_no_recipient() {
        let key = generate_secret_key();
        let mut req = sample_request(FeeModel::Legacy { gas_price: 1 });
        req.to = None;
        let signed = sign_transaction(&req, &key, 1).unwrap();
        let decoded = decode_signed_transaction(&signed).unwrap();
        assert_eq!(decoded.to, None);
    }

    #[test]
    fn sign_and_decode_are_deterministic_given_same_input() {
        let key = generate_secret_key();
        let req = sample_request(FeeModel::Legacy { gas_price: 1 });
        let a = sign_transaction(&req, &key, 1).unwrap();
        let b = sign_transaction(&req, &key, 1).unwrap();
        // ECDSA signing with secp256k1's RFC 6979 nonce is deterministic.
        assert_eq!(a, b);
    }
}
