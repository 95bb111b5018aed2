//! A minimal Recursive Length Prefix (RLP) encoder/decoder, in the style of
//! `ethrex-rlp`: an `RLPEncode` trait with a builder-pattern list `Encoder`,
//! trimmed to the primitives this crate needs to sign and round-trip
//! Ethereum transactions (no generic decode-to-any-type support).

use bytes::{BufMut, Bytes};
use ethereum_types::{Address, U256};

use crate::errors::TxError;

const RLP_NULL: u8 = 0x80;
const RLP_EMPTY_LIST: u8 = 0xc0;

pub trait RLPEncode {
    fn encode(&self, buf: &mut dyn BufMut);
}

fn encode_length(payload_len: usize, prefix_base: u8, buf: &mut dyn BufMut) {
    if payload_len < 56 {
        buf.put_u8(prefix_base + payload_len as u8);
    } else {
        let be = payload_len.to_be_bytes();
        let first_nonzero = be.iter().position(|b| *b != 0).unwrap_or(be.len() - 1);
        let len_bytes = &be[first_nonzero..];
        buf.put_u8(prefix_base + 55 + len_bytes.len() as u8);
        buf.put_slice(len_bytes);
    }
}

fn encode_bytes(bytes: &[u8], buf: &mut dyn BufMut) {
    if bytes.len() == 1 && bytes[0] < RLP_NULL {
        buf.put_u8(bytes[0]);
    } else {
        encode_length(bytes.len(), RLP_NULL, buf);
        buf.put_slice(bytes);
    }
}

impl RLPEncode for [u8] {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self, buf);
    }
}

impl RLPEncode for Vec<u8> {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self, buf);
    }
}

impl RLPEncode for Bytes {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self, buf);
    }
}

/// Integers encode as the shortest big-endian byte string with no leading
/// zero byte; zero encodes as the empty string (0x80).
fn encode_uint_be(be: &[u8], buf: &mut dyn BufMut) {
    let first_nonzero = be.iter().position(|b| *b != 0);
    match first_nonzero {
        None => buf.put_u8(RLP_NULL),
        Some(i) => encode_bytes(&be[i..], buf),
    }
}

impl RLPEncode for u64 {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_uint_be(&self.to_be_bytes(), buf);
    }
}

impl RLPEncode for u128 {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_uint_be(&self.to_be_bytes(), buf);
    }
}

impl RLPEncode for U256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        let mut be = [0u8; 32];
        self.to_big_endian(&mut be);
        encode_uint_be(&be, buf);
    }
}

impl RLPEncode for Address {
    fn encode(&self, buf: &mut dyn BufMut) {
        encode_bytes(self.as_bytes(), buf);
    }
}

/// `TxKind` encodes as the recipient address, or the empty string for
/// contract creation — the convention every Ethereum transaction RLP uses.
pub enum TxKind {
    Call(Address),
    Create,
}

impl RLPEncode for TxKind {
    fn encode(&self, buf: &mut dyn BufMut) {
        match self {
            TxKind::Call(address) => address.encode(buf),
            TxKind::Create => buf.put_u8(RLP_NULL),
        }
    }
}

/// Fluent builder for RLP lists, mirroring `ethrex_rlp::structs::Encoder`.
pub struct Encoder<'a> {
    buf: &'a mut dyn BufMut,
    temp: Vec<u8>,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut dyn BufMut) -> Self {
        Self {
            buf,
            temp: Vec::new(),
        }
    }

    pub fn encode_field<T: RLPEncode>(mut self, value: &T) -> Self {
        value.encode(&mut self.temp);
        self
    }

    /// Encodes an already-empty access list, i.e. `[]`.
    pub fn encode_empty_list(mut self) -> Self {
        self.temp.put_u8(RLP_EMPTY_LIST);
        self
    }

    pub fn finish(self) {
        encode_length(self.temp.len(), RLP_EMPTY_LIST, self.buf);
        self.buf.put_slice(&self.temp);
    }
}

/// A parsed (but not type-interpreted) RLP list item: either a string
/// payload or a nested list of items, each retaining its raw bytes.
#[derive(Debug)]
pub enum Item {
    String(Vec<u8>),
    List(Vec<Item>),
}

impl Item {
    pub fn as_bytes(&self) -> Result<&[u8], TxError> {
        match self {
            Item::String(bytes) => Ok(bytes),
            Item::List(_) => Err(TxError::DecodeError("expected string item, got list".into())),
        }
    }

    pub fn as_list(&self) -> Result<&[Item], TxError> {
        match self {
            Item::List(items) => Ok(items),
            Item::String(_) => Err(TxError::DecodeError("expected list item, got string".into())),
        }
    }

    pub fn as_u64(&self) -> Result<u64, TxError> {
        let bytes = self.as_bytes()?;
        if bytes.len() > 8 {
            return Err(TxError::DecodeError("integer overflows u64".into()));
        }
        let mut be = [0u8; 8];
        be[8 - bytes.len()..].copy_from_slice(bytes);
        Ok(u64::from_be_bytes(be))
    }

    pub fn as_u128(&self) -> Result<u128, TxError> {
        let bytes = self.as_bytes()?;
        if bytes.len() > 16 {
            return Err(TxError::DecodeError("integer overflows u128".into()));
        }
        let mut be = [0u8; 16];
        be[16 - bytes.len()..].copy_from_slice(bytes);
        Ok(u128::from_be_bytes(be))
    }

    pub fn as_u256(&self) -> Result<U256, TxError> {
        Ok(U256::from_big_endian(self.as_bytes()?))
    }

    pub fn as_tx_kind(&self) -> Result<TxKind, TxError> {
        let bytes = self.as_bytes()?;
        if bytes.is_empty() {
            Ok(TxKind::Create)
        } else {
            Ok(TxKind::Call(Address::from_slice(bytes)))
        }
    }
}

/// Decodes a single top-level RLP list into its items, failing on any
/// trailing bytes. This is the only decode entry point this crate needs:
/// round-tripping the signed transactions it itself produced.
pub fn decode_list(data: &[u8]) -> Result<Vec<Item>, TxError> {
    let (item, rest) = decode_item(data)?;
    if !rest.is_empty() {
        return Err(TxError::DecodeError("trailing bytes after RLP list".into()));
    }
    match item {
        Item::List(items) => Ok(items),
        Item::String(_) => Err(TxError::DecodeError("expected outer RLP list".into())),
    }
}

fn decode_item(data: &[u8]) -> Result<(Item, &[u8]), TxError> {
    let first = *data
        .first()
        .ok_or_else(|| TxError::DecodeError("empty RLP input".into()))?;

    if first < RLP_NULL {
        return Ok((Item::String(vec![first]), &data[1..]));
    }
    if first < 0xb8 {
        let len = (first - RLP_NULL) as usize;
        let (payload, rest) = split_at_checked(data, 1, len)?;
        return Ok((Item::String(payload.to_vec()), rest));
    }
    if first < RLP_EMPTY_LIST {
        let len_of_len = (first - 0xb7) as usize;
        let (len_bytes, after_len) = split_at_checked(data, 1, len_of_len)?;
        let len = be_to_usize(len_bytes)?;
        let (payload, rest) = split_at_checked(after_len, 0, len)?;
        return Ok((Item::String(payload.to_vec()), rest));
    }
    if first < 0xf8 {
        let len = (first - RLP_EMPTY_LIST) as usize;
        let (payload, rest) = split_at_checked(data, 1, len)?;
        return Ok((Item::List(decode_items(payload)?), rest));
    }
    let len_of_len = (first - 0xf7) as usize;
    let (len_bytes, after_len) = split_at_checked(data, 1, len_of_len)?;
    let len = be_to_usize(len_bytes)?;
    let (payload, rest) = split_at_checked(after_len, 0, len)?;
    Ok((Item::List(decode_items(payload)?), rest))
}

fn decode_items(mut payload: &[u8]) -> Result<Vec<Item>, TxError> {
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, rest) = decode_item(payload)?;
        items.push(item);
        payload = rest;
    }
    Ok(items)
}

fn split_at_checked(data: &[u8], skip: usize, len: usize) -> Result<(&[u8], &[u8]), TxError> {
    let data = data
        .get(skip..)
        .ok_or_else(|| TxError::DecodeError("RLP input truncated".into()))?;
    if data.len() < len {
        return Err(TxError::DecodeError("RLP input truncated".into()));
    }
    Ok(data.split_at(len))
}

fn be_to_usize(bytes: &[u8]) -> Result<usize, TxError> {
    if bytes.len() > std::mem::size_of::<usize>() {
        return Err(TxError::DecodeError("RLP length prefix too large".into()));
    }
    let mut be = [0u8; std::mem::size_of::<usize>()];
    be[std::mem::size_of::<usize>() - bytes.len()..].copy_from_slice(bytes);
    Ok(usize::from_be_bytes(be))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encodes_short_and_long_strings() {
        let mut buf = Vec::new();
        b"dog".to_vec().encode(&mut buf);
        assert_eq!(buf, vec![0x83, b'd', b'o', b'g']);

        let mut buf = Vec::new();
        0u64.encode(&mut buf);
        assert_eq!(buf, vec![RLP_NULL]);
    }

    #[test]
    fn list_round_trips_through_decode() {
        let mut buf = Vec::new();
        Encoder::new(&mut buf)
            .encode_field(&42u64)
            .encode_field(&Address::zero())
            .finish();
        let items = decode_list(&buf).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_u64().unwrap(), 42);
    }
}
