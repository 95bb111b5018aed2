//! Byte encoding helpers for the REST sign endpoints: inputs may be hex
//! (`0x`-prefixed) or base64, and the response must echo back whichever
//! convention the caller used.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ethereum_types::Address;

use crate::errors::SignerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Hex,
    Base64,
}

pub fn decode(input: &str) -> Result<(Vec<u8>, Encoding), SignerError> {
    if let Some(stripped) = input.strip_prefix("0x") {
        let bytes = hex::decode(stripped)
            .map_err(|err| SignerError::InvalidRequest(format!("invalid hex data: {err}")))?;
        Ok((bytes, Encoding::Hex))
    } else {
        let bytes = BASE64
            .decode(input)
            .map_err(|err| SignerError::InvalidRequest(format!("invalid base64 data: {err}")))?;
        Ok((bytes, Encoding::Base64))
    }
}

pub fn encode(bytes: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::Hex => format!("0x{}", hex::encode(bytes)),
        Encoding::Base64 => BASE64.encode(bytes),
    }
}

/// Parses an address case-insensitively, requiring a `0x` prefix (adding one
/// if missing) before lowercasing and hex-decoding.
pub fn parse_address(input: &str) -> Result<Address, SignerError> {
    let lower = input.to_lowercase();
    let hex_part = lower.strip_prefix("0x").unwrap_or(&lower);
    let bytes = hex::decode(hex_part)
        .map_err(|err| SignerError::InvalidAddress(format!("{input}: {err}")))?;
    if bytes.len() != 20 {
        return Err(SignerError::InvalidAddress(format!(
            "{input}: expected 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_round_trips_hex() {
        let (bytes, encoding) = decode("0xdeadbeef").unwrap();
        assert_eq!(bytes, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(encode(&bytes, encoding), "0xdeadbeef");
    }

    #[test]
    fn decode_round_trips_base64() {
        let (bytes, encoding) = decode("3q2+7w==").unwrap();
        assert_eq!(encode(&bytes, encoding), "3q2+7w==");
    }

    #[test]
    fn parse_address_is_case_insensitive() {
        let a = parse_address("0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap();
        let b = parse_address("f39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap();
        assert_eq!(a, b);
    }
}
