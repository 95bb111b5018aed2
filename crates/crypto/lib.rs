//! Cryptographic primitives shared by the signer and the deployer: hashing,
//! secp256k1 sign/recover and Ethereum address derivation.

use ethereum_types::{Address, H256};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};
use sha2::Digest as _;
use sha3::{Digest as _, Keccak256};

pub mod errors;
pub use errors::CryptoError;

/// 65-byte uncompressed-key-derived Ethereum signature: R(32) || S(32) || V(1).
///
/// `v` is always stored in "raw" yParity form (0 or 1); conversion to/from the
/// legacy 27/28 convention happens at the edges (see [`Signature::v_legacy`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl Signature {
    pub fn v_legacy(&self) -> u8 {
        self.v + 27
    }

    /// Builds a signature from a legacy-or-raw V byte, normalizing to raw form.
    pub fn from_parts(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        let v = if v >= 27 { v - 27 } else { v };
        Self { r, s, v }
    }

    pub fn to_bytes(self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    pub fn to_bytes_legacy(self) -> [u8; 65] {
        let mut out = self.to_bytes();
        out[64] = self.v_legacy();
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 65 {
            return Err(CryptoError::InvalidInput(format!(
                "signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self::from_parts(r, s, bytes[64]))
    }
}

pub fn keccak256(data: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    sha2::Sha256::digest(data).into()
}

/// EIP-191 "personal_sign" digest: keccak256("\x19Ethereum Signed Message:\n" || len || msg).
pub fn personal_sign_digest(message: &[u8]) -> H256 {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut buf = Vec::with_capacity(prefix.len() + message.len());
    buf.extend_from_slice(prefix.as_bytes());
    buf.extend_from_slice(message);
    keccak256(&buf)
}

/// Derives the canonical lowercase `0x`-prefixed Ethereum address from an
/// uncompressed secp256k1 public key (65 bytes, leading 0x04 tag included).
pub fn address_from_uncompressed_pubkey(pubkey_bytes: &[u8]) -> Result<Address, CryptoError> {
    if pubkey_bytes.len() != 65 || pubkey_bytes[0] != 0x04 {
        return Err(CryptoError::InvalidInput(
            "expected a 65-byte uncompressed public key starting with 0x04".to_string(),
        ));
    }
    let hash = keccak256(&pubkey_bytes[1..]);
    Ok(Address::from_slice(&hash.as_bytes()[12..]))
}

pub fn public_key_to_uncompressed_bytes(pk: &PublicKey) -> [u8; 65] {
    pk.serialize_uncompressed()
}

pub fn address_from_secret_key(sk: &SecretKey) -> Address {
    let pk = PublicKey::from_secret_key(SECP256K1, sk);
    // Safe: serialize_uncompressed() always returns a 65-byte, 0x04-tagged key.
    address_from_uncompressed_pubkey(&public_key_to_uncompressed_bytes(&pk))
        .expect("uncompressed pubkey is always well-formed")
}

/// Signs a 32-byte digest with a secp256k1 private key, returning a raw
/// (yParity 0/1) signature.
pub fn sign_hash(hash: &[u8], key: &SecretKey) -> Result<Signature, CryptoError> {
    if hash.len() != 32 {
        return Err(CryptoError::InvalidInput(format!(
            "digest must be 32 bytes, got {}",
            hash.len()
        )));
    }
    let message = Message::from_digest_slice(hash)
        .map_err(|err| CryptoError::SigningFailed(err.to_string()))?;
    let recoverable = SECP256K1.sign_ecdsa_recoverable(&message, key);
    let (recovery_id, raw) = recoverable.serialize_compact();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&raw[..32]);
    s.copy_from_slice(&raw[32..]);
    Ok(Signature {
        r,
        s,
        v: recovery_id.to_i32() as u8,
    })
}

/// Recovers the address that produced `sig` over `hash`. Accepts both the
/// raw (0/1) and legacy (27/28) V conventions, normalizing `v >= 27` to `v - 27`.
pub fn recover(hash: &[u8], sig: &Signature) -> Result<Address, CryptoError> {
    if hash.len() != 32 {
        return Err(CryptoError::InvalidInput(format!(
            "digest must be 32 bytes, got {}",
            hash.len()
        )));
    }
    let message = Message::from_digest_slice(hash)
        .map_err(|err| CryptoError::SigningFailed(err.to_string()))?;
    let recovery_id = RecoveryId::from_i32(sig.v as i32)
        .map_err(|err| CryptoError::InvalidInput(format!("invalid recovery id: {err}")))?;
    let mut raw = [0u8; 64];
    raw[..32].copy_from_slice(&sig.r);
    raw[32..].copy_from_slice(&sig.s);
    let recoverable = RecoverableSignature::from_compact(&raw, recovery_id)
        .map_err(|err| CryptoError::InvalidInput(format!("invalid signature: {err}")))?;
    let pubkey = SECP256K1
        .recover_ecdsa(&message, &recoverable)
        .map_err(|err| CryptoError::SigningFailed(err.to_string()))?;
    address_from_uncompressed_pubkey(&public_key_to_uncompressed_bytes(&pubkey))
}

pub fn generate_secret_key() -> SecretKey {
    SecretKey::new(&mut rand::thread_rng())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sign_and_recover_are_inverses() {
        let key = generate_secret_key();
        let address = address_from_secret_key(&key);
        let hash = keccak256(b"hello world");
        let sig = sign_hash(hash.as_bytes(), &key).unwrap();
        let recovered = recover(hash.as_bytes(), &sig).unwrap();
        assert_eq!(recovered, address);
    }

    #[test]
    fn sign_hash_rejects_short_digests() {
        let key = generate_secret_key();
        let err = sign_hash(&[0u8; 31], &key).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidInput(_)));
    }

    #[test]
    fn recover_normalizes_legacy_v() {
        let key = generate_secret_key();
        let address = address_from_secret_key(&key);
        let hash = keccak256(b"some message");
        let sig = sign_hash(hash.as_bytes(), &key).unwrap();
        let legacy = Signature::from_parts(sig.r, sig.s, sig.v_legacy());
        assert_eq!(recover(hash.as_bytes(), &legacy).unwrap(), address);
    }

    #[test]
    fn personal_sign_digest_matches_anvil_zero_message() {
        // anvil-0's well-known private key, signing the empty message.
        let key_bytes =
            hex::decode("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")
                .unwrap();
        let key = SecretKey::from_slice(&key_bytes).unwrap();
        let address = address_from_secret_key(&key);
        assert_eq!(
            format!("{address:#x}"),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".to_lowercase()
        );
        let digest = personal_sign_digest(b"");
        let sig = sign_hash(digest.as_bytes(), &key).unwrap();
        assert_eq!(recover(digest.as_bytes(), &sig).unwrap(), address);
    }
}
