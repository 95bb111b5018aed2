//! Thread-safe, in-memory custody of secp256k1 keys.
//!
//! Keys are addressed primarily by their derived Ethereum address; a
//! secondary opaque ID is kept for operator-facing lookups. Entries are
//! immutable after insertion and the map is guarded by a single
//! reader-writer lock (§5: reads never cross an `.await`, signing happens
//! after the lock is released).

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use ethereum_types::Address;
use rb_crypto::{address_from_secret_key, public_key_to_uncompressed_bytes};
use secp256k1::{PublicKey, SecretKey, SECP256K1};

pub mod errors;
pub mod deterministic;

pub use errors::KeystoreError;

/// A single custodied key. Private material never leaves the process this
/// keystore lives in — it is only ever passed to the crypto layer to sign.
#[derive(Clone)]
pub struct Key {
    pub id: String,
    pub name: String,
    pub address: Address,
    pub secret_key: SecretKey,
    pub public_key: [u8; 65],
    pub created_at: DateTime<Utc>,
}

impl Key {
    pub fn new(id: impl Into<String>, name: impl Into<String>, secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(SECP256K1, &secret_key);
        Self {
            id: id.into(),
            name: name.into(),
            address: address_from_secret_key(&secret_key),
            secret_key,
            public_key: public_key_to_uncompressed_bytes(&public_key),
            created_at: Utc::now(),
        }
    }
}

#[derive(Default)]
struct Inner {
    by_address: HashMap<Address, Key>,
}

pub struct Keystore {
    inner: RwLock<Inner>,
}

impl Default for Keystore {
    fn default() -> Self {
        Self::new()
    }
}

impl Keystore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn add(&self, key: Key) -> Result<(), KeystoreError> {
        let mut inner = self.inner.write().expect("keystore lock poisoned");
        if inner.by_address.contains_key(&key.address) {
            return Err(KeystoreError::Conflict(key.address));
        }
        inner.by_address.insert(key.address, key);
        Ok(())
    }

    pub fn get_by_address(&self, address: Address) -> Result<Key, KeystoreError> {
        let inner = self.inner.read().expect("keystore lock poisoned");
        inner
            .by_address
            .get(&address)
            .cloned()
            .ok_or(KeystoreError::NotFound(format!("{address:#x}")))
    }

    /// Linear scan over the keystore; acceptable because N stays in the low
    /// hundreds (operator-managed signer keys, not a general key database).
    pub fn get_by_id(&self, id: &str) -> Result<Key, KeystoreError> {
        let inner = self.inner.read().expect("keystore lock poisoned");
        inner
            .by_address
            .values()
            .find(|key| key.id == id)
            .cloned()
            .ok_or_else(|| KeystoreError::NotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<Key> {
        let inner = self.inner.read().expect("keystore lock poisoned");
        inner.by_address.values().cloned().collect()
    }

    pub fn delete(&self, address: Address) -> Result<(), KeystoreError> {
        let mut inner = self.inner.write().expect("keystore lock poisoned");
        inner
            .by_address
            .remove(&address)
            .map(|_| ())
            .ok_or(KeystoreError::NotFound(format!("{address:#x}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rb_crypto::generate_secret_key;

    fn sample_key() -> Key {
        Key::new("k1", "test key", generate_secret_key())
    }

    #[test]
    fn add_then_get_round_trips() {
        let ks = Keystore::new();
        let key = sample_key();
        let address = key.address;
        ks.add(key).unwrap();
        assert_eq!(ks.get_by_address(address).unwrap().address, address);
        assert_eq!(ks.get_by_id("k1").unwrap().address, address);
    }

    #[test]
    fn add_duplicate_address_conflicts() {
        let ks = Keystore::new();
        let key = sample_key();
        let dup = Key {
            id: "k2".to_string(),
            ..key.clone()
        };
        ks.add(key).unwrap();
        assert!(matches!(ks.add(dup), Err(KeystoreError::Conflict(_))));
    }

    #[test]
    fn delete_missing_is_not_found() {
        let ks = Keystore::new();
        assert!(matches!(
            ks.delete(Address::zero()),
            Err(KeystoreError::NotFound(_))
        ));
    }

    #[test]
    fn list_is_a_snapshot() {
        let ks = Keystore::new();
        ks.add(sample_key()).unwrap();
        assert_eq!(ks.list().len(), 1);
    }
}
