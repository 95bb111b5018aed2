//! The ten deterministic dev keys derived from the well-known
//! `test test test test test test test test test test test junk` mnemonic
//! (the default Anvil/Hardhat accounts), and the guard that keeps them off
//! production networks.

use secp256k1::SecretKey;
use tracing::warn;

use crate::{errors::KeystoreError, Key, Keystore};

/// Private keys for Anvil/Hardhat's default accounts 0 through 9.
const DETERMINISTIC_PRIVATE_KEYS: [&str; 10] = [
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "4fe06bc466e549d5af1a465d6f1b18fd4397ef18936a3f356d16d1c483df1fb1",
    "747145664225b4f21ed16d5b52e7688fdd168f049cdd08a958315a9617be3c8d",
    "de34351ee40e8eb18c661e8bba1482e65d3983c983a7fa03dda6fc532c599b75",
    "620ee5986de00ae2771865b555fde8f3b81e87ce2d22eb7e140a725217e8a80b",
    "84c748f1596e1b404fb85a226f6cab7bca9ef4575359bf3ec8e6335123948dea",
    "6a6146e558b587d50f2de37b240b16c6bbe4fd77dc385db53b815b261d7f75c6",
    "3ab7b4bc02d31129abe56bdc4bfc4da721fff7985861024300821c313bca18e1",
    "ae083231f6c8d7445a2256abe3a0e712f7498a0bcca8f3e4f922f71f22245a30",
    "8fa662cfd56c90aa4a5773667a0fdd744b8b7499d5d2c68a5582707cddec36fd",
];

/// Chain IDs of known-live production L1 networks. Loading the deterministic
/// keys against any of these is refused — they would hold real funds.
const KNOWN_PRODUCTION_L1_CHAIN_IDS: &[(u64, &str)] = &[
    (1, "Ethereum Mainnet"),
    (10, "OP Mainnet"),
    (137, "Polygon"),
    (8453, "Base"),
    (42161, "Arbitrum One"),
];

fn production_network_name(chain_id: u64) -> Option<&'static str> {
    KNOWN_PRODUCTION_L1_CHAIN_IDS
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, name)| *name)
}

/// Loads the ten deterministic dev keys into `keystore`, refusing entirely
/// (before adding any key) if `chain_id` is a known production L1.
pub fn load_deterministic_keys(keystore: &Keystore, chain_id: u64) -> Result<(), KeystoreError> {
    if let Some(name) = production_network_name(chain_id) {
        return Err(KeystoreError::UnsafeNetwork(name.to_string()));
    }

    for (index, hex_key) in DETERMINISTIC_PRIVATE_KEYS.iter().enumerate() {
        let bytes = hex::decode(hex_key).expect("deterministic key is valid hex");
        let secret_key = SecretKey::from_slice(&bytes).expect("deterministic key is valid");
        let key = Key::new(format!("anvil-{index}"), format!("anvil account {index}"), secret_key);
        keystore.add(key)?;
    }
    warn!(chain_id, "loaded deterministic dev keys into signer keystore");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn refuses_on_production_chain_ids() {
        let ks = Keystore::new();
        let err = load_deterministic_keys(&ks, 1).unwrap_err();
        match err {
            KeystoreError::UnsafeNetwork(name) => assert!(name.contains("Ethereum Mainnet")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ks.list().is_empty());
    }

    #[test]
    fn loads_on_a_local_chain_id() {
        let ks = Keystore::new();
        load_deterministic_keys(&ks, 31337).unwrap();
        assert_eq!(ks.list().len(), 10);
    }

    #[test]
    fn first_deterministic_key_is_the_canonical_anvil_zero_address() {
        let ks = Keystore::new();
        load_deterministic_keys(&ks, 31337).unwrap();
        let key = ks.get_by_id("anvil-0").unwrap();
        assert_eq!(
            format!("{:#x}", key.address),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }
}
