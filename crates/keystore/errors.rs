use ethereum_types::Address;

#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    #[error("key already exists for address {0:#x}")]
    Conflict(Address),
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("refusing to load deterministic keys: signer is configured for {0}")]
    UnsafeNetwork(String),
}
