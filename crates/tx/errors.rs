#[derive(Debug, thiserror::Error)]
pub enum TxError {
    #[error("invalid transaction input: {0}")]
    InvalidInput(String),
    #[error("failed to decode transaction: {0}")]
    DecodeError(String),
    #[error(transparent)]
    Crypto(#[from] rb_crypto::CryptoError),
}
