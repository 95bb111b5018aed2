#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("signing failed: {0}")]
    SigningFailed(String),
}
