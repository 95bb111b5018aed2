#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("deployment not found: {0}")]
    DeploymentNotFound(String),
    #[error("infrastructure record not found for chain {0} version {1}")]
    InfrastructureNotFound(u64, String),
    #[error("duplicate transaction hash: {0}")]
    DuplicateTransaction(String),
    #[error("infrastructure version mismatch: record is {actual}, caller required {required}")]
    VersionMismatch { actual: String, required: String },
    #[error("invalid stage transition: {0}")]
    InvalidTransition(String),
}
