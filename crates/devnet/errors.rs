use rb_deployer::DeployerError;
use rb_keystore::KeystoreError;
use rb_repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum DevnetError {
    #[error("l1 node did not expose its ipc socket within the startup timeout")]
    NodeStartupTimeout,
    #[error("failed to spawn l1 node: {0}")]
    Spawn(std::io::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Deployer(#[from] DeployerError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Keystore(#[from] KeystoreError),
}
