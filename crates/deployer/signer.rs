//! The seam between the orchestrator and however a transaction actually
//! gets signed. Production deployments sign over HTTP against the remote
//! Signer (`RemoteSigner`); the local devnet orchestrator signs directly
//! against a pre-loaded keystore instead (`rb-devnet`'s `DirectSigner`).

use ethereum_types::Address;
use rb_signing_client::SigningClient;
use rb_tx::TransactionRequest;
use tokio_util::sync::CancellationToken;

use crate::errors::DeployerError;

#[async_trait::async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign(
        &self,
        from: Address,
        chain_id: u64,
        request: &TransactionRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, DeployerError>;
}

/// Signs over HTTP against the remote Signer service.
pub struct RemoteSigner(pub SigningClient);

#[async_trait::async_trait]
impl TransactionSigner for RemoteSigner {
    async fn sign(
        &self,
        from: Address,
        chain_id: u64,
        request: &TransactionRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, DeployerError> {
        Ok(self.0.sign(from, chain_id, request, cancel).await?)
    }
}
