//! Signs transactions directly against a pre-loaded keystore instead of
//! going out over HTTP to the remote signer (§4.14) — the local devnet
//! orchestrator has no remote signer to talk to.

use std::sync::Arc;

use ethereum_types::Address;
use rb_deployer::{DeployerError, TransactionSigner};
use rb_keystore::Keystore;
use rb_tx::{sign_transaction, TransactionRequest};
use tokio_util::sync::CancellationToken;

pub struct DirectSigner {
    keystore: Arc<Keystore>,
}

impl DirectSigner {
    pub fn new(keystore: Arc<Keystore>) -> Self {
        Self { keystore }
    }
}

#[async_trait::async_trait]
impl TransactionSigner for DirectSigner {
    async fn sign(
        &self,
        from: Address,
        chain_id: u64,
        request: &TransactionRequest,
        _cancel: &CancellationToken,
    ) -> Result<Vec<u8>, DeployerError> {
        let key = self
            .keystore
            .get_by_address(from)
            .map_err(|err| DeployerError::StageFailed { stage: "sign".to_string(), message: err.to_string() })?;
        sign_transaction(request, &key.secret_key, chain_id)
            .map_err(|err| DeployerError::StageFailed { stage: "sign".to_string(), message: err.to_string() })
    }
}
