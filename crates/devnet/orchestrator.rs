//! Ties the ephemeral L1 node, the direct-signing adapter and the shared
//! deployment orchestrator together into one local devnet run (§4.14).

use std::path::PathBuf;
use std::sync::Arc;

use rb_deployer::{L1Client, Orchestrator, ProgressCallback, TransactionSigner};
use rb_keystore::{deterministic::load_deterministic_keys, Keystore};
use rb_repository::{Artifact, Repository};
use tokio_util::sync::CancellationToken;

use crate::errors::DevnetError;
use crate::ipc_client::IpcL1Client;
use crate::node::{L1NodeConfig, L1NodeHandle};
use crate::signer::DirectSigner;

pub const L1_STATE_DUMP_ARTIFACT: &str = "l1_state_dump";

/// Runs one deployment end-to-end against a freshly spawned L1 node, in its
/// own working directory under `bundles_root`.
pub struct DevnetOrchestrator {
    repository: Arc<dyn Repository>,
    bundles_root: PathBuf,
}

impl DevnetOrchestrator {
    pub fn new(repository: Arc<dyn Repository>, bundles_root: PathBuf) -> Self {
        Self { repository, bundles_root }
    }

    pub async fn run(
        &self,
        deployment_id: &str,
        chain_id: u64,
        on_progress: &ProgressCallback,
        cancel: &CancellationToken,
    ) -> Result<(), DevnetError> {
        let working_dir = self.bundles_root.join(deployment_id);

        let keystore = Arc::new(Keystore::new());
        load_deterministic_keys(&keystore, chain_id)?;

        let mut node = L1NodeHandle::spawn(L1NodeConfig::new(working_dir, chain_id)).await?;

        let l1: Arc<dyn L1Client> = Arc::new(IpcL1Client::new(node.ipc_socket_path().to_path_buf()));
        let signer: Arc<dyn TransactionSigner> = Arc::new(DirectSigner::new(keystore));
        let orchestrator = Orchestrator::new(self.repository.clone(), l1, signer);

        let deploy_result = orchestrator.deploy(deployment_id, on_progress, cancel).await;
        node.shutdown().await?;
        let state_dump_result = node.dump_state().await;

        deploy_result?;
        let state_dump = state_dump_result?;
        self.repository.put_artifact(Artifact::new(deployment_id, L1_STATE_DUMP_ARTIFACT, state_dump)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use rb_repository::InMemoryRepository;
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn refuses_to_run_against_a_known_production_chain_id() {
        let repo = Arc::new(InMemoryRepository::new());
        let orchestrator = DevnetOrchestrator::new(repo, tempdir().unwrap().path().to_path_buf());
        let on_progress: ProgressCallback = Box::new(|_, _, _| {});
        let err = orchestrator.run("d1", 1, &on_progress, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, DevnetError::Keystore(_)));
    }

    #[tokio::test]
    async fn surfaces_spawn_failure_for_a_nonexistent_node_binary() {
        let repo = Arc::new(InMemoryRepository::new());
        let orchestrator = DevnetOrchestrator::new(repo, tempdir().unwrap().path().to_path_buf());
        let on_progress: ProgressCallback = Box::new(|_, _, _| {});
        // The default node binary ("anvil") is not guaranteed to be on PATH
        // in every environment this crate builds in; either a spawn error or
        // a startup timeout is an acceptable outcome of this guard test.
        let err = orchestrator.run("d2", 31337, &on_progress, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, DevnetError::Spawn(_) | DevnetError::NodeStartupTimeout | DevnetError::Io(_)));
    }
}
