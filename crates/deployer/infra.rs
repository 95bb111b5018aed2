//! Infrastructure manager (§4.11): gets and saves shared-contract addresses
//! reused across deployments on the same parent chain, keyed by (chain ID,
//! artifact version). Upgrade isolation is enforced one layer down, by
//! `Repository::get_infrastructure` refusing a version mismatch.

use std::sync::Arc;

use rb_repository::{DeploymentConfig, InfrastructureRecord, Repository, RepositoryError};

pub struct InfrastructureManager {
    repository: Arc<dyn Repository>,
}

impl InfrastructureManager {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Fetches the shared-contract addresses for `l1_chain_id` at exactly
    /// `artifact_version`, or `None` if nothing has been saved yet.
    pub async fn get(&self, l1_chain_id: u64, artifact_version: &str) -> Result<Option<InfrastructureRecord>, RepositoryError> {
        self.repository.get_infrastructure(l1_chain_id, artifact_version).await
    }

    /// Populates `config.existing_shared_addresses` from a saved record, if
    /// `config.reuse_infrastructure` is set and one exists for the matching
    /// version. Leaves the config untouched otherwise.
    pub async fn populate(
        &self,
        config: &mut DeploymentConfig,
        l1_chain_id: u64,
        artifact_version: &str,
    ) -> Result<(), RepositoryError> {
        if !config.reuse_infrastructure {
            return Ok(());
        }
        if let Some(record) = self.get(l1_chain_id, artifact_version).await? {
            config.existing_shared_addresses = Some(record.shared_addresses);
        }
        Ok(())
    }

    pub async fn save(
        &self,
        l1_chain_id: u64,
        artifact_version: String,
        deployment_salt: String,
        shared_addresses: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), RepositoryError> {
        self.repository
            .save_infrastructure(InfrastructureRecord { l1_chain_id, artifact_version, deployment_salt, shared_addresses })
            .await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rb_repository::InMemoryRepository;
    use serde_json::json;

    fn sample_config() -> DeploymentConfig {
        DeploymentConfig {
            chain_id: 42,
            chain_name: "test-chain".to_string(),
            parent_chain_id: 11155111,
            parent_chain_rpc: "http://localhost:8545".to_string(),
            signer_endpoint: "http://localhost:8551".to_string(),
            signer_api_key: None,
            deployer_address: Default::default(),
            batcher_address: None,
            proposer_address: None,
            sequencer_address: None,
            challenger_address: None,
            block_time_seconds: 2,
            sequencer_drift_seconds: 600,
            sequencer_window_blocks: 3600,
            gas_limit: 30_000_000,
            da_namespace: None,
            reuse_infrastructure: true,
            existing_shared_addresses: None,
        }
    }

    #[tokio::test]
    async fn populate_skips_when_reuse_disabled() {
        let manager = InfrastructureManager::new(Arc::new(InMemoryRepository::new()));
        let mut config = sample_config();
        config.reuse_infrastructure = false;
        manager.populate(&mut config, 11155111, "v1.0.0").await.unwrap();
        assert!(config.existing_shared_addresses.is_none());
    }

    #[tokio::test]
    async fn populate_fills_in_saved_addresses() {
        let repo = Arc::new(InMemoryRepository::new());
        let manager = InfrastructureManager::new(repo.clone());
        let mut addresses = serde_json::Map::new();
        addresses.insert("SuperchainConfig".to_string(), json!("0x1111111111111111111111111111111111111111"));
        manager.save(11155111, "v1.0.0".to_string(), "0xsalt".to_string(), addresses.clone()).await.unwrap();

        let mut config = sample_config();
        manager.populate(&mut config, 11155111, "v1.0.0").await.unwrap();
        assert_eq!(config.existing_shared_addresses, Some(addresses));
    }
}
