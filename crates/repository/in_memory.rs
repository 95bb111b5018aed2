//! In-memory `Repository`, backed by a single `Mutex`-guarded map per
//! table, following the reference in-memory store's "one inner struct
//! behind one lock" shape. Used by tests and by the local devnet
//! orchestrator, which has no external database (§4.8, §4.14).

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::errors::RepositoryError;
use crate::r#trait::Repository;
use crate::types::{Artifact, Deployment, DeploymentStatus, InfrastructureRecord, RecordedTransaction, Stage};

#[derive(Default)]
struct Inner {
    deployments: HashMap<String, Deployment>,
    transactions: HashMap<String, Vec<RecordedTransaction>>,
    transaction_hashes: std::collections::HashSet<String>,
    artifacts: HashMap<(String, String), Artifact>,
    infrastructure: HashMap<(u64, String), InfrastructureRecord>,
}

#[derive(Default)]
pub struct InMemoryRepository {
    inner: Mutex<Inner>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("repository lock poisoned")
    }
}

#[async_trait::async_trait]
impl Repository for InMemoryRepository {
    async fn create_deployment(&self, deployment: Deployment) -> Result<(), RepositoryError> {
        self.lock().deployments.insert(deployment.id.clone(), deployment);
        Ok(())
    }

    async fn get_deployment(&self, id: &str) -> Result<Deployment, RepositoryError> {
        self.lock().deployments.get(id).cloned().ok_or_else(|| RepositoryError::DeploymentNotFound(id.to_string()))
    }

    async fn update_deployment(&self, mut deployment: Deployment) -> Result<(), RepositoryError> {
        deployment.updated_at = Utc::now();
        let mut inner = self.lock();
        if !inner.deployments.contains_key(&deployment.id) {
            return Err(RepositoryError::DeploymentNotFound(deployment.id));
        }
        inner.deployments.insert(deployment.id.clone(), deployment);
        Ok(())
    }

    async fn list_by_status(&self, status: DeploymentStatus) -> Result<Vec<Deployment>, RepositoryError> {
        Ok(self.lock().deployments.values().filter(|d| d.status == status).cloned().collect())
    }

    async fn list_by_org(&self, org: &str) -> Result<Vec<Deployment>, RepositoryError> {
        Ok(self.lock().deployments.values().filter(|d| d.org.as_deref() == Some(org)).cloned().collect())
    }

    async fn list_by_status_and_org(
        &self,
        status: DeploymentStatus,
        org: &str,
    ) -> Result<Vec<Deployment>, RepositoryError> {
        Ok(self
            .lock()
            .deployments
            .values()
            .filter(|d| d.status == status && d.org.as_deref() == Some(org))
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        deployment_id: &str,
        status: DeploymentStatus,
        stage: Option<Stage>,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        let deployment = inner
            .deployments
            .get_mut(deployment_id)
            .ok_or_else(|| RepositoryError::DeploymentNotFound(deployment_id.to_string()))?;
        deployment.status = status;
        if let Some(stage) = stage {
            deployment.stage = Some(stage);
        }
        deployment.error_message = None;
        deployment.updated_at = Utc::now();
        Ok(())
    }

    async fn set_error(&self, deployment_id: &str, message: &str) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        let deployment = inner
            .deployments
            .get_mut(deployment_id)
            .ok_or_else(|| RepositoryError::DeploymentNotFound(deployment_id.to_string()))?;
        deployment.error_message = Some(message.to_string());
        deployment.updated_at = Utc::now();
        Ok(())
    }

    async fn clear_error(&self, deployment_id: &str) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        let deployment = inner
            .deployments
            .get_mut(deployment_id)
            .ok_or_else(|| RepositoryError::DeploymentNotFound(deployment_id.to_string()))?;
        deployment.error_message = None;
        deployment.updated_at = Utc::now();
        Ok(())
    }

    async fn record_transaction(&self, transaction: RecordedTransaction) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        if !inner.transaction_hashes.insert(transaction.hash.clone()) {
            return Ok(());
        }
        inner.transactions.entry(transaction.deployment_id.clone()).or_default().push(transaction);
        Ok(())
    }

    async fn list_transactions(&self, deployment_id: &str) -> Result<Vec<RecordedTransaction>, RepositoryError> {
        Ok(self.lock().transactions.get(deployment_id).cloned().unwrap_or_default())
    }

    async fn put_artifact(&self, artifact: Artifact) -> Result<(), RepositoryError> {
        let key = (artifact.deployment_id.clone(), artifact.artifact_type.clone());
        self.lock().artifacts.insert(key, artifact);
        Ok(())
    }

    async fn get_artifact(&self, deployment_id: &str, artifact_type: &str) -> Result<Artifact, RepositoryError> {
        self.lock()
            .artifacts
            .get(&(deployment_id.to_string(), artifact_type.to_string()))
            .cloned()
            .ok_or_else(|| RepositoryError::DeploymentNotFound(format!("{deployment_id}/{artifact_type}")))
    }

    async fn list_artifacts(&self, deployment_id: &str) -> Result<Vec<Artifact>, RepositoryError> {
        Ok(self
            .lock()
            .artifacts
            .values()
            .filter(|artifact| artifact.deployment_id == deployment_id)
            .cloned()
            .collect())
    }

    async fn get_infrastructure(
        &self,
        l1_chain_id: u64,
        required_version: &str,
    ) -> Result<Option<InfrastructureRecord>, RepositoryError> {
        let inner = self.lock();
        match inner.infrastructure.iter().find(|((chain_id, _), _)| *chain_id == l1_chain_id) {
            None => Ok(None),
            Some(((_, version), record)) if version == required_version => Ok(Some(record.clone())),
            Some((_, record)) => {
                Err(RepositoryError::VersionMismatch { actual: record.artifact_version.clone(), required: required_version.to_string() })
            }
        }
    }

    async fn save_infrastructure(&self, record: InfrastructureRecord) -> Result<(), RepositoryError> {
        let key = (record.l1_chain_id, record.artifact_version.clone());
        self.lock().infrastructure.insert(key, record);
        Ok(())
    }

    async fn mark_stale_failed(&self, older_than: DateTime<Utc>) -> Result<Vec<String>, RepositoryError> {
        let mut inner = self.lock();
        let stale: Vec<String> = inner
            .deployments
            .values()
            .filter(|d| matches!(d.status, DeploymentStatus::Pending | DeploymentStatus::Running) && d.updated_at < older_than)
            .map(|d| d.id.clone())
            .collect();
        for id in &stale {
            if let Some(deployment) = inner.deployments.get_mut(id) {
                deployment.status = DeploymentStatus::Failed;
                deployment.error_message = Some("deployment marked failed: stale with no progress".to_string());
                deployment.updated_at = Utc::now();
            }
        }
        Ok(stale)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn sample_deployment(id: &str) -> Deployment {
        Deployment::new(id, Some("acme".to_string()), json!({}))
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let repo = InMemoryRepository::new();
        repo.create_deployment(sample_deployment("d1")).await.unwrap();
        let fetched = repo.get_deployment("d1").await.unwrap();
        assert_eq!(fetched.id, "d1");
    }

    #[tokio::test]
    async fn get_missing_deployment_errors() {
        let repo = InMemoryRepository::new();
        assert!(matches!(repo.get_deployment("missing").await, Err(RepositoryError::DeploymentNotFound(_))));
    }

    #[tokio::test]
    async fn update_status_clears_error_and_advances_stage() {
        let repo = InMemoryRepository::new();
        repo.create_deployment(sample_deployment("d1")).await.unwrap();
        repo.set_error("d1", "boom").await.unwrap();
        repo.update_status("d1", DeploymentStatus::Running, Some(Stage::DeployOpchain)).await.unwrap();
        let deployment = repo.get_deployment("d1").await.unwrap();
        assert_eq!(deployment.status, DeploymentStatus::Running);
        assert_eq!(deployment.stage, Some(Stage::DeployOpchain));
        assert!(deployment.error_message.is_none());
    }

    #[tokio::test]
    async fn record_transaction_is_idempotent_by_hash() {
        let repo = InMemoryRepository::new();
        repo.create_deployment(sample_deployment("d1")).await.unwrap();
        let tx = RecordedTransaction {
            deployment_id: "d1".to_string(),
            stage: Stage::DeploySuperchain,
            hash: "0xabc".to_string(),
            description: "deploy superchain config".to_string(),
            created_at: Utc::now(),
        };
        repo.record_transaction(tx.clone()).await.unwrap();
        repo.record_transaction(tx).await.unwrap();
        assert_eq!(repo.list_transactions("d1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn infrastructure_refuses_version_mismatch() {
        let repo = InMemoryRepository::new();
        repo.save_infrastructure(InfrastructureRecord {
            l1_chain_id: 11155111,
            artifact_version: "v1.0.0".to_string(),
            deployment_salt: "0x01".to_string(),
            shared_addresses: Default::default(),
        })
        .await
        .unwrap();
        assert!(matches!(
            repo.get_infrastructure(11155111, "v2.0.0").await,
            Err(RepositoryError::VersionMismatch { .. })
        ));
        assert!(repo.get_infrastructure(11155111, "v1.0.0").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn mark_stale_failed_only_touches_pending_and_running() {
        let repo = InMemoryRepository::new();
        let mut old = sample_deployment("old");
        old.updated_at = Utc::now() - chrono::Duration::hours(2);
        repo.create_deployment(old).await.unwrap();
        let mut completed = sample_deployment("done");
        completed.status = DeploymentStatus::Completed;
        completed.updated_at = Utc::now() - chrono::Duration::hours(2);
        repo.create_deployment(completed).await.unwrap();

        let stale = repo.mark_stale_failed(Utc::now() - chrono::Duration::hours(1)).await.unwrap();
        assert_eq!(stale, vec!["old".to_string()]);
        assert_eq!(repo.get_deployment("done").await.unwrap().status, DeploymentStatus::Completed);
    }
}
