//! The deployment FSM writer (§4.9): the only thing allowed to mutate a
//! deployment's status/stage/error fields. Every mutation goes through one
//! of these methods so the allowed-transition table in §4.9 is enforced in
//! one place.

use std::sync::Arc;

use rb_repository::{Deployment, DeploymentStatus, RecordedTransaction, Repository, RepositoryError, Stage};

use crate::errors::DeployerError;

const STATE_ARTIFACT_TYPE: &str = "deployment_state";

pub struct DeploymentStateWriter {
    repository: Arc<dyn Repository>,
    deployment_id: String,
}

impl DeploymentStateWriter {
    pub fn new(repository: Arc<dyn Repository>, deployment_id: impl Into<String>) -> Self {
        Self { repository, deployment_id: deployment_id.into() }
    }

    pub async fn deployment(&self) -> Result<Deployment, RepositoryError> {
        self.repository.get_deployment(&self.deployment_id).await
    }

    pub async fn can_resume(&self) -> Result<bool, RepositoryError> {
        Ok(self.deployment().await?.can_resume())
    }

    pub async fn is_stage_complete(&self, stage: Stage) -> Result<bool, RepositoryError> {
        Ok(self.deployment().await?.is_stage_complete(stage))
    }

    /// Sets status to `running` and advances the current stage. Must be
    /// called before a stage executes so partial progress is recoverable
    /// (§4.10 invariant (a)).
    pub async fn update_stage(&self, stage: Stage) -> Result<(), RepositoryError> {
        self.repository.update_status(&self.deployment_id, DeploymentStatus::Running, Some(stage)).await
    }

    /// Requires evidence of on-chain activity; use `mark_simulated` when no
    /// transaction was ever broadcast.
    pub async fn mark_complete(&self) -> Result<(), DeployerError> {
        let has_transactions = !self.repository.list_transactions(&self.deployment_id).await?.is_empty();
        if !has_transactions {
            return Err(DeployerError::StageFailed {
                stage: "completed".to_string(),
                message: "mark_complete requires at least one recorded transaction; use mark_simulated".to_string(),
            });
        }
        self.repository.update_status(&self.deployment_id, DeploymentStatus::Completed, Some(Stage::Completed)).await?;
        Ok(())
    }

    pub async fn mark_simulated(&self) -> Result<(), RepositoryError> {
        self.repository.update_status(&self.deployment_id, DeploymentStatus::Simulated, Some(Stage::Completed)).await
    }

    pub async fn mark_failed(&self, message: &str) -> Result<(), RepositoryError> {
        self.repository.update_status(&self.deployment_id, DeploymentStatus::Failed, None).await?;
        self.repository.set_error(&self.deployment_id, message).await
    }

    pub async fn mark_paused(&self) -> Result<(), RepositoryError> {
        self.repository.update_status(&self.deployment_id, DeploymentStatus::Paused, None).await
    }

    pub async fn record_transaction(&self, stage: Stage, hash: String, description: impl Into<String>) -> Result<(), RepositoryError> {
        self.repository
            .record_transaction(RecordedTransaction {
                deployment_id: self.deployment_id.clone(),
                stage,
                hash,
                description: description.into(),
                created_at: chrono::Utc::now(),
            })
            .await
    }

    /// Persists an opaque JSON blob as a `deployment_state` artifact.
    pub async fn write_state(&self, state: &serde_json::Value) -> Result<(), RepositoryError> {
        let content = serde_json::to_vec(state).unwrap_or_default();
        self.repository
            .put_artifact(rb_repository::Artifact::new(self.deployment_id.clone(), STATE_ARTIFACT_TYPE, content))
            .await
    }

    pub async fn read_state(&self) -> Result<Option<serde_json::Value>, RepositoryError> {
        match self.repository.get_artifact(&self.deployment_id, STATE_ARTIFACT_TYPE).await {
            Ok(artifact) => Ok(serde_json::from_slice(&artifact.content).ok()),
            Err(RepositoryError::DeploymentNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rb_repository::InMemoryRepository;
    use serde_json::json;

    async fn setup() -> (Arc<InMemoryRepository>, DeploymentStateWriter) {
        let repo = Arc::new(InMemoryRepository::new());
        repo.create_deployment(Deployment::new("d1", None, json!({}))).await.unwrap();
        let writer = DeploymentStateWriter::new(repo.clone(), "d1");
        (repo, writer)
    }

    #[tokio::test]
    async fn update_stage_sets_running() {
        let (repo, writer) = setup().await;
        writer.update_stage(Stage::DeploySuperchain).await.unwrap();
        let deployment = repo.get_deployment("d1").await.unwrap();
        assert_eq!(deployment.status, DeploymentStatus::Running);
        assert_eq!(deployment.stage, Some(Stage::DeploySuperchain));
    }

    #[tokio::test]
    async fn mark_complete_without_transactions_fails() {
        let (_repo, writer) = setup().await;
        assert!(writer.mark_complete().await.is_err());
    }

    #[tokio::test]
    async fn mark_complete_with_transaction_succeeds() {
        let (_repo, writer) = setup().await;
        writer.record_transaction(Stage::Init, "0xabc".to_string(), "preflight snapshot").await.unwrap();
        writer.mark_complete().await.unwrap();
        assert_eq!(writer.deployment().await.unwrap().status, DeploymentStatus::Completed);
    }

    #[tokio::test]
    async fn write_state_then_read_state_round_trips() {
        let (_repo, writer) = setup().await;
        let state = json!({"nonce": 4});
        writer.write_state(&state).await.unwrap();
        assert_eq!(writer.read_state().await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn is_stage_complete_is_strict() {
        let (_repo, writer) = setup().await;
        writer.update_stage(Stage::DeployOpchain).await.unwrap();
        assert!(writer.is_stage_complete(Stage::DeploySuperchain).await.unwrap());
        assert!(!writer.is_stage_complete(Stage::DeployOpchain).await.unwrap());
        assert!(!writer.is_stage_complete(Stage::DeployAltDa).await.unwrap());
    }
}
