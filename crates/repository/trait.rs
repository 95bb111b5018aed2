//! The repository boundary (§4.8, §9 "Abstract storage"). A pure interface;
//! persistence engines are out of scope. Modeled as an `async_trait` so it
//! stays object-safe (`dyn Repository`) for callers that hold it behind an
//! `Arc`.

use chrono::{DateTime, Utc};

use crate::errors::RepositoryError;
use crate::types::{Artifact, Deployment, DeploymentStatus, InfrastructureRecord, RecordedTransaction, Stage};

#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    async fn create_deployment(&self, deployment: Deployment) -> Result<(), RepositoryError>;
    async fn get_deployment(&self, id: &str) -> Result<Deployment, RepositoryError>;
    async fn update_deployment(&self, deployment: Deployment) -> Result<(), RepositoryError>;

    async fn list_by_status(&self, status: DeploymentStatus) -> Result<Vec<Deployment>, RepositoryError>;
    async fn list_by_org(&self, org: &str) -> Result<Vec<Deployment>, RepositoryError>;
    async fn list_by_status_and_org(
        &self,
        status: DeploymentStatus,
        org: &str,
    ) -> Result<Vec<Deployment>, RepositoryError>;

    /// Transitions `deployment_id` to `status`/`stage`, clearing any prior
    /// error message. `stage` is left unchanged when `None`.
    async fn update_status(
        &self,
        deployment_id: &str,
        status: DeploymentStatus,
        stage: Option<Stage>,
    ) -> Result<(), RepositoryError>;

    async fn set_error(&self, deployment_id: &str, message: &str) -> Result<(), RepositoryError>;
    async fn clear_error(&self, deployment_id: &str) -> Result<(), RepositoryError>;

    /// No-op (not an error) if `transaction.hash` was already recorded —
    /// this is what makes replaying a stage idempotent.
    async fn record_transaction(&self, transaction: RecordedTransaction) -> Result<(), RepositoryError>;
    async fn list_transactions(&self, deployment_id: &str) -> Result<Vec<RecordedTransaction>, RepositoryError>;

    /// Upserts keyed by (deployment_id, artifact_type); implementations may
    /// additionally retain history under the same key.
    async fn put_artifact(&self, artifact: Artifact) -> Result<(), RepositoryError>;
    async fn get_artifact(&self, deployment_id: &str, artifact_type: &str) -> Result<Artifact, RepositoryError>;
    async fn list_artifacts(&self, deployment_id: &str) -> Result<Vec<Artifact>, RepositoryError>;

    /// Upserts by (l1_chain_id, artifact_version); refuses to expose a
    /// record whose version does not equal `required_version` (§4.11
    /// upgrade isolation) — callers asking for a specific version that
    /// exists under a different version get `VersionMismatch`, not `None`.
    async fn get_infrastructure(
        &self,
        l1_chain_id: u64,
        required_version: &str,
    ) -> Result<Option<InfrastructureRecord>, RepositoryError>;
    async fn save_infrastructure(&self, record: InfrastructureRecord) -> Result<(), RepositoryError>;

    /// Marks every deployment in {pending, running} whose `updated_at` is
    /// older than `older_than` as `failed`, returning the affected IDs.
    async fn mark_stale_failed(&self, older_than: DateTime<Utc>) -> Result<Vec<String>, RepositoryError>;
}
