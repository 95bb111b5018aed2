//! The persistence boundary (§4.8): a pure `Repository` interface plus the
//! data model it serves, and an in-memory implementation for tests and the
//! local devnet orchestrator.

pub mod errors;
pub mod in_memory;
#[path = "./trait.rs"]
pub mod r#trait;
pub mod types;

pub use errors::RepositoryError;
pub use in_memory::InMemoryRepository;
pub use r#trait::Repository;
pub use types::{
    Artifact, ConfigValidationError, Deployment, DeploymentConfig, DeploymentStatus, InfrastructureRecord,
    RecordedTransaction, Stage, RESERVED_L1_CHAIN_IDS,
};
