#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("archive integrity check failed: expected sha256 {expected}, got {actual}")]
    IntegrityError { expected: String, actual: String },
    #[error("unsafe archive entry: {0} escapes destination root")]
    PathTraversal(String),
    #[error("required artifact {0} is missing")]
    MissingRequired(String),
    #[error(transparent)]
    Repository(#[from] rb_repository::RepositoryError),
    #[error("bundle name sanitizes to empty, and no default was supplied")]
    EmptyBundleName,
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
