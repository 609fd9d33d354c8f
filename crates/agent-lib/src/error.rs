//! Error types shared across the relevancy agent

use thiserror::Error;

/// Errors reported by a file access store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket does not exist for container {0}")]
    BucketNotFound(String),

    #[error("file store database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("file store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_bucket_not_found(&self) -> bool {
        matches!(self, StoreError::BucketNotFound(_))
    }
}

/// Errors reported by the SBOM collaborator
#[derive(Debug, Error)]
pub enum SbomError {
    /// The filtered inventory is already stored under this key
    #[error("filtered SBOM already exists: {0}")]
    AlreadyExists(String),

    /// The inventory can never be filtered for this container
    #[error("SBOM is incomplete: {0}")]
    Incomplete(String),

    #[error("SBOM not found: {0}")]
    NotFound(String),

    #[error("SBOM I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SBOM serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl SbomError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, SbomError::AlreadyExists(_))
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, SbomError::Incomplete(_))
    }
}

/// Errors reported by the Kubernetes collaborator
#[derive(Debug, Error)]
pub enum K8sError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("invalid workload identity: {0}")]
    InvalidIdentity(String),

    #[error("kubernetes API error: {0}")]
    Api(String),
}

/// Why inventory acquisition failed for one monitoring cycle
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("failed to resolve workload: {0}")]
    Workload(#[from] K8sError),

    /// Image or identity could not be determined, e.g. for init containers
    #[error("container identity is incomplete")]
    IncompleteIdentity,

    #[error("failed to fetch SBOM: {0}")]
    Sbom(#[from] SbomError),
}

/// Reasons a container monitor loop stops before its deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MonitorExit {
    #[error("container terminated")]
    Terminated,

    #[error("incomplete SBOM")]
    SbomIncomplete,

    #[error("agent shutting down")]
    Shutdown,
}

impl MonitorExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorExit::Terminated => "terminated",
            MonitorExit::SbomIncomplete => "sbom_incomplete",
            MonitorExit::Shutdown => "shutdown",
        }
    }
}
