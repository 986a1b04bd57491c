use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("item already exists: {0}")]
    AlreadyExists(String),
    #[error("item mapping failed: {0}")]
    Serde(#[from] serde_dynamo::Error),
    #[error("{0}")]
    Sdk(BoxError),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("connection gone: {0}")]
    Gone(String),
    #[error("message encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{0}")]
    Sdk(BoxError),
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("staged object not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Sdk(BoxError),
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("{0}")]
    Sdk(BoxError),
}

/// Workflow-level error, folding the per-collaborator failures together.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invoice transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("malformed event: {0}")]
    MalformedEvent(String),
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed item image: {0}")]
    Image(#[from] serde_dynamo::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Staging(#[from] StagingError),
    #[error(transparent)]
    Audit(#[from] AuditError),
}
