use thiserror::Error;

/// Crate-level errors for configuration and input validation
///
/// Lifecycle operations carry their own error types
/// ([`ReportError`](crate::ReportError), [`RunError`](crate::RunError),
/// [`StateDataError`](crate::StateDataError)); this type covers everything
/// around them.
#[derive(Debug, Error)]
pub enum TaskKitError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TaskKitError>;
