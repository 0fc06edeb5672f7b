//! Control-plane error type.
//!
//! Business-rule failures travel as [`CoreError`]; every storage fault is
//! flattened into [`PipelineError::Storage`] at the boundary so no raw
//! driver error reaches callers.

use chartops_core::error::CoreError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Storage operation failed: {0}")]
    Storage(String),
}

/// Coarse category callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidOperation,
    Validation,
    Infrastructure,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(CoreError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Core(CoreError::InvalidOperation(_)) => ErrorKind::InvalidOperation,
            Self::Core(CoreError::Validation(_)) => ErrorKind::Validation,
            Self::Core(CoreError::Internal(_)) | Self::Storage(_) => ErrorKind::Infrastructure,
        }
    }

    /// Only infrastructure failures are worth retrying automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "Storage operation failed");
        Self::Storage(err.to_string())
    }
}
