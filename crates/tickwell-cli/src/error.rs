use thiserror::Error;
use tickwell_core::{CacheError, CoreError, ServiceError, StoreError, ValidationError};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Service(ServiceError::Validation(_)) => 2,
            Self::Store(StoreError::NotFound(_)) => 2,
            Self::Service(ServiceError::Store(StoreError::NotFound(_))) => 2,
            Self::Service(ServiceError::RateNotFound { .. }) => 2,
            Self::Service(_) => 3,
            Self::Serialization(_) => 4,
            Self::Core(_) | Self::Store(_) | Self::Cache(_) => 5,
            Self::Io(_) => 10,
        }
    }
}
