//! Errors surfaced by the platform facade

use crate::api::ApiError;
use crate::augment::AugmentError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] ApiError),

    #[error("Augmentation error: {0}")]
    Augmentation(#[from] AugmentError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlatformError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        PlatformError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        PlatformError::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound { .. })
    }
}

impl From<StoreError> for PlatformError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => PlatformError::NotFound { kind, id },
            other => PlatformError::Store(other),
        }
    }
}
