//! Domain error types.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::job::JobError;
use crate::points::PointsConfigError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A job or assignment invariant was violated.
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Configuration failed validation.
    #[error("Points configuration error: {0}")]
    PointsConfig(#[from] PointsConfigError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DomainError>;
