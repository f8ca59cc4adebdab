//! Engine error types.

use common::{AssignmentId, EmployeeId, JobId, ProductId, PurchaseOrderId, SaleId, TransferId};
use domain::{CatalogError, DomainError, JobError};
use ledger::LedgerError;
use projections::ProjectionError;
use thiserror::Error;

/// How a failure should be handled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced record does not exist. Nothing was mutated.
    NotFound,
    /// The request was rejected before any mutation.
    PreconditionViolation,
    /// A durable write failed.
    PersistenceFailure,
    /// The record already exists. Callers at the chain edges treat this as a no-op.
    Duplicate,
}

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Employee not found: {0}")]
    EmployeeNotFound(EmployeeId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Assignment not found: {0}")]
    AssignmentNotFound(AssignmentId),

    #[error("Sale not found: {0}")]
    SaleNotFound(SaleId),

    #[error("Transfer not found: {0}")]
    TransferNotFound(TransferId),

    #[error("Purchase order not found: {0}")]
    PurchaseOrderNotFound(PurchaseOrderId),

    /// The worker already holds the maximum number of active assignments.
    #[error("Employee {employee_id} already holds {active} active assignment(s) (limit {limit})")]
    AssignmentLimit {
        employee_id: EmployeeId,
        active: usize,
        limit: usize,
    },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Already exists: {0}")]
    Duplicate(String),

    /// The backing store rejected a write or was unreachable.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::JobNotFound(_)
            | EngineError::EmployeeNotFound(_)
            | EngineError::ProductNotFound(_)
            | EngineError::AssignmentNotFound(_)
            | EngineError::SaleNotFound(_)
            | EngineError::TransferNotFound(_)
            | EngineError::PurchaseOrderNotFound(_) => ErrorKind::NotFound,
            EngineError::AssignmentLimit { .. }
            | EngineError::Precondition(_)
            | EngineError::Job(_)
            | EngineError::Catalog(_)
            | EngineError::Domain(_) => ErrorKind::PreconditionViolation,
            EngineError::Duplicate(_) => ErrorKind::Duplicate,
            EngineError::Persistence(_)
            | EngineError::Ledger(_)
            | EngineError::Serialization(_)
            | EngineError::Projection(_) => ErrorKind::PersistenceFailure,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_duplicate(&self) -> bool {
        self.kind() == ErrorKind::Duplicate
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        EngineError::Precondition(message.into())
    }
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;
