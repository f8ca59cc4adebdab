//! Runner error types.

use domain::DomainError;
use engine::EngineError;
use projections::ProjectionError;
use thiserror::Error;

/// Errors that stop a scenario run.
///
/// Engine rejections of individual steps are not errors here; they are
/// recorded in the run summary and the replay continues.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid scenario: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid engine configuration: {0}")]
    Config(#[from] DomainError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// A step names a site, product, employee or order that was never declared.
    #[error("Unknown {kind} '{alias}'")]
    UnknownAlias { kind: &'static str, alias: String },

    #[error("Alias '{0}' is declared twice")]
    DuplicateAlias(String),

    #[error("Metrics recorder error: {0}")]
    Metrics(String),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
