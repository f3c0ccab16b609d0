//! Shared error model for pure, deterministic failures.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failure that any crate can surface without knowing the concrete parser.
///
/// Transport and storage concerns belong in `tenantry-infra`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier (tenant slug, principal) failed to parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A policy value failed validation (e.g. malformed flag key).
    #[error("validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
