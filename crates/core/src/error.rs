//! Errors raised by ids, pricing inputs and the order aggregate.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Why an order command or a request value was refused.
///
/// These never carry I/O failures. Repositories and the marketplace client
/// report through their own error types and are folded together with this
/// one at the workflow layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Bad request input: an empty phone, a rating outside 1..=5, a date in
    /// the wrong format.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The command is not allowed in the order's current status, such as
    /// editing a published order or completing a draft.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An id in a path or comma list did not parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The command targets an order that was never created.
    #[error("not found")]
    NotFound,

    /// The order snapshot is stale: it was saved by someone else since it was
    /// loaded, or a create hit an existing id.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
