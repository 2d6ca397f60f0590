use thiserror::Error;

use super::id::EntityId;

/// Domain errors for the classroom graph core.
///
/// Expected domain conditions are returned as values through this enum,
/// never panicked. Unexpected failures (storage I/O, conversion crashes,
/// programmer errors) travel in `Internal` and are re-surfaced unchanged
/// after a saga rollback.
#[derive(Error, Debug)]
pub enum DomainError {
    /// The entity or edge does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A required ownership/participation edge is missing.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The entity exists but is in the wrong state for this operation
    /// (expired or mismatched presigned url, already-revoked resource).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The authorization engine rejected the requested consumption.
    #[error("quota exceeded for policy {policy_id}: {attempted} > {max_consumption}")]
    QuotaExceeded {
        policy_id: EntityId,
        max_consumption: f64,
        attempted: f64,
    },

    /// An idempotency key was reused for a logical write-once.
    #[error("conflict: idempotency key '{0}' already used")]
    Conflict(String),

    /// Unexpected infrastructure failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DomainError {
    /// Whether this is an expected domain condition (as opposed to an
    /// infrastructure failure).
    pub fn is_domain(&self) -> bool {
        !matches!(self, DomainError::Internal(_))
    }
}
