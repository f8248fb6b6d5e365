//! Error types for the approval layer

use crate::{RequestId, UserId};

/// Kind of entity a lookup failed for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Request,
    Resource,
    Workflow,
    Institution,
    User,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Request => "Approval request",
            EntityKind::Resource => "Resource",
            EntityKind::Workflow => "Workflow",
            EntityKind::Institution => "Institution",
            EntityKind::User => "User",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in approval operations
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalError {
    #[error("Actor {actor} is not authorized: {reason}")]
    NotAuthorized { actor: UserId, reason: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("Request {request} was modified concurrently (expected version {expected}, found {found})")]
    ConcurrentModification {
        request: RequestId,
        expected: u64,
        found: u64,
    },

    #[error("Bulk batch of {requested} items exceeds the limit of {limit}")]
    BatchTooLarge { requested: usize, limit: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApprovalError {
    pub fn not_found(kind: EntityKind, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn not_authorized(actor: &UserId, reason: impl Into<String>) -> Self {
        Self::NotAuthorized {
            actor: actor.clone(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code, used in bulk reports and by transport
    /// layers that map errors to status codes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAuthorized { .. } => "not_authorized",
            Self::InvalidState(_) => "invalid_state",
            Self::NotFound { .. } => "not_found",
            Self::DataIntegrity(_) => "data_integrity",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::BatchTooLarge { .. } => "batch_too_large",
            Self::InvalidInput(_) => "invalid_input",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
        }
    }
}

/// Result type alias for approval operations
pub type ApprovalResult<T> = Result<T, ApprovalError>;
