//! Reward operation errors.

use wyrmhold_domain::EntityKind;

use crate::infrastructure::ports::{RepoError, RetryableError};

/// Errors from granting or consuming entities.
///
/// Business outcomes (duplicates, caps, zero quantities) are reported as
/// `GrantOutcome`s, never as errors.
#[derive(Debug, thiserror::Error)]
pub enum RewardError {
    /// No handler is registered for the kind. A configuration defect.
    #[error("Unsupported entity kind: {0}")]
    UnsupportedEntityKind(EntityKind),
    #[error("{0} cannot be consumed")]
    ConsumptionUnsupported(EntityKind),
    #[error("Insufficient {kind} {id}: need {required}, have {available}")]
    InsufficientQuantity {
        kind: EntityKind,
        id: i32,
        required: u32,
        available: u64,
    },
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl RetryableError for RewardError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Repo(e) if e.is_retryable())
    }
}

/// Fatal handler-registry configuration errors, raised at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("More than one handler claims {0}")]
    DuplicateKind(EntityKind),
    #[error("No handler registered for {0}")]
    MissingHandler(EntityKind),
}
