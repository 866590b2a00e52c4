//! Mission operation errors.

use wyrmhold_domain::{DomainError, MissionCategory, MissionId};

use crate::infrastructure::ports::{RepoError, RetryableError};
use crate::use_cases::reward::RewardError;

#[derive(Debug, thiserror::Error)]
pub enum MissionError {
    /// Unknown to master data, or not unlocked for the player.
    #[error("Mission not found: {0}")]
    NotFound(MissionId),
    #[error("No {category} missions in group {group_id}")]
    GroupNotFound {
        category: MissionCategory,
        group_id: i32,
    },
    /// The mission is not in a state that allows the operation.
    #[error("Invalid mission state: {0}")]
    InvalidState(String),
    #[error("Reward error: {0}")]
    Reward(#[from] RewardError),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl From<DomainError> for MissionError {
    fn from(e: DomainError) -> Self {
        Self::InvalidState(e.to_string())
    }
}

impl RetryableError for MissionError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Repo(e) => e.is_retryable(),
            Self::Reward(e) => e.is_retryable(),
            _ => false,
        }
    }
}
