//! Cascade errors.

use crate::infrastructure::ports::{RepoError, RetryableError};
use crate::use_cases::missions::MissionError;

/// A consumer failed; the cascade stopped at that consumer.
#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    #[error("Mission consumer failed: {0}")]
    Mission(#[from] MissionError),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl RetryableError for CascadeError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Mission(e) => e.is_retryable(),
            Self::Repo(e) => e.is_retryable(),
        }
    }
}

impl From<CascadeError> for MissionError {
    fn from(e: CascadeError) -> Self {
        match e {
            CascadeError::Mission(e) => e,
            CascadeError::Repo(e) => MissionError::Repo(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_stay_retryable_through_the_cascade() {
        let err = CascadeError::from(RepoError::conflict("set_tutorial_flag", "locked"));
        assert!(err.is_retryable());
        assert!(MissionError::from(err).is_retryable());

        let err = CascadeError::from(MissionError::InvalidState("claimed".into()));
        assert!(!err.is_retryable());
        assert!(matches!(MissionError::from(err), MissionError::InvalidState(_)));
    }
}
