//! Transaction runner with exponential backoff retry.
//!
//! Runs a unit of work against one player's transaction and commits it. Write
//! conflicts re-run the whole unit from a fresh transaction; nothing of a
//! failed attempt is ever committed.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use rand::Rng;
use wyrmhold_domain::PlayerId;

use crate::infrastructure::ports::{PlayerTx, RepoError, RetryableError, UnitOfWork};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries, just the initial attempt)
    pub max_retries: u32,
    /// Base delay in milliseconds before first retry
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,
    /// Jitter factor (0.0-1.0) for randomizing delays
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 50,
            max_delay_ms: 1000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1), capped, ± jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exponential.min(self.max_delay_ms);

        let jitter_range = (capped as f64 * self.jitter_factor) as i64;
        let millis = if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped as i64 + jitter).max(0) as u64
        } else {
            capped
        };
        Duration::from_millis(millis)
    }
}

/// Runs units of work inside player transactions.
#[derive(Clone)]
pub struct TransactionRunner {
    store: Arc<dyn UnitOfWork>,
    config: RetryConfig,
}

impl TransactionRunner {
    pub fn new(store: Arc<dyn UnitOfWork>, config: RetryConfig) -> Self {
        Self { store, config }
    }

    /// Run `work` in a fresh transaction for `player` and commit it.
    ///
    /// `work` may be called more than once: retryable errors from the work itself
    /// or from the commit discard the transaction and start over. Any other error
    /// drops the transaction, rolling it back.
    ///
    /// # Arguments
    /// * `player` - Whose rows the transaction covers
    /// * `operation` - Name used in logs
    /// * `work` - The unit of work; must only touch state through the given transaction
    ///
    /// # Returns
    /// * `Ok(T)` - The work's result, after a successful commit
    /// * `Err(E)` - A non-retryable error, or the last retryable error once attempts run out
    pub async fn run<T, E, F>(
        &self,
        player: PlayerId,
        operation: &'static str,
        mut work: F,
    ) -> Result<T, E>
    where
        T: Send,
        E: From<RepoError> + RetryableError + std::fmt::Display + Send,
        F: for<'tx> FnMut(&'tx mut dyn PlayerTx) -> BoxFuture<'tx, Result<T, E>> + Send,
    {
        let mut attempt: u32 = 0;
        loop {
            match self.attempt(player, &mut work).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(
                            player_id = %player,
                            attempt = attempt + 1,
                            operation,
                            "Transaction committed after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.delay_for(attempt);
                    tracing::warn!(
                        player_id = %player,
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        operation,
                        "Transaction conflicted, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::error!(
                            player_id = %player,
                            attempts = attempt + 1,
                            error = %e,
                            operation,
                            "Transaction failed after all retry attempts"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn attempt<T, E, F>(&self, player: PlayerId, work: &mut F) -> Result<T, E>
    where
        E: From<RepoError>,
        F: for<'tx> FnMut(&'tx mut dyn PlayerTx) -> BoxFuture<'tx, Result<T, E>>,
    {
        let mut tx = self.store.begin(player).await?;
        let value = work(tx.as_mut()).await?;
        tx.commit().await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::InMemoryPlayerStore;
    use wyrmhold_domain::EntityKind;

    const PLAYER: PlayerId = PlayerId::new(7);

    fn runner(store: Arc<InMemoryPlayerStore>, max_retries: u32) -> TransactionRunner {
        TransactionRunner::new(
            store,
            RetryConfig {
                max_retries,
                base_delay_ms: 1,
                max_delay_ms: 5,
                jitter_factor: 0.0,
            },
        )
    }

    fn add_ticket(tx: &mut dyn PlayerTx) -> BoxFuture<'_, Result<u64, RepoError>> {
        Box::pin(async move { tx.increment_stack(EntityKind::SummonTicket, 10101, 1).await })
    }

    #[test]
    fn delay_grows_and_caps() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 10,
            max_delay_ms: 25,
            jitter_factor: 0.0,
        };
        assert_eq!(config.delay_for(1), Duration::from_millis(10));
        assert_eq!(config.delay_for(2), Duration::from_millis(20));
        assert_eq!(config.delay_for(3), Duration::from_millis(25));
    }

    #[tokio::test]
    async fn conflict_is_retried_then_committed_once() {
        let store = Arc::new(InMemoryPlayerStore::new());
        store.inject_conflicts(2);
        let runner = runner(store.clone(), 3);

        let balance = runner.run(PLAYER, "test", add_ticket).await.unwrap();
        assert_eq!(balance, 1);

        let mut tx = store.begin(PLAYER).await.unwrap();
        assert_eq!(tx.stack_quantity(EntityKind::SummonTicket, 10101).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn conflict_surfaces_after_retries_run_out() {
        let store = Arc::new(InMemoryPlayerStore::new());
        store.inject_conflicts(5);
        let runner = runner(store.clone(), 1);

        let err = runner.run(PLAYER, "test", add_ticket).await.unwrap_err();
        assert!(err.is_conflict());

        let mut tx = store.begin(PLAYER).await.unwrap();
        assert_eq!(tx.stack_quantity(EntityKind::SummonTicket, 10101).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failing_work_is_not_committed() {
        let store = Arc::new(InMemoryPlayerStore::new());
        let runner = runner(store.clone(), 3);

        let result: Result<(), RepoError> = runner
            .run(PLAYER, "test", |tx| {
                Box::pin(async move {
                    tx.increment_stack(EntityKind::Material, 1, 10).await?;
                    Err::<(), RepoError>(RepoError::constraint("boom"))
                })
            })
            .await;
        assert!(result.is_err());

        let mut tx = store.begin(PLAYER).await.unwrap();
        assert_eq!(tx.stack_quantity(EntityKind::Material, 1).await.unwrap(), 0);
    }
}
