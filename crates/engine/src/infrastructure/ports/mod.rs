//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Player persistence (in-memory or SQLite)
//! - The session backing cache (in-process TTL map or a distributed cache)
//! - Clock/Random (for testing)

mod error;
mod repos;
mod testing;

// =============================================================================
// Persistence Ports
// =============================================================================
pub use repos::{BoundedItem, PlayerTx, SessionCachePort, UnitOfWork};

#[cfg(test)]
pub use repos::MockSessionCachePort;

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::{ClockPort, RandomPort};

#[cfg(test)]
pub use testing::{MockClockPort, MockRandomPort};

// =============================================================================
// Error Types
// =============================================================================
pub use error::{CacheError, RepoError, RetryableError};
