//! Persistence and cache port traits.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use wyrmhold_domain::{EntityKind, MissionCategory, MissionId, MissionRecord, PlayerId};

use super::error::{CacheError, RepoError};

// =============================================================================
// Player State
// =============================================================================

/// Row of a bounded (limit-breakable) entity: one per `(player, kind, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedItem {
    pub kind: EntityKind,
    pub id: i32,
    pub limit_break_count: u32,
    pub equipable_count: u32,
    pub buildup_count: u32,
}

/// Opens one transaction over a single player's rows.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self, player: PlayerId) -> Result<Box<dyn PlayerTx>, RepoError>;
}

/// Scoped transaction over one player's persistent state.
///
/// Every write of a gameplay action goes through the same `PlayerTx`.
/// Nothing is visible to other transactions until `commit`; dropping the
/// transaction without committing rolls everything back.
#[async_trait]
pub trait PlayerTx: Send {
    fn player(&self) -> PlayerId;

    // Stackable entities
    async fn stack_quantity(&mut self, kind: EntityKind, id: i32) -> Result<u64, RepoError>;
    /// `quantity = quantity + delta`, creating the row if needed. Returns the new balance.
    async fn increment_stack(
        &mut self,
        kind: EntityKind,
        id: i32,
        delta: u32,
    ) -> Result<u64, RepoError>;
    /// Decrement if the balance covers `delta`. `None` leaves the row untouched.
    async fn decrement_stack(
        &mut self,
        kind: EntityKind,
        id: i32,
        delta: u32,
    ) -> Result<Option<u64>, RepoError>;

    // Unique-ownership entities
    async fn owns_unit(&mut self, kind: EntityKind, id: i32) -> Result<bool, RepoError>;
    async fn insert_unit(
        &mut self,
        kind: EntityKind,
        id: i32,
        obtained_at: DateTime<Utc>,
    ) -> Result<(), RepoError>;

    // Bounded entities
    async fn bounded_item(
        &mut self,
        kind: EntityKind,
        id: i32,
    ) -> Result<Option<BoundedItem>, RepoError>;
    async fn upsert_bounded_item(&mut self, item: &BoundedItem) -> Result<(), RepoError>;

    // Missions (live rows, keyed by id)
    async fn mission(&mut self, id: MissionId) -> Result<Option<MissionRecord>, RepoError>;
    async fn missions(
        &mut self,
        category: Option<MissionCategory>,
    ) -> Result<Vec<MissionRecord>, RepoError>;
    async fn upsert_mission(&mut self, record: &MissionRecord) -> Result<(), RepoError>;

    // Daily completions (keyed by id and day)
    async fn daily_completions(
        &mut self,
        days: &[NaiveDate],
    ) -> Result<Vec<MissionRecord>, RepoError>;
    /// Insert or advance the `(id, day)` record; a stored state is never lowered.
    async fn upsert_daily_completion(&mut self, record: &MissionRecord) -> Result<(), RepoError>;

    // Tutorial
    async fn tutorial_flags(&mut self) -> Result<BTreeSet<i32>, RepoError>;
    /// Returns `true` if the flag was not set before.
    async fn set_tutorial_flag(&mut self, flag_id: i32) -> Result<bool, RepoError>;

    async fn commit(self: Box<Self>) -> Result<(), RepoError>;
}

// =============================================================================
// Session Cache
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionCachePort: Send + Sync {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
    /// `None` when the key was never set or has expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
}
