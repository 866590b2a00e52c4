//! In-memory player store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use wyrmhold_domain::{EntityKind, MissionCategory, MissionId, MissionRecord, PlayerId};

use crate::infrastructure::ports::{BoundedItem, PlayerTx, RepoError, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct PlayerData {
    stacks: HashMap<(EntityKind, i32), u64>,
    units: HashMap<(EntityKind, i32), DateTime<Utc>>,
    bounded: HashMap<(EntityKind, i32), BoundedItem>,
    missions: BTreeMap<MissionId, MissionRecord>,
    daily_completions: BTreeMap<(MissionId, NaiveDate), MissionRecord>,
    tutorial_flags: BTreeSet<i32>,
}

/// Player state held in process memory.
///
/// A transaction locks the player's data for its whole lifetime and works on a
/// copy, which replaces the stored data on commit. Concurrent actions for the
/// same player therefore run one after another; different players never wait
/// on each other.
#[derive(Default)]
pub struct InMemoryPlayerStore {
    players: DashMap<PlayerId, Arc<Mutex<PlayerData>>>,
    pending_conflicts: Arc<AtomicU32>,
}

impl InMemoryPlayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with a write conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    fn slot(&self, player: PlayerId) -> Arc<Mutex<PlayerData>> {
        self.players
            .entry(player)
            .or_insert_with(|| Arc::new(Mutex::new(PlayerData::default())))
            .clone()
    }
}

#[async_trait]
impl UnitOfWork for InMemoryPlayerStore {
    async fn begin(&self, player: PlayerId) -> Result<Box<dyn PlayerTx>, RepoError> {
        let guard = self.slot(player).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx {
            player,
            guard,
            working,
            pending_conflicts: Arc::clone(&self.pending_conflicts),
        }))
    }
}

struct InMemoryTx {
    player: PlayerId,
    guard: OwnedMutexGuard<PlayerData>,
    working: PlayerData,
    pending_conflicts: Arc<AtomicU32>,
}

#[async_trait]
impl PlayerTx for InMemoryTx {
    fn player(&self) -> PlayerId {
        self.player
    }

    async fn stack_quantity(&mut self, kind: EntityKind, id: i32) -> Result<u64, RepoError> {
        Ok(self.working.stacks.get(&(kind, id)).copied().unwrap_or(0))
    }

    async fn increment_stack(
        &mut self,
        kind: EntityKind,
        id: i32,
        delta: u32,
    ) -> Result<u64, RepoError> {
        let quantity = self.working.stacks.entry((kind, id)).or_insert(0);
        *quantity = quantity.saturating_add(u64::from(delta));
        Ok(*quantity)
    }

    async fn decrement_stack(
        &mut self,
        kind: EntityKind,
        id: i32,
        delta: u32,
    ) -> Result<Option<u64>, RepoError> {
        let current = self.working.stacks.get(&(kind, id)).copied().unwrap_or(0);
        let Some(remaining) = current.checked_sub(u64::from(delta)) else {
            return Ok(None);
        };
        if current > 0 {
            self.working.stacks.insert((kind, id), remaining);
        }
        Ok(Some(remaining))
    }

    async fn owns_unit(&mut self, kind: EntityKind, id: i32) -> Result<bool, RepoError> {
        Ok(self.working.units.contains_key(&(kind, id)))
    }

    async fn insert_unit(
        &mut self,
        kind: EntityKind,
        id: i32,
        obtained_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        self.working.units.entry((kind, id)).or_insert(obtained_at);
        Ok(())
    }

    async fn bounded_item(
        &mut self,
        kind: EntityKind,
        id: i32,
    ) -> Result<Option<BoundedItem>, RepoError> {
        Ok(self.working.bounded.get(&(kind, id)).copied())
    }

    async fn upsert_bounded_item(&mut self, item: &BoundedItem) -> Result<(), RepoError> {
        self.working.bounded.insert((item.kind, item.id), *item);
        Ok(())
    }

    async fn mission(&mut self, id: MissionId) -> Result<Option<MissionRecord>, RepoError> {
        Ok(self.working.missions.get(&id).cloned())
    }

    async fn missions(
        &mut self,
        category: Option<MissionCategory>,
    ) -> Result<Vec<MissionRecord>, RepoError> {
        Ok(self
            .working
            .missions
            .values()
            .filter(|m| category.map_or(true, |c| m.category == c))
            .cloned()
            .collect())
    }

    async fn upsert_mission(&mut self, record: &MissionRecord) -> Result<(), RepoError> {
        self.working.missions.insert(record.id, record.clone());
        Ok(())
    }

    async fn daily_completions(
        &mut self,
        days: &[NaiveDate],
    ) -> Result<Vec<MissionRecord>, RepoError> {
        Ok(self
            .working
            .daily_completions
            .iter()
            .filter(|((_, day), _)| days.contains(day))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn upsert_daily_completion(&mut self, record: &MissionRecord) -> Result<(), RepoError> {
        let day = record
            .day
            .ok_or_else(|| {
                RepoError::constraint(format!("daily completion {} has no day", record.id))
            })?;
        self.working
            .daily_completions
            .entry((record.id, day))
            .and_modify(|stored| {
                if record.state > stored.state {
                    stored.state = record.state;
                    stored.progress = record.progress;
                }
            })
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn tutorial_flags(&mut self) -> Result<BTreeSet<i32>, RepoError> {
        Ok(self.working.tutorial_flags.clone())
    }

    async fn set_tutorial_flag(&mut self, flag_id: i32) -> Result<bool, RepoError> {
        Ok(self.working.tutorial_flags.insert(flag_id))
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        let InMemoryTx {
            player,
            mut guard,
            working,
            pending_conflicts,
        } = *self;

        let injected = pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RepoError::conflict(
                "commit",
                format!("injected conflict for player {}", player),
            ));
        }

        *guard = working;
        Ok(())
    }
}
