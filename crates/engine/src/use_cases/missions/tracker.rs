//! Mission progress, claims and unlocks.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use wyrmhold_domain::{
    DailyReset, GrantResult, MasterData, MissionCategory, MissionDefinition, MissionId,
    MissionNotices, MissionRecord, MissionState, ProgressChange, ProgressionEvent,
};

use super::error::MissionError;
use crate::infrastructure::ports::{ClockPort, PlayerTx};
use crate::use_cases::reward::RewardOrchestrator;

/// A successful claim: the record after the claim plus the rewards it paid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedMission {
    pub mission: MissionRecord,
    pub grant: GrantResult,
}

/// Drives per-player mission rows from progression events.
///
/// Holds no player state; every operation works inside the caller's
/// transaction, so a rolled-back action leaves no progress behind.
pub struct MissionTracker {
    pub(super) master: Arc<MasterData>,
    orchestrator: RewardOrchestrator,
    pub(super) clock: Arc<dyn ClockPort>,
    pub(super) daily_reset: DailyReset,
}

impl MissionTracker {
    pub fn new(
        master: Arc<MasterData>,
        orchestrator: RewardOrchestrator,
        clock: Arc<dyn ClockPort>,
        daily_reset: DailyReset,
    ) -> Self {
        Self {
            master,
            orchestrator,
            clock,
            daily_reset,
        }
    }

    pub(super) fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.daily_reset.game_day(now)
    }

    fn definition(&self, id: MissionId) -> Result<&MissionDefinition, MissionError> {
        self.master.mission(id).ok_or(MissionError::NotFound(id))
    }

    /// Whether a stored row can still receive progress at `now`.
    fn accepts_progress(&self, record: &MissionRecord, now: DateTime<Utc>) -> bool {
        if record.state.is_finished() {
            return false;
        }
        match record.category {
            MissionCategory::Period => record.is_in_window(now),
            MissionCategory::Daily => record.day == Some(self.today(now)),
            MissionCategory::MainStory | MissionCategory::Drill => true,
        }
    }

    /// Fold one event into every unlocked, unfinished mission whose predicate matches.
    ///
    /// Completions are recorded in `notices`; counts are filled separately by
    /// [`MissionTracker::fill_counts`] once the whole action has been applied.
    pub async fn record_event(
        &self,
        tx: &mut dyn PlayerTx,
        event: &ProgressionEvent,
        notices: &mut MissionNotices,
    ) -> Result<(), MissionError> {
        let now = self.clock.now();
        let quest = match event {
            ProgressionEvent::QuestCleared { quest_id, .. } => self.master.quest(*quest_id),
            _ => None,
        };

        for mut record in tx.missions(None).await? {
            if !self.accepts_progress(&record, now) {
                continue;
            }
            let Some(definition) = self.master.mission(record.id) else {
                tracing::debug!(
                    mission_id = %record.id,
                    "Stored mission has no master data, skipping"
                );
                continue;
            };
            let Some(amount) = definition.predicate.evaluate(event, quest) else {
                continue;
            };

            let change = record.apply_progress(
                amount,
                definition.predicate.progress_mode(),
                definition.threshold,
            );
            if change == ProgressChange::Unchanged {
                continue;
            }
            tx.upsert_mission(&record).await?;

            if change == ProgressChange::Completed {
                if record.category == MissionCategory::Daily {
                    tx.upsert_daily_completion(&record).await?;
                }
                notices.get_mut(record.category).record_completion(record.id);
                tracing::info!(
                    player_id = %tx.player(),
                    mission_id = %record.id,
                    category = %record.category,
                    "Mission completed"
                );
            }
        }
        Ok(())
    }

    /// Claim a completed mission and pay out its rewards.
    ///
    /// Daily missions are claimed for the current game day.
    ///
    /// # Returns
    /// * `Ok(ClaimedMission)` - The claimed record and the grant result
    /// * `Err(MissionError::NotFound)` - Unknown or not unlocked
    /// * `Err(MissionError::InvalidState)` - The mission is not `Completed`
    pub async fn claim(
        &self,
        tx: &mut dyn PlayerTx,
        id: MissionId,
    ) -> Result<ClaimedMission, MissionError> {
        let definition = self.definition(id)?;
        let now = self.clock.now();
        if definition.category == MissionCategory::Daily {
            return self.claim_daily(tx, id, self.today(now)).await;
        }

        let mut record = tx.mission(id).await?.ok_or(MissionError::NotFound(id))?;
        if record.category == MissionCategory::Period && !record.is_in_window(now) {
            return Err(MissionError::InvalidState(format!(
                "mission {} is outside its window",
                id
            )));
        }
        record.claim()?;

        let grant = self.orchestrator.grant(tx, &definition.rewards).await?;
        tx.upsert_mission(&record).await?;

        tracing::info!(player_id = %tx.player(), mission_id = %id, "Mission claimed");
        Ok(ClaimedMission { mission: record, grant })
    }

    /// Claim the `(id, day)` instance of a daily mission.
    pub async fn claim_daily(
        &self,
        tx: &mut dyn PlayerTx,
        id: MissionId,
        day: NaiveDate,
    ) -> Result<ClaimedMission, MissionError> {
        let definition = self.definition(id)?;
        if definition.category != MissionCategory::Daily {
            return Err(MissionError::InvalidState(format!(
                "mission {} is a {} mission, not daily",
                id, definition.category
            )));
        }

        let completion = tx
            .daily_completions(&[day])
            .await?
            .into_iter()
            .find(|record| record.id == id);
        let live = tx.mission(id).await?.filter(|record| record.day == Some(day));

        let mut record = match (completion, live.clone()) {
            (Some(a), Some(b)) => {
                if a.state >= b.state {
                    a
                } else {
                    b
                }
            }
            (Some(record), None) | (None, Some(record)) => record,
            (None, None) => return Err(MissionError::NotFound(id)),
        };
        record.claim()?;

        let grant = self.orchestrator.grant(tx, &definition.rewards).await?;
        tx.upsert_daily_completion(&record).await?;
        if let Some(mut live) = live {
            live.state = MissionState::Claimed;
            live.progress = record.progress;
            tx.upsert_mission(&live).await?;
        }

        tracing::info!(player_id = %tx.player(), mission_id = %id, %day, "Daily mission claimed");
        Ok(ClaimedMission { mission: record, grant })
    }

    /// Claim several missions in one unit of work; the first failure aborts the batch.
    pub async fn claim_many(
        &self,
        tx: &mut dyn PlayerTx,
        ids: &[MissionId],
    ) -> Result<Vec<ClaimedMission>, MissionError> {
        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            claimed.push(self.claim(tx, *id).await?);
        }
        Ok(claimed)
    }

    /// Claim several `(id, day)` daily instances in one unit of work.
    pub async fn claim_daily_many(
        &self,
        tx: &mut dyn PlayerTx,
        instances: &[(MissionId, NaiveDate)],
    ) -> Result<Vec<ClaimedMission>, MissionError> {
        let mut claimed = Vec::with_capacity(instances.len());
        for (id, day) in instances {
            claimed.push(self.claim_daily(tx, *id, *day).await?);
        }
        Ok(claimed)
    }

    /// Materialize `Unstarted` rows for every mission of a MainStory or Drill group.
    ///
    /// Rows that already exist are kept as they are. Returns the group's rows.
    pub async fn unlock_group(
        &self,
        tx: &mut dyn PlayerTx,
        category: MissionCategory,
        group_id: i32,
    ) -> Result<Vec<MissionRecord>, MissionError> {
        let definitions = self.master.missions_in_group(category, group_id);
        if !category.is_grouped() || definitions.is_empty() {
            return Err(MissionError::GroupNotFound { category, group_id });
        }

        let mut records = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let record = match tx.mission(definition.id).await? {
                Some(existing) => existing,
                None => {
                    let record =
                        MissionRecord::new(definition.id, category).with_group(Some(group_id));
                    tx.upsert_mission(&record).await?;
                    record
                }
            };
            records.push(record);
        }

        tracing::debug!(
            player_id = %tx.player(),
            %category,
            group_id,
            missions = records.len(),
            "Mission group unlocked"
        );
        Ok(records)
    }

    /// Materialize a Period mission row carrying its master-data window.
    pub async fn unlock_period(
        &self,
        tx: &mut dyn PlayerTx,
        id: MissionId,
    ) -> Result<MissionRecord, MissionError> {
        let definition = self.definition(id)?;
        if definition.category != MissionCategory::Period {
            return Err(MissionError::InvalidState(format!(
                "mission {} is a {} mission, not period",
                id, definition.category
            )));
        }
        if let Some(existing) = tx.mission(id).await? {
            return Ok(existing);
        }

        let mut record =
            MissionRecord::new(id, MissionCategory::Period).with_group(definition.group_id);
        if let Some(window) = definition.window {
            record = record.with_window(window.start, window.end);
        }
        tx.upsert_mission(&record).await?;
        Ok(record)
    }

    /// Make sure every daily mission has a live row for the current game day.
    ///
    /// Rows left over from an earlier day restart from `Unstarted`; that day's
    /// completion, if any, stays in the completion table.
    pub async fn refresh_daily(
        &self,
        tx: &mut dyn PlayerTx,
    ) -> Result<Vec<MissionRecord>, MissionError> {
        let today = self.today(self.clock.now());
        let mut records = Vec::new();

        for definition in self.master.missions_in_category(MissionCategory::Daily) {
            let record = match tx.mission(definition.id).await? {
                Some(existing) if existing.day == Some(today) => existing,
                _ => {
                    let record = MissionRecord::new(definition.id, MissionCategory::Daily)
                        .with_group(definition.group_id)
                        .with_day(today);
                    tx.upsert_mission(&record).await?;
                    record
                }
            };
            records.push(record);
        }

        tracing::debug!(
            player_id = %tx.player(),
            %today,
            missions = records.len(),
            "Daily missions refreshed"
        );
        Ok(records)
    }

    /// Unlocked drill groups, ascending.
    pub async fn drill_groups(&self, tx: &mut dyn PlayerTx) -> Result<Vec<i32>, MissionError> {
        let mut groups: Vec<i32> = tx
            .missions(Some(MissionCategory::Drill))
            .await?
            .into_iter()
            .filter_map(|record| record.group_id)
            .collect();
        groups.sort_unstable();
        groups.dedup();
        Ok(groups)
    }
}
