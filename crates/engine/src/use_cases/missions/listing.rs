//! Mission listings and notification badges.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use wyrmhold_domain::{MissionCategory, MissionId, MissionNotices, MissionRecord, MissionState};

use super::error::MissionError;
use super::tracker::MissionTracker;
use crate::infrastructure::ports::PlayerTx;

/// What the player currently sees, per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionList {
    pub main_story: Vec<MissionRecord>,
    pub period: Vec<MissionRecord>,
    pub daily: Vec<MissionRecord>,
    pub drill: Vec<MissionRecord>,
}

impl MissionList {
    pub fn get(&self, category: MissionCategory) -> &[MissionRecord] {
        match category {
            MissionCategory::MainStory => &self.main_story,
            MissionCategory::Period => &self.period,
            MissionCategory::Daily => &self.daily,
            MissionCategory::Drill => &self.drill,
        }
    }

    fn set(&mut self, category: MissionCategory, records: Vec<MissionRecord>) {
        match category {
            MissionCategory::MainStory => self.main_story = records,
            MissionCategory::Period => self.period = records,
            MissionCategory::Daily => self.daily = records,
            MissionCategory::Drill => self.drill = records,
        }
    }
}

/// Rows of the lowest group that still has an unclaimed mission.
fn current_group(mut rows: Vec<MissionRecord>) -> Vec<MissionRecord> {
    let current = rows
        .iter()
        .filter(|row| row.state != MissionState::Claimed)
        .filter_map(|row| row.group_id)
        .min();
    let Some(current) = current else {
        return Vec::new();
    };
    rows.retain(|row| row.group_id == Some(current));
    rows.sort_by_key(|row| row.id);
    rows
}

fn count(rows: &[MissionRecord], state: impl Fn(MissionState) -> bool) -> u32 {
    rows.iter().filter(|row| state(row.state)).count() as u32
}

impl MissionTracker {
    /// List one category, or every category when `category` is `None`.
    pub async fn list(
        &self,
        tx: &mut dyn PlayerTx,
        category: Option<MissionCategory>,
    ) -> Result<MissionList, MissionError> {
        let now = self.clock.now();
        let mut list = MissionList::default();
        let categories = match category {
            Some(category) => vec![category],
            None => MissionCategory::ALL.to_vec(),
        };
        for category in categories {
            let records = self.list_category(tx, category, now).await?;
            list.set(category, records);
        }
        Ok(list)
    }

    async fn list_category(
        &self,
        tx: &mut dyn PlayerTx,
        category: MissionCategory,
        now: DateTime<Utc>,
    ) -> Result<Vec<MissionRecord>, MissionError> {
        match category {
            MissionCategory::MainStory | MissionCategory::Drill => {
                Ok(current_group(tx.missions(Some(category)).await?))
            }
            MissionCategory::Period => {
                let mut rows = tx.missions(Some(category)).await?;
                rows.retain(|row| row.is_in_window(now));
                rows.sort_by_key(|row| row.id);
                Ok(rows)
            }
            MissionCategory::Daily => self.list_daily(tx, now).await,
        }
    }

    /// Today's and yesterday's daily records, one per `(id, day)`.
    ///
    /// Completion records and live rows for the same `(id, day)` collapse to the
    /// further-advanced of the two; different days are never merged. Yesterday's
    /// records drop out once claimed.
    async fn list_daily(
        &self,
        tx: &mut dyn PlayerTx,
        now: DateTime<Utc>,
    ) -> Result<Vec<MissionRecord>, MissionError> {
        let today = self.today(now);
        let days = [today, today - Duration::days(1)];

        let mut merged: BTreeMap<(MissionId, NaiveDate), MissionRecord> = BTreeMap::new();
        let completions = tx.daily_completions(&days).await?;
        let live = tx.missions(Some(MissionCategory::Daily)).await?;

        for record in completions.into_iter().chain(live) {
            let Some(day) = record.day.filter(|day| days.contains(day)) else {
                continue;
            };
            match merged.get(&(record.id, day)) {
                Some(existing) if existing.state >= record.state => {}
                _ => {
                    merged.insert((record.id, day), record);
                }
            }
        }
        Ok(merged
            .into_values()
            .filter(|record| record.day == Some(today) || record.state != MissionState::Claimed)
            .collect())
    }

    /// Fill completed/receivable counts for every category.
    ///
    /// Leaves `is_update` and the newly completed ids recorded by
    /// [`MissionTracker::record_event`] untouched.
    pub async fn fill_counts(
        &self,
        tx: &mut dyn PlayerTx,
        notices: &mut MissionNotices,
    ) -> Result<(), MissionError> {
        let list = self.list(tx, None).await?;
        let ungrouped = [
            MissionCategory::MainStory,
            MissionCategory::Period,
            MissionCategory::Daily,
        ];
        for category in ungrouped {
            let rows = list.get(category);
            let notice = notices.get_mut(category);
            notice.completed_mission_count = count(rows, |s| s.is_finished());
            notice.receivable_reward_count = count(rows, |s| s == MissionState::Completed);
        }

        let drill_rows = tx.missions(Some(MissionCategory::Drill)).await?;
        let notice = notices.get_mut(MissionCategory::Drill);
        notice.completed_mission_count = count(&list.drill, |s| s.is_finished());
        notice.receivable_reward_count = count(&drill_rows, |s| s == MissionState::Completed);

        if notice.receivable_reward_count == 0 && self.next_drill_group_waiting(&drill_rows) {
            notice.receivable_reward_count = 1;
        }
        Ok(())
    }

    /// Every unlocked drill group is fully claimed and a later group exists.
    fn next_drill_group_waiting(&self, drill_rows: &[MissionRecord]) -> bool {
        let Some(highest) = drill_rows.iter().filter_map(|row| row.group_id).max() else {
            return false;
        };
        drill_rows.iter().all(|row| row.state == MissionState::Claimed)
            && self
                .master
                .groups(MissionCategory::Drill)
                .range(highest + 1..)
                .next()
                .is_some()
    }

    /// Badge data without any triggering event.
    pub async fn notice(&self, tx: &mut dyn PlayerTx) -> Result<MissionNotices, MissionError> {
        let mut notices = MissionNotices::default();
        self.fill_counts(tx, &mut notices).await?;
        Ok(notices)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tracker::tests::*;
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::persistence::InMemoryPlayerStore;
    use crate::infrastructure::ports::UnitOfWork;
    use std::sync::Arc;
    use wyrmhold_domain::ProgressionEvent;

    #[tokio::test]
    async fn main_story_lists_only_current_group() {
        let store = InMemoryPlayerStore::new();
        let tracker = tracker();
        let mut tx = store.begin(PLAYER).await.unwrap();
        tracker.unlock_group(tx.as_mut(), MissionCategory::MainStory, 1).await.unwrap();
        tracker.unlock_group(tx.as_mut(), MissionCategory::MainStory, 2).await.unwrap();

        let list = tracker.list(tx.as_mut(), Some(MissionCategory::MainStory)).await.unwrap();
        let ids: Vec<_> = list.main_story.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![CLEAR_ANY, CLEAR_FLAME]);

        let mut notices = MissionNotices::default();
        tracker.record_event(tx.as_mut(), &cleared(2), &mut notices).await.unwrap();
        tracker.claim_many(tx.as_mut(), &[CLEAR_ANY, CLEAR_FLAME]).await.unwrap();

        let list = tracker.list(tx.as_mut(), Some(MissionCategory::MainStory)).await.unwrap();
        let ids: Vec<_> = list.main_story.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![STORY_TWO, LEVEL_30]);
        assert!(list.daily.is_empty());
    }

    #[tokio::test]
    async fn ended_period_mission_is_hidden_even_in_progress() {
        let store = InMemoryPlayerStore::new();
        let clock = Arc::new(FixedClock::new(now()));
        let tracker = tracker_with(clock.clone());
        let mut tx = store.begin(PLAYER).await.unwrap();
        tracker.unlock_period(tx.as_mut(), PERIOD_SUMMON).await.unwrap();
        let mut notices = MissionNotices::default();
        tracker
            .record_event(tx.as_mut(), &ProgressionEvent::ItemSummoned { count: 1 }, &mut notices)
            .await
            .unwrap();

        let list = tracker.list(tx.as_mut(), Some(MissionCategory::Period)).await.unwrap();
        assert_eq!(list.period.len(), 1);
        assert_eq!(list.period[0].state, MissionState::InProgress);

        clock.advance(chrono::Duration::days(30));
        let list = tracker.list(tx.as_mut(), Some(MissionCategory::Period)).await.unwrap();
        assert!(list.period.is_empty());
    }

    #[tokio::test]
    async fn daily_list_keeps_one_record_per_day() {
        let store = InMemoryPlayerStore::new();
        let clock = Arc::new(FixedClock::new(now()));
        let tracker = tracker_with(clock.clone());
        let mut tx = store.begin(PLAYER).await.unwrap();
        let first_day = wyrmhold_domain::DailyReset::default().game_day(now());

        tracker.refresh_daily(tx.as_mut()).await.unwrap();
        let mut notices = MissionNotices::default();
        tracker.record_event(tx.as_mut(), &cleared(1), &mut notices).await.unwrap();

        clock.advance(Duration::days(1));
        tracker.refresh_daily(tx.as_mut()).await.unwrap();
        tracker.record_event(tx.as_mut(), &cleared(1), &mut notices).await.unwrap();

        let daily = tracker.list(tx.as_mut(), Some(MissionCategory::Daily)).await.unwrap().daily;
        assert_eq!(daily.len(), 2);
        assert!(daily.iter().all(|r| r.id == DAILY_CLEAR && r.state == MissionState::Completed));
        assert_eq!(daily[0].day, Some(first_day));
        assert_eq!(daily[1].day, Some(first_day + Duration::days(1)));

        // A day later the first day is no longer yesterday.
        clock.advance(Duration::days(1));
        let daily = tracker.list(tx.as_mut(), Some(MissionCategory::Daily)).await.unwrap().daily;
        assert_eq!(daily.len(), 1);
    }

    #[tokio::test]
    async fn drill_badge_counts_all_groups_and_points_to_next_group() {
        let store = InMemoryPlayerStore::new();
        let tracker = tracker();
        let mut tx = store.begin(PLAYER).await.unwrap();
        tracker.unlock_group(tx.as_mut(), MissionCategory::Drill, 1).await.unwrap();

        let notices = tracker.notice(tx.as_mut()).await.unwrap();
        assert_eq!(notices.drill.receivable_reward_count, 0);

        let mut notices = MissionNotices::default();
        tracker
            .record_event(tx.as_mut(), &ProgressionEvent::ItemSummoned { count: 1 }, &mut notices)
            .await
            .unwrap();
        tracker.fill_counts(tx.as_mut(), &mut notices).await.unwrap();
        assert!(notices.drill.is_update);
        assert_eq!(notices.drill.receivable_reward_count, 1);
        assert_eq!(notices.drill.completed_mission_count, 1);

        tracker.claim(tx.as_mut(), DRILL_ONE).await.unwrap();
        let notices = tracker.notice(tx.as_mut()).await.unwrap();
        assert_eq!(notices.drill.receivable_reward_count, 1);
        assert!(!notices.drill.is_update);

        tracker.unlock_group(tx.as_mut(), MissionCategory::Drill, 2).await.unwrap();
        let notices = tracker.notice(tx.as_mut()).await.unwrap();
        assert_eq!(notices.drill.receivable_reward_count, 0);
    }

    #[tokio::test]
    async fn drill_badge_includes_completed_missions_of_past_groups() {
        let store = InMemoryPlayerStore::new();
        let tracker = tracker();
        let mut tx = store.begin(PLAYER).await.unwrap();
        tracker.unlock_group(tx.as_mut(), MissionCategory::Drill, 1).await.unwrap();
        tracker.unlock_group(tx.as_mut(), MissionCategory::Drill, 2).await.unwrap();
        let mut notices = MissionNotices::default();
        tracker
            .record_event(tx.as_mut(), &ProgressionEvent::ItemSummoned { count: 1 }, &mut notices)
            .await
            .unwrap();
        tracker.claim(tx.as_mut(), DRILL_TWO).await.unwrap();

        let notices = tracker.notice(tx.as_mut()).await.unwrap();
        assert_eq!(notices.drill.receivable_reward_count, 1);
        let list = tracker.list(tx.as_mut(), Some(MissionCategory::Drill)).await.unwrap();
        assert_eq!(list.drill.len(), 1);
        assert_eq!(list.drill[0].id, DRILL_ONE);
    }
}
