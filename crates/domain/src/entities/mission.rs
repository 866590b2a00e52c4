//! Mission records and their forward-only state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{DomainError, MissionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionCategory {
    MainStory,
    Period,
    Daily,
    Drill,
}

impl MissionCategory {
    pub const ALL: [MissionCategory; 4] = [
        MissionCategory::MainStory,
        MissionCategory::Period,
        MissionCategory::Daily,
        MissionCategory::Drill,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainStory => "main_story",
            Self::Period => "period",
            Self::Daily => "daily",
            Self::Drill => "drill",
        }
    }

    /// Categories whose missions are organised in sequential groups.
    pub fn is_grouped(&self) -> bool {
        matches!(self, Self::MainStory | Self::Drill)
    }
}

impl fmt::Display for MissionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissionCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MissionCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DomainError::parse(format!("Unknown mission category: {}", s)))
    }
}

/// Ordered: a record's state may only move to a greater value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionState {
    Unstarted,
    InProgress,
    Completed,
    Claimed,
}

impl MissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unstarted => "unstarted",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Claimed => "claimed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Claimed)
    }
}

impl fmt::Display for MissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissionState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unstarted" => Ok(Self::Unstarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "claimed" => Ok(Self::Claimed),
            _ => Err(DomainError::parse(format!("Unknown mission state: {}", s))),
        }
    }
}

/// How an event amount folds into stored progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMode {
    /// progress += amount
    Accumulate,
    /// progress = max(progress, amount)
    Reach,
}

/// What a progress application did to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressChange {
    Unchanged,
    Progressed,
    Completed,
}

/// Per-player mission instance.
///
/// Identity is `(player, id)` except for Daily records, which are additionally
/// keyed by `day`: the same daily mission recurs every game day and each day's
/// completion is its own record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionRecord {
    pub id: MissionId,
    pub category: MissionCategory,
    pub group_id: Option<i32>,
    pub state: MissionState,
    pub progress: u32,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub day: Option<NaiveDate>,
}

impl MissionRecord {
    pub fn new(id: MissionId, category: MissionCategory) -> Self {
        Self {
            id,
            category,
            group_id: None,
            state: MissionState::Unstarted,
            progress: 0,
            start: None,
            end: None,
            day: None,
        }
    }

    pub fn with_group(mut self, group_id: Option<i32>) -> Self {
        self.group_id = group_id;
        self
    }

    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_day(mut self, day: NaiveDate) -> Self {
        self.day = Some(day);
        self
    }

    pub fn with_state(mut self, state: MissionState) -> Self {
        self.state = state;
        self
    }

    pub fn with_progress(mut self, progress: u32) -> Self {
        self.progress = progress;
        self
    }

    /// `[start, end)`; a record without a stored window is always in window.
    pub fn is_in_window(&self, now: DateTime<Utc>) -> bool {
        match (self.start, self.end) {
            (Some(start), Some(end)) => start <= now && now < end,
            (Some(start), None) => start <= now,
            (None, Some(end)) => now < end,
            (None, None) => true,
        }
    }

    /// Fold an event amount into this record.
    ///
    /// Finished records are never touched. Reaching `threshold` completes the
    /// record; progress is capped at the threshold.
    pub fn apply_progress(
        &mut self,
        amount: u32,
        mode: ProgressMode,
        threshold: u32,
    ) -> ProgressChange {
        if self.state.is_finished() || amount == 0 {
            return ProgressChange::Unchanged;
        }

        let next = match mode {
            ProgressMode::Accumulate => self.progress.saturating_add(amount),
            ProgressMode::Reach => self.progress.max(amount),
        };

        if next == self.progress && self.state == MissionState::InProgress {
            return ProgressChange::Unchanged;
        }

        if next >= threshold {
            self.progress = threshold;
            self.state = MissionState::Completed;
            ProgressChange::Completed
        } else {
            self.progress = next;
            self.state = MissionState::InProgress;
            ProgressChange::Progressed
        }
    }

    /// `Completed → Claimed`. Any other source state is rejected.
    pub fn claim(&mut self) -> Result<(), DomainError> {
        if self.state != MissionState::Completed {
            return Err(DomainError::invalid_state_transition(format!(
                "mission {} is {}, only completed missions can be claimed",
                self.id, self.state
            )));
        }
        self.state = MissionState::Claimed;
        Ok(())
    }

    /// Move to `state`, refusing to go backwards or to leave `Claimed`.
    pub fn advance_to(&mut self, state: MissionState) -> Result<(), DomainError> {
        if state < self.state || (self.state == MissionState::Claimed && state != self.state) {
            return Err(DomainError::invalid_state_transition(format!(
                "mission {} cannot move from {} to {}",
                self.id, self.state, state
            )));
        }
        self.state = state;
        Ok(())
    }
}

/// Per-category notification badge data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionNotice {
    pub is_update: bool,
    /// Completed or claimed missions in the category's current view.
    pub completed_mission_count: u32,
    /// Completed but unclaimed missions the player can collect.
    pub receivable_reward_count: u32,
    /// Missions completed by the event that produced this notice.
    pub new_completed_mission_ids: Vec<MissionId>,
}

impl MissionNotice {
    pub fn record_completion(&mut self, id: MissionId) {
        self.is_update = true;
        self.new_completed_mission_ids.push(id);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionNotices {
    pub main_story: MissionNotice,
    pub period: MissionNotice,
    pub daily: MissionNotice,
    pub drill: MissionNotice,
}

impl MissionNotices {
    pub fn get(&self, category: MissionCategory) -> &MissionNotice {
        match category {
            MissionCategory::MainStory => &self.main_story,
            MissionCategory::Period => &self.period,
            MissionCategory::Daily => &self.daily,
            MissionCategory::Drill => &self.drill,
        }
    }

    pub fn get_mut(&mut self, category: MissionCategory) -> &mut MissionNotice {
        match category {
            MissionCategory::MainStory => &mut self.main_story,
            MissionCategory::Period => &mut self.period,
            MissionCategory::Daily => &mut self.daily,
            MissionCategory::Drill => &mut self.drill,
        }
    }

    /// Ids completed by the triggering event, across all categories.
    pub fn newly_completed(&self) -> Vec<MissionId> {
        MissionCategory::ALL
            .iter()
            .flat_map(|c| self.get(*c).new_completed_mission_ids.iter().copied())
            .collect()
    }
}
