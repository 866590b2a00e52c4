//! Built-in progression consumers.

use std::sync::Arc;

use async_trait::async_trait;
use wyrmhold_domain::{MasterData, ProgressionEvent, ProgressionEventKind};

use super::cascade::{CascadeEffects, ProgressionConsumer};
use super::error::CascadeError;
use crate::infrastructure::ports::PlayerTx;
use crate::use_cases::missions::MissionTracker;

/// Feeds every event to the mission tracker.
pub struct MissionConsumer {
    tracker: Arc<MissionTracker>,
}

impl MissionConsumer {
    pub fn new(tracker: Arc<MissionTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl ProgressionConsumer for MissionConsumer {
    fn name(&self) -> &'static str {
        "missions"
    }

    fn subscriptions(&self) -> &'static [ProgressionEventKind] {
        &ProgressionEventKind::ALL
    }

    async fn on_event(
        &self,
        tx: &mut dyn PlayerTx,
        event: &ProgressionEvent,
        effects: &mut CascadeEffects,
    ) -> Result<(), CascadeError> {
        self.tracker.record_event(tx, event, &mut effects.notices).await?;
        Ok(())
    }
}

/// Sets tutorial flags the first time their trigger story is read.
pub struct TutorialFlagConsumer {
    master: Arc<MasterData>,
}

impl TutorialFlagConsumer {
    pub fn new(master: Arc<MasterData>) -> Self {
        Self { master }
    }
}

#[async_trait]
impl ProgressionConsumer for TutorialFlagConsumer {
    fn name(&self) -> &'static str {
        "tutorial_flags"
    }

    fn subscriptions(&self) -> &'static [ProgressionEventKind] {
        &[ProgressionEventKind::QuestStoryRead]
    }

    async fn on_event(
        &self,
        tx: &mut dyn PlayerTx,
        event: &ProgressionEvent,
        effects: &mut CascadeEffects,
    ) -> Result<(), CascadeError> {
        let ProgressionEvent::QuestStoryRead { story_id } = event else {
            return Ok(());
        };
        let flags: Vec<i32> = self.master.tutorial_flags_for_story(*story_id).collect();
        for flag_id in flags {
            if tx.set_tutorial_flag(flag_id).await? {
                tracing::debug!(player_id = %tx.player(), story_id, flag_id, "Tutorial flag set");
                effects.tutorial_flags.push(flag_id);
            }
        }
        Ok(())
    }
}
