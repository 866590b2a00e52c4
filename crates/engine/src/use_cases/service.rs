//! Caller-facing progression operations.
//!
//! Every player-state operation runs as one unit of work through the
//! [`TransactionRunner`]: all of its writes commit together or not at all, and
//! write conflicts re-run the whole operation.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use wyrmhold_domain::{
    DungeonKey, DungeonSession, EntityDescriptor, GrantResult, MissionCategory, MissionId,
    MissionNotices, MissionRecord, PlayerId, ProgressionEvent,
};

use crate::infrastructure::retry::TransactionRunner;
use crate::use_cases::dungeon::{DungeonError, DungeonStore};
use crate::use_cases::missions::{ClaimedMission, MissionError, MissionList, MissionTracker};
use crate::use_cases::progression::ProgressionCascade;
use crate::use_cases::reward::{RewardError, RewardOrchestrator};

/// Outcome of a gameplay action: what was granted and the resulting badges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub grant: GrantResult,
    pub notice: MissionNotices,
    pub tutorial_flags: Vec<i32>,
}

#[derive(Clone)]
pub struct ProgressionService {
    runner: TransactionRunner,
    dungeons: Arc<DungeonStore>,
    rewards: RewardOrchestrator,
    missions: Arc<MissionTracker>,
    cascade: Arc<ProgressionCascade>,
}

impl ProgressionService {
    pub fn new(
        runner: TransactionRunner,
        dungeons: Arc<DungeonStore>,
        rewards: RewardOrchestrator,
        missions: Arc<MissionTracker>,
        cascade: Arc<ProgressionCascade>,
    ) -> Self {
        Self {
            runner,
            dungeons,
            rewards,
            missions,
            cascade,
        }
    }

    // =========================================================================
    // Dungeon sessions
    // =========================================================================

    pub async fn start_dungeon(
        &self,
        session: &DungeonSession,
    ) -> Result<DungeonKey, DungeonError> {
        self.dungeons.start(session).await
    }

    pub async fn get_dungeon(&self, key: &DungeonKey) -> Result<DungeonSession, DungeonError> {
        self.dungeons.get(key).await
    }

    // =========================================================================
    // Rewards
    // =========================================================================

    /// Grant entities to a player.
    ///
    /// # Returns
    /// * `Ok(GrantResult)` - One outcome per descriptor, in input order
    /// * `Err(RewardError)` - Nothing was granted
    pub async fn grant_rewards(
        &self,
        player: PlayerId,
        descriptors: Vec<EntityDescriptor>,
    ) -> Result<GrantResult, RewardError> {
        let rewards = self.rewards.clone();
        self.runner
            .run(player, "grant_rewards", move |tx| {
                let rewards = rewards.clone();
                let descriptors = descriptors.clone();
                Box::pin(async move { rewards.grant(tx, &descriptors).await })
            })
            .await
    }

    /// Remove entities from a player, all or nothing.
    pub async fn consume(
        &self,
        player: PlayerId,
        descriptors: Vec<EntityDescriptor>,
    ) -> Result<(), RewardError> {
        let rewards = self.rewards.clone();
        self.runner
            .run(player, "consume", move |tx| {
                let rewards = rewards.clone();
                let descriptors = descriptors.clone();
                Box::pin(async move { rewards.consume(tx, &descriptors).await })
            })
            .await
    }

    // =========================================================================
    // Progression
    // =========================================================================

    /// Cascade events through missions and the other consumers.
    pub async fn increment_mission_progress(
        &self,
        player: PlayerId,
        events: Vec<ProgressionEvent>,
    ) -> Result<MissionNotices, MissionError> {
        self.apply_action(player, Vec::new(), events)
            .await
            .map(|result| result.notice)
    }

    /// Grant an action's rewards and cascade its events in one transaction.
    ///
    /// # Arguments
    /// * `player` - The acting player
    /// * `grants` - Entities the action awards
    /// * `events` - Progression events the action produced
    ///
    /// # Returns
    /// * `Ok(ActionResult)` - The grant, mission badges and newly set tutorial flags
    /// * `Err(MissionError)` - Nothing of the action was persisted
    pub async fn apply_action(
        &self,
        player: PlayerId,
        grants: Vec<EntityDescriptor>,
        events: Vec<ProgressionEvent>,
    ) -> Result<ActionResult, MissionError> {
        let rewards = self.rewards.clone();
        let missions = self.missions.clone();
        let cascade = self.cascade.clone();
        self.runner
            .run(player, "apply_action", move |tx| {
                let rewards = rewards.clone();
                let missions = missions.clone();
                let cascade = cascade.clone();
                let grants = grants.clone();
                let events = events.clone();
                Box::pin(async move {
                    let grant = rewards.grant(tx, &grants).await?;
                    let mut effects = cascade.dispatch(tx, &events).await?;
                    missions.fill_counts(tx, &mut effects.notices).await?;
                    Ok(ActionResult {
                        grant,
                        notice: effects.notices,
                        tutorial_flags: effects.tutorial_flags,
                    })
                })
            })
            .await
    }

    // =========================================================================
    // Missions
    // =========================================================================

    pub async fn claim_mission(
        &self,
        player: PlayerId,
        id: MissionId,
    ) -> Result<ClaimedMission, MissionError> {
        let missions = self.missions.clone();
        self.runner
            .run(player, "claim_mission", move |tx| {
                let missions = missions.clone();
                Box::pin(async move { missions.claim(tx, id).await })
            })
            .await
    }

    pub async fn claim_daily_mission(
        &self,
        player: PlayerId,
        id: MissionId,
        day: NaiveDate,
    ) -> Result<ClaimedMission, MissionError> {
        let missions = self.missions.clone();
        self.runner
            .run(player, "claim_daily_mission", move |tx| {
                let missions = missions.clone();
                Box::pin(async move { missions.claim_daily(tx, id, day).await })
            })
            .await
    }

    /// Claim a batch; if any claim fails, none of them is persisted.
    pub async fn claim_missions(
        &self,
        player: PlayerId,
        ids: Vec<MissionId>,
    ) -> Result<Vec<ClaimedMission>, MissionError> {
        let missions = self.missions.clone();
        self.runner
            .run(player, "claim_missions", move |tx| {
                let missions = missions.clone();
                let ids = ids.clone();
                Box::pin(async move { missions.claim_many(tx, &ids).await })
            })
            .await
    }

    /// Claim a batch of `(id, day)` daily instances, all or nothing.
    pub async fn claim_daily_missions(
        &self,
        player: PlayerId,
        instances: Vec<(MissionId, NaiveDate)>,
    ) -> Result<Vec<ClaimedMission>, MissionError> {
        let missions = self.missions.clone();
        self.runner
            .run(player, "claim_daily_missions", move |tx| {
                let missions = missions.clone();
                let instances = instances.clone();
                Box::pin(async move { missions.claim_daily_many(tx, &instances).await })
            })
            .await
    }

    pub async fn list_missions(
        &self,
        player: PlayerId,
        category: Option<MissionCategory>,
    ) -> Result<MissionList, MissionError> {
        let missions = self.missions.clone();
        self.runner
            .run(player, "list_missions", move |tx| {
                let missions = missions.clone();
                Box::pin(async move { missions.list(tx, category).await })
            })
            .await
    }

    pub async fn unlock_main_story_group(
        &self,
        player: PlayerId,
        group_id: i32,
    ) -> Result<Vec<MissionRecord>, MissionError> {
        self.unlock_group(player, MissionCategory::MainStory, group_id).await
    }

    pub async fn unlock_drill_group(
        &self,
        player: PlayerId,
        group_id: i32,
    ) -> Result<Vec<MissionRecord>, MissionError> {
        self.unlock_group(player, MissionCategory::Drill, group_id).await
    }

    async fn unlock_group(
        &self,
        player: PlayerId,
        category: MissionCategory,
        group_id: i32,
    ) -> Result<Vec<MissionRecord>, MissionError> {
        let missions = self.missions.clone();
        self.runner
            .run(player, "unlock_group", move |tx| {
                let missions = missions.clone();
                Box::pin(async move { missions.unlock_group(tx, category, group_id).await })
            })
            .await
    }

    pub async fn unlock_period_mission(
        &self,
        player: PlayerId,
        id: MissionId,
    ) -> Result<MissionRecord, MissionError> {
        let missions = self.missions.clone();
        self.runner
            .run(player, "unlock_period_mission", move |tx| {
                let missions = missions.clone();
                Box::pin(async move { missions.unlock_period(tx, id).await })
            })
            .await
    }

    pub async fn refresh_daily_missions(
        &self,
        player: PlayerId,
    ) -> Result<Vec<MissionRecord>, MissionError> {
        let missions = self.missions.clone();
        self.runner
            .run(player, "refresh_daily_missions", move |tx| {
                let missions = missions.clone();
                Box::pin(async move { missions.refresh_daily(tx).await })
            })
            .await
    }

    pub async fn drill_group_list(&self, player: PlayerId) -> Result<Vec<i32>, MissionError> {
        let missions = self.missions.clone();
        self.runner
            .run(player, "drill_group_list", move |tx| {
                let missions = missions.clone();
                Box::pin(async move { missions.drill_groups(tx).await })
            })
            .await
    }

    pub async fn mission_notice(&self, player: PlayerId) -> Result<MissionNotices, MissionError> {
        let missions = self.missions.clone();
        self.runner
            .run(player, "mission_notice", move |tx| {
                let missions = missions.clone();
                Box::pin(async move { missions.notice(tx).await })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::TtlCache;
    use crate::infrastructure::clock::{FixedClock, SequentialRandom};
    use crate::infrastructure::persistence::InMemoryPlayerStore;
    use crate::infrastructure::ports::UnitOfWork;
    use crate::infrastructure::retry::RetryConfig;
    use crate::use_cases::progression::{MissionConsumer, TutorialFlagConsumer};
    use crate::use_cases::reward::RewardHandlerRegistry;
    use crate::infrastructure::persistence::SqlitePlayerStore;
    use chrono::{TimeZone, Utc};
    use futures_util::future::join_all;
    use std::time::Duration;
    use wyrmhold_domain::{
        currency, CompletionPredicate, DailyReset, EntityKind, GrantOutcome, MasterData,
        MasterDataFile, MissionDefinition, MissionState, PartySlot, QuestData, QuestId,
    };

    const PLAYER: PlayerId = PlayerId::new(77);
    const QUEST: QuestId = QuestId::new(100010103);
    const CLEAR_TWICE: MissionId = MissionId::new(10010103);
    const DAILY_CLEAR: MissionId = MissionId::new(15070101);

    struct Fixture {
        service: ProgressionService,
        store: Arc<InMemoryPlayerStore>,
        master: Arc<MasterData>,
    }

    fn master() -> Arc<MasterData> {
        let file = MasterDataFile {
            quests: vec![QuestData {
                id: QUEST,
                group_id: 100010,
                element: wyrmhold_domain::Element::Light,
                difficulty: 1,
                pay_stamina: 6,
                can_play_co_op: false,
            }],
            missions: vec![
                MissionDefinition {
                    id: CLEAR_TWICE,
                    category: MissionCategory::MainStory,
                    group_id: Some(1),
                    threshold: 2,
                    predicate: CompletionPredicate::ClearQuest {
                        quest_id: Some(QUEST),
                        quest_group_id: None,
                        element: None,
                        min_difficulty: None,
                    },
                    rewards: vec![EntityDescriptor::new(EntityKind::Character, 10140101, 1)],
                    window: None,
                },
                MissionDefinition {
                    id: DAILY_CLEAR,
                    category: MissionCategory::Daily,
                    group_id: None,
                    threshold: 1,
                    predicate: CompletionPredicate::ClearQuest {
                        quest_id: None,
                        quest_group_id: None,
                        element: None,
                        min_difficulty: None,
                    },
                    rewards: vec![EntityDescriptor::currency(currency::WYRMITE, 10)],
                    window: None,
                },
            ],
            ..Default::default()
        };
        Arc::new(MasterData::from_file(file).unwrap())
    }

    fn service_over(
        players: Arc<dyn UnitOfWork>,
        master: Arc<MasterData>,
        clock: Arc<FixedClock>,
    ) -> ProgressionService {
        let registry = RewardHandlerRegistry::standard(master.clone(), clock.clone()).unwrap();
        let rewards = RewardOrchestrator::new(Arc::new(registry));
        let missions = Arc::new(MissionTracker::new(
            master.clone(),
            rewards.clone(),
            clock,
            DailyReset::default(),
        ));
        let cascade = ProgressionCascade::new()
            .with(Arc::new(MissionConsumer::new(missions.clone())))
            .with(Arc::new(TutorialFlagConsumer::new(master)));
        let cache = Arc::new(TtlCache::<String, Vec<u8>>::new(Duration::from_secs(1800)));
        let dungeons = DungeonStore::new(
            cache,
            Arc::new(SequentialRandom::new()),
            Duration::from_secs(1800),
        );
        let retry = RetryConfig {
            max_retries: 8,
            base_delay_ms: 1,
            max_delay_ms: 2,
            ..RetryConfig::default()
        };

        ProgressionService::new(
            TransactionRunner::new(players, retry),
            Arc::new(dungeons),
            rewards,
            missions,
            Arc::new(cascade),
        )
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn fixture_with(clock: Arc<FixedClock>) -> Fixture {
        let master = master();
        let store = Arc::new(InMemoryPlayerStore::new());
        Fixture {
            service: service_over(store.clone(), master.clone(), clock),
            store,
            master,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(FixedClock::new(now())))
    }

    fn cleared() -> ProgressionEvent {
        ProgressionEvent::QuestCleared {
            quest_id: QUEST,
            count: 1,
        }
    }

    #[tokio::test]
    async fn dungeon_session_round_trips() {
        let fixture = fixture();
        let quest = fixture.master.quest(QUEST).unwrap().clone();
        let session =
            DungeonSession::new(quest, vec![PartySlot::new(1, 10140101)], Utc::now()).unwrap();

        let key = fixture.service.start_dungeon(&session).await.unwrap();
        assert_eq!(fixture.service.get_dungeon(&key).await.unwrap(), session);
    }

    #[tokio::test]
    async fn action_grants_and_completes_then_claim_pays_out() {
        let fixture = fixture();
        let service = &fixture.service;
        service.unlock_main_story_group(PLAYER, 1).await.unwrap();

        let result = service
            .apply_action(
                PLAYER,
                vec![EntityDescriptor::currency(currency::MANA, 300)],
                vec![cleared(), cleared()],
            )
            .await
            .unwrap();
        assert_eq!(result.grant.outcome(0), Some(&GrantOutcome::added(300)));
        assert_eq!(result.notice.main_story.new_completed_mission_ids, vec![CLEAR_TWICE]);
        assert_eq!(result.notice.main_story.receivable_reward_count, 1);

        let claimed = service.claim_mission(PLAYER, CLEAR_TWICE).await.unwrap();
        assert_eq!(claimed.mission.state, MissionState::Claimed);
        assert_eq!(claimed.grant.outcome(0), Some(&GrantOutcome::added(1)));

        let notices = service.mission_notice(PLAYER).await.unwrap();
        assert_eq!(notices.main_story.receivable_reward_count, 0);
    }

    #[tokio::test]
    async fn conflicts_are_retried_and_commit_once() {
        let fixture = fixture();
        fixture.store.inject_conflicts(2);

        let result = fixture
            .service
            .grant_rewards(PLAYER, vec![EntityDescriptor::currency(currency::RUPIES, 1000)])
            .await
            .unwrap();
        assert_eq!(result.len(), 1);

        let mut tx = fixture.store.begin(PLAYER).await.unwrap();
        assert_eq!(
            tx.stack_quantity(EntityKind::Currency, currency::RUPIES).await.unwrap(),
            1000
        );
    }

    #[tokio::test]
    async fn failed_action_persists_nothing() {
        let fixture = fixture();
        fixture.service.unlock_main_story_group(PLAYER, 1).await.unwrap();

        let result = fixture
            .service
            .claim_missions(PLAYER, vec![CLEAR_TWICE])
            .await;
        assert!(matches!(result, Err(MissionError::InvalidState(_))));

        fixture
            .service
            .increment_mission_progress(PLAYER, vec![cleared()])
            .await
            .unwrap();
        fixture.store.inject_conflicts(9);
        let result = fixture
            .service
            .increment_mission_progress(PLAYER, vec![cleared()])
            .await;
        assert!(matches!(result, Err(MissionError::Repo(ref e)) if e.is_conflict()));

        let list = fixture
            .service
            .list_missions(PLAYER, Some(MissionCategory::MainStory))
            .await
            .unwrap();
        assert_eq!(list.main_story[0].progress, 1);
        assert_eq!(list.main_story[0].state, MissionState::InProgress);
    }

    async fn assert_wyrmite(players: &dyn UnitOfWork, expected: u64) {
        let mut tx = players.begin(PLAYER).await.unwrap();
        assert_eq!(
            tx.stack_quantity(EntityKind::Currency, currency::WYRMITE).await.unwrap(),
            expected
        );
    }

    async fn grant_concurrently(service: &ProgressionService, grants: u64, delta: u32) {
        let calls = (0..grants).map(|_| {
            let wyrmite = EntityDescriptor::currency(currency::WYRMITE, delta);
            service.grant_rewards(PLAYER, vec![wyrmite])
        });
        for result in join_all(calls).await {
            assert_eq!(result.unwrap().outcome(0), Some(&GrantOutcome::added(delta)));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sqlite_grants_lose_no_increment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("players.db");
        let store = Arc::new(SqlitePlayerStore::new(path.to_str().unwrap()).await.unwrap());
        let service = service_over(store.clone(), master(), Arc::new(FixedClock::new(now())));

        grant_concurrently(&service, 16, 25).await;
        assert_wyrmite(store.as_ref(), 16 * 25).await;
    }

    #[tokio::test]
    async fn concurrent_grants_retry_through_conflicts() {
        let fixture = fixture();
        fixture.store.inject_conflicts(3);

        grant_concurrently(&fixture.service, 8, 5).await;
        assert_wyrmite(fixture.store.as_ref(), 8 * 5).await;
    }

    #[tokio::test]
    async fn daily_batch_claim_drops_yesterdays_claims_from_the_list() {
        let clock = Arc::new(FixedClock::new(now()));
        let fixture = fixture_with(clock.clone());
        let service = &fixture.service;
        let yesterday = DailyReset::default().game_day(now());
        let today = yesterday + chrono::Duration::days(1);

        service.refresh_daily_missions(PLAYER).await.unwrap();
        service.increment_mission_progress(PLAYER, vec![cleared()]).await.unwrap();
        clock.advance(chrono::Duration::days(1));
        service.refresh_daily_missions(PLAYER).await.unwrap();
        service.increment_mission_progress(PLAYER, vec![cleared()]).await.unwrap();

        let claimed = service
            .claim_daily_missions(PLAYER, vec![(DAILY_CLEAR, yesterday), (DAILY_CLEAR, today)])
            .await
            .unwrap();
        assert_eq!(claimed.len(), 2);
        assert_wyrmite(fixture.store.as_ref(), 20).await;

        let daily = service
            .list_missions(PLAYER, Some(MissionCategory::Daily))
            .await
            .unwrap()
            .daily;
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].day, Some(today));
        assert_eq!(daily[0].state, MissionState::Claimed);
    }
}
