//! Application state and composition.

use std::sync::Arc;

use wyrmhold_domain::MasterData;

use crate::infrastructure::{
    clock::{SystemClock, SystemRandom},
    config::EngineConfig,
    ports::{ClockPort, RandomPort, SessionCachePort, UnitOfWork},
    retry::TransactionRunner,
};
use crate::use_cases::{
    self, DungeonStore, MissionConsumer, MissionTracker, ProgressionCascade, ProgressionService,
    RegistryError, RewardHandlerRegistry, RewardOrchestrator, TutorialFlagConsumer,
};

/// Main application state.
///
/// Holds the storage ports and the wired use cases.
pub struct App {
    pub repositories: Repositories,
    pub use_cases: UseCases,
    pub master: Arc<MasterData>,
}

/// Storage ports the use cases run against.
pub struct Repositories {
    pub players: Arc<dyn UnitOfWork>,
    pub sessions: Arc<dyn SessionCachePort>,
}

/// Container for all use cases.
pub struct UseCases {
    pub progression: use_cases::ProgressionService,
    pub rewards: use_cases::RewardOrchestrator,
    pub missions: Arc<use_cases::MissionTracker>,
    pub dungeons: Arc<use_cases::DungeonStore>,
}

impl App {
    /// Wire the app with the system clock and RNG.
    pub fn new(
        config: &EngineConfig,
        master: Arc<MasterData>,
        players: Arc<dyn UnitOfWork>,
        sessions: Arc<dyn SessionCachePort>,
    ) -> Result<Self, RegistryError> {
        Self::with_ports(
            config,
            master,
            Repositories { players, sessions },
            Arc::new(SystemClock),
            Arc::new(SystemRandom),
        )
    }

    /// Wire the app with explicit time and randomness sources.
    ///
    /// Fails if a reward kind has no handler.
    pub fn with_ports(
        config: &EngineConfig,
        master: Arc<MasterData>,
        repositories: Repositories,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
    ) -> Result<Self, RegistryError> {
        let registry = RewardHandlerRegistry::standard(master.clone(), clock.clone())?;
        let rewards = RewardOrchestrator::new(Arc::new(registry));

        let missions = Arc::new(MissionTracker::new(
            master.clone(),
            rewards.clone(),
            clock,
            config.daily_reset,
        ));
        let cascade = ProgressionCascade::new()
            .with(Arc::new(MissionConsumer::new(missions.clone())))
            .with(Arc::new(TutorialFlagConsumer::new(master.clone())));

        let dungeons = Arc::new(DungeonStore::new(
            repositories.sessions.clone(),
            random,
            config.dungeon_expiry,
        ));
        let runner = TransactionRunner::new(repositories.players.clone(), config.retry.clone());

        let progression = ProgressionService::new(
            runner,
            dungeons.clone(),
            rewards.clone(),
            missions.clone(),
            Arc::new(cascade),
        );

        Ok(Self {
            repositories,
            use_cases: UseCases {
                progression,
                rewards,
                missions,
                dungeons,
            },
            master,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::TtlCache;
    use crate::infrastructure::persistence::InMemoryPlayerStore;
    use std::time::Duration;
    use wyrmhold_domain::{currency, EntityDescriptor, PlayerId};

    #[tokio::test]
    async fn wired_app_grants_through_the_store() {
        let config = EngineConfig::default();
        let store = Arc::new(InMemoryPlayerStore::new());
        let cache = Arc::new(TtlCache::<String, Vec<u8>>::new(Duration::from_secs(60)));
        let app = App::new(&config, Arc::new(MasterData::default()), store.clone(), cache).unwrap();

        let player = PlayerId::new(1);
        app.use_cases
            .progression
            .grant_rewards(player, vec![EntityDescriptor::currency(currency::WYRMITE, 120)])
            .await
            .unwrap();

        let mut tx = app.repositories.players.begin(player).await.unwrap();
        assert_eq!(
            tx.stack_quantity(wyrmhold_domain::EntityKind::Currency, currency::WYRMITE)
                .await
                .unwrap(),
            120
        );
    }
}
