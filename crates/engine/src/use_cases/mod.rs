//! Use cases - progression orchestration.
//!
//! Each module covers one area of player progression; [`ProgressionService`]
//! wraps them into transactional, caller-facing operations.

pub mod dungeon;
pub mod missions;
pub mod progression;
pub mod reward;
pub mod service;

pub use dungeon::{DungeonError, DungeonStore};
pub use missions::{ClaimedMission, MissionError, MissionList, MissionTracker};
pub use progression::{
    CascadeEffects, CascadeError, MissionConsumer, ProgressionCascade, ProgressionConsumer,
    TutorialFlagConsumer,
};
pub use reward::{RegistryError, RewardError, RewardHandlerRegistry, RewardOrchestrator};
pub use service::{ActionResult, ProgressionService};
