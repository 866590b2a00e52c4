//! Domain entities - player-owned state with identity

pub mod dungeon;
pub mod mission;

pub use dungeon::{DungeonSession, PartySlot};
pub use mission::{
    MissionCategory, MissionNotice, MissionNotices, MissionRecord, MissionState, ProgressChange,
    ProgressMode,
};
