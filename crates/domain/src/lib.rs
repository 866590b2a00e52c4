//! Pure domain model of the progression core: ids, entity descriptors, grant
//! outcomes, mission records, dungeon sessions, progression events and the
//! master-data shapes they are checked against. No I/O lives here.

pub mod entities;
pub mod error;
pub mod events;
pub mod ids;
pub mod master_data;
pub mod value_objects;

pub use entities::{
    DungeonSession, MissionCategory, MissionNotice, MissionNotices, MissionRecord, MissionState,
    PartySlot, ProgressChange, ProgressMode,
};
pub use error::DomainError;
pub use events::{ProgressionEvent, ProgressionEventKind};
pub use ids::{DungeonKey, MissionId, PlayerId, QuestId};
pub use master_data::{
    CapacityRule, CompletionPredicate, Element, MasterData, MasterDataFile, MissionDefinition,
    MissionWindow, OverflowPolicy, QuestData, SubstituteRule, TutorialTrigger,
};
pub use value_objects::{
    currency, DailyReset, EntityDescriptor, EntityKind, GrantOutcome, GrantResult, GrantedEntity,
    IgnoreReason,
};
