//! Value objects: immutable data without identity.

pub mod entity;
pub mod game_day;
pub mod grant;

pub use entity::{currency, EntityDescriptor, EntityKind};
pub use game_day::DailyReset;
pub use grant::{GrantOutcome, GrantResult, GrantedEntity, IgnoreReason};
