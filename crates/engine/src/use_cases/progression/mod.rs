//! Progression cascade: fans gameplay events out to their consumers.

mod cascade;
mod consumers;
mod error;

pub use cascade::{CascadeEffects, ProgressionCascade, ProgressionConsumer};
pub use error::CascadeError;
pub use consumers::{MissionConsumer, TutorialFlagConsumer};
