//! Mission progress tracking across the MainStory, Period, Daily and Drill categories.

mod error;
mod listing;
mod tracker;

pub use error::MissionError;
pub use listing::MissionList;
pub use tracker::{ClaimedMission, MissionTracker};
