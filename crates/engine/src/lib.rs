//! Wyrmhold Engine library.
//!
//! Server-side progression core: dungeon sessions, reward granting, mission
//! tracking and the progression cascade.
//!
//! ## Structure
//!
//! - `use_cases/` - Progression operations over a player transaction
//! - `infrastructure/` - Ports and their adapters (SQLite, in-memory, TTL cache)
//! - `app` - Application composition

pub mod app;
pub mod infrastructure;
pub mod use_cases;

pub use app::App;
