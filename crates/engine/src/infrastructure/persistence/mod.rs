//! Player-state persistence adapters.
//!
//! - [`InMemoryPlayerStore`]: per-player lock held for the whole transaction,
//!   used by tests and local runs.
//! - [`SqlitePlayerStore`]: one SQLite transaction per unit of work.

mod memory;
mod sqlite;

pub use memory::InMemoryPlayerStore;
pub use sqlite::SqlitePlayerStore;
