//! Reward granting: per-kind handlers, their registry and the orchestrator.

mod error;
pub mod handlers;
mod orchestrator;
mod registry;

pub use error::{RegistryError, RewardError};
pub use handlers::{
    BoundedHandler, ConvertingHandler, RewardHandler, StackableHandler, UniqueHandler,
};
pub use orchestrator::RewardOrchestrator;
pub use registry::RewardHandlerRegistry;
