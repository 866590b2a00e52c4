//! Handler registry: one handler per entity kind.

use std::collections::HashMap;
use std::sync::Arc;

use wyrmhold_domain::{EntityKind, MasterData};

use super::error::RegistryError;
use super::handlers::{
    BoundedHandler, ConvertingHandler, RewardHandler, StackableHandler, UniqueHandler,
};
use crate::infrastructure::ports::ClockPort;

/// Maps each entity kind to the handler that owns it.
pub struct RewardHandlerRegistry {
    handlers: HashMap<EntityKind, Arc<dyn RewardHandler>>,
}

impl RewardHandlerRegistry {
    /// Build a registry from handlers, rejecting any kind claimed twice.
    pub fn new(handlers: Vec<Arc<dyn RewardHandler>>) -> Result<Self, RegistryError> {
        let mut map: HashMap<EntityKind, Arc<dyn RewardHandler>> = HashMap::new();
        for handler in handlers {
            for kind in handler.supported_kinds() {
                if map.insert(*kind, Arc::clone(&handler)).is_some() {
                    return Err(RegistryError::DuplicateKind(*kind));
                }
            }
        }
        Ok(Self { handlers: map })
    }

    /// The built-in handlers, checked for completeness.
    pub fn standard(
        master: Arc<MasterData>,
        clock: Arc<dyn ClockPort>,
    ) -> Result<Self, RegistryError> {
        let registry = Self::new(vec![
            Arc::new(StackableHandler),
            Arc::new(UniqueHandler::new(Arc::clone(&master), clock)),
            Arc::new(BoundedHandler::new(Arc::clone(&master))),
            Arc::new(ConvertingHandler::new(master)),
        ])?;
        registry.validate_complete()?;
        Ok(registry)
    }

    /// Every [`EntityKind`] must have a handler.
    pub fn validate_complete(&self) -> Result<(), RegistryError> {
        match EntityKind::ALL.iter().find(|k| !self.handlers.contains_key(*k)) {
            Some(kind) => Err(RegistryError::MissingHandler(*kind)),
            None => Ok(()),
        }
    }

    pub fn get(&self, kind: EntityKind) -> Option<Arc<dyn RewardHandler>> {
        self.handlers.get(&kind).cloned()
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<EntityKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }
}
