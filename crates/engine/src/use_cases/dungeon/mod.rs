//! Dungeon run sessions.
//!
//! A started run is serialized into the session cache under a fresh key and
//! stays readable until its TTL passes. Sessions are never updated in place;
//! starting again issues a new key.

use std::sync::Arc;
use std::time::Duration;

use wyrmhold_domain::{DungeonKey, DungeonSession};

use crate::infrastructure::ports::{CacheError, RandomPort, SessionCachePort};

const KEY_PREFIX: &str = "dungeon";

#[derive(Debug, thiserror::Error)]
pub enum DungeonError {
    /// Absent or expired; the client has to start the run again.
    #[error("Dungeon session not found: {0}")]
    NotFound(DungeonKey),
    #[error("Dungeon session could not be encoded: {0}")]
    Serialization(String),
    #[error("Session cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Session store for active dungeon runs.
pub struct DungeonStore {
    cache: Arc<dyn SessionCachePort>,
    random: Arc<dyn RandomPort>,
    expiry: Duration,
}

impl DungeonStore {
    pub fn new(
        cache: Arc<dyn SessionCachePort>,
        random: Arc<dyn RandomPort>,
        expiry: Duration,
    ) -> Self {
        Self {
            cache,
            random,
            expiry,
        }
    }

    fn cache_key(key: &DungeonKey) -> String {
        format!("{}:{}", KEY_PREFIX, key)
    }

    /// Store a new run and return the key it can be fetched with.
    pub async fn start(&self, session: &DungeonSession) -> Result<DungeonKey, DungeonError> {
        let key = DungeonKey::new(self.random.gen_uuid().to_string());
        let bytes =
            serde_json::to_vec(session).map_err(|e| DungeonError::Serialization(e.to_string()))?;

        self.cache
            .set(&Self::cache_key(&key), bytes, self.expiry)
            .await?;

        tracing::debug!(
            dungeon_key = %key,
            quest_id = %session.quest.id,
            party_size = session.party.len(),
            "Dungeon session started"
        );
        Ok(key)
    }

    /// Fetch a run. Expired and unknown keys are both `NotFound`.
    pub async fn get(&self, key: &DungeonKey) -> Result<DungeonSession, DungeonError> {
        let bytes = self
            .cache
            .get(&Self::cache_key(key))
            .await?
            .ok_or_else(|| DungeonError::NotFound(key.clone()))?;

        serde_json::from_slice(&bytes).map_err(|e| DungeonError::Serialization(e.to_string()))
    }
}
