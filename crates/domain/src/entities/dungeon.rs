//! Dungeon run snapshot, held by the session store for the duration of a quest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::master_data::QuestData;
use crate::DomainError;

/// One unit slot of the party a run was started with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartySlot {
    pub unit_no: u32,
    pub character_id: i32,
    #[serde(default)]
    pub dragon_key_id: Option<u64>,
    #[serde(default)]
    pub weapon_body_id: Option<i32>,
    #[serde(default)]
    pub wyrmprint_ids: Vec<i32>,
}

impl PartySlot {
    pub fn new(unit_no: u32, character_id: i32) -> Self {
        Self {
            unit_no,
            character_id,
            dragon_key_id: None,
            weapon_body_id: None,
            wyrmprint_ids: Vec::new(),
        }
    }

    pub fn with_weapon(mut self, weapon_body_id: i32) -> Self {
        self.weapon_body_id = Some(weapon_body_id);
        self
    }
}

/// Transient state of an active quest run.
///
/// Immutable once started: starting again produces a new session under a new key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DungeonSession {
    pub quest: QuestData,
    pub party: Vec<PartySlot>,
    /// Saved party numbers the run was started from.
    #[serde(default)]
    pub party_numbers: Vec<u32>,
    #[serde(default)]
    pub is_multi: bool,
    pub created_at: DateTime<Utc>,
}

impl DungeonSession {
    pub fn new(
        quest: QuestData,
        party: Vec<PartySlot>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if party.is_empty() {
            return Err(DomainError::validation("a dungeon run needs at least one party slot"));
        }
        Ok(Self {
            quest,
            party,
            party_numbers: Vec::new(),
            is_multi: false,
            created_at,
        })
    }

    pub fn with_party_numbers(mut self, numbers: Vec<u32>) -> Self {
        self.party_numbers = numbers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master_data::Element;
    use crate::QuestId;

    fn quest() -> QuestData {
        QuestData {
            id: QuestId::new(100010103),
            group_id: 100010,
            element: Element::Flame,
            difficulty: 1,
            pay_stamina: 0,
            can_play_co_op: false,
        }
    }

    #[test]
    fn empty_party_is_rejected() {
        assert!(DungeonSession::new(quest(), vec![], Utc::now()).is_err());
    }

    #[test]
    fn session_survives_json() {
        let session = DungeonSession::new(
            quest(),
            vec![PartySlot::new(1, 10140101).with_weapon(30129901)],
            Utc::now(),
        )
        .unwrap()
        .with_party_numbers(vec![1]);

        let bytes = serde_json::to_vec(&session).unwrap();
        let back: DungeonSession = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, session);
    }
}
