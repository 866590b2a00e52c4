//! Master data: static game-design tables.
//!
//! The engine loads these once at startup and never mutates them afterwards.
//! This module only defines the shapes, the lookups and the predicate logic;
//! file loading lives in the engine.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::mission::{MissionCategory, ProgressMode};
use crate::events::ProgressionEvent;
use crate::value_objects::entity::{currency, EntityDescriptor, EntityKind};
use crate::{DomainError, MissionId, QuestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    None,
    Flame,
    Water,
    Wind,
    Light,
    Shadow,
}

/// Quest attributes used by completion predicates and carried in dungeon sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestData {
    pub id: QuestId,
    pub group_id: i32,
    pub element: Element,
    pub difficulty: u32,
    #[serde(default)]
    pub pay_stamina: u32,
    #[serde(default)]
    pub can_play_co_op: bool,
}

/// Condition a progression event must satisfy to count towards a mission.
/// `None` fields match anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompletionPredicate {
    ReadQuestStory {
        #[serde(default)]
        story_id: Option<i32>,
    },
    ClearQuest {
        #[serde(default)]
        quest_id: Option<QuestId>,
        #[serde(default)]
        quest_group_id: Option<i32>,
        #[serde(default)]
        element: Option<Element>,
        #[serde(default)]
        min_difficulty: Option<u32>,
    },
    BuildupItem {
        #[serde(default)]
        kind: Option<EntityKind>,
        #[serde(default)]
        id: Option<i32>,
    },
    /// Raise a unit to a level; overleveling satisfies it too.
    ReachItemLevel {
        kind: EntityKind,
        #[serde(default)]
        id: Option<i32>,
    },
    CollectFortIncome {
        #[serde(default)]
        kind: Option<EntityKind>,
    },
    TradeTreasure {
        #[serde(default)]
        trade_id: Option<i32>,
    },
    SummonItem,
}

fn matches_opt<T: PartialEq>(expected: &Option<T>, actual: &T) -> bool {
    expected.as_ref().map_or(true, |e| e == actual)
}

impl CompletionPredicate {
    pub fn progress_mode(&self) -> ProgressMode {
        match self {
            Self::ReachItemLevel { .. } => ProgressMode::Reach,
            _ => ProgressMode::Accumulate,
        }
    }

    /// Amount this event contributes, or `None` if it doesn't match.
    ///
    /// `quest` is the master-data row of the cleared quest, when the event is a
    /// quest clear; attribute filters fail closed when it is missing.
    pub fn evaluate(&self, event: &ProgressionEvent, quest: Option<&QuestData>) -> Option<u32> {
        match (self, event) {
            (
                Self::ReadQuestStory { story_id },
                ProgressionEvent::QuestStoryRead { story_id: read },
            ) => matches_opt(story_id, read).then_some(1),
            (
                Self::ClearQuest {
                    quest_id,
                    quest_group_id,
                    element,
                    min_difficulty,
                },
                ProgressionEvent::QuestCleared {
                    quest_id: cleared,
                    count,
                },
            ) => {
                if !matches_opt(quest_id, cleared) {
                    return None;
                }
                let needs_attributes =
                    quest_group_id.is_some() || element.is_some() || min_difficulty.is_some();
                if needs_attributes {
                    let quest = quest?;
                    if !matches_opt(quest_group_id, &quest.group_id)
                        || !matches_opt(element, &quest.element)
                        || min_difficulty.is_some_and(|min| quest.difficulty < min)
                    {
                        return None;
                    }
                }
                Some(*count)
            }
            (
                Self::BuildupItem { kind, id },
                ProgressionEvent::ItemBuildup { kind: k, id: i, .. },
            ) => (matches_opt(kind, k) && matches_opt(id, i)).then_some(1),
            (
                Self::ReachItemLevel { kind, id },
                ProgressionEvent::ItemBuildup {
                    kind: k,
                    id: i,
                    level,
                },
            ) => (kind == k && matches_opt(id, i)).then_some(*level),
            (
                Self::CollectFortIncome { kind },
                ProgressionEvent::FortIncomeCollected { kind: k, .. },
            ) => matches_opt(kind, k).then_some(1),
            (
                Self::TradeTreasure { trade_id },
                ProgressionEvent::TreasureTraded { trade_id: t, count },
            ) => matches_opt(trade_id, t).then_some(*count),
            (Self::SummonItem, ProgressionEvent::ItemSummoned { count }) => Some(*count),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionDefinition {
    pub id: MissionId,
    pub category: MissionCategory,
    #[serde(default)]
    pub group_id: Option<i32>,
    pub threshold: u32,
    pub predicate: CompletionPredicate,
    #[serde(default)]
    pub rewards: Vec<EntityDescriptor>,
    #[serde(default)]
    pub window: Option<MissionWindow>,
}

/// Payout credited per duplicate copy of a unique-ownership entity.
/// `id: None` applies to every entity of the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstituteRule {
    pub kind: EntityKind,
    #[serde(default)]
    pub id: Option<i32>,
    pub per_copy: EntityDescriptor,
}

impl SubstituteRule {
    pub fn defaults() -> Vec<SubstituteRule> {
        vec![
            SubstituteRule {
                kind: EntityKind::Character,
                id: None,
                per_copy: EntityDescriptor::currency(currency::ELDWATER, 2200),
            },
            SubstituteRule {
                kind: EntityKind::Dragon,
                id: None,
                per_copy: EntityDescriptor::currency(currency::RUPIES, 1000),
            },
            SubstituteRule {
                kind: EntityKind::Title,
                id: None,
                per_copy: EntityDescriptor::currency(currency::WYRMITE, 25),
            },
            SubstituteRule {
                kind: EntityKind::Stamp,
                id: None,
                per_copy: EntityDescriptor::currency(currency::WYRMITE, 25),
            },
        ]
    }
}

/// What happens to copies of a bounded entity beyond its cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum OverflowPolicy {
    Drop,
    Convert { per_copy: EntityDescriptor },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityRule {
    pub kind: EntityKind,
    pub max_limit_break: u32,
    pub max_equipable: u32,
    pub overflow: OverflowPolicy,
}

impl CapacityRule {
    pub fn defaults() -> Vec<CapacityRule> {
        vec![
            CapacityRule {
                kind: EntityKind::Wyrmprint,
                max_limit_break: 4,
                max_equipable: 4,
                overflow: OverflowPolicy::Convert {
                    per_copy: EntityDescriptor::currency(currency::ELDWATER, 500),
                },
            },
            CapacityRule {
                kind: EntityKind::Weapon,
                max_limit_break: 4,
                max_equipable: 4,
                overflow: OverflowPolicy::Drop,
            },
        ]
    }
}

/// Tutorial flag set the first time a story is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorialTrigger {
    pub story_id: i32,
    pub flag_id: i32,
}

/// On-disk layout of the master-data file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterDataFile {
    #[serde(default)]
    pub quests: Vec<QuestData>,
    #[serde(default)]
    pub missions: Vec<MissionDefinition>,
    #[serde(default)]
    pub substitutes: Option<Vec<SubstituteRule>>,
    #[serde(default)]
    pub capacities: Option<Vec<CapacityRule>>,
    #[serde(default)]
    pub tutorial_triggers: Vec<TutorialTrigger>,
}

/// Indexed, validated master data.
#[derive(Debug, Clone)]
pub struct MasterData {
    quests: HashMap<QuestId, QuestData>,
    missions: HashMap<MissionId, MissionDefinition>,
    substitutes: Vec<SubstituteRule>,
    capacities: HashMap<EntityKind, CapacityRule>,
    tutorial_triggers: Vec<TutorialTrigger>,
}

impl Default for MasterData {
    fn default() -> Self {
        Self {
            quests: HashMap::new(),
            missions: HashMap::new(),
            substitutes: SubstituteRule::defaults(),
            capacities: CapacityRule::defaults()
                .into_iter()
                .map(|rule| (rule.kind, rule))
                .collect(),
            tutorial_triggers: Vec::new(),
        }
    }
}

impl MasterData {
    pub fn from_file(file: MasterDataFile) -> Result<Self, DomainError> {
        let mut quests = HashMap::with_capacity(file.quests.len());
        for quest in file.quests {
            let id = quest.id;
            if quests.insert(id, quest).is_some() {
                return Err(DomainError::validation(format!("duplicate quest id {}", id)));
            }
        }

        let mut missions = HashMap::with_capacity(file.missions.len());
        for mission in file.missions {
            validate_mission(&mission)?;
            let id = mission.id;
            if missions.insert(id, mission).is_some() {
                return Err(DomainError::validation(format!("duplicate mission id {}", id)));
            }
        }

        let mut capacities = HashMap::new();
        for rule in file.capacities.unwrap_or_else(CapacityRule::defaults) {
            let kind = rule.kind;
            if capacities.insert(kind, rule).is_some() {
                return Err(DomainError::validation(format!(
                    "duplicate capacity rule for {}",
                    kind
                )));
            }
        }

        Ok(Self {
            quests,
            missions,
            substitutes: file.substitutes.unwrap_or_else(SubstituteRule::defaults),
            capacities,
            tutorial_triggers: file.tutorial_triggers,
        })
    }

    pub fn quest(&self, id: QuestId) -> Option<&QuestData> {
        self.quests.get(&id)
    }

    pub fn mission(&self, id: MissionId) -> Option<&MissionDefinition> {
        self.missions.get(&id)
    }

    pub fn missions(&self) -> impl Iterator<Item = &MissionDefinition> {
        self.missions.values()
    }

    /// Missions of a category and group, ordered by id.
    pub fn missions_in_group(
        &self,
        category: MissionCategory,
        group_id: i32,
    ) -> Vec<&MissionDefinition> {
        let mut found: Vec<_> = self
            .missions
            .values()
            .filter(|m| m.category == category && m.group_id == Some(group_id))
            .collect();
        found.sort_by_key(|m| m.id);
        found
    }

    /// Missions of a category, ordered by id.
    pub fn missions_in_category(&self, category: MissionCategory) -> Vec<&MissionDefinition> {
        let mut found: Vec<_> = self
            .missions
            .values()
            .filter(|m| m.category == category)
            .collect();
        found.sort_by_key(|m| m.id);
        found
    }

    /// Distinct group ids defined for a category, ascending.
    pub fn groups(&self, category: MissionCategory) -> BTreeSet<i32> {
        self.missions
            .values()
            .filter(|m| m.category == category)
            .filter_map(|m| m.group_id)
            .collect()
    }

    /// Per-copy substitute for a duplicate unique entity. An id-specific rule wins
    /// over a kind-wide one.
    pub fn substitute_for(&self, kind: EntityKind, id: i32) -> Option<&EntityDescriptor> {
        self.substitutes
            .iter()
            .find(|r| r.kind == kind && r.id == Some(id))
            .or_else(|| self.substitutes.iter().find(|r| r.kind == kind && r.id.is_none()))
            .map(|r| &r.per_copy)
    }

    pub fn capacity_for(&self, kind: EntityKind) -> Option<&CapacityRule> {
        self.capacities.get(&kind)
    }

    /// Tutorial flags unlocked by reading `story_id`.
    pub fn tutorial_flags_for_story(&self, story_id: i32) -> impl Iterator<Item = i32> + '_ {
        self.tutorial_triggers
            .iter()
            .filter(move |t| t.story_id == story_id)
            .map(|t| t.flag_id)
    }
}

fn validate_mission(mission: &MissionDefinition) -> Result<(), DomainError> {
    if mission.category.is_grouped() && mission.group_id.is_none() {
        return Err(DomainError::validation(format!(
            "{} mission {} has no group",
            mission.category, mission.id
        )));
    }
    if let Some(window) = mission.window {
        if window.end <= window.start {
            return Err(DomainError::validation(format!(
                "mission {} window ends before it starts",
                mission.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quest(id: i32, element: Element, difficulty: u32) -> QuestData {
        QuestData {
            id: QuestId::new(id),
            group_id: 100010,
            element,
            difficulty,
            pay_stamina: 10,
            can_play_co_op: true,
        }
    }

    #[test]
    fn clear_quest_filters_on_attributes() {
        let predicate = CompletionPredicate::ClearQuest {
            quest_id: None,
            quest_group_id: None,
            element: Some(Element::Flame),
            min_difficulty: Some(2),
        };
        let event = ProgressionEvent::QuestCleared {
            quest_id: QuestId::new(100010103),
            count: 1,
        };

        assert_eq!(
            predicate.evaluate(&event, Some(&quest(100010103, Element::Flame, 3))),
            Some(1)
        );
        assert_eq!(
            predicate.evaluate(&event, Some(&quest(100010103, Element::Water, 3))),
            None
        );
        assert_eq!(
            predicate.evaluate(&event, Some(&quest(100010103, Element::Flame, 1))),
            None
        );
        assert_eq!(predicate.evaluate(&event, None), None);
    }

    #[test]
    fn unfiltered_clear_counts_without_quest_data() {
        let predicate = CompletionPredicate::ClearQuest {
            quest_id: None,
            quest_group_id: None,
            element: None,
            min_difficulty: None,
        };
        let event = ProgressionEvent::QuestCleared {
            quest_id: QuestId::new(1),
            count: 3,
        };
        assert_eq!(predicate.evaluate(&event, None), Some(3));
    }

    #[test]
    fn reach_level_yields_level() {
        let predicate = CompletionPredicate::ReachItemLevel {
            kind: EntityKind::Dragon,
            id: None,
        };
        let event = ProgressionEvent::ItemBuildup {
            kind: EntityKind::Dragon,
            id: 20050102,
            level: 12,
        };
        assert_eq!(predicate.evaluate(&event, None), Some(12));
        assert_eq!(predicate.progress_mode(), ProgressMode::Reach);
    }

    #[test]
    fn mismatched_event_type_never_matches() {
        let predicate = CompletionPredicate::SummonItem;
        let event = ProgressionEvent::QuestStoryRead { story_id: 1000106 };
        assert_eq!(predicate.evaluate(&event, None), None);
    }

    #[test]
    fn id_specific_substitute_wins() {
        let mut file = MasterDataFile::default();
        let mut rules = SubstituteRule::defaults();
        rules.push(SubstituteRule {
            kind: EntityKind::Character,
            id: Some(10150101),
            per_copy: EntityDescriptor::currency(currency::ELDWATER, 8500),
        });
        file.substitutes = Some(rules);
        let master = MasterData::from_file(file).unwrap();

        assert_eq!(
            master.substitute_for(EntityKind::Character, 10150101).unwrap().quantity,
            8500
        );
        assert_eq!(
            master.substitute_for(EntityKind::Character, 10140101).unwrap().quantity,
            2200
        );
        assert!(master.substitute_for(EntityKind::Material, 1).is_none());
    }

    #[test]
    fn grouped_mission_without_group_is_rejected() {
        let file = MasterDataFile {
            missions: vec![MissionDefinition {
                id: MissionId::new(100100),
                category: MissionCategory::Drill,
                group_id: None,
                threshold: 1,
                predicate: CompletionPredicate::SummonItem,
                rewards: vec![],
                window: None,
            }],
            ..Default::default()
        };
        assert!(matches!(
            MasterData::from_file(file),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn master_data_file_parses_from_json() {
        let json = r#"{
            "quests": [{"id": 100010103, "groupId": 100010, "element": "flame", "difficulty": 1}],
            "missions": [{
                "id": 100200, "category": "drill", "groupId": 1, "threshold": 1,
                "predicate": {"type": "read_quest_story", "story_id": 1000106},
                "rewards": [{"kind": "currency", "id": 1, "quantity": 25}]
            }]
        }"#;
        let file: MasterDataFile = serde_json::from_str(json).unwrap();
        let master = MasterData::from_file(file).unwrap();

        assert!(master.quest(QuestId::new(100010103)).is_some());
        assert_eq!(master.missions_in_group(MissionCategory::Drill, 1).len(), 1);
        assert!(master.capacity_for(EntityKind::Wyrmprint).is_some());
    }
}
