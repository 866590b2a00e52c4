//! Progression events
//!
//! Semantic gameplay events that drive mission progress and other cascading
//! consumers (tutorial flags). The set is closed: consumers subscribe by
//! [`ProgressionEventKind`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{EntityKind, QuestId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressionEvent {
    QuestStoryRead {
        story_id: i32,
    },
    QuestCleared {
        quest_id: QuestId,
        count: u32,
    },
    /// A unit or item was built up; `level` is the level reached afterwards.
    ItemBuildup {
        kind: EntityKind,
        id: i32,
        level: u32,
    },
    FortIncomeCollected {
        kind: EntityKind,
        quantity: u32,
    },
    TreasureTraded {
        trade_id: i32,
        count: u32,
    },
    ItemSummoned {
        count: u32,
    },
}

impl ProgressionEvent {
    pub fn kind(&self) -> ProgressionEventKind {
        match self {
            Self::QuestStoryRead { .. } => ProgressionEventKind::QuestStoryRead,
            Self::QuestCleared { .. } => ProgressionEventKind::QuestCleared,
            Self::ItemBuildup { .. } => ProgressionEventKind::ItemBuildup,
            Self::FortIncomeCollected { .. } => ProgressionEventKind::FortIncomeCollected,
            Self::TreasureTraded { .. } => ProgressionEventKind::TreasureTraded,
            Self::ItemSummoned { .. } => ProgressionEventKind::ItemSummoned,
        }
    }
}

/// Discriminant of [`ProgressionEvent`], used as the dispatch-table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionEventKind {
    QuestStoryRead,
    QuestCleared,
    ItemBuildup,
    FortIncomeCollected,
    TreasureTraded,
    ItemSummoned,
}

impl ProgressionEventKind {
    pub const ALL: [ProgressionEventKind; 6] = [
        ProgressionEventKind::QuestStoryRead,
        ProgressionEventKind::QuestCleared,
        ProgressionEventKind::ItemBuildup,
        ProgressionEventKind::FortIncomeCollected,
        ProgressionEventKind::TreasureTraded,
        ProgressionEventKind::ItemSummoned,
    ];
}

impl fmt::Display for ProgressionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::QuestStoryRead => "quest_story_read",
            Self::QuestCleared => "quest_cleared",
            Self::ItemBuildup => "item_buildup",
            Self::FortIncomeCollected => "fort_income_collected",
            Self::TreasureTraded => "treasure_traded",
            Self::ItemSummoned => "item_summoned",
        };
        f.write_str(name)
    }
}
