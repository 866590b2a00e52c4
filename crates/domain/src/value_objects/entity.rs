//! Entity descriptors: the typed reward/cost unit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Closed set of entity kinds the reward pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Currency,
    Material,
    Character,
    Dragon,
    Wyrmprint,
    Weapon,
    SummonTicket,
    Title,
    FortPlant,
    DragonGift,
    /// Chat stamps. Not kept in player state; every copy converts.
    Stamp,
}

impl EntityKind {
    /// Every kind, in declaration order. Registry completeness is checked against this.
    pub const ALL: [EntityKind; 11] = [
        EntityKind::Currency,
        EntityKind::Material,
        EntityKind::Character,
        EntityKind::Dragon,
        EntityKind::Wyrmprint,
        EntityKind::Weapon,
        EntityKind::SummonTicket,
        EntityKind::Title,
        EntityKind::FortPlant,
        EntityKind::DragonGift,
        EntityKind::Stamp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Currency => "currency",
            Self::Material => "material",
            Self::Character => "character",
            Self::Dragon => "dragon",
            Self::Wyrmprint => "wyrmprint",
            Self::Weapon => "weapon",
            Self::SummonTicket => "summon_ticket",
            Self::Title => "title",
            Self::FortPlant => "fort_plant",
            Self::DragonGift => "dragon_gift",
            Self::Stamp => "stamp",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DomainError::parse(format!("Unknown entity kind: {}", s)))
    }
}

/// Well-known currency ids (the `id` of a `Currency` descriptor).
pub mod currency {
    pub const WYRMITE: i32 = 1;
    pub const RUPIES: i32 = 2;
    pub const MANA: i32 = 3;
    pub const ELDWATER: i32 = 4;
}

/// A typed reward or cost unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub id: i32,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_break_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipable_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buildup_count: Option<u32>,
}

impl EntityDescriptor {
    pub fn new(kind: EntityKind, id: i32, quantity: u32) -> Self {
        Self {
            kind,
            id,
            quantity,
            limit_break_count: None,
            equipable_count: None,
            buildup_count: None,
        }
    }

    pub fn currency(id: i32, quantity: u32) -> Self {
        Self::new(EntityKind::Currency, id, quantity)
    }

    pub fn with_limit_break_count(mut self, count: u32) -> Self {
        self.limit_break_count = Some(count);
        self
    }

    pub fn with_equipable_count(mut self, count: u32) -> Self {
        self.equipable_count = Some(count);
        self
    }

    pub fn with_buildup_count(mut self, count: u32) -> Self {
        self.buildup_count = Some(count);
        self
    }

    /// Same entity with a different quantity (modifiers preserved).
    pub fn with_quantity(&self, quantity: u32) -> Self {
        Self {
            quantity,
            ..self.clone()
        }
    }
}

impl fmt::Display for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} x{}", self.kind, self.id, self.quantity)
    }
}
