//! Grant outcomes reported back to the caller.

use serde::{Deserialize, Serialize};

use super::entity::EntityDescriptor;

/// Why a grant was (partly) not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IgnoreReason {
    ZeroQuantity,
    /// Bounded entity hit its cap and the kind's overflow policy is to drop.
    CapacityExceeded { kept: u32, dropped: u32 },
}

/// Business outcome of applying one descriptor. Never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GrantOutcome {
    Added {
        quantity: u32,
    },
    /// `kept` copies were added as-is, `converted` copies became `to`.
    Converted {
        kept: u32,
        converted: u32,
        to: EntityDescriptor,
    },
    Ignored {
        reason: IgnoreReason,
    },
}

impl GrantOutcome {
    pub fn added(quantity: u32) -> Self {
        Self::Added { quantity }
    }

    pub fn ignored(reason: IgnoreReason) -> Self {
        Self::Ignored { reason }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added { .. })
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, Self::Converted { .. })
    }

    /// Substitute entity to credit, if this outcome is a conversion.
    pub fn substitute(&self) -> Option<&EntityDescriptor> {
        match self {
            Self::Converted { to, .. } => Some(to),
            _ => None,
        }
    }
}

/// One descriptor with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantedEntity {
    pub entity: EntityDescriptor,
    pub outcome: GrantOutcome,
}

/// Result of one grant call: one outcome per input descriptor, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantResult {
    pub outcomes: Vec<GrantedEntity>,
    /// Substitutes actually credited because of conversions.
    pub converted: Vec<EntityDescriptor>,
}

impl GrantResult {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            outcomes: Vec::with_capacity(capacity),
            converted: Vec::new(),
        }
    }

    pub fn push(&mut self, entity: EntityDescriptor, outcome: GrantOutcome) {
        if let Some(to) = outcome.substitute() {
            self.converted.push(to.clone());
        }
        self.outcomes.push(GrantedEntity { entity, outcome });
    }

    /// Append another result, keeping order.
    pub fn extend(&mut self, other: GrantResult) {
        self.outcomes.extend(other.outcomes);
        self.converted.extend(other.converted);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcome(&self, index: usize) -> Option<&GrantOutcome> {
        self.outcomes.get(index).map(|g| &g.outcome)
    }
}
