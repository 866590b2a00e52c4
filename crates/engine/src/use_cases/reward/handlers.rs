//! Per-kind reward handlers.
//!
//! Each handler applies one family of entity kinds to a player's persistent
//! state and reports what happened as a [`GrantOutcome`]. Handlers never
//! deduplicate: applying the same descriptor twice grants twice.

use std::sync::Arc;

use async_trait::async_trait;
use wyrmhold_domain::{
    EntityDescriptor, EntityKind, GrantOutcome, IgnoreReason, MasterData, OverflowPolicy,
};

use super::error::RewardError;
use crate::infrastructure::ports::{BoundedItem, ClockPort, PlayerTx, RepoError};

#[async_trait]
pub trait RewardHandler: Send + Sync {
    /// Kinds this handler owns. No two registered handlers may overlap.
    fn supported_kinds(&self) -> &'static [EntityKind];

    async fn apply(
        &self,
        tx: &mut dyn PlayerTx,
        descriptor: &EntityDescriptor,
    ) -> Result<GrantOutcome, RepoError>;

    /// Remove `descriptor.quantity` from the player. Only stackable kinds support it.
    async fn consume(
        &self,
        _tx: &mut dyn PlayerTx,
        descriptor: &EntityDescriptor,
    ) -> Result<(), RewardError> {
        Err(RewardError::ConsumptionUnsupported(descriptor.kind))
    }
}

/// `per_copy` scaled to `copies`.
fn scaled(per_copy: &EntityDescriptor, copies: u32) -> EntityDescriptor {
    per_copy.with_quantity(per_copy.quantity.saturating_mul(copies))
}

// =============================================================================
// Stackable
// =============================================================================

/// Counted entities: one row per `(player, kind, id)` holding a quantity.
pub struct StackableHandler;

impl StackableHandler {
    pub const KINDS: &'static [EntityKind] = &[
        EntityKind::Currency,
        EntityKind::Material,
        EntityKind::SummonTicket,
        EntityKind::DragonGift,
        EntityKind::FortPlant,
    ];
}

#[async_trait]
impl RewardHandler for StackableHandler {
    fn supported_kinds(&self) -> &'static [EntityKind] {
        Self::KINDS
    }

    async fn apply(
        &self,
        tx: &mut dyn PlayerTx,
        descriptor: &EntityDescriptor,
    ) -> Result<GrantOutcome, RepoError> {
        if descriptor.quantity == 0 {
            return Ok(GrantOutcome::ignored(IgnoreReason::ZeroQuantity));
        }

        let balance = tx
            .increment_stack(descriptor.kind, descriptor.id, descriptor.quantity)
            .await?;
        tracing::debug!(
            player_id = %tx.player(),
            entity = %descriptor,
            balance,
            "Stack incremented"
        );
        Ok(GrantOutcome::added(descriptor.quantity))
    }

    async fn consume(
        &self,
        tx: &mut dyn PlayerTx,
        descriptor: &EntityDescriptor,
    ) -> Result<(), RewardError> {
        let remaining = tx
            .decrement_stack(descriptor.kind, descriptor.id, descriptor.quantity)
            .await?;

        match remaining {
            Some(_) => Ok(()),
            None => {
                let available = tx.stack_quantity(descriptor.kind, descriptor.id).await?;
                Err(RewardError::InsufficientQuantity {
                    kind: descriptor.kind,
                    id: descriptor.id,
                    required: descriptor.quantity,
                    available,
                })
            }
        }
    }
}

// =============================================================================
// Unique ownership
// =============================================================================

/// Entities a player owns at most once. Duplicates become their substitute.
pub struct UniqueHandler {
    master: Arc<MasterData>,
    clock: Arc<dyn ClockPort>,
}

impl UniqueHandler {
    pub const KINDS: &'static [EntityKind] =
        &[EntityKind::Character, EntityKind::Dragon, EntityKind::Title];

    pub fn new(master: Arc<MasterData>, clock: Arc<dyn ClockPort>) -> Self {
        Self { master, clock }
    }
}

#[async_trait]
impl RewardHandler for UniqueHandler {
    fn supported_kinds(&self) -> &'static [EntityKind] {
        Self::KINDS
    }

    async fn apply(
        &self,
        tx: &mut dyn PlayerTx,
        descriptor: &EntityDescriptor,
    ) -> Result<GrantOutcome, RepoError> {
        if descriptor.quantity == 0 {
            return Ok(GrantOutcome::ignored(IgnoreReason::ZeroQuantity));
        }

        let kept = if tx.owns_unit(descriptor.kind, descriptor.id).await? {
            0
        } else {
            tx.insert_unit(descriptor.kind, descriptor.id, self.clock.now())
                .await?;
            1
        };
        let duplicates = descriptor.quantity - kept;
        if duplicates == 0 {
            return Ok(GrantOutcome::added(kept));
        }

        match self.master.substitute_for(descriptor.kind, descriptor.id) {
            Some(per_copy) => Ok(GrantOutcome::Converted {
                kept,
                converted: duplicates,
                to: scaled(per_copy, duplicates),
            }),
            None => {
                tracing::warn!(
                    player_id = %tx.player(),
                    entity = %descriptor,
                    "Duplicate unique entity has no substitute rule, dropping copies"
                );
                Ok(GrantOutcome::ignored(IgnoreReason::CapacityExceeded {
                    kept,
                    dropped: duplicates,
                }))
            }
        }
    }
}

// =============================================================================
// Bounded
// =============================================================================

/// Limit-breakable equipment. The first copy creates the row; each further
/// copy raises the limit break and the equipable count until the kind's caps,
/// then the kind's overflow policy decides what happens to the rest.
pub struct BoundedHandler {
    master: Arc<MasterData>,
}

impl BoundedHandler {
    pub const KINDS: &'static [EntityKind] = &[EntityKind::Wyrmprint, EntityKind::Weapon];

    pub fn new(master: Arc<MasterData>) -> Self {
        Self { master }
    }
}

#[async_trait]
impl RewardHandler for BoundedHandler {
    fn supported_kinds(&self) -> &'static [EntityKind] {
        Self::KINDS
    }

    async fn apply(
        &self,
        tx: &mut dyn PlayerTx,
        descriptor: &EntityDescriptor,
    ) -> Result<GrantOutcome, RepoError> {
        if descriptor.quantity == 0 {
            return Ok(GrantOutcome::ignored(IgnoreReason::ZeroQuantity));
        }

        let rule = self.master.capacity_for(descriptor.kind);
        let cap = rule.map_or(u32::MAX, |r| r.max_limit_break);
        let max_equipable = rule.map_or(u32::MAX, |r| r.max_equipable).max(1);
        let mut remaining = descriptor.quantity;

        let mut item = match tx.bounded_item(descriptor.kind, descriptor.id).await? {
            Some(item) => item,
            None => {
                remaining -= 1;
                BoundedItem {
                    kind: descriptor.kind,
                    id: descriptor.id,
                    limit_break_count: descriptor.limit_break_count.unwrap_or(0).min(cap),
                    equipable_count: descriptor
                        .equipable_count
                        .unwrap_or(1)
                        .clamp(1, max_equipable),
                    buildup_count: descriptor.buildup_count.unwrap_or(0),
                }
            }
        };

        let absorbed = remaining.min(cap.saturating_sub(item.limit_break_count));
        item.limit_break_count += absorbed;
        item.equipable_count = item.equipable_count.saturating_add(absorbed).min(max_equipable);
        remaining -= absorbed;
        let kept = descriptor.quantity - remaining;

        if kept > 0 {
            tx.upsert_bounded_item(&item).await?;
        }
        if remaining == 0 {
            return Ok(GrantOutcome::added(kept));
        }

        tracing::debug!(
            player_id = %tx.player(),
            entity = %descriptor,
            kept,
            overflow = remaining,
            "Bounded entity reached its cap"
        );
        match rule.map(|r| &r.overflow) {
            Some(OverflowPolicy::Convert { per_copy }) => Ok(GrantOutcome::Converted {
                kept,
                converted: remaining,
                to: scaled(per_copy, remaining),
            }),
            Some(OverflowPolicy::Drop) | None => {
                Ok(GrantOutcome::ignored(IgnoreReason::CapacityExceeded {
                    kept,
                    dropped: remaining,
                }))
            }
        }
    }
}

// =============================================================================
// Converted on receipt
// =============================================================================

/// Kinds the player never holds: every copy is replaced by its substitute.
pub struct ConvertingHandler {
    master: Arc<MasterData>,
}

impl ConvertingHandler {
    pub const KINDS: &'static [EntityKind] = &[EntityKind::Stamp];

    pub fn new(master: Arc<MasterData>) -> Self {
        Self { master }
    }
}

#[async_trait]
impl RewardHandler for ConvertingHandler {
    fn supported_kinds(&self) -> &'static [EntityKind] {
        Self::KINDS
    }

    async fn apply(
        &self,
        tx: &mut dyn PlayerTx,
        descriptor: &EntityDescriptor,
    ) -> Result<GrantOutcome, RepoError> {
        if descriptor.quantity == 0 {
            return Ok(GrantOutcome::ignored(IgnoreReason::ZeroQuantity));
        }

        match self.master.substitute_for(descriptor.kind, descriptor.id) {
            Some(per_copy) => Ok(GrantOutcome::Converted {
                kept: 0,
                converted: descriptor.quantity,
                to: scaled(per_copy, descriptor.quantity),
            }),
            None => {
                tracing::warn!(
                    player_id = %tx.player(),
                    entity = %descriptor,
                    "Entity has no substitute rule, dropping"
                );
                Ok(GrantOutcome::ignored(IgnoreReason::CapacityExceeded {
                    kept: 0,
                    dropped: descriptor.quantity,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::persistence::InMemoryPlayerStore;
    use crate::infrastructure::ports::UnitOfWork;
    use wyrmhold_domain::{currency, PlayerId};

    const PLAYER: PlayerId = PlayerId::new(10);

    async fn tx() -> Box<dyn PlayerTx> {
        InMemoryPlayerStore::new().begin(PLAYER).await.unwrap()
    }

    fn master() -> Arc<MasterData> {
        Arc::new(MasterData::default())
    }

    #[tokio::test]
    async fn stackable_accumulates() {
        let mut tx = tx().await;
        let handler = StackableHandler;
        let tickets = EntityDescriptor::new(EntityKind::SummonTicket, 10101, 5);

        assert_eq!(handler.apply(tx.as_mut(), &tickets).await.unwrap(), GrantOutcome::added(5));
        handler
            .apply(tx.as_mut(), &tickets.with_quantity(1))
            .await
            .unwrap();
        assert_eq!(tx.stack_quantity(EntityKind::SummonTicket, 10101).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn zero_quantity_is_ignored() {
        let mut tx = tx().await;
        let outcome = StackableHandler
            .apply(tx.as_mut(), &EntityDescriptor::currency(currency::RUPIES, 0))
            .await
            .unwrap();
        assert_eq!(outcome, GrantOutcome::ignored(IgnoreReason::ZeroQuantity));
    }

    #[tokio::test]
    async fn consume_requires_balance() {
        let mut tx = tx().await;
        let mana = EntityDescriptor::currency(currency::MANA, 300);
        StackableHandler.apply(tx.as_mut(), &mana).await.unwrap();

        let err = StackableHandler
            .consume(tx.as_mut(), &mana.with_quantity(500))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RewardError::InsufficientQuantity { available: 300, required: 500, .. }
        ));

        StackableHandler.consume(tx.as_mut(), &mana).await.unwrap();
        assert_eq!(tx.stack_quantity(EntityKind::Currency, currency::MANA).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unique_duplicate_converts_to_substitute() {
        let mut tx = tx().await;
        let handler = UniqueHandler::new(master(), Arc::new(SystemClock));
        let audric = EntityDescriptor::new(EntityKind::Character, 10140101, 1);

        assert_eq!(handler.apply(tx.as_mut(), &audric).await.unwrap(), GrantOutcome::added(1));
        let outcome = handler.apply(tx.as_mut(), &audric).await.unwrap();
        assert_eq!(
            outcome,
            GrantOutcome::Converted {
                kept: 0,
                converted: 1,
                to: EntityDescriptor::currency(currency::ELDWATER, 2200),
            }
        );
    }

    #[tokio::test]
    async fn unique_extra_copies_in_one_descriptor_convert() {
        let mut tx = tx().await;
        let handler = UniqueHandler::new(master(), Arc::new(SystemClock));
        let outcome = handler
            .apply(tx.as_mut(), &EntityDescriptor::new(EntityKind::Dragon, 20050102, 3))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            GrantOutcome::Converted {
                kept: 1,
                converted: 2,
                to: EntityDescriptor::currency(currency::RUPIES, 2000),
            }
        );
    }

    #[tokio::test]
    async fn bounded_first_copy_never_has_zero_equipable() {
        let mut tx = tx().await;
        let handler = BoundedHandler::new(master());
        let print =
            EntityDescriptor::new(EntityKind::Wyrmprint, 40050001, 1).with_equipable_count(0);

        handler.apply(tx.as_mut(), &print).await.unwrap();
        let item = tx.bounded_item(EntityKind::Wyrmprint, 40050001).await.unwrap().unwrap();
        assert_eq!(item.equipable_count, 1);
        assert_eq!(item.limit_break_count, 0);
    }

    #[tokio::test]
    async fn bounded_equipable_count_stops_at_the_cap() {
        let mut tx = tx().await;
        let handler = BoundedHandler::new(master());
        let print =
            EntityDescriptor::new(EntityKind::Wyrmprint, 40050002, 1).with_equipable_count(9);

        handler.apply(tx.as_mut(), &print).await.unwrap();
        let item = tx.bounded_item(EntityKind::Wyrmprint, 40050002).await.unwrap().unwrap();
        assert_eq!(item.equipable_count, 4);

        let weapon = EntityDescriptor::new(EntityKind::Weapon, 30129901, 2);
        handler.apply(tx.as_mut(), &weapon).await.unwrap();
        let item = tx.bounded_item(EntityKind::Weapon, 30129901).await.unwrap().unwrap();
        assert_eq!(item.equipable_count, 2);

        handler.apply(tx.as_mut(), &weapon.with_quantity(3)).await.unwrap();
        let item = tx.bounded_item(EntityKind::Weapon, 30129901).await.unwrap().unwrap();
        assert_eq!(item.limit_break_count, 4);
        assert_eq!(item.equipable_count, 4);
    }

    #[tokio::test]
    async fn bounded_overflow_converts_for_wyrmprints() {
        let mut tx = tx().await;
        let handler = BoundedHandler::new(master());
        let print = EntityDescriptor::new(EntityKind::Wyrmprint, 40050001, 7);

        let outcome = handler.apply(tx.as_mut(), &print).await.unwrap();
        assert_eq!(
            outcome,
            GrantOutcome::Converted {
                kept: 5,
                converted: 2,
                to: EntityDescriptor::currency(currency::ELDWATER, 1000),
            }
        );
        let item = tx.bounded_item(EntityKind::Wyrmprint, 40050001).await.unwrap().unwrap();
        assert_eq!(item.limit_break_count, 4);
    }

    #[tokio::test]
    async fn bounded_overflow_drops_for_weapons() {
        let mut tx = tx().await;
        let handler = BoundedHandler::new(master());
        let weapon =
            EntityDescriptor::new(EntityKind::Weapon, 30129901, 1).with_limit_break_count(4);

        handler.apply(tx.as_mut(), &weapon).await.unwrap();
        let outcome = handler.apply(tx.as_mut(), &weapon.with_quantity(2)).await.unwrap();
        assert_eq!(
            outcome,
            GrantOutcome::ignored(IgnoreReason::CapacityExceeded { kept: 0, dropped: 2 })
        );
    }

    #[tokio::test]
    async fn stamps_always_convert() {
        let mut tx = tx().await;
        let handler = ConvertingHandler::new(master());
        let outcome = handler
            .apply(tx.as_mut(), &EntityDescriptor::new(EntityKind::Stamp, 10001, 2))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            GrantOutcome::Converted {
                kept: 0,
                converted: 2,
                to: EntityDescriptor::currency(currency::WYRMITE, 50),
            }
        );
    }

    #[tokio::test]
    async fn unique_and_bounded_refuse_consumption() {
        let mut tx = tx().await;
        let handler = BoundedHandler::new(master());
        let result = handler
            .consume(tx.as_mut(), &EntityDescriptor::new(EntityKind::Weapon, 1, 1))
            .await;
        assert!(matches!(result, Err(RewardError::ConsumptionUnsupported(EntityKind::Weapon))));
    }
}
