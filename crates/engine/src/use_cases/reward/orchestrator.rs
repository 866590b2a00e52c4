//! Reward orchestrator: applies descriptor lists through the handler registry.

use std::sync::Arc;

use wyrmhold_domain::{EntityDescriptor, EntityKind, GrantOutcome, GrantResult, IgnoreReason};

use super::error::RewardError;
use super::handlers::RewardHandler;
use super::registry::RewardHandlerRegistry;
use crate::infrastructure::ports::PlayerTx;

/// Stateless dispatcher over the handler registry.
///
/// Works inside a caller-provided transaction so a grant can share one unit of
/// work with mission updates and other writes of the same action.
#[derive(Clone)]
pub struct RewardOrchestrator {
    registry: Arc<RewardHandlerRegistry>,
}

impl RewardOrchestrator {
    pub fn new(registry: Arc<RewardHandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Entity kinds the registry can grant, sorted.
    pub fn kinds(&self) -> Vec<EntityKind> {
        self.registry.kinds()
    }

    fn handler_for(
        &self,
        tx: &dyn PlayerTx,
        descriptor: &EntityDescriptor,
    ) -> Result<Arc<dyn RewardHandler>, RewardError> {
        self.registry.get(descriptor.kind).ok_or_else(|| {
            tracing::error!(
                player_id = %tx.player(),
                entity = %descriptor,
                "No reward handler registered for entity kind"
            );
            RewardError::UnsupportedEntityKind(descriptor.kind)
        })
    }

    /// Grant every descriptor in order.
    ///
    /// # Arguments
    /// * `tx` - The player's open transaction
    /// * `descriptors` - Entities to grant
    ///
    /// # Returns
    /// * `Ok(GrantResult)` - One outcome per descriptor, in input order, plus the
    ///   substitutes credited for conversions
    /// * `Err(RewardError)` - A kind without handler or a persistence failure;
    ///   the transaction must then be abandoned
    pub async fn grant(
        &self,
        tx: &mut dyn PlayerTx,
        descriptors: &[EntityDescriptor],
    ) -> Result<GrantResult, RewardError> {
        let mut result = GrantResult::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let handler = self.handler_for(tx, descriptor)?;
            let outcome = if descriptor.quantity == 0 {
                GrantOutcome::ignored(IgnoreReason::ZeroQuantity)
            } else {
                handler.apply(tx, descriptor).await?
            };

            if let Some(substitute) = outcome.substitute() {
                self.credit_substitute(tx, descriptor, substitute).await?;
            }
            result.push(descriptor.clone(), outcome);
        }

        debug_assert_eq!(result.len(), descriptors.len());
        tracing::info!(
            player_id = %tx.player(),
            granted = result.len(),
            converted = result.converted.len(),
            "Rewards granted"
        );
        Ok(result)
    }

    /// Substitutes are credited one level deep: a substitute that itself
    /// converts is not followed further.
    async fn credit_substitute(
        &self,
        tx: &mut dyn PlayerTx,
        original: &EntityDescriptor,
        substitute: &EntityDescriptor,
    ) -> Result<(), RewardError> {
        let handler = self.handler_for(tx, substitute)?;
        let outcome = handler.apply(tx, substitute).await?;
        if !outcome.is_added() {
            tracing::warn!(
                player_id = %tx.player(),
                original = %original,
                substitute = %substitute,
                ?outcome,
                "Conversion substitute was not fully credited"
            );
        }
        Ok(())
    }

    /// Remove every descriptor from the player, all or nothing.
    ///
    /// On error some decrements may already be applied to `tx`; the caller must
    /// drop the transaction instead of committing it.
    pub async fn consume(
        &self,
        tx: &mut dyn PlayerTx,
        descriptors: &[EntityDescriptor],
    ) -> Result<(), RewardError> {
        for descriptor in descriptors {
            let handler = self.handler_for(tx, descriptor)?;
            handler.consume(tx, descriptor).await?;
        }
        tracing::debug!(
            player_id = %tx.player(),
            consumed = descriptors.len(),
            "Entities consumed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::persistence::InMemoryPlayerStore;
    use crate::infrastructure::ports::UnitOfWork;
    use crate::use_cases::reward::handlers::StackableHandler;
    use wyrmhold_domain::{currency, MasterData, PlayerId};

    const PLAYER: PlayerId = PlayerId::new(3);
    const AUDRIC: i32 = 10140101;

    fn orchestrator() -> RewardOrchestrator {
        let registry =
            RewardHandlerRegistry::standard(Arc::new(MasterData::default()), Arc::new(SystemClock))
                .unwrap();
        RewardOrchestrator::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn grant_preserves_order_and_converts_on_rerun() {
        let store = InMemoryPlayerStore::new();
        let orchestrator = orchestrator();
        let rewards = vec![
            EntityDescriptor::currency(currency::WYRMITE, 25),
            EntityDescriptor::new(EntityKind::Character, AUDRIC, 1),
        ];

        let mut tx = store.begin(PLAYER).await.unwrap();
        let first = orchestrator.grant(tx.as_mut(), &rewards).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first.outcome(0), Some(&GrantOutcome::added(25)));
        assert_eq!(first.outcome(1), Some(&GrantOutcome::added(1)));
        assert!(first.converted.is_empty());

        let second = orchestrator.grant(tx.as_mut(), &rewards).await.unwrap();
        assert_eq!(second.outcome(0), Some(&GrantOutcome::added(25)));
        assert!(second.outcome(1).unwrap().is_converted());
        assert_eq!(
            second.converted,
            vec![EntityDescriptor::currency(currency::ELDWATER, 2200)]
        );

        assert_eq!(tx.stack_quantity(EntityKind::Currency, currency::WYRMITE).await.unwrap(), 50);
        assert_eq!(
            tx.stack_quantity(EntityKind::Currency, currency::ELDWATER).await.unwrap(),
            2200
        );
    }

    #[tokio::test]
    async fn stamp_reward_credits_wyrmite() {
        let store = InMemoryPlayerStore::new();
        let mut tx = store.begin(PLAYER).await.unwrap();
        let result = orchestrator()
            .grant(tx.as_mut(), &[EntityDescriptor::new(EntityKind::Stamp, 10001, 1)])
            .await
            .unwrap();

        assert_eq!(result.converted, vec![EntityDescriptor::currency(currency::WYRMITE, 25)]);
        assert_eq!(tx.stack_quantity(EntityKind::Currency, currency::WYRMITE).await.unwrap(), 25);
    }

    #[tokio::test]
    async fn same_id_twice_in_one_call_accumulates() {
        let store = InMemoryPlayerStore::new();
        let mut tx = store.begin(PLAYER).await.unwrap();
        let tickets = EntityDescriptor::new(EntityKind::SummonTicket, 10101, 5);

        orchestrator()
            .grant(tx.as_mut(), &[tickets.clone(), tickets.with_quantity(1)])
            .await
            .unwrap();
        assert_eq!(tx.stack_quantity(EntityKind::SummonTicket, 10101).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn unregistered_kind_is_an_error() {
        let registry = RewardHandlerRegistry::new(vec![Arc::new(StackableHandler)]).unwrap();
        let orchestrator = RewardOrchestrator::new(Arc::new(registry));
        let store = InMemoryPlayerStore::new();
        let mut tx = store.begin(PLAYER).await.unwrap();

        let result = orchestrator
            .grant(
                tx.as_mut(),
                &[
                    EntityDescriptor::currency(currency::RUPIES, 10),
                    EntityDescriptor::new(EntityKind::Weapon, 30129901, 1),
                ],
            )
            .await;
        assert!(matches!(
            result,
            Err(RewardError::UnsupportedEntityKind(EntityKind::Weapon))
        ));
    }

    #[tokio::test]
    async fn zero_quantity_is_reported_not_dropped() {
        let store = InMemoryPlayerStore::new();
        let mut tx = store.begin(PLAYER).await.unwrap();
        let result = orchestrator()
            .grant(tx.as_mut(), &[EntityDescriptor::new(EntityKind::Dragon, 20050102, 0)])
            .await
            .unwrap();
        assert_eq!(
            result.outcome(0),
            Some(&GrantOutcome::ignored(IgnoreReason::ZeroQuantity))
        );
        assert!(!tx.owns_unit(EntityKind::Dragon, 20050102).await.unwrap());
    }

    #[tokio::test]
    async fn consume_stops_at_first_shortfall() {
        let store = InMemoryPlayerStore::new();
        let orchestrator = orchestrator();
        let mut tx = store.begin(PLAYER).await.unwrap();
        orchestrator
            .grant(tx.as_mut(), &[EntityDescriptor::currency(currency::MANA, 100)])
            .await
            .unwrap();

        let result = orchestrator
            .consume(
                tx.as_mut(),
                &[
                    EntityDescriptor::currency(currency::MANA, 50),
                    EntityDescriptor::new(EntityKind::Material, 104001011, 1),
                ],
            )
            .await;
        assert!(matches!(result, Err(RewardError::InsufficientQuantity { .. })));
    }
}
