//! Event dispatch table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use wyrmhold_domain::{MissionNotices, ProgressionEvent, ProgressionEventKind};

use super::error::CascadeError;
use crate::infrastructure::ports::PlayerTx;

/// Side effects collected while a batch of events cascades.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeEffects {
    pub notices: MissionNotices,
    /// Tutorial flags that were newly set, in the order they were set.
    pub tutorial_flags: Vec<i32>,
}

/// Reacts to progression events inside the caller's transaction.
#[async_trait]
pub trait ProgressionConsumer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Event kinds this consumer is dispatched for.
    fn subscriptions(&self) -> &'static [ProgressionEventKind];

    async fn on_event(
        &self,
        tx: &mut dyn PlayerTx,
        event: &ProgressionEvent,
        effects: &mut CascadeEffects,
    ) -> Result<(), CascadeError>;
}

/// Synchronous, in-process fan-out keyed by [`ProgressionEventKind`].
///
/// Consumers run in registration order. A consumer error aborts the cascade;
/// the caller then drops the transaction so nothing becomes visible.
#[derive(Default)]
pub struct ProgressionCascade {
    table: HashMap<ProgressionEventKind, Vec<Arc<dyn ProgressionConsumer>>>,
}

impl ProgressionCascade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, consumer: Arc<dyn ProgressionConsumer>) {
        for kind in consumer.subscriptions() {
            self.table.entry(*kind).or_default().push(consumer.clone());
        }
        tracing::debug!(
            consumer = consumer.name(),
            subscriptions = consumer.subscriptions().len(),
            "Progression consumer registered"
        );
    }

    pub fn with(mut self, consumer: Arc<dyn ProgressionConsumer>) -> Self {
        self.register(consumer);
        self
    }

    pub fn consumers_for(&self, kind: ProgressionEventKind) -> &[Arc<dyn ProgressionConsumer>] {
        self.table.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Dispatch every event, in order, to the consumers subscribed to its kind.
    pub async fn dispatch(
        &self,
        tx: &mut dyn PlayerTx,
        events: &[ProgressionEvent],
    ) -> Result<CascadeEffects, CascadeError> {
        let mut effects = CascadeEffects::default();
        for event in events {
            let kind = event.kind();
            for consumer in self.consumers_for(kind) {
                tracing::trace!(
                    consumer = consumer.name(),
                    event = %kind,
                    "Dispatching progression event"
                );
                consumer.on_event(tx, event, &mut effects).await?;
            }
        }
        Ok(effects)
    }
}
