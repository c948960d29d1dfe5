//! Journey resolution with last-call-wins supersession
//!
//! At most one resolution is honored per session at a time. Each `resolve`
//! call bumps a generation counter and spawns the lookup; the settlement
//! is delivered on the session's event channel tagged with its generation.
//! The session consults `is_current` and silently discards settlements of
//! superseded calls, even when they arrive out of order - a slow manual
//! lookup can never clobber a newer camera-triggered one, or vice versa.

use crate::domain::journey::ProductIdentifier;
use crate::io::repository::JourneyStore;
use crate::services::session::SessionEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub struct JourneyResolver {
    store: Arc<dyn JourneyStore>,
    events: mpsc::Sender<SessionEvent>,
    generation: u64,
}

impl JourneyResolver {
    pub fn new(store: Arc<dyn JourneyStore>, events: mpsc::Sender<SessionEvent>) -> Self {
        Self { store, events, generation: 0 }
    }

    /// Issue a lookup, superseding any resolution still in flight.
    /// Returns the generation assigned to this call.
    pub fn resolve(&mut self, id: ProductIdentifier) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        let store = Arc::clone(&self.store);
        let events = self.events.clone();

        debug!(id = %id, generation = %generation, "journey_resolve_issued");
        tokio::spawn(async move {
            let result = store.lookup(&id).await;
            if events
                .send(SessionEvent::LookupSettled { generation, id, result })
                .await
                .is_err()
            {
                // Session already torn down; the settlement has no consumer
                debug!(generation = %generation, "session_event_channel_closed");
            }
        });
        generation
    }

    /// Whether a settlement of this generation is still the newest call
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::journey::{ProductInfo, ProductJourney};
    use crate::io::repository::{StaticJourneyStore, StoreError};
    use async_trait::async_trait;
    use smallvec::smallvec;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Store with a configurable per-identifier settle delay
    struct DelayedStore {
        inner: StaticJourneyStore,
        delays: HashMap<String, Duration>,
    }

    #[async_trait]
    impl JourneyStore for DelayedStore {
        async fn lookup(
            &self,
            id: &ProductIdentifier,
        ) -> Result<Option<ProductJourney>, StoreError> {
            if let Some(delay) = self.delays.get(id.as_str()) {
                tokio::time::sleep(*delay).await;
            }
            self.inner.lookup(id).await
        }
    }

    fn journey(name: &str) -> ProductJourney {
        ProductJourney {
            product: ProductInfo { name: name.to_string(), image_ref: String::new() },
            steps: smallvec![],
        }
    }

    fn delayed_store(entries: &[(&str, &str, u64)]) -> Arc<DelayedStore> {
        let mut inner = StaticJourneyStore::new();
        let mut delays = HashMap::new();
        for (id, name, delay_ms) in entries {
            inner.insert(ProductIdentifier::from(*id), journey(name));
            delays.insert((*id).to_string(), Duration::from_millis(*delay_ms));
        }
        Arc::new(DelayedStore { inner, delays })
    }

    #[tokio::test]
    async fn test_later_call_supersedes_earlier() {
        let store = delayed_store(&[("SLOW-1", "Slow", 80), ("FAST-2", "Fast", 5)]);
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let mut resolver = JourneyResolver::new(store, events_tx);

        let slow = resolver.resolve(ProductIdentifier::from("SLOW-1"));
        let fast = resolver.resolve(ProductIdentifier::from("FAST-2"));

        assert!(!resolver.is_current(slow));
        assert!(resolver.is_current(fast));

        // The later-issued call settles first
        let SessionEvent::LookupSettled { generation, result, .. } =
            events_rx.recv().await.unwrap();
        assert_eq!(generation, fast);
        assert_eq!(result.unwrap().unwrap().product.name, "Fast");

        // The superseded call still settles, out of order, and is stale
        let SessionEvent::LookupSettled { generation, .. } = events_rx.recv().await.unwrap();
        assert_eq!(generation, slow);
        assert!(!resolver.is_current(generation));
    }

    #[tokio::test]
    async fn test_generations_are_monotonic() {
        let store = Arc::new(StaticJourneyStore::new());
        let (events_tx, _events_rx) = mpsc::channel(8);
        let mut resolver = JourneyResolver::new(store, events_tx);

        let first = resolver.resolve(ProductIdentifier::from("A"));
        let second = resolver.resolve(ProductIdentifier::from("B"));
        let third = resolver.resolve(ProductIdentifier::from("C"));

        assert!(first < second && second < third);
        assert!(resolver.is_current(third));
        assert!(!resolver.is_current(second));
    }

    #[tokio::test]
    async fn test_miss_settles_as_none() {
        let store = Arc::new(StaticJourneyStore::with_demo_journeys());
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let mut resolver = JourneyResolver::new(store, events_tx);

        resolver.resolve(ProductIdentifier::from("PROD-999"));

        let SessionEvent::LookupSettled { result, .. } = events_rx.recv().await.unwrap();
        assert!(matches!(result, Ok(None)));
    }
}
