//! Journey lookup stores
//!
//! `JourneyStore` is the seam to the external journey repository: lookups
//! are asynchronous, idempotent and side-effect free. Absence of a journey
//! is a valid outcome (`Ok(None)`), kept distinct from transport failure
//! (`Err(StoreError)`), which the session surfaces as retryable.

use crate::domain::journey::{
    JourneyStep, ProductIdentifier, ProductInfo, ProductJourney, StepStatus,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use smallvec::smallvec;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lookup failure, as opposed to a clean "not found"
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("journey service unreachable: {0}")]
    Transport(String),
    #[error("journey service returned status {0}")]
    Status(u16),
    #[error("malformed journey payload: {0}")]
    Decode(String),
}

/// External journey repository interface
#[async_trait]
pub trait JourneyStore: Send + Sync {
    async fn lookup(
        &self,
        id: &ProductIdentifier,
    ) -> Result<Option<ProductJourney>, StoreError>;
}

/// In-memory store seeded at construction. Backs the demo binary and
/// tests; the optional delay mimics a remote lookup.
pub struct StaticJourneyStore {
    journeys: HashMap<ProductIdentifier, ProductJourney>,
    lookup_delay: Duration,
}

impl StaticJourneyStore {
    pub fn new() -> Self {
        Self { journeys: HashMap::new(), lookup_delay: Duration::ZERO }
    }

    /// Store seeded with the demo journey for "PROD-001"
    pub fn with_demo_journeys() -> Self {
        let mut store = Self::new();
        store.insert(ProductIdentifier::from("PROD-001"), demo_tomato_journey());
        store
    }

    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = delay;
        self
    }

    pub fn insert(&mut self, id: ProductIdentifier, journey: ProductJourney) {
        self.journeys.insert(id, journey);
    }
}

impl Default for StaticJourneyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JourneyStore for StaticJourneyStore {
    async fn lookup(
        &self,
        id: &ProductIdentifier,
    ) -> Result<Option<ProductJourney>, StoreError> {
        if !self.lookup_delay.is_zero() {
            tokio::time::sleep(self.lookup_delay).await;
        }

        let journey = self.journeys.get(id).cloned();
        debug!(id = %id, found = journey.is_some(), "journey_lookup");
        Ok(journey)
    }
}

/// Client of a remote journey service.
///
/// Contract: GET `{base}/journeys/{id}` returns a JSON `ProductJourney`;
/// 404 means the identifier is unknown (a clean miss, not a failure).
pub struct HttpJourneyStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpJourneyStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .http1_only()
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client })
    }

    fn journey_url(&self, id: &ProductIdentifier) -> String {
        format!("{}/journeys/{}", self.base_url, id)
    }
}

#[async_trait]
impl JourneyStore for HttpJourneyStore {
    async fn lookup(
        &self,
        id: &ProductIdentifier,
    ) -> Result<Option<ProductJourney>, StoreError> {
        let url = self.journey_url(id);
        let start = Instant::now();

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        let latency_ms = start.elapsed().as_millis() as u64;

        if status == reqwest::StatusCode::NOT_FOUND {
            info!(id = %id, latency_ms = %latency_ms, "journey_lookup_miss");
            return Ok(None);
        }
        if !status.is_success() {
            warn!(id = %id, status = %status.as_u16(), latency_ms = %latency_ms, "journey_lookup_failed");
            return Err(StoreError::Status(status.as_u16()));
        }

        let journey = response
            .json::<ProductJourney>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        info!(id = %id, steps = %journey.steps.len(), latency_ms = %latency_ms, "journey_lookup_hit");
        Ok(Some(journey))
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// The demo journey mirrored from the field pilot data set
fn demo_tomato_journey() -> ProductJourney {
    ProductJourney {
        product: ProductInfo {
            name: "Organic Tomatoes".to_string(),
            image_ref: "https://picsum.photos/id/1080/100/100".to_string(),
        },
        steps: smallvec![
            JourneyStep::new(
                "Harvested",
                "Green Valley Farms",
                date(2023, 10, 20),
                StepStatus::Completed,
            ),
            JourneyStep::new(
                "Packed at Warehouse A",
                "Fresno, CA",
                date(2023, 10, 21),
                StepStatus::Completed,
            ),
            JourneyStep::new(
                "In Transit",
                "Headed to Distribution Center",
                date(2023, 10, 22),
                StepStatus::Completed,
            ),
            JourneyStep::new(
                "Distribution Center",
                "Los Angeles, CA",
                date(2023, 10, 23),
                StepStatus::Completed,
            ),
            JourneyStep::new(
                "Delivered to Retailer",
                "Local Grocer, LA",
                date(2023, 10, 24),
                StepStatus::Current,
            ),
        ],
    }
}
