//! Journey data model for tracing products through the supply chain

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Newtype wrapper for product identifiers to provide type safety.
///
/// The identifier is an opaque token: equality is exact string match and
/// no normalization (trimming, case folding) is applied before lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct ProductIdentifier(pub String);

impl ProductIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductIdentifier {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Progress of a single custody step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Completed,
    Current,
    Pending,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Completed => "completed",
            StepStatus::Current => "current",
            StepStatus::Pending => "pending",
        }
    }
}

/// A single custody/location event in a product's journey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyStep {
    pub title: String,
    pub location: String,
    pub date: NaiveDate,
    pub status: StepStatus,
}

impl JourneyStep {
    pub fn new(title: &str, location: &str, date: NaiveDate, status: StepStatus) -> Self {
        Self {
            title: title.to_string(),
            location: location.to_string(),
            date,
            status,
        }
    }
}

/// Product descriptor attached to a journey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: String,
    pub image_ref: String,
}

/// Complete journey for one product batch, in chronological custody order.
///
/// Journeys are immutable value snapshots returned by the repository. The
/// repository supplies the ordering invariant (at most one `Current` step,
/// `Completed` before it, `Pending` after it); the resolver does not
/// re-validate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductJourney {
    pub product: ProductInfo,
    pub steps: SmallVec<[JourneyStep; 8]>,
}

impl ProductJourney {
    /// The step the product is currently at, if any step is marked current
    pub fn current_step(&self) -> Option<&JourneyStep> {
        self.steps.iter().find(|s| s.status == StepStatus::Current)
    }
}
