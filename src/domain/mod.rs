//! Domain models - core value types for products and journeys
//!
//! This module contains the canonical data types used throughout the system:
//! - `ProductIdentifier` - the opaque lookup key carried on a product
//! - `ProductJourney` / `JourneyStep` - the custody record returned by lookups
//! - `StepStatus` - per-step progress classification
//! - `RasterFrame` - a single camera frame handed to the symbol decoder

pub mod frame;
pub mod journey;

// Re-export commonly used types at module level
pub use frame::RasterFrame;
pub use journey::{JourneyStep, ProductIdentifier, ProductInfo, ProductJourney, StepStatus};
