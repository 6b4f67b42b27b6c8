//! Core types for the screening engine

pub mod conjunction;
pub mod orbital;

pub use conjunction::{Alert, CandidatePair, CloseApproach, ConjunctionEvent, RiskLevel};
pub use orbital::{
    CatalogEntry, MeanElements, ObjectId, ObjectMetadata, OrbitalState, StateVector, EARTH_RADIUS_KM,
};
