//! conjunction-screen: close-approach screening for an orbital catalog
//!
//! This crate screens a catalog of orbiting objects for conjunctions and issues
//! risk-graded alerts. It combines a uniform spatial grid for catalog-wide
//! proximity search, a three-stage candidate filter cascade for single-primary
//! analysis, a coarse/fine/polish time-of-closest-approach refiner and a
//! heuristic risk classifier.
//!
//! Orbit propagation is consumed through the [`Propagator`] trait; the default
//! [`Sgp4Propagator`] wraps the `sgp4` crate. Catalog and alert persistence go
//! through the [`CatalogStore`] and [`AlertStore`] traits, implemented by the
//! SQLite-backed [`SqliteStore`].

pub mod config;
pub mod error;
pub mod processing;
pub mod propagation;
pub mod screening;
pub mod service;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ScreeningConfig;
pub use error::{Error, Result};
pub use propagation::{Propagator, Sgp4Propagator};
pub use service::{AlertUpsert, AnalysisReport, PairCheck, ScreeningService, SweepReport};
pub use storage::{AlertStore, CatalogStore, SqliteStore};
pub use types::{
    conjunction::{Alert, CandidatePair, CloseApproach, ConjunctionEvent, RiskLevel},
    orbital::{CatalogEntry, MeanElements, ObjectId, ObjectMetadata, OrbitalState, StateVector},
};
