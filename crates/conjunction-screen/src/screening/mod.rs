//! Screening core: element normalization, candidate filters, spatial search,
//! TCA refinement and risk classification

pub mod colocation;
pub mod elements;
pub mod filter;
pub mod grid;
pub mod proximity;
pub mod risk;
pub mod tca;

pub use colocation::{CoLocationFilter, SkipReason};
pub use elements::circular_difference_deg;
pub use filter::{FilterCascade, FilterOutcome};
pub use grid::{CellKey, SpatialGrid};
pub use proximity::{Positioned, ProximitySearch, ScanOutcome, ScanStats};
pub use risk::{collision_probability, hours_to_tca, requires_attention, RiskClassifier};
pub use tca::{RefinementSettings, RefinementTrace, Sample, TcaRefiner};
