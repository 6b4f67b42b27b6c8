//! Co-location filter: pairs that are physically linked or share an orbital slot
//!
//! Three predicates, first match wins:
//! 1. both objects are station modules or frequently docked vehicles
//! 2. a freshly deployed constellation batch on near-identical orbits
//! 3. all five classical elements identical within tight tolerances

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;

use super::elements::circular_difference_deg;
use crate::config::CoLocationConfig;
use crate::types::{CatalogEntry, MeanElements, ObjectId};

// Fresh-deployment tolerances
const NEAR_MEAN_MOTION: f64 = 0.001;
const NEAR_INCLINATION_DEG: f64 = 0.1;
const NEAR_RAAN_DEG: f64 = 1.0;

// Same-slot tolerances
const SAME_MEAN_MOTION: f64 = 0.0001;
const SAME_INCLINATION_DEG: f64 = 0.01;
const SAME_ECCENTRICITY: f64 = 0.0001;
const SAME_RAAN_DEG: f64 = 0.1;
const SAME_ARG_PERIGEE_DEG: f64 = 0.1;

/// Why a pair was excluded from screening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SpaceStation,
    RecentDeployment { days_since_epoch: i64 },
    SameOrbitalSlot,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SpaceStation => f.write_str("Space station modules or docked spacecraft"),
            SkipReason::RecentDeployment { days_since_epoch } => write!(
                f,
                "Recently deployed constellation (launched {} days ago)",
                days_since_epoch
            ),
            SkipReason::SameOrbitalSlot => {
                f.write_str("Intentionally co-located satellites (same orbital slot)")
            }
        }
    }
}

/// Co-location heuristics built from configuration
#[derive(Debug, Clone)]
pub struct CoLocationFilter {
    station_ids: HashSet<ObjectId>,
    station_tokens: Vec<String>,
    constellation_tokens: Vec<String>,
    recent_deployment_days: i64,
}

impl CoLocationFilter {
    pub fn new(config: &CoLocationConfig) -> Self {
        Self {
            station_ids: config.station_ids.iter().copied().collect(),
            station_tokens: config.station_name_tokens.iter().map(|t| t.to_uppercase()).collect(),
            constellation_tokens: config
                .constellation_tokens
                .iter()
                .map(|t| t.to_uppercase())
                .collect(),
            recent_deployment_days: config.recent_deployment_days,
        }
    }

    /// Return the reason to skip the pair, or `None` if it should be screened
    ///
    /// Symmetric in its two arguments.
    pub fn skip_reason(
        &self,
        a: &CatalogEntry,
        b: &CatalogEntry,
        now: DateTime<Utc>,
    ) -> Option<SkipReason> {
        if self.is_station_related(a) && self.is_station_related(b) {
            return Some(SkipReason::SpaceStation);
        }

        if self.share_constellation(a.name(), b.name()) {
            let newest = a.state.epoch.max(b.state.epoch);
            let days_since_epoch = now.signed_duration_since(newest).num_days();
            if days_since_epoch <= self.recent_deployment_days
                && near_identical(&a.state.elements, &b.state.elements)
            {
                return Some(SkipReason::RecentDeployment { days_since_epoch });
            }
        }

        if identical(&a.state.elements, &b.state.elements) {
            return Some(SkipReason::SameOrbitalSlot);
        }

        None
    }

    pub fn should_skip(&self, a: &CatalogEntry, b: &CatalogEntry, now: DateTime<Utc>) -> bool {
        self.skip_reason(a, b, now).is_some()
    }

    fn is_station_related(&self, entry: &CatalogEntry) -> bool {
        if self.station_ids.contains(&entry.id()) {
            return true;
        }
        let name = entry.name().to_uppercase();
        self.station_tokens.iter().any(|token| name.contains(token.as_str()))
    }

    fn share_constellation(&self, name_a: &str, name_b: &str) -> bool {
        let a = name_a.to_uppercase();
        let b = name_b.to_uppercase();
        self.constellation_tokens
            .iter()
            .any(|token| a.contains(token.as_str()) && b.contains(token.as_str()))
    }
}

fn near_identical(a: &MeanElements, b: &MeanElements) -> bool {
    (a.mean_motion_rev_per_day - b.mean_motion_rev_per_day).abs() < NEAR_MEAN_MOTION
        && (a.inclination_deg - b.inclination_deg).abs() < NEAR_INCLINATION_DEG
        && circular_difference_deg(a.raan_deg, b.raan_deg) < NEAR_RAAN_DEG
}

fn identical(a: &MeanElements, b: &MeanElements) -> bool {
    (a.mean_motion_rev_per_day - b.mean_motion_rev_per_day).abs() < SAME_MEAN_MOTION
        && (a.inclination_deg - b.inclination_deg).abs() < SAME_INCLINATION_DEG
        && (a.eccentricity - b.eccentricity).abs() < SAME_ECCENTRICITY
        && circular_difference_deg(a.raan_deg, b.raan_deg) < SAME_RAAN_DEG
        && circular_difference_deg(a.arg_perigee_deg, b.arg_perigee_deg) < SAME_ARG_PERIGEE_DEG
}
