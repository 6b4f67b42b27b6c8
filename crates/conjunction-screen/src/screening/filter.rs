//! Three-stage candidate reduction for single-primary screening

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::colocation::CoLocationFilter;
use crate::config::{CoLocationConfig, FilterConfig};
use crate::types::CatalogEntry;

/// Candidates that survived each stage of the cascade
#[derive(Debug, Clone)]
pub struct FilterOutcome<'a> {
    /// Final candidates, in catalog order
    pub candidates: Vec<&'a CatalogEntry>,
    /// Catalog size the cascade started from
    pub catalog_size: usize,
    /// Remaining after the altitude/inclination box
    pub after_coarse: usize,
    /// Remaining after the RAAN filter (equal to `after_coarse` when it was skipped)
    pub after_raan: usize,
    /// Whether the RAAN filter actually ran
    pub raan_applied: bool,
    /// Remaining after the co-location filter
    pub after_co_location: usize,
}

/// Coarse box, orbital-plane and co-location filters
#[derive(Debug, Clone)]
pub struct FilterCascade {
    config: FilterConfig,
    co_location: CoLocationFilter,
}

impl FilterCascade {
    pub fn new(config: &FilterConfig, co_location: &CoLocationConfig) -> Self {
        Self {
            config: config.clone(),
            co_location: CoLocationFilter::new(co_location),
        }
    }

    pub fn co_location(&self) -> &CoLocationFilter {
        &self.co_location
    }

    /// Run all three stages for `primary` against `catalog`
    pub fn filter_candidates<'a>(
        &self,
        primary: &CatalogEntry,
        catalog: &'a [CatalogEntry],
        now: DateTime<Utc>,
    ) -> FilterOutcome<'a> {
        let coarse = self.coarse_filter(primary, catalog);
        let after_coarse = coarse.len();

        let (after_raan_set, raan_applied) = self.raan_filter(primary, coarse);
        let after_raan = after_raan_set.len();

        let candidates = self.co_location_filter(primary, after_raan_set, now);
        let after_co_location = candidates.len();

        FilterOutcome {
            candidates,
            catalog_size: catalog.len(),
            after_coarse,
            after_raan,
            raan_applied,
            after_co_location,
        }
    }

    /// Stage 1: drop self, duplicates and non-LEO objects; keep the altitude/inclination box
    ///
    /// Both objects of a pair must be in LEO, so a non-LEO primary has no candidates.
    pub fn coarse_filter<'a>(
        &self,
        primary: &CatalogEntry,
        catalog: &'a [CatalogEntry],
    ) -> Vec<&'a CatalogEntry> {
        let primary_elements = &primary.state.elements;
        if !primary_elements.is_leo() {
            tracing::warn!(
                "Primary object {} is not in LEO (alt={:?} km); no candidates screened",
                primary.id(),
                primary_elements.altitude_km()
            );
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let candidates: Vec<&CatalogEntry> = catalog
            .iter()
            .filter(|entry| entry.id() != primary.id())
            .filter(|entry| seen.insert(entry.id()))
            .filter(|entry| entry.state.elements.is_leo())
            .filter(|entry| {
                primary_elements.can_conjunct_with(
                    &entry.state.elements,
                    self.config.altitude_tolerance_km,
                    self.config.inclination_tolerance_deg,
                )
            })
            .collect();

        tracing::info!(
            "Coarse filter: {} objects remain from {} total ({:.1}% reduction)",
            candidates.len(),
            catalog.len(),
            reduction_percent(candidates.len(), catalog.len())
        );
        candidates
    }

    /// Stage 2: orbital-plane filter, only worth running on large candidate sets
    pub fn raan_filter<'a>(
        &self,
        primary: &CatalogEntry,
        candidates: Vec<&'a CatalogEntry>,
    ) -> (Vec<&'a CatalogEntry>, bool) {
        let raan = &self.config.raan;
        if !raan.enabled {
            return (candidates, false);
        }
        if candidates.len() <= raan.activation_candidate_count {
            tracing::info!(
                "Skipping RAAN filter - only {} candidates (threshold: {})",
                candidates.len(),
                raan.activation_candidate_count
            );
            return (candidates, false);
        }

        let before = candidates.len();
        let kept: Vec<&CatalogEntry> = candidates
            .into_iter()
            .filter(|entry| {
                primary.state.elements.raan_difference_deg(&entry.state.elements)
                    <= raan.tolerance_deg
            })
            .collect();

        tracing::info!(
            "RAAN filter: {} objects remain from {} ({:.1}% reduction)",
            kept.len(),
            before,
            reduction_percent(kept.len(), before)
        );
        (kept, true)
    }

    /// Stage 3: drop pairs that are docked, freshly deployed together or share a slot
    pub fn co_location_filter<'a>(
        &self,
        primary: &CatalogEntry,
        candidates: Vec<&'a CatalogEntry>,
        now: DateTime<Utc>,
    ) -> Vec<&'a CatalogEntry> {
        let before = candidates.len();
        let kept: Vec<&CatalogEntry> = candidates
            .into_iter()
            .filter(|entry| match self.co_location.skip_reason(primary, entry, now) {
                Some(reason) => {
                    tracing::debug!(
                        "Skipping pair {} <-> {}: {}",
                        primary.name(),
                        entry.name(),
                        reason
                    );
                    false
                }
                None => true,
            })
            .collect();

        if kept.len() < before {
            tracing::info!(
                "Co-location filter removed {} of {} candidates",
                before - kept.len(),
                before
            );
        }
        kept
    }
}

fn reduction_percent(remaining: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * (1.0 - remaining as f64 / total as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RaanFilterConfig;
    use crate::test_support::entry;

    fn cascade(raan: RaanFilterConfig) -> FilterCascade {
        let config = FilterConfig {
            raan,
            ..FilterConfig::default()
        };
        FilterCascade::new(&config, &CoLocationConfig::default())
    }

    #[test]
    fn test_coarse_filter_drops_self_duplicates_and_non_leo() {
        let now = Utc::now();
        let primary = entry(40001, "PRIMARY", 15.2, 53.0, 10.0, now);
        let catalog = vec![
            primary.clone(),
            entry(40002, "NEAR", 15.25, 53.5, 200.0, now),
            entry(40002, "NEAR", 15.25, 53.5, 200.0, now),
            entry(40003, "GEO", 1.0027, 0.1, 10.0, now),
            entry(40004, "POLAR", 15.2, 98.0, 10.0, now),
            entry(40005, "HIGH LEO", 13.0, 53.0, 10.0, now),
        ];

        let kept = cascade(RaanFilterConfig::default()).coarse_filter(&primary, &catalog);
        let ids: Vec<u32> = kept.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![40002]);
    }

    #[test]
    fn test_raan_filter_only_runs_above_activation_count() {
        let now = Utc::now();
        let primary = entry(1, "PRIMARY", 15.2, 53.0, 350.0, now);
        let catalog: Vec<CatalogEntry> = (0..120)
            .map(|i| entry(1000 + i, "DEBRIS", 15.2, 53.0, (i * 3) as f64, now))
            .collect();

        let raan = RaanFilterConfig::default();
        let outcome = cascade(raan.clone()).filter_candidates(&primary, &catalog, now);
        assert!(outcome.raan_applied);
        assert_eq!(outcome.after_coarse, 120);
        // RAAN 0..=30 wraps to within 45 deg of 350, as does 305..=357
        assert!(outcome.candidates.iter().all(|e| {
            primary.state.elements.raan_difference_deg(&e.state.elements) <= 45.0
        }));
        assert!(outcome.candidates.iter().any(|e| e.state.elements.raan_deg == 0.0));
        assert_eq!(outcome.after_raan, outcome.candidates.len());

        let small = &catalog[..50];
        let outcome = cascade(raan).filter_candidates(&primary, small, now);
        assert!(!outcome.raan_applied);
        assert_eq!(outcome.after_raan, 50);

        let disabled = RaanFilterConfig {
            enabled: false,
            ..RaanFilterConfig::default()
        };
        let outcome = cascade(disabled).filter_candidates(&primary, &catalog, now);
        assert!(!outcome.raan_applied);
        assert_eq!(outcome.after_raan, 120);
    }

    #[test]
    fn test_station_pair_is_removed_by_co_location_stage() {
        let now = Utc::now();
        let iss = entry(25544, "ISS (ZARYA)", 15.50, 51.64, 100.0, now);
        let catalog = vec![
            iss.clone(),
            entry(48274, "CSS (TIANHE)", 15.60, 41.47, 20.0, now),
            entry(60001, "DRAGON CRS-31", 15.49, 51.64, 100.4, now),
            entry(60002, "COSMOS 2251 DEB", 15.45, 60.0, 110.0, now),
        ];

        let outcome = cascade(RaanFilterConfig::default()).filter_candidates(&iss, &catalog, now);
        let ids: Vec<u32> = outcome.candidates.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![60002]);
        assert_eq!(outcome.after_coarse, 3);
        assert_eq!(outcome.after_co_location, 1);
    }

    #[test]
    fn test_cascade_membership_is_symmetric() {
        let now = Utc::now();
        let entries = vec![
            entry(1, "A", 15.2, 53.0, 10.0, now),
            entry(2, "B", 15.3, 60.0, 300.0, now),
            entry(3, "C", 14.0, 98.0, 40.0, now),
            entry(4, "ISS (ZARYA)", 15.5, 51.6, 10.0, now),
            entry(5, "SOYUZ MS-27", 15.5, 51.6, 10.2, now),
            entry(6, "HIGH", 11.20, 70.0, 50.0, now),
            entry(7, "EDGE LEO", 11.45, 70.0, 50.0, now),
        ];
        let cascade = cascade(RaanFilterConfig::default());

        for a in &entries {
            for b in &entries {
                if a.id() == b.id() {
                    continue;
                }
                let a_keeps_b = !cascade
                    .filter_candidates(a, std::slice::from_ref(b), now)
                    .candidates
                    .is_empty();
                let b_keeps_a = !cascade
                    .filter_candidates(b, std::slice::from_ref(a), now)
                    .candidates
                    .is_empty();
                assert_eq!(a_keeps_b, b_keeps_a, "{} vs {}", a.id(), b.id());
            }
        }
    }

    #[test]
    fn test_non_leo_primary_has_no_candidates() {
        let now = Utc::now();
        let high = entry(50001, "HIGH", 11.20, 70.0, 50.0, now);
        let edge = entry(50002, "EDGE LEO", 11.45, 70.0, 50.0, now);
        assert!(!high.state.elements.is_leo());
        assert!(edge.state.elements.is_leo());

        let cascade = cascade(RaanFilterConfig::default());
        assert!(cascade.coarse_filter(&high, std::slice::from_ref(&edge)).is_empty());
        assert!(cascade.coarse_filter(&edge, std::slice::from_ref(&high)).is_empty());
    }
}
