//! Screening service: catalog sweeps, pair checks, single-primary analysis
//! and alert management

use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::ScreeningConfig;
use crate::error::{Error, Result};
use crate::processing::WorkerPool;
use crate::propagation::Propagator;
use crate::screening::{
    collision_probability, requires_attention, risk::risk_summary, FilterCascade, Positioned,
    ProximitySearch, RefinementSettings, RiskClassifier, ScanStats, SpatialGrid, TcaRefiner,
};
use crate::storage::{AlertStore, CatalogStore, SqliteStore};
use crate::types::{
    Alert, CatalogEntry, CloseApproach, ConjunctionEvent, ObjectId, RiskLevel,
};

/// Outcome of an alert upsert
#[derive(Debug, Clone)]
pub struct AlertUpsert {
    pub alert: Alert,
    /// False when an alert with the same key already existed
    pub created: bool,
}

/// Aggregate result of a catalog-wide sweep
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Objects with a current state
    pub objects: usize,
    /// Objects whose position could be computed
    pub positioned: usize,
    pub propagation_failures: usize,
    pub stale_objects: usize,
    /// Approaches involving at least one stale element set
    pub stale_approaches: usize,
    pub occupied_cells: usize,
    pub scan: ScanStats,
    /// Refined approaches above the velocity floor
    pub approaches: usize,
    pub alerts_created: usize,
    pub alerts_existing: usize,
    /// Every alert matched by this sweep, new or pre-existing
    pub alerts: Vec<Alert>,
    pub duration_secs: f64,
}

/// Aggregate result of a single-primary analysis
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub primary_id: ObjectId,
    pub screening_epoch: DateTime<Utc>,
    pub catalog_size: usize,
    pub after_coarse: usize,
    pub after_raan: usize,
    pub after_co_location: usize,
    /// Candidates whose refinement failed and were skipped
    pub failed: usize,
    /// Recorded events, soonest TCA first
    pub events: Vec<ConjunctionEvent>,
    pub counts: BTreeMap<RiskLevel, usize>,
    pub alerts_upserted: usize,
}

impl AnalysisReport {
    pub fn count(&self, level: RiskLevel) -> usize {
        self.counts.get(&level).copied().unwrap_or(0)
    }
}

/// Result of a direct pair check
#[derive(Debug, Clone)]
pub struct PairCheck {
    /// `None` when the pair is co-moving
    pub approach: Option<CloseApproach>,
    /// Set when the approach is within the alert distance
    pub alert: Option<Alert>,
}

struct SweepHit {
    approach: CloseApproach,
    upsert: Option<AlertUpsert>,
}

struct AnalysisHit {
    event: ConjunctionEvent,
    alerted: bool,
}

/// Conjunction screening service
pub struct ScreeningService {
    config: ScreeningConfig,
    propagator: Arc<dyn Propagator>,
    catalog: Arc<dyn CatalogStore>,
    alerts: Arc<dyn AlertStore>,
    pool: WorkerPool,
    cascade: FilterCascade,
    classifier: RiskClassifier,
}

impl ScreeningService {
    /// Create a service; the configuration is validated first
    pub fn new(
        config: ScreeningConfig,
        propagator: Arc<dyn Propagator>,
        catalog: Arc<dyn CatalogStore>,
        alerts: Arc<dyn AlertStore>,
    ) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::from_config(&config)?;
        let cascade = FilterCascade::new(&config.filter, &config.co_location);
        let classifier = RiskClassifier::new(&config.risk);

        tracing::info!(
            "Screening service ready: propagator={}, search radius={} km, workers={}",
            propagator.name(),
            config.sweep.search_radius_km,
            pool.workers()
        );

        Ok(Self {
            config,
            propagator,
            catalog,
            alerts,
            pool,
            cascade,
            classifier,
        })
    }

    /// Create a service whose catalog and alerts live in one SQLite store
    pub fn with_store(
        config: ScreeningConfig,
        propagator: Arc<dyn Propagator>,
        store: Arc<SqliteStore>,
    ) -> Result<Self> {
        Self::new(config, propagator, store.clone(), store)
    }

    pub fn config(&self) -> &ScreeningConfig {
        &self.config
    }

    fn refiner(&self, coarse_step_secs: f64) -> TcaRefiner<'_> {
        TcaRefiner::new(
            self.propagator.as_ref(),
            RefinementSettings::new(&self.config.refinement, coarse_step_secs),
        )
    }

    fn is_stale(&self, entry: &CatalogEntry, now: DateTime<Utc>) -> bool {
        entry
            .state
            .is_stale(now, self.config.staleness.max_state_age_days)
    }

    fn require_entry(&self, id: ObjectId) -> Result<CatalogEntry> {
        self.catalog
            .current_entry(id)?
            .ok_or_else(|| Error::not_found(format!("No current orbital state for object {}", id)))
    }

    // ==================== Catalog Sweep ====================

    /// Screen the whole catalog for approaches in the next `look_ahead_hours`
    pub fn full_catalog_sweep(&self, look_ahead_hours: i64) -> Result<SweepReport> {
        self.full_catalog_sweep_at(clock(), look_ahead_hours)
    }

    /// Catalog sweep starting at `now`
    pub fn full_catalog_sweep_at(
        &self,
        now: DateTime<Utc>,
        look_ahead_hours: i64,
    ) -> Result<SweepReport> {
        if !self.config.sweep.enabled {
            return Err(Error::config("Catalog sweep is disabled"));
        }
        if look_ahead_hours <= 0 {
            return Err(Error::config(format!(
                "look-ahead must be positive (got {} h)",
                look_ahead_hours
            )));
        }

        let started = Instant::now();
        let window_end = offset(now, Duration::try_hours(look_ahead_hours), "look-ahead")?;
        tracing::info!(
            "Starting catalog sweep: {} h look-ahead, {} km search radius",
            look_ahead_hours,
            self.config.sweep.search_radius_km
        );

        let entries = dedup_entries(self.catalog.current_entries()?);
        let stale_objects = entries.iter().filter(|e| self.is_stale(e, now)).count();
        if stale_objects > 0 {
            tracing::warn!(
                "{} of {} objects have element sets older than {} days; results involving them are flagged",
                stale_objects,
                entries.len(),
                self.config.staleness.max_state_age_days
            );
        }

        // Phase 1: positions at the sweep instant
        let positions = self.pool.run_phase(
            "Position",
            (0..entries.len()).collect(),
            |index: usize| {
                let entry = &entries[index];
                self.propagator
                    .propagate(&entry.state, now)
                    .map(|state| Positioned { entry, state })
            },
        );
        let objects: Vec<Positioned<'_>> = positions.completed;
        let propagation_failures = positions.failed;

        let grid_positions: Vec<[f64; 3]> = objects.iter().map(|o| o.state.position_km).collect();
        let grid = SpatialGrid::build(&grid_positions, self.config.sweep.search_radius_km)?;
        tracing::info!(
            "Spatial grid built: {} objects in {} cells",
            objects.len(),
            grid.cell_count()
        );

        // Phase 2: per-cell proximity scan with refinement and alert upsert
        let refiner = self.refiner(self.config.sweep.coarse_step_secs);
        let search = ProximitySearch::new(&grid, &objects, self.cascade.co_location(), now);
        let outcome = search.run(&self.pool, |a, b, _distance| {
            let Some(sample) = refiner.find_tca(&a.entry.state, &b.entry.state, now, window_end)?
            else {
                return Ok(None);
            };
            let stale = self.is_stale(a.entry, now) || self.is_stale(b.entry, now);
            let approach = sample.to_approach(a.entry.id(), b.entry.id(), stale);

            let upsert = if approach.miss_distance_km() < self.config.sweep.alert_distance_km {
                Some(self.upsert_alert(&approach, now)?)
            } else {
                None
            };
            Ok(Some(SweepHit { approach, upsert }))
        });

        let mut report = SweepReport {
            started_at: now,
            window_end,
            objects: entries.len(),
            positioned: objects.len(),
            propagation_failures,
            stale_objects,
            stale_approaches: outcome.results.iter().filter(|h| h.approach.stale_state).count(),
            occupied_cells: grid.cell_count(),
            scan: outcome.stats,
            approaches: outcome.results.len(),
            alerts_created: 0,
            alerts_existing: 0,
            alerts: Vec::new(),
            duration_secs: 0.0,
        };

        for hit in outcome.results {
            let Some(upsert) = hit.upsert else { continue };
            if upsert.created {
                report.alerts_created += 1;
                if requires_attention(upsert.alert.risk_level) {
                    tracing::warn!("{}", risk_summary(&hit.approach, upsert.alert.risk_level));
                }
            } else {
                report.alerts_existing += 1;
            }
            report.alerts.push(upsert.alert);
        }
        report.alerts.sort_by_key(|a| (a.tca, a.pair()));
        report.duration_secs = started.elapsed().as_secs_f64();

        tracing::info!(
            "Catalog sweep complete: {} pairs checked, {} within radius, {} co-located, {} approaches, {} new alerts, {} existing in {:.2}s",
            report.scan.pairs_checked,
            report.scan.within_radius,
            report.scan.co_located,
            report.approaches,
            report.alerts_created,
            report.alerts_existing,
            report.duration_secs
        );

        Ok(report)
    }

    // ==================== Alert Upsert ====================

    /// Create the alert for `approach` unless one with the same (pair, TCA) exists
    pub fn upsert_alert(&self, approach: &CloseApproach, now: DateTime<Utc>) -> Result<AlertUpsert> {
        if let Some(existing) = self.alerts.find_alert(approach.pair(), approach.tca)? {
            return Ok(AlertUpsert {
                alert: existing,
                created: false,
            });
        }

        let miss_km = approach.miss_distance_km();
        let relative_kms = approach.relative_velocity_kms();
        let candidate = Alert {
            id: Uuid::new_v4(),
            satellite1_id: approach.primary_id,
            satellite2_id: approach.secondary_id,
            tca: crate::types::conjunction::alert_key_time(approach.tca),
            min_distance_km: miss_km,
            relative_velocity_kms: relative_kms,
            collision_probability: collision_probability(miss_km, relative_kms),
            risk_level: self.classifier.assess(approach, now),
            resolved: false,
            satellite1_position_km: approach.primary_state.position_km,
            satellite2_position_km: approach.secondary_state.position_km,
            created_at: now,
            updated_at: now,
        };

        // A concurrent worker may have inserted the same key since the lookup
        let stored = self.alerts.insert_alert_if_absent(&candidate)?;
        let created = stored.id == candidate.id;
        Ok(AlertUpsert {
            alert: stored,
            created,
        })
    }

    // ==================== Pair Check ====================

    /// Find the closest approach of two objects in the next `look_ahead_hours`
    ///
    /// Unknown objects are an error here, unlike in batch sweeps.
    pub fn check_pair(&self, id1: ObjectId, id2: ObjectId, look_ahead_hours: i64) -> Result<PairCheck> {
        self.check_pair_at(clock(), id1, id2, look_ahead_hours)
    }

    pub fn check_pair_at(
        &self,
        now: DateTime<Utc>,
        id1: ObjectId,
        id2: ObjectId,
        look_ahead_hours: i64,
    ) -> Result<PairCheck> {
        if id1 == id2 {
            return Err(Error::config("Cannot screen an object against itself"));
        }
        if look_ahead_hours <= 0 {
            return Err(Error::config(format!(
                "look-ahead must be positive (got {} h)",
                look_ahead_hours
            )));
        }
        tracing::info!("Checking collision risk between objects {} and {}", id1, id2);

        let a = self.require_entry(id1)?;
        let b = self.require_entry(id2)?;
        let end = offset(now, Duration::try_hours(look_ahead_hours), "look-ahead")?;

        let refiner = self.refiner(self.config.pairwise.coarse_step_secs);
        let Some(sample) = refiner.find_tca(&a.state, &b.state, now, end)? else {
            return Ok(PairCheck {
                approach: None,
                alert: None,
            });
        };
        let stale = self.is_stale(&a, now) || self.is_stale(&b, now);
        let approach = sample.to_approach(id1, id2, stale);

        if approach.miss_distance_km() < self.config.sweep.alert_distance_km {
            let upsert = self.upsert_alert(&approach, now)?;
            return Ok(PairCheck {
                approach: Some(approach),
                alert: Some(upsert.alert),
            });
        }

        tracing::info!(
            "No collision risk detected. Minimum distance: {:.2} km",
            approach.miss_distance_km()
        );
        Ok(PairCheck {
            approach: Some(approach),
            alert: None,
        })
    }

    /// Present separation of two objects, km
    pub fn current_distance(&self, id1: ObjectId, id2: ObjectId) -> Result<f64> {
        self.current_distance_at(clock(), id1, id2)
    }

    pub fn current_distance_at(&self, now: DateTime<Utc>, id1: ObjectId, id2: ObjectId) -> Result<f64> {
        let a = self.require_entry(id1)?;
        let b = self.require_entry(id2)?;
        let sa = self.propagator.propagate(&a.state, now)?;
        let sb = self.propagator.propagate(&b.state, now)?;
        Ok(sa.distance_to(&sb))
    }

    // ==================== Single-Primary Analysis ====================

    /// Screen one object against the catalog over the next `prediction_days`
    pub fn analyze_primary(&self, primary_id: ObjectId, prediction_days: i64) -> Result<AnalysisReport> {
        self.analyze_primary_at(clock(), primary_id, prediction_days)
    }

    pub fn analyze_primary_at(
        &self,
        now: DateTime<Utc>,
        primary_id: ObjectId,
        prediction_days: i64,
    ) -> Result<AnalysisReport> {
        if !self.config.analysis.enabled {
            return Err(Error::config("Single-primary analysis is disabled"));
        }
        if prediction_days <= 0 {
            return Err(Error::config(format!(
                "prediction window must be positive (got {} days)",
                prediction_days
            )));
        }
        let end = offset(now, Duration::try_days(prediction_days), "prediction window")?;
        tracing::info!("Starting conjunction analysis for primary object {}", primary_id);

        let primary = self.require_entry(primary_id)?;
        let primary_stale = self.is_stale(&primary, now);
        if primary_stale {
            tracing::warn!(
                "Primary object {} element set is {} days old (epoch {}). Results may be unreliable.",
                primary_id,
                primary.state.age(now).num_days(),
                primary.state.epoch
            );
        }

        let entries = self.catalog.current_entries()?;
        let filtered = self.cascade.filter_candidates(&primary, &entries, now);
        let mut report = AnalysisReport {
            primary_id,
            screening_epoch: now,
            catalog_size: filtered.catalog_size,
            after_coarse: filtered.after_coarse,
            after_raan: filtered.after_raan,
            after_co_location: filtered.after_co_location,
            failed: 0,
            events: Vec::new(),
            counts: BTreeMap::new(),
            alerts_upserted: 0,
        };

        if filtered.candidates.is_empty() {
            tracing::info!("No conjunction candidates remain after filtering");
            return Ok(report);
        }
        tracing::info!(
            "Beginning detailed conjunction screening for {} candidates...",
            filtered.candidates.len()
        );

        let refiner = self.refiner(self.config.analysis.coarse_step_secs);
        let phase = self.pool.run_phase("Refinement", filtered.candidates, |candidate| {
            let coarse = refiner.coarse_scan(&primary.state, &candidate.state, now, end)?;
            if coarse.distance_km > self.config.analysis.screening_distance_km {
                return Ok(None);
            }

            let trace = refiner.refine(&primary.state, &candidate.state, coarse, now, end);
            let Some(sample) = refiner.apply_velocity_floor(primary_id, candidate.id(), trace.best())
            else {
                return Ok(None);
            };

            let stale = primary_stale || self.is_stale(candidate, now);
            let approach = sample.to_approach(primary_id, candidate.id(), stale);
            let level = self.classifier.assess(&approach, now);
            let event = self
                .alerts
                .record_event(&ConjunctionEvent::from_approach(&approach, level, now))?;

            if requires_attention(level) {
                tracing::warn!("{}", risk_summary(&approach, level));
            }

            let alerted = if approach.miss_distance_km() < self.config.sweep.alert_distance_km {
                self.upsert_alert(&approach, now)?;
                true
            } else {
                false
            };

            Ok(Some(AnalysisHit { event, alerted }))
        });

        report.failed = phase.failed;
        for hit in phase.completed.into_iter().flatten() {
            *report.counts.entry(hit.event.risk_level).or_insert(0) += 1;
            if hit.alerted {
                report.alerts_upserted += 1;
            }
            report.events.push(hit.event);
        }
        report.events.sort_by_key(|e| (e.tca, e.secondary_id));

        tracing::info!(
            "Analysis complete: {} total events (Critical: {}, High: {}, Medium: {}, Low: {})",
            report.events.len(),
            report.count(RiskLevel::Critical),
            report.count(RiskLevel::High),
            report.count(RiskLevel::Medium),
            report.count(RiskLevel::Low)
        );

        Ok(report)
    }

    // ==================== Alerts and Events ====================

    /// Unresolved alerts, optionally limited to one severity
    pub fn list_unresolved_alerts(&self, level: Option<RiskLevel>) -> Result<Vec<Alert>> {
        self.alerts.list_unresolved(level)
    }

    /// Mark an alert resolved
    pub fn resolve_alert(&self, id: Uuid) -> Result<Alert> {
        let alert = self.alerts.resolve_alert(id, clock())?;
        tracing::info!("Resolved alert {} ({})", id, alert.pair());
        Ok(alert)
    }

    /// Delete conjunction events whose TCA is more than `days_to_keep` days ago
    pub fn purge_events_older_than(&self, days_to_keep: i64) -> Result<usize> {
        self.purge_events_older_than_at(clock(), days_to_keep)
    }

    pub fn purge_events_older_than_at(&self, now: DateTime<Utc>, days_to_keep: i64) -> Result<usize> {
        if days_to_keep < 0 {
            return Err(Error::config(format!(
                "days to keep must be >= 0 (got {})",
                days_to_keep
            )));
        }
        let cutoff = offset(now, Duration::try_days(-days_to_keep), "retention window")?;
        let removed = self.alerts.purge_events_before(cutoff)?;
        tracing::info!("Purged {} conjunction events older than {} days", removed, days_to_keep);
        Ok(removed)
    }

    /// Events for `primary_id` in the next `days_ahead` days, closest miss first
    pub fn upcoming_events(&self, primary_id: ObjectId, days_ahead: i64) -> Result<Vec<ConjunctionEvent>> {
        self.upcoming_events_at(clock(), primary_id, days_ahead)
    }

    pub fn upcoming_events_at(
        &self,
        now: DateTime<Utc>,
        primary_id: ObjectId,
        days_ahead: i64,
    ) -> Result<Vec<ConjunctionEvent>> {
        self.require_object(primary_id)?;
        let to = offset(now, Duration::try_days(days_ahead), "look-ahead")?;
        self.alerts.upcoming_events(primary_id, now, to)
    }

    /// Future HIGH and CRITICAL events for `primary_id`, soonest first
    pub fn high_risk_events(&self, primary_id: ObjectId) -> Result<Vec<ConjunctionEvent>> {
        self.high_risk_events_at(clock(), primary_id)
    }

    pub fn high_risk_events_at(
        &self,
        now: DateTime<Utc>,
        primary_id: ObjectId,
    ) -> Result<Vec<ConjunctionEvent>> {
        self.require_object(primary_id)?;
        self.alerts.high_risk_events(primary_id, now)
    }

    fn require_object(&self, id: ObjectId) -> Result<()> {
        if self.catalog.object(id)?.is_some() || self.catalog.current_entry(id)?.is_some() {
            Ok(())
        } else {
            Err(Error::not_found(format!("Object {}", id)))
        }
    }
}

/// Wall-clock screening origin, truncated to whole seconds
///
/// Fine and polish samples sit on a grid anchored at the window start; a
/// whole-second origin keeps their sub-second phase fixed across runs.
fn clock() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// `now + span`, or a configuration error when it leaves the representable range
fn offset(now: DateTime<Utc>, span: Option<Duration>, what: &str) -> Result<DateTime<Utc>> {
    span.and_then(|span| now.checked_add_signed(span))
        .ok_or_else(|| Error::config(format!("{} is out of range", what)))
}

/// Keep the first entry per object id
fn dedup_entries(entries: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
    let mut seen = HashSet::new();
    entries.into_iter().filter(|e| seen.insert(e.id())).collect()
}
