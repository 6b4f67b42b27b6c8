//! Time of closest approach: coarse scan, fine refinement, sub-second polish
//!
//! This is a local search. A coarse step wider than a very fast pass can land
//! both neighbouring samples far from the true minimum, in which case the fine
//! and polish stages converge on a different local minimum. The step sizes are
//! configuration, and the whole window is never rescanned at fine resolution.
//!
//! Every sample time is `start` plus a whole number of steps. The returned TCA
//! therefore depends on the sub-second phase of `start`; callers that key on
//! the TCA should start windows on whole seconds.

use chrono::{DateTime, Duration, Utc};

use crate::config::RefinementConfig;
use crate::error::{Error, Result};
use crate::propagation::Propagator;
use crate::types::{CloseApproach, ObjectId, OrbitalState, StateVector};

/// One evaluated instant of a pair's separation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: DateTime<Utc>,
    pub distance_km: f64,
    pub primary: StateVector,
    pub secondary: StateVector,
}

impl Sample {
    pub fn relative_speed_kms(&self) -> f64 {
        self.primary.relative_speed(&self.secondary)
    }

    /// Convert to a close approach record (metres, m/s)
    pub fn to_approach(
        &self,
        primary_id: ObjectId,
        secondary_id: ObjectId,
        stale_state: bool,
    ) -> CloseApproach {
        CloseApproach {
            primary_id,
            secondary_id,
            tca: self.time,
            miss_distance_m: self.distance_km * 1000.0,
            relative_velocity_ms: self.relative_speed_kms() * 1000.0,
            primary_altitude_km: self.primary.altitude_km(),
            secondary_altitude_km: self.secondary.altitude_km(),
            primary_state: self.primary,
            secondary_state: self.secondary,
            stale_state,
        }
    }
}

/// Best sample after each stage
#[derive(Debug, Clone, Copy)]
pub struct RefinementTrace {
    pub coarse: Sample,
    pub fine: Sample,
    /// `None` when the fine minimum was above the polish trigger
    pub polish: Option<Sample>,
}

impl RefinementTrace {
    /// The most refined sample available
    pub fn best(&self) -> Sample {
        self.polish.unwrap_or(self.fine)
    }
}

/// Step sizes and thresholds for one refinement mode
#[derive(Debug, Clone, Copy)]
pub struct RefinementSettings {
    pub coarse_step_secs: f64,
    pub fine_window_secs: f64,
    pub fine_step_secs: f64,
    pub polish_window_secs: f64,
    pub polish_step_secs: f64,
    pub polish_trigger_km: f64,
    pub min_relative_velocity_kms: f64,
}

impl RefinementSettings {
    pub fn new(config: &RefinementConfig, coarse_step_secs: f64) -> Self {
        Self {
            coarse_step_secs,
            fine_window_secs: config.fine_window_secs,
            fine_step_secs: config.fine_step_secs,
            polish_window_secs: config.polish_window_secs,
            polish_step_secs: config.polish_step_secs,
            polish_trigger_km: config.polish_trigger_km,
            min_relative_velocity_kms: config.min_relative_velocity_kms,
        }
    }
}

/// Multi-resolution TCA search for a pair of trajectories
pub struct TcaRefiner<'p> {
    propagator: &'p dyn Propagator,
    settings: RefinementSettings,
}

impl<'p> TcaRefiner<'p> {
    pub fn new(propagator: &'p dyn Propagator, settings: RefinementSettings) -> Self {
        Self {
            propagator,
            settings,
        }
    }

    pub fn settings(&self) -> &RefinementSettings {
        &self.settings
    }

    /// Locate the TCA in `[start, end]` and apply the relative-velocity floor
    ///
    /// `Ok(None)` means the pair is co-moving rather than crossing.
    pub fn find_tca(
        &self,
        a: &OrbitalState,
        b: &OrbitalState,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Sample>> {
        let trace = self.trace(a, b, start, end)?;
        Ok(self.apply_velocity_floor(a.object_id, b.object_id, trace.best()))
    }

    /// Run all three stages, keeping the best sample of each
    pub fn trace(
        &self,
        a: &OrbitalState,
        b: &OrbitalState,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<RefinementTrace> {
        let coarse = self.coarse_scan(a, b, start, end)?;
        Ok(self.refine(a, b, coarse, start, end))
    }

    /// Stage 1: fixed-step scan across the whole window
    pub fn coarse_scan(
        &self,
        a: &OrbitalState,
        b: &OrbitalState,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Sample> {
        if end < start {
            return Err(Error::config(format!(
                "screening window ends before it starts ({} > {})",
                start, end
            )));
        }
        self.scan(a, b, start, end, self.settings.coarse_step_secs, None)
            .ok_or_else(|| {
                Error::propagation(
                    a.object_id,
                    format!("no propagable instant for pair with {} in window", b.object_id),
                )
            })
    }

    /// Stages 2 and 3 around a coarse minimum; never worse than `coarse`
    pub fn refine(
        &self,
        a: &OrbitalState,
        b: &OrbitalState,
        coarse: Sample,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RefinementTrace {
        let s = &self.settings;

        let (fine_from, fine_to) = bracket(coarse.time, s.fine_window_secs, start, end);
        let fine = self
            .scan(a, b, fine_from, fine_to, s.fine_step_secs, Some(coarse))
            .unwrap_or(coarse);

        let polish = if fine.distance_km < s.polish_trigger_km {
            let (from, to) = bracket(fine.time, s.polish_window_secs, start, end);
            Some(
                self.scan(a, b, from, to, s.polish_step_secs, Some(fine))
                    .unwrap_or(fine),
            )
        } else {
            None
        };

        RefinementTrace {
            coarse,
            fine,
            polish,
        }
    }

    /// Drop samples below the relative-velocity floor
    pub fn apply_velocity_floor(
        &self,
        a: ObjectId,
        b: ObjectId,
        sample: Sample,
    ) -> Option<Sample> {
        let relative = sample.relative_speed_kms();
        if relative < self.settings.min_relative_velocity_kms {
            tracing::debug!(
                "Discarding {} <-> {}: relative velocity {:.3} km/s below {:.3} km/s floor",
                a,
                b,
                relative,
                self.settings.min_relative_velocity_kms
            );
            return None;
        }
        Some(sample)
    }

    /// Scan `[from, to]` at `step_secs`, carrying `best` forward
    ///
    /// Per-instant propagation failures are skipped.
    fn scan(
        &self,
        a: &OrbitalState,
        b: &OrbitalState,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        step_secs: f64,
        mut best: Option<Sample>,
    ) -> Option<Sample> {
        let step_ms = ((step_secs * 1000.0).round() as i64).max(1);
        let span_ms = (to - from).num_milliseconds();
        let steps = span_ms / step_ms;

        for i in 0..=steps {
            let t = from + Duration::milliseconds(i * step_ms);
            let sample = match self.sample(a, b, t) {
                Ok(sample) => sample,
                Err(e) => {
                    tracing::trace!("Skipping instant {}: {}", t, e);
                    continue;
                }
            };
            if best.map_or(true, |current| sample.distance_km < current.distance_km) {
                best = Some(sample);
            }
        }

        best
    }

    /// Separation of the pair at one instant
    pub fn sample(&self, a: &OrbitalState, b: &OrbitalState, t: DateTime<Utc>) -> Result<Sample> {
        let primary = self.propagator.propagate(a, t)?;
        let secondary = self.propagator.propagate(b, t)?;
        Ok(Sample {
            time: t,
            distance_km: primary.distance_to(&secondary),
            primary,
            secondary,
        })
    }
}

/// `center ± half_width`, clamped to the screening window
fn bracket(
    center: DateTime<Utc>,
    half_width_secs: f64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let half = Duration::milliseconds((half_width_secs * 1000.0).round() as i64);
    ((center - half).max(start), (center + half).min(end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{crossing_pair, state, LinearPropagator};
    use chrono::TimeZone;

    fn settings(coarse_step_secs: f64) -> RefinementSettings {
        RefinementSettings::new(&RefinementConfig::default(), coarse_step_secs)
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        (start, start + Duration::hours(1))
    }

    #[test]
    fn test_locates_crossing() {
        let (start, end) = window();
        let tca = start + Duration::milliseconds(1_234_500);
        let (propagator, a, b) = crossing_pair(1, 2, tca, 3.0, 7.5);

        let refiner = TcaRefiner::new(&propagator, settings(30.0));
        let best = refiner.find_tca(&a, &b, start, end).unwrap().unwrap();

        assert_eq!(best.time, tca);
        assert!((best.distance_km - 3.0).abs() < 1e-6);
        assert!((best.relative_speed_kms() - 15.0).abs() < 1e-9);

        let approach = best.to_approach(1, 2, false);
        assert!((approach.miss_distance_m - 3000.0).abs() < 1e-3);
        assert!((approach.relative_velocity_ms - 15_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_stages_never_regress() {
        let (start, end) = window();
        for (offset_ms, miss, speed, coarse_step) in [
            (1_234_500, 3.0, 7.5, 30.0),
            (17, 0.4, 7.0, 30.0),
            (3_599_990, 12.0, 3.0, 600.0),
            (2_000_033, 150.0, 6.0, 600.0),
            (999_999, 0.05, 7.8, 30.0),
        ] {
            let tca = start + Duration::milliseconds(offset_ms);
            let (propagator, a, b) = crossing_pair(1, 2, tca, miss, speed);
            let trace = TcaRefiner::new(&propagator, settings(coarse_step))
                .trace(&a, &b, start, end)
                .unwrap();

            assert!(trace.fine.distance_km <= trace.coarse.distance_km);
            if let Some(polish) = trace.polish {
                assert!(polish.distance_km <= trace.fine.distance_km);
            }
            assert!(trace.best().time >= start && trace.best().time <= end);
        }
    }

    #[test]
    fn test_polish_skipped_above_trigger() {
        let (start, end) = window();
        let tca = start + Duration::minutes(20);
        let (propagator, a, b) = crossing_pair(1, 2, tca, 150.0, 7.5);

        let trace = TcaRefiner::new(&propagator, settings(30.0))
            .trace(&a, &b, start, end)
            .unwrap();
        assert!(trace.polish.is_none());
        assert_eq!(trace.best(), trace.fine);
    }

    #[test]
    fn test_co_moving_pair_is_discarded() {
        let (start, end) = window();
        let epoch = start;
        let propagator = LinearPropagator::new()
            .with_track(1, epoch, [7000.0, 0.0, 0.0], [0.0, 7.5, 0.0])
            .with_track(2, epoch, [7000.5, 0.0, 0.0], [0.0, 7.6, 0.0]);
        let a = state(1, epoch);
        let b = state(2, epoch);

        let refiner = TcaRefiner::new(&propagator, settings(30.0));
        let trace = refiner.trace(&a, &b, start, end).unwrap();
        assert!(trace.best().distance_km < 1.0);
        assert!(refiner.find_tca(&a, &b, start, end).unwrap().is_none());
    }

    #[test]
    fn test_failed_instants_are_skipped_but_total_failure_errors() {
        let (start, end) = window();
        let tca = start + Duration::minutes(30);
        let (propagator, a, b) = crossing_pair(1, 2, tca, 2.0, 7.5);
        let propagator = propagator.failing_before(start + Duration::minutes(10));

        let best = TcaRefiner::new(&propagator, settings(30.0))
            .find_tca(&a, &b, start, end)
            .unwrap()
            .unwrap();
        assert_eq!(best.time, tca);

        let broken = LinearPropagator::new();
        let err = TcaRefiner::new(&broken, settings(30.0))
            .find_tca(&a, &b, start, end)
            .unwrap_err();
        assert!(matches!(err, Error::Propagation { .. }));
    }

    #[test]
    fn test_refinement_is_clamped_to_window() {
        let (start, end) = window();
        let (propagator, a, b) = crossing_pair(1, 2, start - Duration::minutes(5), 1.0, 7.5);

        let trace = TcaRefiner::new(&propagator, settings(30.0))
            .trace(&a, &b, start, end)
            .unwrap();
        assert_eq!(trace.best().time, start);
    }

    #[test]
    fn test_inverted_window_is_config_error() {
        let (start, end) = window();
        let (propagator, a, b) = crossing_pair(1, 2, start, 1.0, 7.5);
        let err = TcaRefiner::new(&propagator, settings(30.0))
            .coarse_scan(&a, &b, end, start)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
