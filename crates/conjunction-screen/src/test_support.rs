//! Deterministic fixtures for unit tests

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::propagation::Propagator;
use crate::types::{
    CatalogEntry, CloseApproach, MeanElements, ObjectId, ObjectMetadata, OrbitalState, StateVector,
};

/// Mean elements with the given shape parameters and a near-circular orbit
pub fn elements(mean_motion: f64, inclination: f64, raan: f64) -> MeanElements {
    MeanElements {
        inclination_deg: inclination,
        eccentricity: 0.0001,
        raan_deg: raan,
        mean_motion_rev_per_day: mean_motion,
        arg_perigee_deg: 0.0,
        mean_anomaly_deg: 0.0,
    }
}

pub fn entry(
    id: ObjectId,
    name: &str,
    mean_motion: f64,
    inclination: f64,
    raan: f64,
    epoch: DateTime<Utc>,
) -> CatalogEntry {
    CatalogEntry {
        metadata: ObjectMetadata {
            object_id: id,
            name: name.to_string(),
        },
        state: OrbitalState {
            object_id: id,
            epoch,
            elements: elements(mean_motion, inclination, raan),
            line1: String::new(),
            line2: String::new(),
        },
    }
}

/// A LEO state with placeholder elements
pub fn state(id: ObjectId, epoch: DateTime<Utc>) -> OrbitalState {
    entry(id, "TEST", 15.5, 51.6, 0.0, epoch).state
}

pub fn approach(
    primary_id: ObjectId,
    secondary_id: ObjectId,
    tca: DateTime<Utc>,
    miss_distance_m: f64,
    relative_velocity_ms: f64,
) -> CloseApproach {
    let sv = StateVector::new([6778.0, 0.0, 0.0], [0.0, 7.67, 0.0]);
    CloseApproach {
        primary_id,
        secondary_id,
        tca,
        miss_distance_m,
        relative_velocity_ms,
        primary_altitude_km: 400.0,
        secondary_altitude_km: 400.0,
        primary_state: sv,
        secondary_state: sv,
        stale_state: false,
    }
}

#[derive(Debug, Clone, Copy)]
struct Track {
    epoch: DateTime<Utc>,
    position_km: [f64; 3],
    velocity_kms: [f64; 3],
}

/// Straight-line motion keyed by object id
///
/// Unknown objects and instants before `fail_before` are propagation errors.
#[derive(Debug, Clone, Default)]
pub struct LinearPropagator {
    tracks: HashMap<ObjectId, Track>,
    fail_before: Option<DateTime<Utc>>,
    failing_objects: Vec<ObjectId>,
}

impl LinearPropagator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(
        mut self,
        id: ObjectId,
        epoch: DateTime<Utc>,
        position_km: [f64; 3],
        velocity_kms: [f64; 3],
    ) -> Self {
        self.tracks.insert(
            id,
            Track {
                epoch,
                position_km,
                velocity_kms,
            },
        );
        self
    }

    pub fn failing_before(mut self, t: DateTime<Utc>) -> Self {
        self.fail_before = Some(t);
        self
    }

    pub fn failing_object(mut self, id: ObjectId) -> Self {
        self.failing_objects.push(id);
        self
    }
}

impl Propagator for LinearPropagator {
    fn propagate(&self, state: &OrbitalState, at: DateTime<Utc>) -> Result<StateVector> {
        let id = state.object_id;
        if self.failing_objects.contains(&id) {
            return Err(Error::propagation(id, "degenerate elements"));
        }
        if self.fail_before.is_some_and(|t| at < t) {
            return Err(Error::propagation(id, "diverged"));
        }
        let track = self
            .tracks
            .get(&id)
            .ok_or_else(|| Error::propagation(id, "no track"))?;

        let dt = (at - track.epoch).num_milliseconds() as f64 / 1000.0;
        let p = track.position_km;
        let v = track.velocity_kms;
        Ok(StateVector::new(
            [p[0] + v[0] * dt, p[1] + v[1] * dt, p[2] + v[2] * dt],
            v,
        ))
    }

    fn name(&self) -> &str {
        "linear"
    }
}

/// Two objects crossing head-on at `tca` with separation `miss_km`
///
/// Each moves at `speed_kms` along ±y, so the relative speed is twice that.
pub fn crossing_pair(
    id_a: ObjectId,
    id_b: ObjectId,
    tca: DateTime<Utc>,
    miss_km: f64,
    speed_kms: f64,
) -> (LinearPropagator, OrbitalState, OrbitalState) {
    let propagator = LinearPropagator::new()
        .with_track(id_a, tca, [7000.0, 0.0, 0.0], [0.0, speed_kms, 0.0])
        .with_track(id_b, tca, [7000.0 + miss_km, 0.0, 0.0], [0.0, -speed_kms, 0.0]);
    (propagator, state(id_a, tca), state(id_b, tca))
}
