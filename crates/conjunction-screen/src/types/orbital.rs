//! Orbital state and state-vector types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// NORAD catalog number
pub type ObjectId = u32;

/// Mean equatorial radius used for altitude (WGS-84), km
pub const EARTH_RADIUS_KM: f64 = 6378.137;

/// Raw mean elements as published in a two-line element set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanElements {
    /// Inclination in degrees
    pub inclination_deg: f64,
    /// Eccentricity (dimensionless)
    pub eccentricity: f64,
    /// Right ascension of the ascending node in degrees
    pub raan_deg: f64,
    /// Mean motion in revolutions per day
    pub mean_motion_rev_per_day: f64,
    /// Argument of perigee in degrees
    pub arg_perigee_deg: f64,
    /// Mean anomaly in degrees
    pub mean_anomaly_deg: f64,
}

/// The current orbital state of one catalog object
///
/// Read-only input to the engine. The TLE text is what the propagator consumes;
/// `elements` mirrors the parsed values for filtering without re-parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitalState {
    /// NORAD catalog number
    pub object_id: ObjectId,
    /// Element set epoch
    pub epoch: DateTime<Utc>,
    /// Parsed mean elements
    pub elements: MeanElements,
    /// TLE line 1
    pub line1: String,
    /// TLE line 2
    pub line2: String,
}

impl OrbitalState {
    /// Time elapsed since the element set epoch
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.epoch)
    }

    /// Whether the state is older than the configured maximum age
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_days: i64) -> bool {
        self.age(now).num_days() > max_age_days
    }
}

/// Identity and naming information for a catalog object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub object_id: ObjectId,
    pub name: String,
}

/// An object together with its current state, as read from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub metadata: ObjectMetadata,
    pub state: OrbitalState,
}

impl CatalogEntry {
    pub fn id(&self) -> ObjectId {
        self.metadata.object_id
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// Position (km) and velocity (km/s) in the TEME inertial frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    pub position_km: [f64; 3],
    pub velocity_kms: [f64; 3],
}

impl StateVector {
    pub fn new(position_km: [f64; 3], velocity_kms: [f64; 3]) -> Self {
        Self {
            position_km,
            velocity_kms,
        }
    }

    /// Euclidean distance between the two positions, km
    pub fn distance_to(&self, other: &StateVector) -> f64 {
        norm(sub(self.position_km, other.position_km))
    }

    /// Magnitude of the velocity difference, km/s
    pub fn relative_speed(&self, other: &StateVector) -> f64 {
        norm(sub(self.velocity_kms, other.velocity_kms))
    }

    /// Geocentric radius, km
    pub fn radius_km(&self) -> f64 {
        norm(self.position_km)
    }

    /// Height above the equatorial radius, km
    pub fn altitude_km(&self) -> f64 {
        self.radius_km() - EARTH_RADIUS_KM
    }

    pub fn speed_kms(&self) -> f64 {
        norm(self.velocity_kms)
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn norm(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}
