//! Element normalization: semi-major axis, altitude and LEO membership

use std::f64::consts::PI;

use crate::types::{MeanElements, OrbitalState, EARTH_RADIUS_KM};

/// Earth gravitational parameter, km^3/s^2
pub const MU_EARTH: f64 = 398_600.4418;

/// LEO altitude band, km
pub const LEO_MIN_ALTITUDE_KM: f64 = 160.0;
pub const LEO_MAX_ALTITUDE_KM: f64 = 2000.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

impl MeanElements {
    /// Semi-major axis from mean motion, km
    ///
    /// `None` unless mean motion is strictly positive.
    pub fn semi_major_axis_km(&self) -> Option<f64> {
        let n = self.mean_motion_rev_per_day;
        if n <= 0.0 || !n.is_finite() {
            return None;
        }
        let n_rad = n * 2.0 * PI / SECONDS_PER_DAY;
        Some((MU_EARTH / (n_rad * n_rad)).cbrt())
    }

    /// Mean altitude above the equatorial radius, km
    pub fn altitude_km(&self) -> Option<f64> {
        self.semi_major_axis_km().map(|a| a - EARTH_RADIUS_KM)
    }

    pub fn is_leo(&self) -> bool {
        self.altitude_km()
            .map(|alt| (LEO_MIN_ALTITUDE_KM..=LEO_MAX_ALTITUDE_KM).contains(&alt))
            .unwrap_or(false)
    }

    /// Coarse box test: altitude and inclination within tolerance
    pub fn can_conjunct_with(&self, other: &MeanElements, alt_tol_km: f64, inc_tol_deg: f64) -> bool {
        let (Some(a), Some(b)) = (self.altitude_km(), other.altitude_km()) else {
            return false;
        };
        (a - b).abs() <= alt_tol_km
            && (self.inclination_deg - other.inclination_deg).abs() <= inc_tol_deg
    }

    /// Circular RAAN difference in [0, 180] degrees
    pub fn raan_difference_deg(&self, other: &MeanElements) -> f64 {
        circular_difference_deg(self.raan_deg, other.raan_deg)
    }
}

impl OrbitalState {
    pub fn altitude_km(&self) -> Option<f64> {
        self.elements.altitude_km()
    }

    pub fn semi_major_axis_km(&self) -> Option<f64> {
        self.elements.semi_major_axis_km()
    }

    pub fn is_leo(&self) -> bool {
        self.elements.is_leo()
    }
}

/// Smallest angle between two directions, degrees
pub fn circular_difference_deg(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 360.0;
    diff.min(360.0 - diff)
}
