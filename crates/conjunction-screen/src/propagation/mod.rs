//! Orbit propagation boundary
//!
//! The screening core only needs "state at time t" for an object. SGP4 is the
//! production implementation; tests plug in analytic motion.

mod sgp4;

pub use self::sgp4::{parse_catalog_text, parse_tle, Sgp4Propagator};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{OrbitalState, StateVector};

/// Maps an orbital state and a UTC instant to an inertial state vector
pub trait Propagator: Send + Sync {
    /// Propagate `state` to `at`
    ///
    /// Fails with [`crate::Error::Propagation`] on degenerate elements or divergence.
    fn propagate(&self, state: &OrbitalState, at: DateTime<Utc>) -> Result<StateVector>;

    /// Propagator name for logging
    fn name(&self) -> &str {
        "propagator"
    }
}

/// Typical LEO orbital speed band, km/s
const LEO_SPEED_RANGE_KMS: (f64, f64) = (6.5, 8.2);

/// Log speeds that are implausible for a low orbit
pub(crate) fn check_speed(object_id: u32, sv: &StateVector) {
    let speed = sv.speed_kms();
    if speed < LEO_SPEED_RANGE_KMS.0 || speed > LEO_SPEED_RANGE_KMS.1 {
        tracing::debug!(
            "Unusual orbital speed for object {}: {:.3} km/s (altitude {:.1} km)",
            object_id,
            speed,
            sv.altitude_km()
        );
    }
}
