//! Conjunction, alert and risk types

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::orbital::{ObjectId, StateVector};

/// Unordered pair of catalog objects
///
/// Always stored as (low, high), so `CandidatePair::new(a, b) == CandidatePair::new(b, a)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidatePair {
    low: ObjectId,
    high: ObjectId,
}

impl CandidatePair {
    pub fn new(a: ObjectId, b: ObjectId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> ObjectId {
        self.low
    }

    pub fn high(&self) -> ObjectId {
        self.high
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.low == id || self.high == id
    }
}

impl fmt::Display for CandidatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.low, self.high)
    }
}

/// Severity of a predicted close approach, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            "CRITICAL" => Ok(RiskLevel::Critical),
            other => Err(crate::error::Error::config(format!(
                "unknown risk level '{}'",
                other
            ))),
        }
    }
}

/// A refined close approach between two objects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseApproach {
    pub primary_id: ObjectId,
    pub secondary_id: ObjectId,
    /// Time of closest approach
    pub tca: DateTime<Utc>,
    /// Miss distance in metres
    pub miss_distance_m: f64,
    /// Relative velocity at TCA in m/s
    pub relative_velocity_ms: f64,
    /// Primary altitude at TCA, km
    pub primary_altitude_km: f64,
    /// Secondary altitude at TCA, km
    pub secondary_altitude_km: f64,
    /// Primary state vector at TCA
    pub primary_state: StateVector,
    /// Secondary state vector at TCA
    pub secondary_state: StateVector,
    /// One or both element sets were older than the configured maximum age
    #[serde(default)]
    pub stale_state: bool,
}

impl CloseApproach {
    pub fn pair(&self) -> CandidatePair {
        CandidatePair::new(self.primary_id, self.secondary_id)
    }

    pub fn miss_distance_km(&self) -> f64 {
        self.miss_distance_m / 1000.0
    }

    pub fn relative_velocity_kms(&self) -> f64 {
        self.relative_velocity_ms / 1000.0
    }
}

impl fmt::Display for CloseApproach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Conjunction[Primary={}, Secondary={}, TCA={}, Miss={:.1}m, RelVel={:.1}m/s, Alt1={:.1}km, Alt2={:.1}km]",
            self.primary_id,
            self.secondary_id,
            self.tca,
            self.miss_distance_m,
            self.relative_velocity_ms,
            self.primary_altitude_km,
            self.secondary_altitude_km
        )
    }
}

/// Normalize a TCA to the resolution of the alert idempotency key (whole seconds)
pub fn alert_key_time(tca: DateTime<Utc>) -> DateTime<Utc> {
    tca.trunc_subsecs(0)
}

/// A persisted collision alert
///
/// Keyed by (unordered pair, TCA). Immutable once created except for
/// `resolved` and `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub satellite1_id: ObjectId,
    pub satellite2_id: ObjectId,
    /// TCA truncated to whole seconds
    pub tca: DateTime<Utc>,
    /// Minimum distance, km
    pub min_distance_km: f64,
    /// Relative velocity at TCA, km/s
    pub relative_velocity_kms: f64,
    /// Geometric collision-probability proxy (not a calibrated Pc)
    pub collision_probability: f64,
    pub risk_level: RiskLevel,
    pub resolved: bool,
    pub satellite1_position_km: [f64; 3],
    pub satellite2_position_km: [f64; 3],
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    pub fn pair(&self) -> CandidatePair {
        CandidatePair::new(self.satellite1_id, self.satellite2_id)
    }
}

/// A close approach recorded by single-primary analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConjunctionEvent {
    pub id: Uuid,
    pub primary_id: ObjectId,
    pub secondary_id: ObjectId,
    pub tca: DateTime<Utc>,
    pub miss_distance_m: f64,
    pub relative_velocity_ms: f64,
    pub risk_level: RiskLevel,
    pub primary_altitude_km: f64,
    pub secondary_altitude_km: f64,
    pub screening_epoch: DateTime<Utc>,
    #[serde(default)]
    pub stale_state: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConjunctionEvent {
    pub fn from_approach(
        approach: &CloseApproach,
        risk_level: RiskLevel,
        screening_epoch: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            primary_id: approach.primary_id,
            secondary_id: approach.secondary_id,
            tca: alert_key_time(approach.tca),
            miss_distance_m: approach.miss_distance_m,
            relative_velocity_ms: approach.relative_velocity_ms,
            risk_level,
            primary_altitude_km: approach.primary_altitude_km,
            secondary_altitude_km: approach.secondary_altitude_km,
            screening_epoch,
            stale_state: approach.stale_state,
            created_at: now,
            updated_at: now,
        }
    }
}
