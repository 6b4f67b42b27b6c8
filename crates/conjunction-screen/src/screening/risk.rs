//! Risk classification and the geometric collision-probability proxy

use chrono::{DateTime, Utc};

use crate::config::RiskThresholds;
use crate::types::{CloseApproach, RiskLevel};

/// Maps (miss distance, relative velocity, time to TCA) to a severity
#[derive(Debug, Clone)]
pub struct RiskClassifier {
    thresholds: RiskThresholds,
}

impl RiskClassifier {
    pub fn new(thresholds: &RiskThresholds) -> Self {
        Self {
            thresholds: thresholds.clone(),
        }
    }

    /// Classify a close approach relative to `now`
    pub fn assess(&self, approach: &CloseApproach, now: DateTime<Utc>) -> RiskLevel {
        self.classify(
            approach.miss_distance_km(),
            approach.relative_velocity_kms(),
            hours_to_tca(approach.tca, now),
        )
    }

    /// First matching rule wins
    pub fn classify(&self, miss_km: f64, relative_velocity_kms: f64, hours_to_tca: i64) -> RiskLevel {
        let t = &self.thresholds;
        let velocity_factor = (relative_velocity_kms / 10.0).clamp(0.5, 2.0);
        let effective_miss_km = miss_km / velocity_factor;

        if miss_km < t.critical_miss_km && hours_to_tca < t.critical_hours {
            RiskLevel::Critical
        } else if miss_km < t.close_miss_km && relative_velocity_kms > t.critical_velocity_kms {
            RiskLevel::Critical
        } else if effective_miss_km < t.high_effective_miss_km && hours_to_tca < t.high_hours {
            RiskLevel::High
        } else if miss_km < t.close_miss_km {
            RiskLevel::High
        } else if effective_miss_km < t.medium_effective_miss_km && hours_to_tca < t.medium_hours {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Whole hours until TCA, truncated, never negative
pub fn hours_to_tca(tca: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    tca.signed_duration_since(now).num_hours().max(0)
}

/// HIGH and CRITICAL need a human to look at them
pub fn requires_attention(level: RiskLevel) -> bool {
    matches!(level, RiskLevel::High | RiskLevel::Critical)
}

/// One-line summary for attention-level log records
pub fn risk_summary(approach: &CloseApproach, level: RiskLevel) -> String {
    format!(
        "[{}] Conjunction between {} and {}: TCA={}, Miss Distance={:.0}m, Relative Velocity={:.1}m/s",
        level,
        approach.primary_id,
        approach.secondary_id,
        approach.tca,
        approach.miss_distance_m,
        approach.relative_velocity_ms
    )
}

/// Rough collision likelihood from distance (km) and relative speed (km/s)
///
/// A geometric proxy with no covariance behind it. Not a calibrated Pc.
pub fn collision_probability(distance_km: f64, relative_velocity_kms: f64) -> f64 {
    let hard_body_km = 0.01;
    let uncertainty_km = 0.01 + 0.01 * relative_velocity_kms;
    let combined_km = hard_body_km + uncertainty_km;

    if distance_km < combined_km {
        return 0.99;
    }
    if distance_km < 3.0 * combined_km {
        return 0.50;
    }

    let velocity_factor = 1.0 + relative_velocity_kms / 15.0;
    (velocity_factor * (-distance_km / combined_km).exp()).min(0.99)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn classifier() -> RiskClassifier {
        RiskClassifier::new(&RiskThresholds::default())
    }

    #[test]
    fn test_critical_boundaries() {
        let c = classifier();
        assert_eq!(c.classify(0.999, 7.0, 23), RiskLevel::Critical);
        assert_eq!(c.classify(1.5, 13.0, 100), RiskLevel::Critical);
        // just outside the imminence window
        assert_ne!(c.classify(0.999, 7.0, 24), RiskLevel::Critical);
    }

    #[test]
    fn test_high_rules() {
        let c = classifier();
        // fast crossing halves the effective miss: 4 km at 20 km/s -> 2 km effective
        assert_eq!(c.classify(4.0, 20.0, 40), RiskLevel::High);
        // close but far in the future
        assert_eq!(c.classify(1.8, 7.0, 200), RiskLevel::High);
        // a slow 4 km pass is scaled up to 8 km effective
        assert_eq!(c.classify(4.0, 2.0, 40), RiskLevel::Medium);
    }

    #[test]
    fn test_medium_and_low() {
        let c = classifier();
        assert_eq!(c.classify(9.0, 10.0, 70), RiskLevel::Medium);
        assert_eq!(c.classify(9.0, 10.0, 72), RiskLevel::Low);
        assert_eq!(c.classify(20.0, 15.0, 1), RiskLevel::Low);
    }

    #[test]
    fn test_hours_to_tca_truncates_and_clamps() {
        let now = Utc::now();
        assert_eq!(hours_to_tca(now + Duration::minutes(119), now), 1);
        assert_eq!(hours_to_tca(now - Duration::hours(5), now), 0);
    }

    #[test]
    fn test_past_tca_counts_as_imminent() {
        let now = Utc::now();
        let approach = crate::test_support::approach(1, 2, now - Duration::hours(3), 500.0, 7000.0);
        assert_eq!(classifier().assess(&approach, now), RiskLevel::Critical);
    }

    #[test]
    fn test_collision_probability_bands() {
        // combined radius at 10 km/s is 0.12 km
        assert_eq!(collision_probability(0.1, 10.0), 0.99);
        assert_eq!(collision_probability(0.3, 10.0), 0.50);
        let far = collision_probability(1.0, 10.0);
        assert!(far > 0.0 && far < 0.5);
        assert!(collision_probability(5.0, 10.0) < far);
        assert!(collision_probability(0.0, 0.0) <= 0.99);
    }

    #[test]
    fn test_attention_levels() {
        assert!(requires_attention(RiskLevel::Critical));
        assert!(requires_attention(RiskLevel::High));
        assert!(!requires_attention(RiskLevel::Medium));
        assert!(!requires_attention(RiskLevel::Low));
    }
}
