//! SGP4 propagation backed by the `sgp4` crate

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use ::sgp4::{Constants, Elements, MinutesSinceEpoch};

use super::{check_speed, Propagator};
use crate::error::{Error, Result};
use crate::types::{MeanElements, ObjectId, ObjectMetadata, OrbitalState, StateVector};

/// Parsed element set plus its initialized SGP4 constants
struct Model {
    elements: Elements,
    constants: Constants,
}

/// SGP4 propagator with a per-element-set model cache
///
/// Models are keyed by (object, epoch) so a refreshed element set never reuses
/// constants from an older one.
pub struct Sgp4Propagator {
    models: DashMap<(ObjectId, i64), Arc<Model>>,
}

impl Sgp4Propagator {
    pub fn new() -> Self {
        Self {
            models: DashMap::new(),
        }
    }

    /// Number of cached models
    pub fn cached_models(&self) -> usize {
        self.models.len()
    }

    fn model(&self, state: &OrbitalState) -> Result<Arc<Model>> {
        let key = (state.object_id, state.epoch.timestamp_millis());
        if let Some(model) = self.models.get(&key) {
            return Ok(model.clone());
        }

        let elements = Elements::from_tle(None, state.line1.as_bytes(), state.line2.as_bytes())
            .map_err(|e| Error::propagation(state.object_id, format!("TLE parse: {}", e)))?;
        let constants = Constants::from_elements(&elements)
            .map_err(|e| Error::propagation(state.object_id, format!("initialization: {}", e)))?;

        let model = Arc::new(Model { elements, constants });
        self.models.insert(key, model.clone());
        Ok(model)
    }
}

impl Default for Sgp4Propagator {
    fn default() -> Self {
        Self::new()
    }
}

impl Propagator for Sgp4Propagator {
    fn propagate(&self, state: &OrbitalState, at: DateTime<Utc>) -> Result<StateVector> {
        let model = self.model(state)?;

        let minutes: MinutesSinceEpoch = model
            .elements
            .datetime_to_minutes_since_epoch(&at.naive_utc())
            .map_err(|e| Error::propagation(state.object_id, format!("time conversion: {}", e)))?;
        let prediction = model
            .constants
            .propagate(minutes)
            .map_err(|e| Error::propagation(state.object_id, e.to_string()))?;

        let sv = StateVector::new(prediction.position, prediction.velocity);
        if !sv.position_km.iter().chain(sv.velocity_kms.iter()).all(|v| v.is_finite()) {
            return Err(Error::propagation(state.object_id, "non-finite state vector"));
        }
        check_speed(state.object_id, &sv);
        Ok(sv)
    }

    fn name(&self) -> &str {
        "sgp4"
    }
}

/// Parse one two-line element set into an orbital state
pub fn parse_tle(line1: &str, line2: &str) -> Result<OrbitalState> {
    let line1 = line1.trim_end();
    let line2 = line2.trim_end();
    let elements = Elements::from_tle(None, line1.as_bytes(), line2.as_bytes())
        .map_err(|e| Error::InvalidElements(e.to_string()))?;
    state_from_elements(&elements, line1, line2)
}

fn state_from_elements(elements: &Elements, line1: &str, line2: &str) -> Result<OrbitalState> {
    let object_id = ObjectId::try_from(elements.norad_id).map_err(|_| {
        Error::InvalidElements(format!("catalog number {} out of range", elements.norad_id))
    })?;

    Ok(OrbitalState {
        object_id,
        epoch: DateTime::<Utc>::from_naive_utc_and_offset(elements.datetime, Utc),
        elements: MeanElements {
            inclination_deg: elements.inclination,
            eccentricity: elements.eccentricity,
            raan_deg: elements.right_ascension,
            mean_motion_rev_per_day: elements.mean_motion,
            arg_perigee_deg: elements.argument_of_perigee,
            mean_anomaly_deg: elements.mean_anomaly,
        },
        line1: line1.to_string(),
        line2: line2.to_string(),
    })
}

/// Parse a 2LE or 3LE catalog file
///
/// Returns the parsed entries and the number of element sets that failed to
/// parse. Objects without a title line are named after their catalog number.
pub fn parse_catalog_text(text: &str) -> (Vec<(ObjectMetadata, OrbitalState)>, usize) {
    let mut entries = Vec::new();
    let mut failures = 0;
    let mut name: Option<String> = None;
    let mut pending_line1: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim_end();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("1 ") {
            pending_line1 = Some(line);
        } else if line.starts_with("2 ") {
            let Some(line1) = pending_line1.take() else {
                failures += 1;
                continue;
            };
            match parse_tle(line1, line) {
                Ok(state) => {
                    let name = name
                        .take()
                        .unwrap_or_else(|| format!("OBJECT {}", state.object_id));
                    let metadata = ObjectMetadata {
                        object_id: state.object_id,
                        name,
                    };
                    entries.push((metadata, state));
                }
                Err(e) => {
                    tracing::debug!("Skipping element set: {}", e);
                    name = None;
                    failures += 1;
                }
            }
        } else {
            name = Some(line.trim_start_matches("0 ").trim().to_string());
            pending_line1 = None;
        }
    }

    (entries, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ISS_LINE1: &str = "1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992";
    const ISS_LINE2: &str = "2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008";

    #[test]
    fn test_parse_tle() {
        let state = parse_tle(ISS_LINE1, ISS_LINE2).unwrap();
        assert_eq!(state.object_id, 25544);
        assert!((state.elements.inclination_deg - 51.6461).abs() < 1e-9);
        assert!((state.elements.raan_deg - 221.2784).abs() < 1e-9);
        assert!((state.elements.mean_motion_rev_per_day - 15.49507896).abs() < 1e-6);
    }

    #[test]
    fn test_propagate_iss_near_epoch() {
        let state = parse_tle(ISS_LINE1, ISS_LINE2).unwrap();
        let propagator = Sgp4Propagator::new();

        let sv = propagator
            .propagate(&state, state.epoch + Duration::minutes(30))
            .unwrap();
        assert!(sv.altitude_km() > 350.0 && sv.altitude_km() < 450.0);
        assert!(sv.speed_kms() > 7.4 && sv.speed_kms() < 7.9);

        propagator.propagate(&state, state.epoch).unwrap();
        assert_eq!(propagator.cached_models(), 1);
    }

    #[test]
    fn test_malformed_tle_is_propagation_error() {
        let mut state = parse_tle(ISS_LINE1, ISS_LINE2).unwrap();
        state.line2 = "2 25544  garbage".to_string();

        let err = Sgp4Propagator::new()
            .propagate(&state, state.epoch)
            .unwrap_err();
        assert!(matches!(err, Error::Propagation { object_id: 25544, .. }));
    }

    #[test]
    fn test_parse_catalog_text() {
        let text = format!(
            "ISS (ZARYA)\n{}\n{}\n\nBROKEN\n1 99999U garbage\n2 99999 garbage\n",
            ISS_LINE1, ISS_LINE2
        );
        let (entries, failures) = parse_catalog_text(&text);
        assert_eq!(entries.len(), 1);
        assert_eq!(failures, 1);
        assert_eq!(entries[0].0.name, "ISS (ZARYA)");
        assert_eq!(entries[0].1.object_id, 25544);
    }
}
