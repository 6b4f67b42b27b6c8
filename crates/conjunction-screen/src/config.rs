//! Configuration for the screening engine

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::ObjectId;

/// Main screening configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreeningConfig {
    /// Worker pool configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Catalog-wide sweep configuration
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Direct pairwise query configuration
    #[serde(default)]
    pub pairwise: PairwiseConfig,
    /// Single-primary analysis configuration
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// TCA refinement configuration
    #[serde(default)]
    pub refinement: RefinementConfig,
    /// Candidate filter cascade configuration
    #[serde(default)]
    pub filter: FilterConfig,
    /// Co-location heuristics
    #[serde(default)]
    pub co_location: CoLocationConfig,
    /// Risk classification thresholds
    #[serde(default)]
    pub risk: RiskThresholds,
    /// Element set staleness
    #[serde(default)]
    pub staleness: StalenessConfig,
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

impl ScreeningConfig {
    /// Load and validate a configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ScreeningConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every tunable is usable before any expensive work starts
    pub fn validate(&self) -> Result<()> {
        if self.processing.workers == Some(0) {
            return Err(Error::config("processing.workers must be at least 1"));
        }
        positive("sweep.search_radius_km", self.sweep.search_radius_km)?;
        positive("sweep.coarse_step_secs", self.sweep.coarse_step_secs)?;
        positive("sweep.alert_distance_km", self.sweep.alert_distance_km)?;
        positive("pairwise.coarse_step_secs", self.pairwise.coarse_step_secs)?;
        positive("analysis.coarse_step_secs", self.analysis.coarse_step_secs)?;
        positive("analysis.screening_distance_km", self.analysis.screening_distance_km)?;
        positive("refinement.fine_window_secs", self.refinement.fine_window_secs)?;
        positive("refinement.fine_step_secs", self.refinement.fine_step_secs)?;
        positive("refinement.polish_window_secs", self.refinement.polish_window_secs)?;
        positive("refinement.polish_step_secs", self.refinement.polish_step_secs)?;
        non_negative("refinement.polish_trigger_km", self.refinement.polish_trigger_km)?;
        non_negative(
            "refinement.min_relative_velocity_kms",
            self.refinement.min_relative_velocity_kms,
        )?;
        non_negative("filter.altitude_tolerance_km", self.filter.altitude_tolerance_km)?;
        non_negative(
            "filter.inclination_tolerance_deg",
            self.filter.inclination_tolerance_deg,
        )?;
        non_negative("filter.raan.tolerance_deg", self.filter.raan.tolerance_deg)?;
        if self.co_location.recent_deployment_days < 0 {
            return Err(Error::config("co_location.recent_deployment_days must be >= 0"));
        }
        if self.staleness.max_state_age_days < 0 {
            return Err(Error::config("staleness.max_state_age_days must be >= 0"));
        }
        self.risk.validate()
    }

    /// Number of worker threads for the parallel phases
    pub fn worker_count(&self) -> usize {
        self.processing
            .workers
            .unwrap_or_else(|| num_cpus::get().min(8))
            .max(1)
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::config(format!("{} must be > 0 (got {})", name, value)))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::config(format!("{} must be >= 0 (got {})", name, value)))
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Number of worker threads (default: CPU count, max 8)
    pub workers: Option<usize>,
}

/// Catalog-wide sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Allow full catalog sweeps (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Proximity search radius, also the grid cell size (default: 100 km)
    #[serde(default = "default_search_radius")]
    pub search_radius_km: f64,
    /// Coarse TCA scan step for grid-driven pairs (default: 30 s)
    #[serde(default = "default_batch_step")]
    pub coarse_step_secs: f64,
    /// Approaches closer than this raise an alert (default: 25 km)
    #[serde(default = "default_alert_distance")]
    pub alert_distance_km: f64,
}

fn default_true() -> bool { true }
fn default_search_radius() -> f64 { 100.0 }
fn default_batch_step() -> f64 { 30.0 }
fn default_alert_distance() -> f64 { 25.0 }

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_radius_km: 100.0,
            coarse_step_secs: 30.0,
            alert_distance_km: 25.0,
        }
    }
}

/// Direct pairwise query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairwiseConfig {
    /// Coarse TCA scan step for direct pair checks (default: 600 s = 10 minutes)
    #[serde(default = "default_pairwise_step")]
    pub coarse_step_secs: f64,
}

fn default_pairwise_step() -> f64 { 600.0 }

impl Default for PairwiseConfig {
    fn default() -> Self {
        Self {
            coarse_step_secs: 600.0,
        }
    }
}

/// Single-primary analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Allow single-primary analysis (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Coarse TCA scan step (default: 30 s)
    #[serde(default = "default_batch_step")]
    pub coarse_step_secs: f64,
    /// Pairs whose coarse minimum exceeds this are dropped before refinement (default: 50 km)
    #[serde(default = "default_screening_distance")]
    pub screening_distance_km: f64,
}

fn default_screening_distance() -> f64 { 50.0 }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            coarse_step_secs: 30.0,
            screening_distance_km: 50.0,
        }
    }
}

/// TCA refinement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Half-width of the fine window around the coarse minimum (default: 120 s)
    #[serde(default = "default_fine_window")]
    pub fine_window_secs: f64,
    /// Fine scan step (default: 1 s)
    #[serde(default = "default_fine_step")]
    pub fine_step_secs: f64,
    /// Half-width of the polish window around the fine minimum (default: 10 s)
    #[serde(default = "default_polish_window")]
    pub polish_window_secs: f64,
    /// Polish scan step (default: 0.1 s)
    #[serde(default = "default_polish_step")]
    pub polish_step_secs: f64,
    /// Polish only runs when the fine minimum is below this (default: 100 km)
    #[serde(default = "default_polish_trigger")]
    pub polish_trigger_km: f64,
    /// Approaches slower than this are co-moving false positives (default: 0.5 km/s)
    #[serde(default = "default_min_relative_velocity")]
    pub min_relative_velocity_kms: f64,
}

fn default_fine_window() -> f64 { 120.0 }
fn default_fine_step() -> f64 { 1.0 }
fn default_polish_window() -> f64 { 10.0 }
fn default_polish_step() -> f64 { 0.1 }
fn default_polish_trigger() -> f64 { 100.0 }
fn default_min_relative_velocity() -> f64 { 0.5 }

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            fine_window_secs: 120.0,
            fine_step_secs: 1.0,
            polish_window_secs: 10.0,
            polish_step_secs: 0.1,
            polish_trigger_km: 100.0,
            min_relative_velocity_kms: 0.5,
        }
    }
}

/// Candidate filter cascade configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Maximum altitude difference for the coarse box filter (default: 150 km)
    #[serde(default = "default_altitude_tolerance")]
    pub altitude_tolerance_km: f64,
    /// Maximum inclination difference for the coarse box filter (default: 30 deg)
    #[serde(default = "default_inclination_tolerance")]
    pub inclination_tolerance_deg: f64,
    /// Orbital-plane filter
    #[serde(default)]
    pub raan: RaanFilterConfig,
}

fn default_altitude_tolerance() -> f64 { 150.0 }
fn default_inclination_tolerance() -> f64 { 30.0 }

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            altitude_tolerance_km: 150.0,
            inclination_tolerance_deg: 30.0,
            raan: RaanFilterConfig::default(),
        }
    }
}

/// RAAN (orbital-plane) filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaanFilterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum circular RAAN difference (default: 45 deg)
    #[serde(default = "default_raan_tolerance")]
    pub tolerance_deg: f64,
    /// The filter only runs when more candidates than this remain (default: 100)
    #[serde(default = "default_raan_activation")]
    pub activation_candidate_count: usize,
}

fn default_raan_tolerance() -> f64 { 45.0 }
fn default_raan_activation() -> usize { 100 }

impl Default for RaanFilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance_deg: 45.0,
            activation_candidate_count: 100,
        }
    }
}

/// Co-location heuristics: station identifiers and name tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoLocationConfig {
    /// Catalog numbers of crewed-platform modules
    #[serde(default = "default_station_ids")]
    pub station_ids: Vec<ObjectId>,
    /// Upper-case name fragments of stations and frequently docked vehicles
    #[serde(default = "default_station_tokens")]
    pub station_name_tokens: Vec<String>,
    /// Upper-case constellation name fragments
    #[serde(default = "default_constellation_tokens")]
    pub constellation_tokens: Vec<String>,
    /// Maximum age of the newer epoch for the fresh-deployment rule (default: 7 days)
    #[serde(default = "default_recent_deployment_days")]
    pub recent_deployment_days: i64,
}

fn default_station_ids() -> Vec<ObjectId> {
    // ISS (Zarya), ISS (Nauka), CSS Tianhe-1, CSS Wentian, CSS Mengtian
    vec![25544, 15902, 48274, 17388, 18086]
}

fn default_station_tokens() -> Vec<String> {
    [
        "ISS", "CSS", "TIANHE", "WENTIAN", "MENGTIAN", "NAUKA", "PROGRESS", "SOYUZ",
        "DRAGON", "CYGNUS", "HTV", "TIANZHOU", "SZ-",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_constellation_tokens() -> Vec<String> {
    ["STARLINK", "ONEWEB", "IRIDIUM", "GLOBALSTAR", "PLANET", "FLOCK"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_recent_deployment_days() -> i64 { 7 }

impl Default for CoLocationConfig {
    fn default() -> Self {
        Self {
            station_ids: default_station_ids(),
            station_name_tokens: default_station_tokens(),
            constellation_tokens: default_constellation_tokens(),
            recent_deployment_days: 7,
        }
    }
}

/// Risk classification thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// CRITICAL when closer than this and imminent (default: 1 km)
    #[serde(default = "default_critical_miss")]
    pub critical_miss_km: f64,
    /// Imminence window for the CRITICAL distance rule (default: 24 h)
    #[serde(default = "default_critical_hours")]
    pub critical_hours: i64,
    /// Close-pass distance for the velocity and HIGH fallback rules (default: 2 km)
    #[serde(default = "default_close_miss")]
    pub close_miss_km: f64,
    /// CRITICAL when a close pass is faster than this (default: 12 km/s)
    #[serde(default = "default_critical_velocity")]
    pub critical_velocity_kms: f64,
    /// HIGH effective-miss threshold (default: 5 km)
    #[serde(default = "default_high_miss")]
    pub high_effective_miss_km: f64,
    /// HIGH imminence window (default: 48 h)
    #[serde(default = "default_high_hours")]
    pub high_hours: i64,
    /// MEDIUM effective-miss threshold (default: 10 km)
    #[serde(default = "default_medium_miss")]
    pub medium_effective_miss_km: f64,
    /// MEDIUM imminence window (default: 72 h)
    #[serde(default = "default_medium_hours")]
    pub medium_hours: i64,
}

fn default_critical_miss() -> f64 { 1.0 }
fn default_critical_hours() -> i64 { 24 }
fn default_close_miss() -> f64 { 2.0 }
fn default_critical_velocity() -> f64 { 12.0 }
fn default_high_miss() -> f64 { 5.0 }
fn default_high_hours() -> i64 { 48 }
fn default_medium_miss() -> f64 { 10.0 }
fn default_medium_hours() -> i64 { 72 }

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical_miss_km: 1.0,
            critical_hours: 24,
            close_miss_km: 2.0,
            critical_velocity_kms: 12.0,
            high_effective_miss_km: 5.0,
            high_hours: 48,
            medium_effective_miss_km: 10.0,
            medium_hours: 72,
        }
    }
}

impl RiskThresholds {
    fn validate(&self) -> Result<()> {
        non_negative("risk.critical_miss_km", self.critical_miss_km)?;
        non_negative("risk.close_miss_km", self.close_miss_km)?;
        non_negative("risk.critical_velocity_kms", self.critical_velocity_kms)?;
        non_negative("risk.high_effective_miss_km", self.high_effective_miss_km)?;
        non_negative("risk.medium_effective_miss_km", self.medium_effective_miss_km)?;
        if self.critical_hours < 0 || self.high_hours < 0 || self.medium_hours < 0 {
            return Err(Error::config("risk hour windows must be >= 0"));
        }
        Ok(())
    }
}

/// Element set staleness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StalenessConfig {
    /// States older than this are flagged stale (default: 30 days)
    #[serde(default = "default_max_state_age")]
    pub max_state_age_days: i64,
}

fn default_max_state_age() -> i64 { 30 }

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            max_state_age_days: 30,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let database_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("conjunction-screen")
            .join("catalog.db");

        Self { database_path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScreeningConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sweep.search_radius_km, 100.0);
        assert_eq!(config.refinement.polish_step_secs, 0.1);
        assert_eq!(config.filter.raan.activation_candidate_count, 100);
        assert!(config.co_location.station_ids.contains(&25544));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ScreeningConfig::from_toml_str(
            r#"
            [processing]
            workers = 4

            [sweep]
            search_radius_km = 50.0

            [filter.raan]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.worker_count(), 4);
        assert_eq!(config.sweep.search_radius_km, 50.0);
        assert_eq!(config.sweep.coarse_step_secs, 30.0);
        assert!(!config.filter.raan.enabled);
        assert_eq!(config.filter.raan.tolerance_deg, 45.0);
        assert_eq!(config.refinement.fine_window_secs, 120.0);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = ScreeningConfig::from_toml_str("[sweep]\nsearch_radius_km = 0.0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ScreeningConfig::from_toml_str("[processing]\nworkers = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
