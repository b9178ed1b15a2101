// src/config/mod.rs
//! Decomposition configuration
//!
//! Every option has a constant-backed default, so a partial TOML file (or no
//! file at all) yields a usable configuration. [`DecompositionConfig::validate`]
//! reports every problem found rather than stopping at the first one.

pub mod constants;
pub mod geometry;
pub mod loader;

pub use geometry::{ArrayGeometry, EmgType};
pub use loader::ConfigLoader;

use crate::decomposition::contrast::ContrastFunction;
use crate::decomposition::fixed_point::InitializationMode;
use crate::error::{DecompResult, DecompositionError};
use serde::{Deserialize, Serialize};

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DecompositionConfig {
    #[serde(default)]
    pub conditioning: ConditioningConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub separation: SeparationConfig,
    #[serde(default)]
    pub spikes: SpikeConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub peel_off: PeelOffConfig,
    #[serde(default)]
    pub postprocessing: PostProcessingConfig,
}

/// Notch and bandpass switches
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConditioningConfig {
    #[serde(default = "defaults::enabled")]
    pub notch_enabled: bool,

    #[serde(default = "defaults::notch_bandwidth_hz")]
    pub notch_bandwidth_hz: f64,

    #[serde(default = "defaults::notch_threshold_sd")]
    pub notch_threshold_sd: f64,

    #[serde(default = "defaults::enabled")]
    pub bandpass_enabled: bool,
}

/// Windowing and delay extension
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SegmentationConfig {
    #[serde(default = "defaults::window_count")]
    pub window_count: usize,

    /// Seconds dropped from both ends of each window's extended signal
    #[serde(default = "defaults::edge_trim_s")]
    pub edge_trim_s: f64,

    /// Extended channel count aimed for; the extension factor is
    /// `round(target / active channels)`
    #[serde(default = "defaults::extension_target")]
    pub extension_target: usize,

    /// When set, and a reference signal is supplied, the analysis range is
    /// the span where the reference reaches this fraction of its maximum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_plateau_fraction: Option<f64>,
}

/// Fixed-point extraction settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SeparationConfig {
    /// Candidate sources attempted per window
    #[serde(default = "defaults::candidates_per_window")]
    pub candidates_per_window: usize,

    /// Fixed-point iteration cap per candidate
    #[serde(default = "defaults::max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "defaults::convergence_tolerance")]
    pub convergence_tolerance: f64,

    #[serde(default)]
    pub contrast: ContrastFunction,

    #[serde(default)]
    pub initialization: InitializationMode,

    #[serde(default = "defaults::seed")]
    pub seed: u64,

    /// Run windows and electrodes on the rayon pool
    #[serde(default = "defaults::enabled")]
    pub parallel: bool,
}

/// Peak detection settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SpikeConfig {
    #[serde(default = "defaults::peak_distance_ms")]
    pub peak_distance_ms: f64,

    #[serde(default = "defaults::reconciliation_peak_distance_ms")]
    pub reconciliation_peak_distance_ms: f64,

    #[serde(default = "defaults::min_discharges")]
    pub min_discharges: usize,
}

/// Acceptance gates
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QualityConfig {
    #[serde(default = "defaults::sil_threshold")]
    pub sil_threshold: f64,

    #[serde(default = "defaults::cov_threshold")]
    pub cov_threshold: f64,

    /// Reject candidates whose CoV(ISI) exceeds `cov_threshold`
    #[serde(default = "defaults::enabled")]
    pub cov_filter: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PeelOffConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "defaults::peel_off_window_ms")]
    pub window_ms: f64,
}

/// Outlier and duplicate handling
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PostProcessingConfig {
    #[serde(default = "defaults::enabled")]
    pub remove_outliers: bool,

    #[serde(default = "defaults::outlier_cov_threshold")]
    pub outlier_cov_threshold: f64,

    #[serde(default = "defaults::enabled")]
    pub remove_duplicates: bool,

    #[serde(default)]
    pub remove_duplicates_between_electrodes: bool,

    #[serde(default = "defaults::duplicate_threshold")]
    pub duplicate_threshold: f64,

    #[serde(default = "defaults::duplicate_jitter_ms")]
    pub duplicate_jitter_ms: f64,

    #[serde(default = "defaults::duplicate_max_lag_ms")]
    pub duplicate_max_lag_ms: f64,
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::*;

    pub fn enabled() -> bool { true }

    pub fn notch_bandwidth_hz() -> f64 { conditioning::DEFAULT_NOTCH_BANDWIDTH_HZ }
    pub fn notch_threshold_sd() -> f64 { conditioning::DEFAULT_NOTCH_THRESHOLD_SD }

    pub fn window_count() -> usize { 1 }
    pub fn edge_trim_s() -> f64 { extension::DEFAULT_EDGE_TRIM_S }
    pub fn extension_target() -> usize { extension::DEFAULT_EXTENSION_TARGET }

    pub fn candidates_per_window() -> usize { separation::DEFAULT_CANDIDATES_PER_WINDOW }
    pub fn max_iterations() -> usize { separation::DEFAULT_MAX_ITERATIONS }
    pub fn convergence_tolerance() -> f64 { separation::DEFAULT_CONVERGENCE_TOLERANCE }
    pub fn seed() -> u64 { separation::DEFAULT_SEED }

    pub fn peak_distance_ms() -> f64 { spikes::DEFAULT_PEAK_DISTANCE_MS }
    pub fn reconciliation_peak_distance_ms() -> f64 { spikes::DEFAULT_RECONCILIATION_PEAK_DISTANCE_MS }
    pub fn min_discharges() -> usize { spikes::DEFAULT_MIN_DISCHARGES }

    pub fn sil_threshold() -> f64 { quality::DEFAULT_SIL_THRESHOLD }
    pub fn cov_threshold() -> f64 { quality::DEFAULT_COV_THRESHOLD }

    pub fn peel_off_window_ms() -> f64 { peel_off::DEFAULT_WINDOW_MS }

    pub fn outlier_cov_threshold() -> f64 { postprocessing::DEFAULT_OUTLIER_COV_THRESHOLD }
    pub fn duplicate_threshold() -> f64 { postprocessing::DEFAULT_DUPLICATE_THRESHOLD }
    pub fn duplicate_jitter_ms() -> f64 { postprocessing::DEFAULT_DUPLICATE_JITTER_MS }
    pub fn duplicate_max_lag_ms() -> f64 { postprocessing::DEFAULT_DUPLICATE_MAX_LAG_MS }
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            notch_enabled: defaults::enabled(),
            notch_bandwidth_hz: defaults::notch_bandwidth_hz(),
            notch_threshold_sd: defaults::notch_threshold_sd(),
            bandpass_enabled: defaults::enabled(),
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            window_count: defaults::window_count(),
            edge_trim_s: defaults::edge_trim_s(),
            extension_target: defaults::extension_target(),
            reference_plateau_fraction: None,
        }
    }
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            candidates_per_window: defaults::candidates_per_window(),
            max_iterations: defaults::max_iterations(),
            convergence_tolerance: defaults::convergence_tolerance(),
            contrast: ContrastFunction::default(),
            initialization: InitializationMode::default(),
            seed: defaults::seed(),
            parallel: defaults::enabled(),
        }
    }
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            peak_distance_ms: defaults::peak_distance_ms(),
            reconciliation_peak_distance_ms: defaults::reconciliation_peak_distance_ms(),
            min_discharges: defaults::min_discharges(),
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            sil_threshold: defaults::sil_threshold(),
            cov_threshold: defaults::cov_threshold(),
            cov_filter: defaults::enabled(),
        }
    }
}

impl Default for PeelOffConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_ms: defaults::peel_off_window_ms(),
        }
    }
}

impl Default for PostProcessingConfig {
    fn default() -> Self {
        Self {
            remove_outliers: defaults::enabled(),
            outlier_cov_threshold: defaults::outlier_cov_threshold(),
            remove_duplicates: defaults::enabled(),
            remove_duplicates_between_electrodes: false,
            duplicate_threshold: defaults::duplicate_threshold(),
            duplicate_jitter_ms: defaults::duplicate_jitter_ms(),
            duplicate_max_lag_ms: defaults::duplicate_max_lag_ms(),
        }
    }
}

impl DecompositionConfig {
    /// Check value ranges and cross-field consistency
    pub fn validate(&self) -> DecompResult<()> {
        let mut errors = Vec::new();

        let c = &self.conditioning;
        if !(c.notch_bandwidth_hz >= 0.0) {
            errors.push("conditioning.notch_bandwidth_hz must be non-negative".to_string());
        }
        if !(c.notch_threshold_sd > 0.0) {
            errors.push("conditioning.notch_threshold_sd must be positive".to_string());
        }

        let s = &self.segmentation;
        if s.window_count == 0 {
            errors.push("segmentation.window_count must be at least 1".to_string());
        }
        if !(s.edge_trim_s >= 0.0) {
            errors.push("segmentation.edge_trim_s must be non-negative".to_string());
        }
        if s.extension_target == 0 {
            errors.push("segmentation.extension_target must be at least 1".to_string());
        }
        if let Some(fraction) = s.reference_plateau_fraction {
            if !(fraction > 0.0 && fraction <= 1.0) {
                errors.push("segmentation.reference_plateau_fraction must be in (0, 1]".to_string());
            }
        }

        let sep = &self.separation;
        if sep.max_iterations == 0 {
            errors.push("separation.max_iterations must be at least 1".to_string());
        }
        if !(sep.convergence_tolerance > 0.0) {
            errors.push("separation.convergence_tolerance must be positive".to_string());
        }

        let sp = &self.spikes;
        if !(sp.peak_distance_ms > 0.0) || !(sp.reconciliation_peak_distance_ms > 0.0) {
            errors.push("spikes peak distances must be positive".to_string());
        }

        let q = &self.quality;
        if !(0.0..=1.0).contains(&q.sil_threshold) {
            errors.push("quality.sil_threshold must be in [0, 1]".to_string());
        }
        if !(q.cov_threshold > 0.0) {
            errors.push("quality.cov_threshold must be positive".to_string());
        }

        if self.peel_off.enabled && !(self.peel_off.window_ms > 0.0) {
            errors.push("peel_off.window_ms must be positive".to_string());
        }

        let p = &self.postprocessing;
        if !(p.outlier_cov_threshold > 0.0) {
            errors.push("postprocessing.outlier_cov_threshold must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&p.duplicate_threshold) {
            errors.push("postprocessing.duplicate_threshold must be in [0, 1]".to_string());
        }
        if !(p.duplicate_jitter_ms >= 0.0) || !(p.duplicate_max_lag_ms >= 0.0) {
            errors.push("postprocessing duplicate jitter and lag must be non-negative".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DecompositionError::configuration("decomposition", errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DecompositionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.separation.max_iterations, constants::separation::DEFAULT_MAX_ITERATIONS);
        assert_eq!(config.spikes.peak_distance_ms, 20.0);
        assert_eq!(config.spikes.reconciliation_peak_distance_ms, 5.0);
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let mut config = DecompositionConfig::default();
        config.segmentation.window_count = 0;
        config.quality.sil_threshold = 1.5;
        config.postprocessing.duplicate_threshold = -0.1;

        let err = config.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("window_count"));
        assert!(message.contains("sil_threshold"));
        assert!(message.contains("duplicate_threshold"));
    }

    #[test]
    fn test_nan_thresholds_rejected() {
        let mut config = DecompositionConfig::default();
        config.quality.cov_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
            [separation]
            contrast = "logcosh"
            initialization = "random"
            max_iterations = 75

            [peel_off]
            enabled = true
        "#;
        let config: DecompositionConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.separation.contrast, ContrastFunction::Logcosh);
        assert_eq!(config.separation.initialization, InitializationMode::Random);
        assert_eq!(config.separation.max_iterations, 75);
        assert!(config.peel_off.enabled);
        assert_eq!(config.peel_off.window_ms, constants::peel_off::DEFAULT_WINDOW_MS);
        assert_eq!(config.quality, QualityConfig::default());
    }

    #[test]
    fn test_config_serialization() {
        let config = DecompositionConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: DecompositionConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, deserialized);
    }
}
