// src/config/constants.rs
//! Engine-wide constants backing the configuration defaults

/// Signal conditioning constants
pub mod conditioning {
    /// Length of one notch analysis window, in seconds
    pub const NOTCH_WINDOW_S: f64 = 1.0;
    /// Width of the band cleared around each flagged bin
    pub const DEFAULT_NOTCH_BANDWIDTH_HZ: f64 = 4.0;
    /// Bins above `median + k * std` are treated as line interference
    pub const DEFAULT_NOTCH_THRESHOLD_SD: f64 = 5.0;

    pub const SURFACE_BANDPASS_ORDER: usize = 2;
    pub const SURFACE_BANDPASS_HZ: (f64, f64) = (20.0, 500.0);
    pub const INTRAMUSCULAR_BANDPASS_ORDER: usize = 3;
    pub const INTRAMUSCULAR_BANDPASS_HZ: (f64, f64) = (100.0, 4400.0);
}

/// Extension and whitening constants
pub mod extension {
    /// Number of extended channels aimed for (channels * factor)
    pub const DEFAULT_EXTENSION_TARGET: usize = 1000;
    pub const DEFAULT_EDGE_TRIM_S: f64 = 0.1;
}

/// Fixed-point separation constants
pub mod separation {
    /// Iteration cap used for the main extraction loop. A cap of 75 is also
    /// seen in lighter re-runs; both are reachable through configuration.
    pub const DEFAULT_MAX_ITERATIONS: usize = 500;
    pub const ALTERNATE_MAX_ITERATIONS: usize = 75;
    pub const DEFAULT_CONVERGENCE_TOLERANCE: f64 = 1e-4;
    pub const DEFAULT_CANDIDATES_PER_WINDOW: usize = 150;
    pub const DEFAULT_SEED: u64 = 0x5eed_e3c0;
}

/// Spike detection and quality scoring constants
pub mod spikes {
    /// Minimum peak spacing during separation and refinement
    pub const DEFAULT_PEAK_DISTANCE_MS: f64 = 20.0;
    /// Minimum peak spacing on reconstructed full-length pulse trains
    pub const DEFAULT_RECONCILIATION_PEAK_DISTANCE_MS: f64 = 5.0;
    /// Number of largest peaks averaged for normalization
    pub const NORMALIZATION_PEAK_COUNT: usize = 10;
    pub const KMEANS_MAX_ITERATIONS: usize = 100;
    /// Candidates with fewer discharges skip refinement and are rejected
    pub const DEFAULT_MIN_DISCHARGES: usize = 10;
}

/// Quality gate constants
pub mod quality {
    pub const DEFAULT_SIL_THRESHOLD: f64 = 0.9;
    pub const DEFAULT_COV_THRESHOLD: f64 = 0.5;
}

/// Peel-off constants
pub mod peel_off {
    /// Half-width of the waveform template cut around each discharge
    pub const DEFAULT_WINDOW_MS: f64 = 25.0;
}

/// Post-processing constants
pub mod postprocessing {
    pub const DEFAULT_OUTLIER_COV_THRESHOLD: f64 = 0.3;
    pub const MAX_OUTLIER_ITERATIONS: usize = 30;
    /// Rates above `mean + k * std` are flagged
    pub const OUTLIER_SD_FACTOR: f64 = 3.0;

    pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.3;
    pub const DEFAULT_DUPLICATE_JITTER_MS: f64 = 0.5;
    pub const DEFAULT_DUPLICATE_MAX_LAG_MS: f64 = 25.0;
    /// Cross-correlation peak needed before realigning by the best lag
    pub const REALIGNMENT_CORRELATION: f64 = 0.2;
}
