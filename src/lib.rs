//! EMG-Decomp: motor unit decomposition of high-density EMG
//!
//! This library recovers motor unit discharge times from multi-channel
//! surface or intramuscular EMG by convolutive blind source separation.
//! It features:
//!
//! - Notch and bandpass conditioning per electrode
//! - Delay extension and eigen-based whitening
//! - Fixed-point source extraction with refinement and peel-off
//! - Reconciliation, outlier and duplicate removal across windows
//! - Parallel execution, progress reporting and cancellation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use emg_decomp::config::{ArrayGeometry, DecompositionConfig};
//! use emg_decomp::signal::{ElectrodeLayout, SignalBundle};
//! use emg_decomp::DecompositionEngine;
//! use ndarray::Array2;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let data = Array2::<f64>::zeros((64, 20480));
//!     let bundle = SignalBundle::new(data, 2048.0)?
//!         .with_electrode(ElectrodeLayout::contiguous(ArrayGeometry::from_name("GR08MM1305")?, 0));
//!
//!     let engine = DecompositionEngine::new(DecompositionConfig::default())?;
//!     let result = engine.decompose(&bundle)?;
//!     println!("{} motor units", result.total_motor_units());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod decomposition;
pub mod error;
pub mod postprocessing;
pub mod processing;
pub mod results;
pub mod signal;
pub mod simulation;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{ArrayGeometry, ConfigLoader, DecompositionConfig, EmgType};
pub use decomposition::{CancellationToken, DecompositionEngine, ProgressEvent};
pub use error::{DecompResult, DecompositionError};
pub use results::{DecompositionResult, ElectrodeDecomposition, MotorUnit};
pub use signal::{ElectrodeLayout, SignalBundle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Motor unit decomposition of high-density EMG".to_string(),
        features: vec![
            "Signal conditioning".to_string(),
            "Convolutive blind source separation".to_string(),
            "Motor unit post-processing".to_string(),
            "Parallel multi-electrode execution".to_string(),
            "Synthetic mixture generation".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}
