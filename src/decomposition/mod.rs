// src/decomposition/mod.rs
//! Convolutive blind source separation of motor unit spike trains
//!
//! The engine walks electrodes and windows; each window runs a stream of
//! fixed-point extractions in whitened space, with spike detection,
//! refinement and optional peel-off between candidates.

pub mod contrast;
pub mod engine;
pub mod fixed_point;
pub mod peel_off;
pub mod progress;
pub mod refinement;
pub mod spikes;
pub mod stream;

pub use contrast::ContrastFunction;
pub use engine::DecompositionEngine;
pub use fixed_point::{FixedPointOutcome, FixedPointSettings, InitializationMode, SeparationBasis};
pub use progress::{CancellationToken, ProgressEvent, ProgressReporter};
pub use refinement::{discharge_cov, refine, RefinedSource};
pub use spikes::{find_peaks, SpikeDetection, SpikeDetector};
pub use stream::{decompose_window, WindowDecomposition, WindowSource};
