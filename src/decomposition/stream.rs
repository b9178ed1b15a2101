// src/decomposition/stream.rs
//! Candidate extraction loop over one analysis window of one electrode
//!
//! The stream owns everything that is private to its window: the whitened
//! residual (modified in place by peel-off), the separation basis and the
//! initializer. Candidates are extracted strictly one after another because
//! each one is deflated against the vectors found before it.

use super::fixed_point::{extract, stream_seed, FixedPointSettings, Initializer, SeparationBasis};
use super::peel_off::peel_off;
use super::progress::CancellationToken;
use super::refinement::refine;
use super::spikes::SpikeDetector;
use crate::config::DecompositionConfig;
use crate::error::{DecompResult, DecompositionError, ProcessingStage};
use crate::processing::{extend, whiten, WhiteningModel};
use crate::signal::AnalysisWindow;
use crate::utils::stats::ms_to_samples;
use ndarray::{s, Array1, Array2};
use tracing::{debug, trace};

/// Source accepted in one window
#[derive(Debug, Clone)]
pub struct WindowSource {
    /// Separation vector in the window's whitened space
    pub vector: Array1<f64>,
    /// Discharge times in recording samples
    pub discharges: Vec<usize>,
    pub sil: f64,
    pub cov: f64,
}

/// Everything one window contributes to reconciliation
#[derive(Debug, Clone)]
pub struct WindowDecomposition {
    pub electrode: usize,
    pub window: AnalysisWindow,
    /// Extended columns dropped at each end
    pub trim: usize,
    pub model: WhiteningModel,
    pub sources: Vec<WindowSource>,
    /// Candidates that produced a usable separation vector
    pub candidates: usize,
}

impl WindowDecomposition {
    /// Recording sample of the first retained extended column
    pub fn offset(&self) -> usize {
        self.window.start + self.trim
    }
}

/// Electrode-level inputs shared by every window stream
#[derive(Debug, Clone, Copy)]
pub struct StreamContext<'a> {
    pub config: &'a DecompositionConfig,
    pub sample_rate: f64,
    pub electrode: usize,
    pub extension_factor: usize,
    pub cancel: &'a CancellationToken,
}

impl StreamContext<'_> {
    /// Edge trim in samples
    pub fn trim(&self) -> usize {
        (self.config.segmentation.edge_trim_s * self.sample_rate).round() as usize
    }
}

/// Extended, trimmed observation matrix of one window
pub fn extended_window(
    data: &Array2<f64>,
    window: &AnalysisWindow,
    extension_factor: usize,
    trim: usize,
) -> DecompResult<Array2<f64>> {
    if window.end > data.ncols() || window.is_empty() {
        return Err(DecompositionError::shape(
            ProcessingStage::Extension,
            format!("window inside 0..{}", data.ncols()),
            format!("{}..{}", window.start, window.end),
        ));
    }
    let extended = extend(&data.slice(s![.., window.start..window.end]).to_owned(), extension_factor)?;
    let columns = extended.ncols();
    if 2 * trim + 2 > columns {
        return Err(DecompositionError::shape(
            ProcessingStage::Extension,
            format!("more than {} extended samples", 2 * trim + 1),
            format!("{} in window {}", columns, window.index),
        ));
    }
    Ok(extended.slice(s![.., trim..columns - trim]).to_owned())
}

/// Run the candidate loop on one window of conditioned electrode data
pub fn decompose_window(
    data: &Array2<f64>,
    window: AnalysisWindow,
    ctx: &StreamContext<'_>,
) -> DecompResult<WindowDecomposition> {
    let config = ctx.config;
    let trim = ctx.trim();
    let extended = extended_window(data, &window, ctx.extension_factor, trim)?;
    let whitened = whiten(&extended)?;
    let offset = window.start + trim;

    let mut result = WindowDecomposition {
        electrode: ctx.electrode,
        window,
        trim,
        model: whitened.model,
        sources: Vec::new(),
        candidates: 0,
    };
    if result.model.is_empty() {
        debug!(electrode = ctx.electrode, window = window.index, "Empty whitened space, window skipped");
        return Ok(result);
    }

    let mut residual = whitened.signal;
    let mut basis = SeparationBasis::new();
    let mut initializer = Initializer::new(
        config.separation.initialization,
        &residual,
        stream_seed(config.separation.seed, ctx.electrode, window.index),
    );
    let settings = FixedPointSettings {
        contrast: config.separation.contrast,
        max_iterations: config.separation.max_iterations,
        tolerance: config.separation.convergence_tolerance,
    };
    let detector = SpikeDetector::from_ms(config.spikes.peak_distance_ms, ctx.sample_rate);
    let peel_radius = ms_to_samples(config.peel_off.window_ms, ctx.sample_rate);

    for candidate in 0..config.separation.candidates_per_window {
        ctx.cancel.checkpoint(ctx.electrode, Some(window.index))?;

        let Some(initial) = initializer.next_vector(&residual, &basis) else {
            trace!(candidate, "No usable starting vector");
            continue;
        };
        let Some(outcome) = extract(&residual, initial, &basis, &settings) else {
            debug!(
                electrode = ctx.electrode,
                window = window.index,
                candidate,
                "Separation vector collapsed, candidate skipped"
            );
            continue;
        };
        result.candidates += 1;
        basis.push(outcome.vector.clone());

        let source = residual.t().dot(&outcome.vector);
        let first = detector.detect(source.as_slice().unwrap_or(&[]));
        if first.discharges.len() < config.spikes.min_discharges {
            trace!(candidate, discharges = first.discharges.len(), "Too few discharges");
            continue;
        }

        let refined = refine(
            &residual,
            outcome.vector,
            &detector,
            ctx.sample_rate,
            config.separation.max_iterations,
        );
        let sil = refined.detection.sil;
        let cov = refined.cov;
        let passes_cov = !config.quality.cov_filter || cov <= config.quality.cov_threshold;
        if sil < config.quality.sil_threshold || !passes_cov {
            trace!(candidate, sil, cov, "Candidate rejected by quality gate");
            continue;
        }

        debug!(
            electrode = ctx.electrode,
            window = window.index,
            candidate,
            sil,
            cov,
            discharges = refined.detection.discharges.len(),
            iterations = outcome.iterations,
            converged = outcome.converged,
            "Motor unit accepted"
        );

        if config.peel_off.enabled && peel_off(&mut residual, &refined.detection.discharges, peel_radius) {
            initializer.refresh(&residual);
        }

        result.sources.push(WindowSource {
            vector: refined.vector,
            discharges: refined.detection.discharges.iter().map(|&t| t + offset).collect(),
            sil,
            cov,
        });
    }

    Ok(result)
}
