// src/decomposition/engine.rs
//! Orchestration over electrodes and analysis windows
//!
//! Each electrode is conditioned once, split into windows that are
//! decomposed independently, then reconciled and cleaned. Electrodes and
//! windows run on the rayon pool when `separation.parallel` is set; results
//! are always assembled in electrode-then-window order, so a given seed
//! yields the same output either way.

use super::progress::{CancellationToken, ProgressEvent, ProgressReporter};
use super::refinement::discharge_cov;
use super::spikes::SpikeDetector;
use super::stream::{decompose_window, StreamContext, WindowDecomposition};
use crate::config::constants::postprocessing::MAX_OUTLIER_ITERATIONS;
use crate::config::DecompositionConfig;
use crate::error::{DecompResult, ElectrodeContext};
use crate::postprocessing::{remove_duplicates_between_electrodes, remove_outliers, DuplicateDetector, Reconciler};
use crate::processing::{extension_factor, SignalConditioner};
use crate::results::{DecompositionResult, ElectrodeDecomposition};
use crate::signal::{segment, AnalysisWindow, SignalBundle};
use crossbeam::channel::Sender;
use rayon::prelude::*;
use tracing::{debug, info};

/// Motor unit decomposition engine
pub struct DecompositionEngine {
    config: DecompositionConfig,
    progress: ProgressReporter,
    cancel: CancellationToken,
}

impl DecompositionEngine {
    /// Create an engine; the configuration is validated here
    pub fn new(config: DecompositionConfig) -> DecompResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            progress: ProgressReporter::silent(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_progress(mut self, sender: Sender<ProgressEvent>) -> Self {
        self.progress = ProgressReporter::new(sender);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that aborts a running decomposition when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &DecompositionConfig {
        &self.config
    }

    /// Decompose every electrode of the bundle
    pub fn decompose(&self, bundle: &SignalBundle) -> DecompResult<DecompositionResult> {
        bundle.validate()?;
        info!(
            electrodes = bundle.electrodes.len(),
            channels = bundle.data.nrows(),
            samples = bundle.samples(),
            sample_rate = bundle.sample_rate,
            "Starting decomposition"
        );

        let indices: Vec<usize> = (0..bundle.electrodes.len()).collect();
        let mut electrodes = if self.config.separation.parallel {
            indices
                .par_iter()
                .map(|&e| self.decompose_electrode(bundle, e))
                .collect::<DecompResult<Vec<_>>>()?
        } else {
            indices
                .iter()
                .map(|&e| self.decompose_electrode(bundle, e))
                .collect::<DecompResult<Vec<_>>>()?
        };

        let post = &self.config.postprocessing;
        if post.remove_duplicates_between_electrodes && electrodes.len() > 1 {
            let detector = DuplicateDetector::from_config(post, bundle.sample_rate);
            remove_duplicates_between_electrodes(&mut electrodes, &detector);
        }

        let result = DecompositionResult {
            sample_rate: bundle.sample_rate,
            samples: bundle.samples(),
            electrodes,
        };
        self.progress.emit(ProgressEvent::Finished {
            motor_units: result.total_motor_units(),
        });
        info!(motor_units = result.total_motor_units(), "Decomposition finished");
        Ok(result)
    }

    /// Decompose a single electrode of the bundle
    pub fn decompose_electrode(&self, bundle: &SignalBundle, electrode: usize) -> DecompResult<ElectrodeDecomposition> {
        self.cancel.checkpoint(electrode, None)?;
        let config = &self.config;
        let fs = bundle.sample_rate;

        let data = bundle.electrode_data(electrode).electrode_context(electrode, None)?;
        let layout = &bundle.electrodes[electrode];
        let conditioner = SignalConditioner::new(&config.conditioning, fs, layout.geometry.emg_type)
            .electrode_context(electrode, None)?;
        let conditioned = conditioner.condition(&data);

        let factor = extension_factor(config.segmentation.extension_target, conditioned.nrows());
        let range = bundle.resolve_range(config.segmentation.reference_plateau_fraction);
        let windows = segment(range, config.segmentation.window_count).electrode_context(electrode, None)?;

        info!(
            electrode,
            geometry = %layout.geometry.name,
            channels = conditioned.nrows(),
            extension_factor = factor,
            windows = windows.len(),
            "Decomposing electrode"
        );
        self.progress.emit(ProgressEvent::ElectrodeStarted {
            electrode,
            windows: windows.len(),
            extension_factor: factor,
        });

        let ctx = StreamContext {
            config,
            sample_rate: fs,
            electrode,
            extension_factor: factor,
            cancel: &self.cancel,
        };
        let run = |window: &AnalysisWindow| -> DecompResult<WindowDecomposition> {
            self.cancel.checkpoint(electrode, Some(window.index))?;
            let result = decompose_window(&conditioned, *window, &ctx).electrode_context(electrode, Some(window.index))?;
            debug!(
                electrode,
                window = window.index,
                accepted = result.sources.len(),
                candidates = result.candidates,
                rank = result.model.rank(),
                "Window finished"
            );
            self.progress.emit(ProgressEvent::WindowFinished {
                electrode,
                window: window.index,
                accepted: result.sources.len(),
                candidates: result.candidates,
            });
            Ok(result)
        };
        let streams: Vec<WindowDecomposition> = if config.separation.parallel {
            windows.par_iter().map(run).collect::<DecompResult<_>>()?
        } else {
            windows.iter().map(run).collect::<DecompResult<_>>()?
        };

        let accepted: usize = streams.iter().map(|s| s.sources.len()).sum();
        self.progress.emit(ProgressEvent::PostProcessing {
            electrode,
            candidates: accepted,
        });

        let reconciler = Reconciler {
            data: &conditioned,
            extension_factor: factor,
            sample_rate: fs,
            detector: SpikeDetector::from_ms(config.spikes.reconciliation_peak_distance_ms, fs),
            min_discharges: config.spikes.min_discharges,
        };
        let mut units = reconciler
            .reconcile(&streams, &self.cancel, electrode)
            .electrode_context(electrode, None)?;

        let post = &config.postprocessing;
        if post.remove_outliers {
            for unit in &mut units {
                let report = remove_outliers(
                    &mut unit.discharges,
                    &unit.pulse_train,
                    fs,
                    post.outlier_cov_threshold,
                    MAX_OUTLIER_ITERATIONS,
                );
                if report.removed > 0 {
                    unit.cov = discharge_cov(&unit.discharges, fs);
                    debug!(
                        electrode,
                        removed = report.removed,
                        iterations = report.iterations,
                        cov_before = report.initial_cov,
                        cov_after = report.final_cov,
                        "Removed outlier discharges"
                    );
                }
            }
        }

        if post.remove_duplicates {
            let before = units.len();
            units = DuplicateDetector::from_config(post, fs).remove_duplicates(units);
            if units.len() < before {
                debug!(electrode, before, after = units.len(), "Removed duplicate motor units");
            }
        }

        info!(electrode, motor_units = units.len(), "Electrode finished");
        self.progress.emit(ProgressEvent::ElectrodeFinished {
            electrode,
            motor_units: units.len(),
        });

        Ok(ElectrodeDecomposition {
            electrode,
            geometry: layout.geometry.name.clone(),
            extension_factor: factor,
            windows,
            motor_units: units,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArrayGeometry, EmgType};
    use crate::error::DecompositionError;
    use crate::signal::ElectrodeLayout;
    use ndarray::Array2;

    fn flat_bundle() -> SignalBundle {
        let geometry = ArrayGeometry::custom("FLAT4", 2, 2, 4, 5.0, EmgType::Surface).unwrap();
        SignalBundle::new(Array2::zeros((4, 4096)), 2048.0)
            .unwrap()
            .with_electrode(ElectrodeLayout::contiguous(geometry, 0))
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = DecompositionConfig::default();
        config.segmentation.window_count = 0;
        assert!(DecompositionEngine::new(config).is_err());
    }

    #[test]
    fn test_flat_recording_has_no_units() {
        let mut config = DecompositionConfig::default();
        config.segmentation.extension_target = 40;
        config.segmentation.window_count = 2;
        let engine = DecompositionEngine::new(config).unwrap();
        let result = engine.decompose(&flat_bundle()).unwrap();
        assert_eq!(result.total_motor_units(), 0);
        assert_eq!(result.electrodes.len(), 1);
        assert_eq!(result.electrodes[0].extension_factor, 10);
        assert_eq!(result.electrodes[0].windows.len(), 2);
    }

    #[test]
    fn test_cancelled_before_start() {
        let engine = DecompositionEngine::new(DecompositionConfig::default()).unwrap();
        engine.cancellation_token().cancel();
        let err = engine.decompose(&flat_bundle()).unwrap_err();
        assert!(matches!(err, DecompositionError::Cancelled { electrode: 0, window: None }));
    }

    #[test]
    fn test_short_range_rejects_window_count() {
        let mut config = DecompositionConfig::default();
        config.segmentation.window_count = 8;
        let engine = DecompositionEngine::new(config).unwrap();
        let bundle = flat_bundle().with_analysis_range(100..105);

        let err = engine.decompose(&bundle).unwrap_err();
        match &err {
            DecompositionError::Electrode { electrode: 0, window: None, source } => {
                assert!(matches!(**source, DecompositionError::Configuration { .. }), "{source}");
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(err.to_string().contains("cannot hold 8 windows"), "{err}");
    }

    #[test]
    fn test_window_failure_carries_context() {
        let mut config = DecompositionConfig::default();
        config.segmentation.window_count = 4;
        config.segmentation.edge_trim_s = 1.0;
        config.segmentation.extension_target = 8;
        let engine = DecompositionEngine::new(config).unwrap();
        let err = engine.decompose(&flat_bundle()).unwrap_err();
        match err {
            DecompositionError::Electrode { electrode, window, .. } => {
                assert_eq!(electrode, 0);
                assert!(window.is_some());
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
