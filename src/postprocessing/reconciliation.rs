// src/postprocessing/reconciliation.rs
//! Projection of every window's filters onto the whole analysis range
//!
//! A filter found in one window is moved into extended-observation space
//! with that window's dewhitening matrix. It is then applied to each
//! window's extended signal through the window's own regularized inverse
//! covariance, and the per-window trains are laid end to end on the
//! recording's time axis before spikes are detected again.

use crate::decomposition::progress::CancellationToken;
use crate::decomposition::refinement::discharge_cov;
use crate::decomposition::spikes::SpikeDetector;
use crate::decomposition::stream::{extended_window, WindowDecomposition};
use crate::error::{DecompResult, DecompositionError, ProcessingStage};
use crate::results::MotorUnit;
use ndarray::{Array1, Array2};
use tracing::debug;

/// Inputs shared by every filter of one electrode
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    /// Conditioned, masked electrode data (channels x samples)
    pub data: &'a Array2<f64>,
    pub extension_factor: usize,
    pub sample_rate: f64,
    pub detector: SpikeDetector,
    /// Units whose full-length train yields fewer discharges are dropped
    pub min_discharges: usize,
}

impl Reconciler<'_> {
    /// Full-length motor units for every source accepted in `windows`
    pub fn reconcile(
        &self,
        windows: &[WindowDecomposition],
        cancel: &CancellationToken,
        electrode: usize,
    ) -> DecompResult<Vec<MotorUnit>> {
        let origins: Vec<(usize, Array1<f64>)> = windows
            .iter()
            .flat_map(|w| {
                w.sources
                    .iter()
                    .map(move |source| (w.window.index, w.model.dewhitening.dot(&source.vector)))
            })
            .collect();
        if origins.is_empty() {
            return Ok(Vec::new());
        }

        let dimension = origins[0].1.len();
        let mut filters = Array2::zeros((dimension, origins.len()));
        for (col, (_, filter)) in origins.iter().enumerate() {
            if filter.len() != dimension {
                return Err(DecompositionError::shape(
                    ProcessingStage::Reconciliation,
                    format!("filters of length {}", dimension),
                    format!("{}", filter.len()),
                ));
            }
            filters.column_mut(col).assign(filter);
        }

        let samples = self.data.ncols();
        let mut trains = Array2::<f64>::zeros((origins.len(), samples));
        for window in windows {
            cancel.checkpoint(electrode, Some(window.window.index))?;
            if window.model.is_empty() {
                continue;
            }

            let extended = extended_window(self.data, &window.window, self.extension_factor, window.trim)?;
            let centered = window.model.center(&extended)?;
            let weights = window.model.inverse_covariance.dot(&filters);
            let projected = weights.t().dot(&centered);

            let offset = window.offset();
            let span = projected.ncols().min(samples.saturating_sub(offset));
            for (unit, row) in projected.rows().into_iter().enumerate() {
                for (j, &value) in row.iter().take(span).enumerate() {
                    trains[[unit, offset + j]] = value;
                }
            }
        }

        let candidates = origins.len();
        let units = origins
            .into_iter()
            .zip(trains.rows())
            .filter_map(|((window, filter), train)| {
                let detection = self.detector.detect(&train.to_vec());
                if detection.discharges.len() < self.min_discharges {
                    debug!(
                        electrode,
                        window,
                        discharges = detection.discharges.len(),
                        "Reconciled train too sparse, unit dropped"
                    );
                    return None;
                }
                let cov = discharge_cov(&detection.discharges, self.sample_rate);
                Some(MotorUnit {
                    electrode,
                    window,
                    filter,
                    pulse_train: detection.pulse_train,
                    discharges: detection.discharges,
                    sil: detection.sil,
                    cov,
                })
            })
            .collect::<Vec<_>>();

        debug!(electrode, candidates, units = units.len(), "Reconciled window filters");
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposition::fixed_point::normalize;
    use crate::decomposition::stream::WindowSource;
    use crate::processing::whiten;
    use crate::signal::AnalysisWindow;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    const FS: f64 = 2048.0;
    const TRIM: usize = 10;

    /// Two channels sharing one spike train every 150 samples
    fn spiky_data() -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(23);
        let noise = Normal::new(0.0, 0.05).unwrap();
        let mut data = Array2::from_shape_fn((2, 3000), |_| noise.sample(&mut rng));
        for t in (40..3000).step_by(150) {
            data[[0, t]] += 5.0;
            data[[1, t]] -= 3.0;
        }
        data
    }

    fn window_decomposition(data: &Array2<f64>) -> WindowDecomposition {
        let window = AnalysisWindow { index: 0, start: 0, end: data.ncols() };
        let extended = extended_window(data, &window, 2, TRIM).unwrap();
        let whitened = whiten(&extended).unwrap();
        // Extended column 30 holds the spike at recording sample 40
        let vector = normalize(whitened.signal.column(30).to_owned()).unwrap();
        WindowDecomposition {
            electrode: 0,
            window,
            trim: TRIM,
            model: whitened.model,
            sources: vec![WindowSource {
                vector,
                discharges: Vec::new(),
                sil: 1.0,
                cov: 0.0,
            }],
            candidates: 1,
        }
    }

    fn reconciler(data: &Array2<f64>, min_discharges: usize) -> Reconciler<'_> {
        Reconciler {
            data,
            extension_factor: 2,
            sample_rate: FS,
            detector: SpikeDetector::new(20),
            min_discharges,
        }
    }

    #[test]
    fn test_filter_recovers_full_train() {
        let data = spiky_data();
        let streams = vec![window_decomposition(&data)];
        let units = reconciler(&data, 2)
            .reconcile(&streams, &CancellationToken::new(), 0)
            .unwrap();

        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!(unit.pulse_train.len(), data.ncols());
        assert!(unit.discharges.len() >= 15, "{} discharges", unit.discharges.len());
        assert!(unit.discharges.windows(2).all(|p| p[0] < p[1]));
    }

    #[test]
    fn test_sparse_units_dropped() {
        let data = spiky_data();
        let streams = vec![window_decomposition(&data)];
        let units = reconciler(&data, 1000)
            .reconcile(&streams, &CancellationToken::new(), 0)
            .unwrap();
        assert!(units.is_empty());
    }

    #[test]
    fn test_no_sources_no_units() {
        let data = spiky_data();
        let mut stream = window_decomposition(&data);
        stream.sources.clear();
        let units = reconciler(&data, 2)
            .reconcile(&[stream], &CancellationToken::new(), 0)
            .unwrap();
        assert!(units.is_empty());
    }
}
