// src/processing/whitening.rs
//! Regularized ZCA whitening of the extended observation matrix
//!
//! Eigenvalues at or below the mean of the lower half of the spectrum are
//! treated as noise and dropped. The whitening, dewhitening and inverse
//! covariance matrices are all built from the retained eigenspace only.

use crate::error::{DecompResult, DecompositionError, ProcessingStage};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, Axis};
use tracing::trace;

/// Whitening model fitted to one extended window
#[derive(Debug, Clone)]
pub struct WhiteningModel {
    /// Row means removed before whitening
    pub means: Array1<f64>,
    /// `E * D^(-1/2) * E^T`
    pub whitening: Array2<f64>,
    /// `E * D^(1/2) * E^T`
    pub dewhitening: Array2<f64>,
    /// Regularized `E * D^(-1) * E^T`
    pub inverse_covariance: Array2<f64>,
    /// Retained eigenvalues, descending
    pub eigenvalues: Vec<f64>,
}

impl WhiteningModel {
    /// Dimension of the retained eigenspace
    pub fn rank(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eigenvalues.is_empty()
    }

    /// Subtract the fitted row means
    pub fn center(&self, data: &Array2<f64>) -> DecompResult<Array2<f64>> {
        if data.nrows() != self.means.len() {
            return Err(DecompositionError::shape(
                ProcessingStage::Whitening,
                format!("{} rows", self.means.len()),
                format!("{} rows", data.nrows()),
            ));
        }
        Ok(data - &self.means.view().insert_axis(Axis(1)))
    }

    /// Whiten data with the fitted means and matrix
    pub fn apply(&self, data: &Array2<f64>) -> DecompResult<Array2<f64>> {
        Ok(self.whitening.dot(&self.center(data)?))
    }
}

/// Whitened signal together with the model that produced it
#[derive(Debug, Clone)]
pub struct Whitened {
    pub signal: Array2<f64>,
    pub model: WhiteningModel,
}

/// Fit a whitening model to `data` (rows = extended channels) and apply it
pub fn whiten(data: &Array2<f64>) -> DecompResult<Whitened> {
    let (rows, samples) = data.dim();
    if rows == 0 || samples < 2 {
        return Err(DecompositionError::shape(
            ProcessingStage::Whitening,
            "at least one row and two samples",
            format!("{}x{}", rows, samples),
        ));
    }

    let means = data.mean_axis(Axis(1)).ok_or_else(|| {
        DecompositionError::processing(ProcessingStage::Whitening, "empty sample axis")
    })?;
    let centered = data - &means.view().insert_axis(Axis(1));
    let covariance = centered.dot(&centered.t()) / (samples - 1) as f64;

    let eigen = SymmetricEigen::new(DMatrix::from_fn(rows, rows, |i, j| covariance[[i, j]]));
    let mut order: Vec<usize> = (0..rows).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
    let sorted: Vec<f64> = order.iter().map(|&i| eigen.eigenvalues[i]).collect();

    let retained = retained_count(&sorted);
    trace!(rows, retained, "Whitening eigenspace");

    let mut basis = Array2::zeros((rows, retained));
    for (col, &idx) in order.iter().take(retained).enumerate() {
        for row in 0..rows {
            basis[[row, col]] = eigen.eigenvectors[(row, idx)];
        }
    }
    let eigenvalues = sorted[..retained].to_vec();

    let project = |scale: &dyn Fn(f64) -> f64| -> Array2<f64> {
        let mut scaled = basis.clone();
        for (mut column, &value) in scaled.axis_iter_mut(Axis(1)).zip(&eigenvalues) {
            column *= scale(value);
        }
        scaled.dot(&basis.t())
    };

    let whitening = project(&|d| 1.0 / d.sqrt());
    let dewhitening = project(&|d| d.sqrt());
    let inverse_covariance = project(&|d| 1.0 / d);

    let model = WhiteningModel {
        means,
        whitening,
        dewhitening,
        inverse_covariance,
        eigenvalues,
    };
    let signal = model.whitening.dot(&centered);

    Ok(Whitened { signal, model })
}

/// Number of leading (descending) eigenvalues kept
fn retained_count(sorted: &[f64]) -> usize {
    if sorted.is_empty() {
        return 0;
    }
    let lower = &sorted[sorted.len() / 2..];
    let threshold = (lower.iter().sum::<f64>() / lower.len() as f64).max(0.0);
    let rank = sorted.iter().filter(|&&d| d > threshold).count();
    if rank == 0 {
        return 0;
    }
    let cutoff = if rank < sorted.len() {
        0.5 * (sorted[rank - 1] + sorted[rank])
    } else {
        threshold
    };
    sorted.iter().filter(|&&d| d > cutoff).count()
}
