// src/decomposition/fixed_point.rs
//! Deflationary fixed-point extraction of one separation vector
//!
//! Each update is
//!
//! ```text
//! w <- mean(X * g(w'X)) - mean(g'(w'X)) * w
//! w <- w - B * B' * w
//! w <- w / |w|
//! ```
//!
//! where `B` holds the vectors already found in the current window. The
//! vector is unit norm after every update; a vector that collapses to zero
//! or stops being finite marks the candidate as unusable.

use super::contrast::ContrastFunction;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

const MIN_NORM: f64 = 1e-12;

/// How the starting vector of each candidate is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializationMode {
    /// Unused whitened column with the largest energy
    #[default]
    MaxAmplitude,
    /// Standard-normal draw from the window's seeded generator
    Random,
}

/// Ordered separation vectors found so far in one window
#[derive(Debug, Clone, Default)]
pub struct SeparationBasis {
    vectors: Vec<Array1<f64>>,
}

impl SeparationBasis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn push(&mut self, w: Array1<f64>) {
        self.vectors.push(w);
    }

    pub fn vectors(&self) -> &[Array1<f64>] {
        &self.vectors
    }

    /// `w - B * B' * w`
    pub fn deflate(&self, w: &mut Array1<f64>) {
        for b in &self.vectors {
            let projection = b.dot(w);
            w.scaled_add(-projection, b);
        }
    }
}

/// Scale to unit norm; `None` for zero or non-finite vectors
pub fn normalize(mut w: Array1<f64>) -> Option<Array1<f64>> {
    let norm = w.dot(&w).sqrt();
    if !norm.is_finite() || norm < MIN_NORM {
        return None;
    }
    w /= norm;
    Some(w)
}

/// Result of one fixed-point run
#[derive(Debug, Clone)]
pub struct FixedPointOutcome {
    pub vector: Array1<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Fixed-point iteration settings
#[derive(Debug, Clone, Copy)]
pub struct FixedPointSettings {
    pub contrast: ContrastFunction,
    pub max_iterations: usize,
    pub tolerance: f64,
}

/// Run the fixed-point rule from `initial` on whitened data `x`
///
/// Hitting `max_iterations` is not a failure: the last vector is returned
/// with `converged = false`.
pub fn extract(
    x: &Array2<f64>,
    initial: Array1<f64>,
    basis: &SeparationBasis,
    settings: &FixedPointSettings,
) -> Option<FixedPointOutcome> {
    let samples = x.ncols() as f64;
    if samples == 0.0 {
        return None;
    }
    let contrast = settings.contrast;
    let mut w = normalize(initial)?;

    for iteration in 1..=settings.max_iterations {
        let u = x.t().dot(&w);
        let g = u.mapv(|v| contrast.g(v));
        let mean_g_prime = u.iter().map(|&v| contrast.g_prime(v)).sum::<f64>() / samples;

        let mut next = x.dot(&g) / samples;
        next.scaled_add(-mean_g_prime, &w);
        basis.deflate(&mut next);
        let next = normalize(next)?;

        let similarity = next.dot(&w).abs();
        w = next;
        if (similarity - 1.0).abs() < settings.tolerance {
            return Some(FixedPointOutcome {
                vector: w,
                iterations: iteration,
                converged: true,
            });
        }
    }

    Some(FixedPointOutcome {
        vector: w,
        iterations: settings.max_iterations,
        converged: false,
    })
}

/// Seed for one `(electrode, window)` stream
pub fn stream_seed(seed: u64, electrode: usize, window: usize) -> u64 {
    seed ^ ((electrode as u64) << 32) ^ (window as u64).rotate_left(17)
}

/// Produces starting vectors for successive candidates of one window
pub struct Initializer {
    mode: InitializationMode,
    rng: StdRng,
    energies: Vec<f64>,
    used: Vec<bool>,
}

impl Initializer {
    pub fn new(mode: InitializationMode, x: &Array2<f64>, seed: u64) -> Self {
        Self {
            mode,
            rng: StdRng::seed_from_u64(seed),
            energies: column_energies(x),
            used: vec![false; x.ncols()],
        }
    }

    /// Recompute column energies after the residual changed
    pub fn refresh(&mut self, x: &Array2<f64>) {
        if self.mode == InitializationMode::MaxAmplitude {
            self.energies = column_energies(x);
        }
    }

    /// Next starting vector, deflated against `basis` and normalized
    pub fn next_vector(&mut self, x: &Array2<f64>, basis: &SeparationBasis) -> Option<Array1<f64>> {
        let mut w = match self.mode {
            InitializationMode::MaxAmplitude => {
                let column = self.take_max_energy_column()?;
                x.column(column).to_owned()
            }
            InitializationMode::Random => {
                let rng = &mut self.rng;
                Array1::from_shape_fn(x.nrows(), |_| -> f64 { StandardNormal.sample(rng) })
            }
        };
        basis.deflate(&mut w);
        normalize(w)
    }

    fn take_max_energy_column(&mut self) -> Option<usize> {
        let column = (0..self.energies.len())
            .filter(|&i| !self.used[i])
            .max_by(|&a, &b| self.energies[a].total_cmp(&self.energies[b]))?;
        self.used[column] = true;
        Some(column)
    }
}

fn column_energies(x: &Array2<f64>) -> Vec<f64> {
    x.axis_iter(Axis(1))
        .map(|c: ArrayView1<f64>| c.dot(&c))
        .collect()
}
