// src/decomposition/refinement.rs
//! CoV-driven refinement of a separation vector
//!
//! The vector is re-estimated as the sum of the whitened columns at the
//! current discharge times for as long as that lowers the coefficient of
//! variation of the inter-spike intervals. The first update that does not
//! lower it is discarded.

use super::fixed_point::normalize;
use super::spikes::{SpikeDetection, SpikeDetector};
use crate::utils::stats::{coefficient_of_variation, inter_spike_intervals};
use ndarray::{Array1, Array2};

/// Refined vector with the detection it produces
#[derive(Debug, Clone)]
pub struct RefinedSource {
    pub vector: Array1<f64>,
    pub detection: SpikeDetection,
    pub cov: f64,
    /// Accepted re-estimation steps
    pub iterations: usize,
}

/// CoV of the inter-spike intervals of a discharge sequence
pub fn discharge_cov(discharges: &[usize], sample_rate: f64) -> f64 {
    coefficient_of_variation(&inter_spike_intervals(discharges, sample_rate))
}

/// Refine `w` on whitened data `x`; `max_steps` bounds the re-estimations
pub fn refine(
    x: &Array2<f64>,
    w: Array1<f64>,
    detector: &SpikeDetector,
    sample_rate: f64,
    max_steps: usize,
) -> RefinedSource {
    let detect = |w: &Array1<f64>| detector.detect(x.t().dot(w).as_slice().unwrap_or(&[]));

    let mut detection = detect(&w);
    let mut cov = discharge_cov(&detection.discharges, sample_rate);
    let mut vector = w;
    let mut iterations = 0;

    while iterations < max_steps && !detection.discharges.is_empty() {
        let mut estimate = Array1::zeros(x.nrows());
        for &t in &detection.discharges {
            estimate += &x.column(t);
        }
        let Some(candidate) = normalize(estimate) else {
            break;
        };

        let next = detect(&candidate);
        let next_cov = discharge_cov(&next.discharges, sample_rate);
        if next_cov < cov {
            vector = candidate;
            detection = next;
            cov = next_cov;
            iterations += 1;
        } else {
            break;
        }
    }

    if detection.discharges.len() < 2 {
        detection = detect(&vector);
        cov = discharge_cov(&detection.discharges, sample_rate);
    }

    RefinedSource {
        vector,
        detection,
        cov,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    /// Whitened-like data with one periodic sparse source in row 0 and
    /// an irregular one in row 1
    fn two_sources(n: usize) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(17);
        let noise = Normal::new(0.0, 0.05).unwrap();
        let mut x = Array2::from_shape_fn((3, n), |_| noise.sample(&mut rng));
        for t in (50..n).step_by(120) {
            x[[0, t]] += 3.0;
        }
        let mut t = 70;
        let mut step = 60;
        while t < n {
            x[[1, t]] += 3.0;
            t += step;
            step = if step == 60 { 190 } else { 60 };
        }
        x
    }

    #[test]
    fn test_refinement_never_raises_cov() {
        let x = two_sources(6000);
        let detector = SpikeDetector::new(20);
        // Start from a mix leaning towards the periodic source
        let start = normalize(ndarray::array![0.8, 0.55, 0.2]).unwrap();

        let first = detector.detect(x.t().dot(&start).as_slice().unwrap());
        let first_cov = discharge_cov(&first.discharges, 2048.0);

        let refined = refine(&x, start, &detector, 2048.0, 50);
        assert!(refined.cov <= first_cov);
        assert!((refined.vector.dot(&refined.vector) - 1.0).abs() < 1e-12);
        assert_eq!(refined.cov, discharge_cov(&refined.detection.discharges, 2048.0));
        // The regular source dominates the spike class
        assert!(refined.cov < 0.05, "cov {}", refined.cov);
    }

    #[test]
    fn test_no_spikes_returns_input() {
        let x = Array2::zeros((2, 500));
        let start = normalize(ndarray::array![1.0, 0.0]).unwrap();
        let refined = refine(&x, start.clone(), &SpikeDetector::new(10), 2048.0, 50);
        assert_eq!(refined.vector, start);
        assert!(refined.detection.discharges.is_empty());
        assert!(refined.cov.is_infinite());
        assert_eq!(refined.iterations, 0);
    }

    #[test]
    fn test_cov_helper() {
        assert!(discharge_cov(&[10], 2048.0).is_infinite());
        assert!(discharge_cov(&[0, 100, 200, 300], 2048.0).abs() < 1e-12);
        assert!(discharge_cov(&[0, 60, 250, 310, 500], 2048.0) > 0.5);
    }
}
