// src/postprocessing/duplicates.rs
//! Detection and merging of motor units that share their discharges
//!
//! Two discharge trains are compared as binary firing sequences. When their
//! normalized cross-correlation peaks clearly inside the allowed lag range,
//! the second train is shifted by that lag first; the shared discharges are
//! then counted with a one-to-one match inside the jitter tolerance.

use crate::config::constants::postprocessing::REALIGNMENT_CORRELATION;
use crate::config::PostProcessingConfig;
use crate::results::MotorUnit;
use crate::utils::stats::ms_to_samples;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use tracing::debug;

/// Pairwise duplicate test with the merge policy built on it
#[derive(Debug, Clone, Copy)]
pub struct DuplicateDetector {
    max_lag: usize,
    jitter: usize,
    threshold: f64,
}

impl DuplicateDetector {
    pub fn new(max_lag: usize, jitter: usize, threshold: f64) -> Self {
        Self {
            max_lag,
            jitter,
            threshold,
        }
    }

    pub fn from_config(config: &PostProcessingConfig, sample_rate: f64) -> Self {
        Self::new(
            ms_to_samples(config.duplicate_max_lag_ms, sample_rate),
            ms_to_samples(config.duplicate_jitter_ms, sample_rate),
            config.duplicate_threshold,
        )
    }

    /// Fraction of shared discharges, relative to the longer train
    pub fn shared_fraction(&self, a: &[usize], b: &[usize]) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let lag = self.alignment_lag(a, b);
        let common = count_common(a, b, lag, self.jitter);
        common as f64 / a.len().max(b.len()) as f64
    }

    pub fn is_duplicate(&self, a: &[usize], b: &[usize]) -> bool {
        self.shared_fraction(a, b) >= self.threshold
    }

    /// Lag `l` maximizing `sum_t a[t] * b[t + l]` within `±max_lag`, or 0
    /// when the normalized peak is too weak to trust
    fn alignment_lag(&self, a: &[usize], b: &[usize]) -> isize {
        let correlation = cross_correlation(a, b, self.max_lag);
        let peak = correlation.iter().map(|&(_, c)| c).fold(0.0, f64::max);
        let normalized = peak / ((a.len() * b.len()) as f64).sqrt();
        if normalized <= REALIGNMENT_CORRELATION {
            return 0;
        }

        // Several lags can share the peak; keep the one that matches most
        let mut best = (0usize, 0isize);
        for &(lag, c) in &correlation {
            if c == peak {
                let common = count_common(a, b, lag, self.jitter);
                if common > best.0 || (common == best.0 && lag.abs() < best.1.abs()) {
                    best = (common, lag);
                }
            }
        }
        best.1
    }

    /// Merge duplicate groups, keeping the lowest-CoV member of each
    ///
    /// Groups form around the first remaining unit; ties on CoV keep the
    /// earliest unit. Survivors keep their original relative order.
    pub fn remove_duplicates(&self, units: Vec<MotorUnit>) -> Vec<MotorUnit> {
        let mut remaining: Vec<Option<MotorUnit>> = units.into_iter().map(Some).collect();
        let mut survivors: Vec<(usize, MotorUnit)> = Vec::new();

        for pivot in 0..remaining.len() {
            let Some(pivot_unit) = remaining[pivot].as_ref() else {
                continue;
            };
            let mut group = vec![pivot];
            for other in pivot + 1..remaining.len() {
                if let Some(candidate) = remaining[other].as_ref() {
                    if self.is_duplicate(&pivot_unit.discharges, &candidate.discharges) {
                        group.push(other);
                    }
                }
            }

            let keep = group
                .iter()
                .copied()
                .min_by(|&x, &y| {
                    let cov = |i: usize| remaining[i].as_ref().map_or(f64::INFINITY, |u| u.cov);
                    cov(x).total_cmp(&cov(y)).then(x.cmp(&y))
                })
                .unwrap_or(pivot);

            if group.len() > 1 {
                debug!(group = ?group, kept = keep, "Merged duplicate motor units");
            }
            for &idx in &group {
                if let Some(unit) = remaining[idx].take() {
                    if idx == keep {
                        survivors.push((idx, unit));
                    }
                }
            }
        }

        survivors.sort_by_key(|&(idx, _)| idx);
        survivors.into_iter().map(|(_, unit)| unit).collect()
    }
}

/// Binary-train cross-correlation for lags in `-max_lag..=max_lag`
///
/// Values are spike-pair counts, so the FFT result is rounded back to
/// integers.
fn cross_correlation(a: &[usize], b: &[usize], max_lag: usize) -> Vec<(isize, f64)> {
    let origin = a[0].min(b[0]);
    let end = a[a.len() - 1].max(b[b.len() - 1]);
    let span = end - origin + 1;
    let size = (span + max_lag + 1).next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(size);
    let inverse = planner.plan_fft_inverse(size);

    let indicator = |times: &[usize]| {
        let mut buffer = vec![Complex::new(0.0, 0.0); size];
        for &t in times {
            buffer[t - origin] = Complex::new(1.0, 0.0);
        }
        forward.process(&mut buffer);
        buffer
    };
    let spectrum_a = indicator(a);
    let mut product = indicator(b);
    for (p, fa) in product.iter_mut().zip(&spectrum_a) {
        *p *= fa.conj();
    }
    inverse.process(&mut product);

    let lag = max_lag as isize;
    (-lag..=lag)
        .map(|l| {
            let idx = l.rem_euclid(size as isize) as usize;
            (l, (product[idx].re / size as f64).round())
        })
        .collect()
}

/// One-to-one matches between `a` and `b - lag` within `jitter` samples
fn count_common(a: &[usize], b: &[usize], lag: isize, jitter: usize) -> usize {
    let jitter = jitter as isize;
    let (mut i, mut j, mut common) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        let diff = a[i] as isize - (b[j] as isize - lag);
        if diff.abs() <= jitter {
            common += 1;
            i += 1;
            j += 1;
        } else if diff < 0 {
            i += 1;
        } else {
            j += 1;
        }
    }
    common
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn unit(discharges: Vec<usize>, cov: f64) -> MotorUnit {
        MotorUnit {
            electrode: 0,
            window: 0,
            filter: Array1::zeros(1),
            pulse_train: Vec::new(),
            discharges,
            sil: 0.95,
            cov,
        }
    }

    fn detector() -> DuplicateDetector {
        DuplicateDetector::new(51, 1, 0.3)
    }

    #[test]
    fn test_cross_correlation_finds_shift() {
        let a: Vec<usize> = (0..20).map(|i| 100 + i * 97).collect();
        let b: Vec<usize> = a.iter().map(|t| t + 7).collect();
        let correlation = cross_correlation(&a, &b, 20);
        let (best, peak) = correlation
            .iter()
            .copied()
            .fold((0, 0.0), |acc, (l, c)| if c > acc.1 { (l, c) } else { acc });
        assert_eq!(best, 7);
        assert_eq!(peak, 20.0);
    }

    #[test]
    fn test_shifted_copy_is_duplicate() {
        let a: Vec<usize> = (0..30).map(|i| 200 + i * 150 + (i * 37) % 11).collect();
        let b: Vec<usize> = a.iter().map(|t| t + 12).collect();
        let d = detector();
        assert!((d.shared_fraction(&a, &b) - 1.0).abs() < 1e-12);
        assert!((d.shared_fraction(&b, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fraction_uses_longer_train() {
        let a: Vec<usize> = (0..40).map(|i| 100 + i * 120).collect();
        let b: Vec<usize> = a.iter().step_by(2).copied().collect();
        let d = detector();
        assert!((d.shared_fraction(&a, &b) - 0.5).abs() < 1e-12);
        assert!(d.is_duplicate(&a, &b));
        assert_eq!(d.shared_fraction(&a, &[]), 0.0);
    }

    #[test]
    fn test_independent_trains_are_distinct() {
        let a: Vec<usize> = (0..40).map(|i| 100 + i * 120).collect();
        let b: Vec<usize> = (0..25).map(|i| 130 + i * 191).collect();
        assert!(!detector().is_duplicate(&a, &b));
    }

    #[test]
    fn test_group_keeps_lowest_cov() {
        let base: Vec<usize> = (0..30).map(|i| 100 + i * 140).collect();
        let shifted: Vec<usize> = base.iter().map(|t| t + 3).collect();
        let other: Vec<usize> = (0..25).map(|i| 170 + i * 193).collect();

        let units = vec![
            unit(base.clone(), 0.2),
            unit(other.clone(), 0.15),
            unit(shifted.clone(), 0.1),
            unit(base.clone(), 0.1),
        ];
        let kept = detector().remove_duplicates(units);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].discharges, other);
        // Equal CoV: the earlier of the two tied members wins
        assert_eq!(kept[1].discharges, shifted);
    }
}
