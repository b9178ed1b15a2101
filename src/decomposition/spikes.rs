// src/decomposition/spikes.rs
//! Discharge detection and silhouette scoring on an estimated source
//!
//! The source is squared with its sign kept (`s * |s|`), peaks are picked
//! tallest-first under a minimum spacing, and the peak heights are split
//! into spike and noise classes by a two-centroid k-means. The silhouette of
//! the spike class is the quality score.

use crate::config::constants::spikes::{KMEANS_MAX_ITERATIONS, NORMALIZATION_PEAK_COUNT};
use crate::utils::stats::ms_to_samples;

/// Discharges and quality score found on one source
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeDetection {
    /// Ascending sample indices of the spike class
    pub discharges: Vec<usize>,
    /// Silhouette of the spike class, 0 when undefined
    pub sil: f64,
    /// `s * |s|` scaled by the mean of the largest peaks
    pub pulse_train: Vec<f64>,
}

impl SpikeDetection {
    fn empty(pulse_train: Vec<f64>) -> Self {
        Self {
            discharges: Vec::new(),
            sil: 0.0,
            pulse_train,
        }
    }
}

/// Peak picker plus spike/noise classifier
#[derive(Debug, Clone, Copy)]
pub struct SpikeDetector {
    min_distance: usize,
}

impl SpikeDetector {
    pub fn new(min_distance: usize) -> Self {
        Self {
            min_distance: min_distance.max(1),
        }
    }

    pub fn from_ms(distance_ms: f64, sample_rate: f64) -> Self {
        Self::new(ms_to_samples(distance_ms, sample_rate))
    }

    pub fn min_distance(&self) -> usize {
        self.min_distance
    }

    pub fn detect(&self, source: &[f64]) -> SpikeDetection {
        let mut pulse_train: Vec<f64> = source.iter().map(|&s| s * s.abs()).collect();
        let peaks = find_peaks(&pulse_train, self.min_distance);
        if peaks.len() < 2 {
            return SpikeDetection::empty(pulse_train);
        }

        let mut heights: Vec<f64> = peaks.iter().map(|&p| pulse_train[p]).collect();
        let scale = top_mean(&heights, NORMALIZATION_PEAK_COUNT);
        if scale.is_finite() && scale > 0.0 {
            pulse_train.iter_mut().for_each(|v| *v /= scale);
            heights.iter_mut().for_each(|v| *v /= scale);
        }

        let clusters = TwoMeans::fit(&heights);
        let spike_class = clusters.spike_class();
        let discharges: Vec<usize> = peaks
            .iter()
            .zip(&clusters.labels)
            .filter(|&(_, &label)| label == spike_class)
            .map(|(&p, _)| p)
            .collect();

        let sil = clusters.silhouette(&heights);
        SpikeDetection {
            discharges,
            sil,
            pulse_train,
        }
    }
}

/// Local maxima at least `min_distance` apart, kept tallest-first,
/// returned in ascending order
///
/// Flat tops report their middle sample. End points are never peaks.
pub fn find_peaks(signal: &[f64], min_distance: usize) -> Vec<usize> {
    let n = signal.len();
    let mut peaks = Vec::new();
    let mut i = 1;
    while i + 1 < n {
        if signal[i - 1] < signal[i] {
            let mut ahead = i + 1;
            while ahead + 1 < n && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }

    if min_distance <= 1 || peaks.len() < 2 {
        return peaks;
    }

    let mut by_height: Vec<usize> = (0..peaks.len()).collect();
    by_height.sort_by(|&a, &b| signal[peaks[b]].total_cmp(&signal[peaks[a]]));

    let mut keep = vec![true; peaks.len()];
    for &idx in &by_height {
        if !keep[idx] {
            continue;
        }
        let center = peaks[idx];
        for left in (0..idx).rev() {
            if center - peaks[left] >= min_distance {
                break;
            }
            keep[left] = false;
        }
        for right in idx + 1..peaks.len() {
            if peaks[right] - center >= min_distance {
                break;
            }
            keep[right] = false;
        }
    }

    peaks
        .into_iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(p))
        .collect()
}

fn top_mean(values: &[f64], count: usize) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let top = &sorted[..count.min(sorted.len())];
    top.iter().sum::<f64>() / top.len() as f64
}

/// One-dimensional k-means with two centroids seeded at the extremes
struct TwoMeans {
    centroids: [f64; 2],
    labels: Vec<usize>,
}

impl TwoMeans {
    fn fit(values: &[f64]) -> Self {
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut centroids = [lo, hi];
        let mut labels = vec![0usize; values.len()];

        for _ in 0..KMEANS_MAX_ITERATIONS {
            let mut changed = false;
            for (label, &v) in labels.iter_mut().zip(values) {
                let nearest = usize::from((v - centroids[1]).abs() < (v - centroids[0]).abs());
                if nearest != *label {
                    *label = nearest;
                    changed = true;
                }
            }

            let mut sums = [0.0; 2];
            let mut counts = [0usize; 2];
            for (&label, &v) in labels.iter().zip(values) {
                sums[label] += v;
                counts[label] += 1;
            }
            for k in 0..2 {
                if counts[k] > 0 {
                    centroids[k] = sums[k] / counts[k] as f64;
                }
            }
            if !changed {
                break;
            }
        }

        Self { centroids, labels }
    }

    /// Higher-centroid cluster, or the only populated one
    fn spike_class(&self) -> usize {
        let populated = |k: usize| self.labels.contains(&k);
        match (populated(0), populated(1)) {
            (true, false) => 0,
            (false, true) => 1,
            _ => usize::from(self.centroids[1] >= self.centroids[0]),
        }
    }

    /// `(between - within) / max(within, between)` over spike-class members
    fn silhouette(&self, values: &[f64]) -> f64 {
        let spike = self.spike_class();
        let noise = 1 - spike;
        if !self.labels.contains(&noise) {
            return 0.0;
        }

        let members: Vec<f64> = self
            .labels
            .iter()
            .zip(values)
            .filter(|&(&label, _)| label == spike)
            .map(|(_, &v)| v)
            .collect();
        if members.is_empty() {
            return 0.0;
        }

        let count = members.len() as f64;
        let within = members.iter().map(|v| (v - self.centroids[spike]).powi(2)).sum::<f64>() / count;
        let between = members.iter().map(|v| (v - self.centroids[noise]).powi(2)).sum::<f64>() / count;
        let denominator = within.max(between);
        if denominator > 0.0 {
            (between - within) / denominator
        } else {
            0.0
        }
    }
}
