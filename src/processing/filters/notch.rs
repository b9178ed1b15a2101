// src/processing/filters/notch.rs
//! Spectral line-interference removal
//!
//! Each channel is cut into one-second analysis windows. In every window the
//! bins of the one-sided magnitude spectrum that stand out above
//! `median + k * std` are flagged together with a small neighbourhood, and
//! only those bins are rebuilt into a conjugate-symmetric correction spectrum
//! whose inverse transform is subtracted from the window. Everything else in
//! the signal is left untouched.

use super::ChannelFilter;
use crate::config::constants::conditioning::NOTCH_WINDOW_S;
use crate::utils::stats::{median, sample_std};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Adaptive FFT notch for power-line interference and its harmonics
#[derive(Debug, Clone)]
pub struct SpectralNotch {
    sample_rate: f64,
    bandwidth_hz: f64,
    threshold_sd: f64,
    window_samples: usize,
}

impl SpectralNotch {
    pub fn new(sample_rate: f64, bandwidth_hz: f64, threshold_sd: f64) -> Self {
        let window_samples = ((sample_rate * NOTCH_WINDOW_S).round() as usize).max(1);
        Self {
            sample_rate,
            bandwidth_hz,
            threshold_sd,
            window_samples,
        }
    }

    /// One-sided bins (`1..=n/2`) flagged for removal in a segment,
    /// neighbourhood included, in ascending order
    pub fn interference_bins(&self, segment: &[f64]) -> Vec<usize> {
        let n = segment.len();
        if n < 4 {
            return Vec::new();
        }
        let spectrum = forward(segment, &mut FftPlanner::new());
        self.flag_bins(&spectrum)
    }

    fn flag_bins(&self, spectrum: &[Complex<f64>]) -> Vec<usize> {
        let n = spectrum.len();
        let half = n / 2;
        let magnitudes: Vec<f64> = spectrum[1..=half].iter().map(|c| c.norm()).collect();

        let threshold = median(&magnitudes) + self.threshold_sd * sample_std(&magnitudes);
        let bandwidth_bins = (self.bandwidth_hz * n as f64 / self.sample_rate).round() as usize;
        let reach = bandwidth_bins / 2;

        let mut flagged = vec![false; half + 1];
        for (offset, &magnitude) in magnitudes.iter().enumerate() {
            if magnitude > threshold {
                let bin = offset + 1;
                let lo = bin.saturating_sub(reach).max(1);
                let hi = (bin + reach).min(half);
                for f in &mut flagged[lo..=hi] {
                    *f = true;
                }
            }
        }

        flagged
            .iter()
            .enumerate()
            .filter_map(|(bin, &f)| f.then_some(bin))
            .collect()
    }

    fn notch_segment(&self, segment: &mut [f64], planner: &mut FftPlanner<f64>) {
        let n = segment.len();
        if n < 4 {
            return;
        }
        let spectrum = forward(segment, planner);
        let bins = self.flag_bins(&spectrum);
        if bins.is_empty() {
            return;
        }

        let mut correction = vec![Complex::new(0.0, 0.0); n];
        for &bin in &bins {
            correction[bin] = spectrum[bin];
            let mirror = n - bin;
            if mirror != bin {
                correction[mirror] = spectrum[bin].conj();
            }
        }

        planner.plan_fft_inverse(n).process(&mut correction);
        let scale = 1.0 / n as f64;
        for (sample, c) in segment.iter_mut().zip(&correction) {
            *sample -= c.re * scale;
        }
    }
}

impl ChannelFilter for SpectralNotch {
    fn name(&self) -> &str {
        "spectral-notch"
    }

    fn apply(&self, channel: &[f64]) -> Vec<f64> {
        let mut out = channel.to_vec();
        let mut planner = FftPlanner::new();
        for segment in out.chunks_mut(self.window_samples) {
            self.notch_segment(segment, &mut planner);
        }
        out
    }
}

fn forward(segment: &[f64], planner: &mut FftPlanner<f64>) -> Vec<Complex<f64>> {
    let mut buffer: Vec<Complex<f64>> = segment.iter().map(|&x| Complex::new(x, 0.0)).collect();
    planner.plan_fft_forward(buffer.len()).process(&mut buffer);
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};
    use std::f64::consts::PI;

    const FS: f64 = 2048.0;

    fn noisy_with_line(seconds: usize, line_hz: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 0.2).unwrap();
        (0..(FS as usize * seconds))
            .map(|i| {
                let t = i as f64 / FS;
                (2.0 * PI * line_hz * t).sin() + noise.sample(&mut rng)
            })
            .collect()
    }

    fn bin_magnitude(segment: &[f64], bin: usize) -> f64 {
        forward(segment, &mut FftPlanner::new())[bin].norm()
    }

    #[test]
    fn test_line_interference_removed() {
        let notch = SpectralNotch::new(FS, 4.0, 5.0);
        let signal = noisy_with_line(2, 50.0, 7);

        let window = &signal[..FS as usize];
        assert!(notch.interference_bins(window).contains(&50));

        let filtered = notch.apply(&signal);
        let before = bin_magnitude(&signal[..FS as usize], 50);
        let after = bin_magnitude(&filtered[..FS as usize], 50);
        assert!(after < 1e-6 * before, "50 Hz bin not cleared: {} -> {}", before, after);
    }

    #[test]
    fn test_notch_is_fixed_point_at_flagged_bins() {
        let notch = SpectralNotch::new(FS, 4.0, 5.0);
        let signal = noisy_with_line(1, 60.0, 11);
        let flagged = notch.interference_bins(&signal);
        assert!(!flagged.is_empty());

        let once = notch.apply(&signal);
        let twice = notch.apply(&once);
        for &bin in &flagged {
            let removed = (bin_magnitude(&once, bin) - bin_magnitude(&twice, bin)).abs();
            assert!(removed < 1e-8, "bin {} lost a further {}", bin, removed);
        }
    }

    #[test]
    fn test_zero_channel_passes_through() {
        let notch = SpectralNotch::new(FS, 4.0, 5.0);
        let zeros = vec![0.0; 3000];
        assert_eq!(notch.apply(&zeros), zeros);
    }

    #[test]
    fn test_neighbourhood_width() {
        let notch = SpectralNotch::new(FS, 4.0, 5.0);
        let signal = noisy_with_line(1, 100.0, 3);
        let bins = notch.interference_bins(&signal);
        // 4 Hz at 1 Hz resolution: +/- 2 bins around the line
        for expected in 98..=102 {
            assert!(bins.contains(&expected), "missing bin {}", expected);
        }
    }

    #[test]
    fn test_trailing_partial_window_processed() {
        let notch = SpectralNotch::new(FS, 4.0, 5.0);
        let signal = noisy_with_line(2, 50.0, 5);
        let tail = &signal[..FS as usize + 1024];
        let filtered = notch.apply(tail);
        assert_eq!(filtered.len(), tail.len());

        let last = &filtered[FS as usize..];
        // 1024-sample tail at 2 Hz resolution: 50 Hz sits on bin 25
        assert!(bin_magnitude(last, 25) < 1e-6 * bin_magnitude(&tail[FS as usize..], 25));
    }
}
