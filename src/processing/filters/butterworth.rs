// src/processing/filters/butterworth.rs
//! Zero-phase Butterworth bandpass
//!
//! The analog prototype is mapped to a bandpass, discretized with the
//! bilinear transform and stored as a cascade of second-order sections.
//! Filtering runs the cascade forward and backward with odd-reflection
//! padding and steady-state initial conditions, so the output has no phase
//! shift and the same length as the input.

use super::ChannelFilter;
use crate::error::{DecompResult, DecompositionError};
use rustfft::num_complex::Complex;
use std::f64::consts::PI;

const REAL_POLE_TOLERANCE: f64 = 1e-9;

/// Biquad with `a[0] == 1`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecondOrderSection {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl SecondOrderSection {
    fn response(&self, z_inv: Complex<f64>) -> Complex<f64> {
        let z_inv2 = z_inv * z_inv;
        let num = self.b[0] + z_inv * self.b[1] + z_inv2 * self.b[2];
        let den = self.a[0] + z_inv * self.a[1] + z_inv2 * self.a[2];
        num / den
    }

    /// Steady-state transposed direct form II state for a unit step input
    fn step_state(&self) -> [f64; 2] {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let c0 = b1 - a1 * b0;
        let c1 = b2 - a2 * b0;
        let z0 = (c0 + c1) / (1.0 + a1 + a2);
        [z0, c1 - a2 * z0]
    }

    fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }

    fn run(&self, signal: &mut [f64], mut state: [f64; 2]) {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        for sample in signal.iter_mut() {
            let x = *sample;
            let y = b0 * x + state[0];
            state[0] = b1 * x - a1 * y + state[1];
            state[1] = b2 * x - a2 * y;
            *sample = y;
        }
    }
}

/// Digital Butterworth bandpass of a given prototype order
#[derive(Debug, Clone)]
pub struct ButterworthBandpass {
    order: usize,
    low_hz: f64,
    high_hz: f64,
    sample_rate: f64,
    sections: Vec<SecondOrderSection>,
}

impl ButterworthBandpass {
    /// Design the filter; the cascade has `order` sections
    pub fn design(order: usize, low_hz: f64, high_hz: f64, sample_rate: f64) -> DecompResult<Self> {
        if order == 0 {
            return Err(DecompositionError::configuration("bandpass", "order must be at least 1"));
        }
        if !(sample_rate > 0.0) {
            return Err(DecompositionError::configuration("bandpass", "sample rate must be positive"));
        }
        let nyquist = sample_rate / 2.0;
        if !(low_hz > 0.0 && low_hz < high_hz) {
            return Err(DecompositionError::configuration(
                "bandpass",
                format!("invalid band {} - {} Hz", low_hz, high_hz),
            ));
        }
        if high_hz >= nyquist {
            return Err(DecompositionError::configuration(
                "bandpass",
                format!("high edge {} Hz is not below Nyquist ({} Hz)", high_hz, nyquist),
            ));
        }

        // Pre-warped analog band edges
        let fs2 = 2.0 * sample_rate;
        let w1 = fs2 * (PI * low_hz / sample_rate).tan();
        let w2 = fs2 * (PI * high_hz / sample_rate).tan();
        let bandwidth = w2 - w1;
        let center_sq = w1 * w2;

        let mut upper = Vec::new();
        let mut real = Vec::new();
        for k in 0..order {
            let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            let prototype = Complex::from_polar(1.0, theta);
            let a = prototype * (bandwidth / 2.0);
            let d = (a * a - center_sq).sqrt();
            for analog in [a + d, a - d] {
                let digital = (fs2 + analog) / (fs2 - analog);
                if digital.im.abs() <= REAL_POLE_TOLERANCE {
                    real.push(digital.re);
                } else if digital.im > 0.0 {
                    upper.push(digital);
                }
            }
        }
        real.sort_by(|a, b| a.total_cmp(b));

        let mut sections: Vec<SecondOrderSection> = upper
            .iter()
            .map(|p| SecondOrderSection {
                b: [1.0, 0.0, -1.0],
                a: [1.0, -2.0 * p.re, p.norm_sqr()],
            })
            .collect();
        for pair in real.chunks(2) {
            let (r1, r2) = match pair {
                [r1, r2] => (*r1, *r2),
                _ => {
                    return Err(DecompositionError::configuration(
                        "bandpass",
                        "unpaired real pole in bandpass design",
                    ))
                }
            };
            sections.push(SecondOrderSection {
                b: [1.0, 0.0, -1.0],
                a: [1.0, -(r1 + r2), r1 * r2],
            });
        }
        if sections.len() != order {
            return Err(DecompositionError::configuration(
                "bandpass",
                format!("expected {} sections, designed {}", order, sections.len()),
            ));
        }

        // Unit gain at the geometric band centre
        let omega0 = 2.0 * (center_sq.sqrt() / fs2).atan();
        let z_inv = Complex::from_polar(1.0, -omega0);
        let peak: Complex<f64> = sections.iter().map(|s| s.response(z_inv)).product();
        let gain = 1.0 / peak.norm();
        for coefficient in sections[0].b.iter_mut() {
            *coefficient *= gain;
        }

        Ok(Self {
            order,
            low_hz,
            high_hz,
            sample_rate,
            sections,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn band(&self) -> (f64, f64) {
        (self.low_hz, self.high_hz)
    }

    pub fn sections(&self) -> &[SecondOrderSection] {
        &self.sections
    }

    /// Single-pass magnitude response at `freq_hz`
    pub fn magnitude_response(&self, freq_hz: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / self.sample_rate;
        let z_inv = Complex::from_polar(1.0, -omega);
        self.sections
            .iter()
            .map(|s| s.response(z_inv))
            .product::<Complex<f64>>()
            .norm()
    }

    fn padding(&self, len: usize) -> usize {
        (3 * (2 * self.sections.len() + 1)).min(len - 1)
    }

    fn cascade(&self, signal: &mut [f64], initial: f64, states: &[[f64; 2]]) {
        for (section, state) in self.sections.iter().zip(states) {
            section.run(signal, [state[0] * initial, state[1] * initial]);
        }
    }

    fn steady_states(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|section| {
                let [z0, z1] = section.step_state();
                let state = [z0 * scale, z1 * scale];
                scale *= section.dc_gain();
                state
            })
            .collect()
    }

    /// Forward-backward filtering
    pub fn filtfilt(&self, signal: &[f64]) -> Vec<f64> {
        let len = signal.len();
        if len < 2 {
            return signal.to_vec();
        }
        let edge = self.padding(len);
        let first = signal[0];
        let last = signal[len - 1];

        let mut extended = Vec::with_capacity(len + 2 * edge);
        extended.extend((1..=edge).rev().map(|i| 2.0 * first - signal[i]));
        extended.extend_from_slice(signal);
        extended.extend((1..=edge).map(|i| 2.0 * last - signal[len - 1 - i]));

        let states = self.steady_states();

        let x0 = extended[0];
        self.cascade(&mut extended, x0, &states);

        extended.reverse();
        let y0 = extended[0];
        self.cascade(&mut extended, y0, &states);
        extended.reverse();

        extended[edge..edge + len].to_vec()
    }
}

impl ChannelFilter for ButterworthBandpass {
    fn name(&self) -> &str {
        "butterworth-bandpass"
    }

    fn apply(&self, channel: &[f64]) -> Vec<f64> {
        self.filtfilt(channel)
    }
}
