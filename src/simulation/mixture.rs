// src/simulation/mixture.rs
//! Convolutive synthetic recordings with known discharge times
//!
//! Each motor unit fires a jittered train; every channel sees that train
//! convolved with its own biphasic action potential (a Gaussian derivative
//! with channel-dependent amplitude, width and delay). Channels are summed
//! over units and Gaussian noise is added on top.

use crate::error::{DecompResult, DecompositionError};
use crate::signal::SignalBundle;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::debug;

/// Firing pattern of one simulated motor unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedUnit {
    /// Mean inter-spike interval in samples
    pub mean_isi: usize,
    /// Relative ISI jitter, uniform in `±jitter`
    pub jitter: f64,
    /// Peak action potential amplitude across channels
    pub amplitude: f64,
}

impl SimulatedUnit {
    pub fn new(mean_isi: usize) -> Self {
        Self {
            mean_isi,
            jitter: 0.05,
            amplitude: 1.0,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }
}

/// Builder for synthetic multi-channel mixtures
#[derive(Debug, Clone)]
pub struct SyntheticMixture {
    pub sample_rate: f64,
    pub channels: usize,
    pub samples: usize,
    /// Kernel support in samples
    pub kernel_length: usize,
    pub noise_sd: f64,
    pub seed: u64,
    pub units: Vec<SimulatedUnit>,
}

/// Generated recording plus ground truth
#[derive(Debug, Clone)]
pub struct SyntheticRecording {
    /// Channels x samples
    pub data: Array2<f64>,
    pub sample_rate: f64,
    /// Ground-truth discharge times, one train per unit
    pub discharges: Vec<Vec<usize>>,
    /// Per-unit kernels, channels x kernel length
    pub kernels: Vec<Array2<f64>>,
}

impl SyntheticRecording {
    /// Bundle without electrodes attached; callers add the layout
    pub fn to_bundle(&self) -> DecompResult<SignalBundle> {
        SignalBundle::new(self.data.clone(), self.sample_rate)
    }
}

impl SyntheticMixture {
    pub fn new(channels: usize, samples: usize, sample_rate: f64) -> Self {
        Self {
            sample_rate,
            channels,
            samples,
            kernel_length: 24,
            noise_sd: 0.01,
            seed: 7,
            units: Vec::new(),
        }
    }

    pub fn with_unit(mut self, unit: SimulatedUnit) -> Self {
        self.units.push(unit);
        self
    }

    pub fn with_noise(mut self, noise_sd: f64) -> Self {
        self.noise_sd = noise_sd;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_kernel_length(mut self, kernel_length: usize) -> Self {
        self.kernel_length = kernel_length;
        self
    }

    fn check(&self) -> DecompResult<()> {
        if self.channels == 0 || self.samples == 0 {
            return Err(DecompositionError::configuration(
                "simulation",
                format!("empty recording {}x{}", self.channels, self.samples),
            ));
        }
        if self.kernel_length < 4 {
            return Err(DecompositionError::configuration("simulation", "kernel_length must be at least 4"));
        }
        if !(self.noise_sd >= 0.0) || !self.noise_sd.is_finite() {
            return Err(DecompositionError::configuration(
                "simulation",
                format!("noise_sd must be finite and non-negative, got {}", self.noise_sd),
            ));
        }
        if let Some(unit) = self.units.iter().find(|u| u.mean_isi < 2 || !(0.0..1.0).contains(&u.jitter)) {
            return Err(DecompositionError::configuration(
                "simulation",
                format!("unusable unit firing pattern {:?}", unit),
            ));
        }
        Ok(())
    }

    /// Draw a recording; the same seed gives the same recording
    pub fn generate(&self) -> DecompResult<SyntheticRecording> {
        self.check()?;
        let noise = Normal::new(0.0, self.noise_sd)
            .map_err(|e| DecompositionError::configuration("simulation", e.to_string()))?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut data = Array2::<f64>::zeros((self.channels, self.samples));
        let mut discharges = Vec::with_capacity(self.units.len());
        let mut kernels = Vec::with_capacity(self.units.len());

        for unit in &self.units {
            let train = self.discharge_train(unit, &mut rng);
            let kernel = self.kernel(unit, &mut rng);

            for (mut channel, shape) in data.rows_mut().into_iter().zip(kernel.rows()) {
                for &t in &train {
                    for (lag, &value) in shape.iter().enumerate() {
                        if let Some(sample) = channel.get_mut(t + lag) {
                            *sample += value;
                        }
                    }
                }
            }
            debug!(mean_isi = unit.mean_isi, discharges = train.len(), "Simulated motor unit");
            discharges.push(train);
            kernels.push(kernel);
        }

        if self.noise_sd > 0.0 {
            data.mapv_inplace(|v| v + noise.sample(&mut rng));
        }

        Ok(SyntheticRecording {
            data,
            sample_rate: self.sample_rate,
            discharges,
            kernels,
        })
    }

    fn discharge_train(&self, unit: &SimulatedUnit, rng: &mut StdRng) -> Vec<usize> {
        let isi = unit.mean_isi as f64;
        let mut t = rng.gen_range(0.0..isi);
        let mut train = Vec::new();
        while (t as usize) < self.samples {
            train.push(t as usize);
            let jitter: f64 = rng.gen_range(-unit.jitter..=unit.jitter);
            t += (isi * (1.0 + jitter)).max(1.0);
        }
        train
    }

    /// Biphasic Gaussian-derivative shape per channel
    fn kernel(&self, unit: &SimulatedUnit, rng: &mut StdRng) -> Array2<f64> {
        let length = self.kernel_length;
        let mut kernel = Array2::zeros((self.channels, length));
        for mut row in kernel.rows_mut() {
            let gain = unit.amplitude * rng.gen_range(0.3..1.0) * if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            let width = rng.gen_range(1.5..3.5);
            let centre = rng.gen_range(length as f64 * 0.3..length as f64 * 0.6);
            // Peak of u * exp(-u^2) is at u = 1/sqrt(2)
            let scale = gain / ((0.5f64).sqrt() * (-0.5f64).exp());
            for (i, value) in row.iter_mut().enumerate() {
                let u = (i as f64 - centre) / width;
                *value = scale * u * (-u * u).exp();
            }
        }
        kernel
    }
}
