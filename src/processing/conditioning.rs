// src/processing/conditioning.rs
//! Notch plus bandpass conditioning of one electrode's channel matrix

use super::filters::{ButterworthBandpass, FilterChain, SpectralNotch};
use crate::config::constants::conditioning::*;
use crate::config::{ConditioningConfig, EmgType};
use crate::error::DecompResult;
use ndarray::Array2;
use tracing::debug;

/// Builds and runs the filter chain selected by the EMG type
pub struct SignalConditioner {
    chain: FilterChain,
}

impl SignalConditioner {
    pub fn new(config: &ConditioningConfig, sample_rate: f64, emg_type: EmgType) -> DecompResult<Self> {
        let mut chain = FilterChain::new();

        if config.notch_enabled {
            chain.push(Box::new(SpectralNotch::new(
                sample_rate,
                config.notch_bandwidth_hz,
                config.notch_threshold_sd,
            )));
        }

        if config.bandpass_enabled {
            let (order, (low, high)) = match emg_type {
                EmgType::Surface => (SURFACE_BANDPASS_ORDER, SURFACE_BANDPASS_HZ),
                EmgType::Intramuscular => (INTRAMUSCULAR_BANDPASS_ORDER, INTRAMUSCULAR_BANDPASS_HZ),
            };
            chain.push(Box::new(ButterworthBandpass::design(order, low, high, sample_rate)?));
        }

        Ok(Self { chain })
    }

    pub fn stages(&self) -> Vec<&str> {
        self.chain.names()
    }

    /// Filtered copy of `data` (channels x samples)
    pub fn condition(&self, data: &Array2<f64>) -> Array2<f64> {
        if self.chain.is_empty() {
            return data.clone();
        }
        debug!(
            channels = data.nrows(),
            samples = data.ncols(),
            stages = ?self.chain.names(),
            "Conditioning channel matrix"
        );
        self.chain.apply_rows(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecompositionError;

    #[test]
    fn test_stage_selection() {
        let config = ConditioningConfig::default();
        let conditioner = SignalConditioner::new(&config, 2048.0, EmgType::Surface).unwrap();
        assert_eq!(conditioner.stages(), vec!["spectral-notch", "butterworth-bandpass"]);

        let off = ConditioningConfig {
            notch_enabled: false,
            bandpass_enabled: false,
            ..ConditioningConfig::default()
        };
        let conditioner = SignalConditioner::new(&off, 2048.0, EmgType::Surface).unwrap();
        let data = Array2::from_shape_fn((2, 16), |(r, c)| (r * 16 + c) as f64);
        assert_eq!(conditioner.condition(&data), data);
    }

    #[test]
    fn test_intramuscular_needs_high_sample_rate() {
        let config = ConditioningConfig::default();
        let err = SignalConditioner::new(&config, 2048.0, EmgType::Intramuscular)
            .err()
            .unwrap();
        assert!(matches!(err, DecompositionError::Configuration { .. }));
        assert!(SignalConditioner::new(&config, 10240.0, EmgType::Intramuscular).is_ok());
    }

    #[test]
    fn test_zero_rows_stay_zero() {
        let config = ConditioningConfig::default();
        let conditioner = SignalConditioner::new(&config, 2048.0, EmgType::Surface).unwrap();
        let mut data = Array2::zeros((3, 4096));
        for c in 0..4096 {
            data[[1, c]] = (c as f64 * 0.3).sin();
        }
        let out = conditioner.condition(&data);
        assert!(out.row(0).iter().all(|&v| v == 0.0));
        assert!(out.row(2).iter().all(|&v| v == 0.0));
        assert!(out.row(1).iter().any(|&v| v != 0.0));
    }
}
