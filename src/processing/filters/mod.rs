// src/processing/filters/mod.rs
//! Offline filters applied channel by channel before decomposition

pub mod butterworth;
pub mod notch;

pub use butterworth::{ButterworthBandpass, SecondOrderSection};
pub use notch::SpectralNotch;

use ndarray::{Array2, Axis};
use rayon::prelude::*;

/// A filter that maps one whole channel to a filtered copy
pub trait ChannelFilter: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, channel: &[f64]) -> Vec<f64>;
}

/// Chain of channel filters applied in order
pub struct FilterChain {
    filters: Vec<Box<dyn ChannelFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self { filters: Vec::new() }
    }

    pub fn push(&mut self, filter: Box<dyn ChannelFilter>) {
        self.filters.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Filter one channel through every stage
    pub fn apply(&self, channel: &[f64]) -> Vec<f64> {
        let mut current = channel.to_vec();
        for filter in &self.filters {
            current = filter.apply(&current);
        }
        current
    }

    /// Filter every row of a channel matrix, channels in parallel
    pub fn apply_rows(&self, data: &Array2<f64>) -> Array2<f64> {
        let rows: Vec<Vec<f64>> = (0..data.nrows())
            .into_par_iter()
            .map(|r| self.apply(&data.row(r).to_vec()))
            .collect();

        let mut out = Array2::zeros(data.raw_dim());
        for (mut target, filtered) in out.axis_iter_mut(Axis(0)).zip(rows) {
            for (dst, src) in target.iter_mut().zip(filtered) {
                *dst = src;
            }
        }
        out
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct Doubler;

    impl ChannelFilter for Doubler {
        fn name(&self) -> &str {
            "doubler"
        }

        fn apply(&self, channel: &[f64]) -> Vec<f64> {
            channel.iter().map(|x| 2.0 * x).collect()
        }
    }

    #[test]
    fn test_chain_applies_in_order_per_row() {
        let mut chain = FilterChain::new();
        chain.push(Box::new(Doubler));
        chain.push(Box::new(Doubler));
        assert_eq!(chain.names(), vec!["doubler", "doubler"]);

        let data = array![[1.0, 2.0], [3.0, 4.0]];
        let out = chain.apply_rows(&data);
        assert_eq!(out, array![[4.0, 8.0], [12.0, 16.0]]);
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let chain = FilterChain::default();
        assert!(chain.is_empty());
        let data = array![[1.0, -1.0, 0.5]];
        assert_eq!(chain.apply_rows(&data), data);
    }
}
