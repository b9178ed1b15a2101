//! Common numeric helpers shared by the decomposition stages

pub mod stats;

pub use stats::{coefficient_of_variation, inter_spike_intervals, mean, median, ms_to_samples, sample_std};
