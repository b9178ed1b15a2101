// src/simulation/mod.rs
//! Synthetic HD-EMG generation for tests, benchmarks and demos

pub mod mixture;

pub use mixture::{SimulatedUnit, SyntheticMixture, SyntheticRecording};
