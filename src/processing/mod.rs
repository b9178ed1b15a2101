// src/processing/mod.rs
//! Signal preparation ahead of source separation
//!
//! Conditioning removes line interference and out-of-band content, extension
//! turns the convolutive mixture into an instantaneous one, and whitening
//! decorrelates the extended channels.

pub mod conditioning;
pub mod extension;
pub mod filters;
pub mod whitening;

pub use conditioning::SignalConditioner;
pub use extension::{extend, extension_factor};
pub use filters::{ButterworthBandpass, ChannelFilter, FilterChain, SpectralNotch};
pub use whitening::{whiten, Whitened, WhiteningModel};
