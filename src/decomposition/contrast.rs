// src/decomposition/contrast.rs
//! Contrast nonlinearities for the fixed-point update

use serde::{Deserialize, Serialize};

/// Nonlinearity `g` and its derivative used by the fixed-point rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContrastFunction {
    /// `g(u) = u^2`, suited to sparse, skewed sources
    #[default]
    Skew,
    /// `g(u) = u^3`
    Kurtosis,
    /// `g(u) = tanh(u)`
    Logcosh,
}

impl ContrastFunction {
    #[inline]
    pub fn g(self, u: f64) -> f64 {
        match self {
            ContrastFunction::Skew => u * u,
            ContrastFunction::Kurtosis => u * u * u,
            ContrastFunction::Logcosh => u.tanh(),
        }
    }

    #[inline]
    pub fn g_prime(self, u: f64) -> f64 {
        match self {
            ContrastFunction::Skew => 2.0 * u,
            ContrastFunction::Kurtosis => 3.0 * u * u,
            ContrastFunction::Logcosh => {
                let t = u.tanh();
                1.0 - t * t
            }
        }
    }
}
