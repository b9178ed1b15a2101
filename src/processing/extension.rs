// src/processing/extension.rs
//! Delay-stacked extension of a channel matrix
//!
//! Convolutive mixtures become instantaneous ones once every channel is
//! augmented with its delayed copies. Block `m` (0-based here) holds the
//! channels delayed by `m` samples, so the extended matrix has
//! `channels * k` rows and `samples + k - 1` columns.

use crate::error::{DecompResult, DecompositionError, ProcessingStage};
use ndarray::{s, Array2};

/// Stack `k` delayed copies of `data`
pub fn extend(data: &Array2<f64>, k: usize) -> DecompResult<Array2<f64>> {
    let (channels, samples) = data.dim();
    if k == 0 {
        return Err(DecompositionError::shape(
            ProcessingStage::Extension,
            "extension factor >= 1",
            "0",
        ));
    }
    if channels == 0 || samples == 0 {
        return Err(DecompositionError::shape(
            ProcessingStage::Extension,
            "non-empty channel matrix",
            format!("{}x{}", channels, samples),
        ));
    }

    let mut extended = Array2::zeros((channels * k, samples + k - 1));
    for m in 0..k {
        extended
            .slice_mut(s![m * channels..(m + 1) * channels, m..m + samples])
            .assign(data);
    }
    Ok(extended)
}

/// Delay count giving roughly `target` extended channels
pub fn extension_factor(target: usize, channels: usize) -> usize {
    if channels == 0 {
        return 1;
    }
    ((target as f64 / channels as f64).round() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_extend_layout() {
        let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let ext = extend(&data, 3).unwrap();
        assert_eq!(ext.dim(), (6, 5));

        assert_eq!(ext.row(0).to_vec(), vec![1.0, 2.0, 3.0, 0.0, 0.0]);
        assert_eq!(ext.row(1).to_vec(), vec![4.0, 5.0, 6.0, 0.0, 0.0]);
        assert_eq!(ext.row(2).to_vec(), vec![0.0, 1.0, 2.0, 3.0, 0.0]);
        assert_eq!(ext.row(5).to_vec(), vec![0.0, 0.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_factor_one_is_identity() {
        let data = array![[1.0, -2.0], [0.5, 0.25]];
        assert_eq!(extend(&data, 1).unwrap(), data);
    }

    #[test]
    fn test_invalid_inputs() {
        let data = array![[1.0, 2.0]];
        let err = extend(&data, 0).unwrap_err();
        assert!(matches!(err, DecompositionError::ShapeMismatch { .. }));
        assert!(extend(&Array2::zeros((0, 10)), 2).is_err());
    }

    #[test]
    fn test_extension_factor() {
        assert_eq!(extension_factor(1000, 64), 16);
        assert_eq!(extension_factor(1000, 32), 31);
        assert_eq!(extension_factor(10, 64), 1);
        assert_eq!(extension_factor(80, 8), 10);
    }
}
