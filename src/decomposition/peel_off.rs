// src/decomposition/peel_off.rs
//! Removal of an accepted unit's contribution from the residual

use ndarray::{s, Array2, Axis};

/// Average waveform of `residual` around each discharge (channels x `2r + 1`)
///
/// Only discharges whose whole window fits inside the signal contribute.
pub fn waveform_template(residual: &Array2<f64>, discharges: &[usize], radius: usize) -> Option<Array2<f64>> {
    let samples = residual.ncols();
    let width = 2 * radius + 1;
    let mut template = Array2::zeros((residual.nrows(), width));
    let mut count = 0usize;

    for &t in discharges {
        if t < radius || t + radius >= samples {
            continue;
        }
        template += &residual.slice(s![.., t - radius..=t + radius]);
        count += 1;
    }

    if count == 0 {
        return None;
    }
    template /= count as f64;
    Some(template)
}

/// Subtract the unit's template at every discharge, in place
///
/// Same result as convolving the firing indicator with the template and
/// keeping the centred part. Returns `false` when no template could be
/// formed and the residual is untouched.
pub fn peel_off(residual: &mut Array2<f64>, discharges: &[usize], radius: usize) -> bool {
    let Some(template) = waveform_template(residual, discharges, radius) else {
        return false;
    };
    let samples = residual.ncols() as isize;

    for &t in discharges {
        let start = t as isize - radius as isize;
        for (offset, column) in template.axis_iter(Axis(1)).enumerate() {
            let target = start + offset as isize;
            if (0..samples).contains(&target) {
                let mut out = residual.column_mut(target as usize);
                out -= &column;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repeated_waveform(samples: usize, times: &[usize]) -> Array2<f64> {
        let shape = [0.5, 1.0, -0.75, 0.25, 0.0];
        let mut x = Array2::zeros((2, samples));
        for &t in times {
            for (i, &v) in shape.iter().enumerate() {
                let idx = t + i - 2;
                x[[0, idx]] += v;
                x[[1, idx]] -= 2.0 * v;
            }
        }
        x
    }

    #[test]
    fn test_template_is_mean_waveform() {
        let times = [10, 30, 50];
        let x = repeated_waveform(64, &times);
        let template = waveform_template(&x, &times, 2).unwrap();
        assert_eq!(template.row(0).to_vec(), vec![0.5, 1.0, -0.75, 0.25, 0.0]);
        assert_eq!(template.row(1).to_vec(), vec![-1.0, -2.0, 1.5, -0.5, 0.0]);
    }

    #[test]
    fn test_peel_off_cancels_isolated_unit() {
        let times = [10, 30, 50];
        let mut x = repeated_waveform(64, &times);
        assert!(peel_off(&mut x, &times, 2));
        assert!(x.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_partial_windows_excluded_from_template() {
        // The discharge at 1 does not fit a radius-2 window
        let times = [1, 20, 40];
        let x = repeated_waveform(64, &times[1..]);
        let template = waveform_template(&x, &times, 2).unwrap();
        assert_eq!(template[[0, 1]], 1.0);

        let mut flat = Array2::zeros((1, 10));
        assert!(!peel_off(&mut flat, &[0, 9], 3));
    }
}
