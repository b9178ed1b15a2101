// src/postprocessing/outliers.rs
//! Removal of spurious discharges that produce implausibly high rates

use crate::config::constants::postprocessing::OUTLIER_SD_FACTOR;
use crate::utils::stats::{coefficient_of_variation, mean, sample_std};
use std::collections::BTreeSet;
use tracing::trace;

/// What an outlier pass did to one discharge train
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierReport {
    pub removed: usize,
    pub iterations: usize,
    pub initial_cov: f64,
    pub final_cov: f64,
}

/// Instantaneous discharge rates in Hz
pub fn discharge_rates(discharges: &[usize], sample_rate: f64) -> Vec<f64> {
    discharges
        .windows(2)
        .map(|pair| sample_rate / (pair[1] - pair[0]).max(1) as f64)
        .collect()
}

/// Iteratively drop the weaker spike bounding each rate above
/// `mean + 3 * std`
///
/// Stops once CoV(rate) is at or below `cov_threshold`, after
/// `max_iterations` passes, when nothing is flagged, or when a pass would
/// raise CoV(rate), in which case that pass is not applied.
pub fn remove_outliers(
    discharges: &mut Vec<usize>,
    pulse_train: &[f64],
    sample_rate: f64,
    cov_threshold: f64,
    max_iterations: usize,
) -> OutlierReport {
    let amplitude = |t: usize| pulse_train.get(t).copied().unwrap_or(0.0);
    let initial_cov = coefficient_of_variation(&discharge_rates(discharges, sample_rate));
    let mut cov = initial_cov;
    let mut removed = 0;
    let mut iterations = 0;

    while cov > cov_threshold && iterations < max_iterations {
        let rates = discharge_rates(discharges, sample_rate);
        let limit = mean(&rates) + OUTLIER_SD_FACTOR * sample_std(&rates);

        let mut doomed = BTreeSet::new();
        for (i, &rate) in rates.iter().enumerate() {
            if rate > limit {
                let (left, right) = (discharges[i], discharges[i + 1]);
                doomed.insert(if amplitude(left) < amplitude(right) { i } else { i + 1 });
            }
        }
        if doomed.is_empty() {
            break;
        }

        let kept: Vec<usize> = discharges
            .iter()
            .enumerate()
            .filter(|(i, _)| !doomed.contains(i))
            .map(|(_, &t)| t)
            .collect();
        let next_cov = coefficient_of_variation(&discharge_rates(&kept, sample_rate));
        if next_cov > cov {
            trace!(cov, next_cov, "Outlier pass would raise CoV, stopping");
            break;
        }

        removed += doomed.len();
        *discharges = kept;
        cov = next_cov;
        iterations += 1;
    }

    OutlierReport {
        removed,
        iterations,
        initial_cov,
        final_cov: cov,
    }
}
