//! Descriptive statistics on sample sequences
//!
//! Standard deviations use the `n - 1` normalization throughout, matching
//! how CoV values are reported downstream.

/// Arithmetic mean, `0.0` for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation, `0.0` with fewer than two values
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// `std / mean`; infinite when there are fewer than two values or the mean
/// is not positive, so such sequences never pass a CoV gate
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if values.len() < 2 || !(m > 0.0) {
        return f64::INFINITY;
    }
    sample_std(values) / m
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

/// Inter-spike intervals in seconds
pub fn inter_spike_intervals(discharge_times: &[usize], sample_rate: f64) -> Vec<f64> {
    discharge_times
        .windows(2)
        .map(|pair| (pair[1] as f64 - pair[0] as f64) / sample_rate)
        .collect()
}

/// Round a duration in milliseconds to a sample count
pub fn ms_to_samples(ms: f64, sample_rate: f64) -> usize {
    (ms * 1e-3 * sample_rate).round().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values) - 5.0).abs() < 1e-12);
        // n - 1 normalization
        assert!((sample_std(&values) - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_cov_degenerate_inputs() {
        assert!(coefficient_of_variation(&[]).is_infinite());
        assert!(coefficient_of_variation(&[0.1]).is_infinite());
        assert_eq!(coefficient_of_variation(&[0.5, 0.5, 0.5]), 0.0);
        // 0.1 is not representable, so the mean picks up rounding
        assert!(coefficient_of_variation(&[0.1, 0.1, 0.1]) < 1e-12);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_intervals_and_conversion() {
        let isi = inter_spike_intervals(&[100, 300, 600], 1000.0);
        assert_eq!(isi, vec![0.2, 0.3]);
        assert_eq!(ms_to_samples(20.0, 2048.0), 41);
        assert_eq!(ms_to_samples(0.5, 2048.0), 1);
    }
}
