use tracing::warn;

use super::Dataset;
use crate::core::missing::is_missing;

/// Smallest fitted stddev, relative to `max(1, |mean|)`. Keeps the density of a
/// constant column narrow but finite.
pub const MIN_RELATIVE_STANDARD_DEVIATION: f64 = 1e-3;

/// Mean and population standard deviation of `variable` over the non-missing
/// values addressed by `indices`.
pub fn mean_standard_deviation(dataset: &Dataset, indices: &[u32], variable: usize) -> (f64, f64) {
    let mut total = 0.0;
    let mut count = 0usize;
    for &i in indices {
        let x = dataset.value(i as usize, variable);
        if !is_missing(x) {
            total += x;
            count += 1;
        }
    }

    if count == 0 {
        warn!(variable, "found only missing values, using mean 0 and stddev 1");
        return (0.0, 1.0);
    }

    let mu = total / count as f64;
    let variance = indices
        .iter()
        .map(|&i| dataset.value(i as usize, variable))
        .filter(|x| !is_missing(*x))
        .map(|x| (x - mu) * (x - mu))
        .sum::<f64>()
        / count as f64;

    let floor = MIN_RELATIVE_STANDARD_DEVIATION * mu.abs().max(1.0);
    let mut sigma = variance.sqrt();
    if sigma < floor {
        warn!(variable, mu, sigma, floor, "(near) zero variance, raising the stddev");
        sigma = floor;
    }
    (mu, sigma)
}

/// Relative frequency of each category of `variable`, ignoring missing values.
pub fn category_fractions(dataset: &Dataset, indices: &[u32], variable: usize) -> Vec<f64> {
    let counts = dataset.categorical_counts(indices, variable);
    let total: u32 = counts.iter().sum();
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    counts
        .iter()
        .map(|&c| c as f64 / total as f64)
        .collect()
}
