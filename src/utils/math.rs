use std::f64::consts::{PI, SQRT_2};

use statrs::function::erf::erf_inv;

#[inline]
pub fn normal_pdf(x: f64, mean: f64, standard_deviation: f64) -> f64 {
    let z = (x - mean) / standard_deviation;
    (-0.5 * z * z).exp() / (standard_deviation * (2.0 * PI).sqrt())
}

#[inline]
pub fn normal_log_pdf(x: f64, mean: f64, standard_deviation: f64) -> f64 {
    let z = (x - mean) / standard_deviation;
    -0.5 * z * z - (standard_deviation * (2.0 * PI).sqrt()).ln()
}

#[inline]
pub fn normal_cdf(x: f64, mean: f64, standard_deviation: f64) -> f64 {
    0.5 * (1.0 + libm::erf((x - mean) / (standard_deviation * SQRT_2)))
}

/// Inverse of [`normal_cdf`]. `p` is clamped to the open unit interval.
pub fn normal_quantile(p: f64, mean: f64, standard_deviation: f64) -> f64 {
    let p = p.clamp(f64::EPSILON, 1.0 - f64::EPSILON);
    mean + standard_deviation * SQRT_2 * erf_inv(2.0 * p - 1.0)
}

pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Returns the first index `i` such that `weights[0] + ... + weights[i] > p`.
/// For `p` in `[0, 1)` a zero weight is never chosen. If the weights sum to at
/// most `p`, returns the last index with a positive weight.
pub fn find_categorical_section(weights: &[f64], p: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cumulative += w;
        if cumulative > p {
            return i;
        }
    }
    weights
        .iter()
        .rposition(|&w| w > 0.0)
        .unwrap_or_else(|| weights.len().saturating_sub(1))
}

/// Mean and standard deviation of the two component mixture `w1 N(mu1, s1) + w2 N(mu2, s2)`.
pub fn mean_standard_deviation_mixture(
    w1: f64,
    mu1: f64,
    sigma1: f64,
    w2: f64,
    mu2: f64,
    sigma2: f64,
) -> (f64, f64) {
    let mu = w1 * mu1 + w2 * mu2;
    let second_moment = w1 * (sigma1 * sigma1 + mu1 * mu1) + w2 * (sigma2 * sigma2 + mu2 * mu2);
    (mu, (second_moment - mu * mu).sqrt())
}
