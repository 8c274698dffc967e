use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::core::error::{Error, Result};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ImpurityMeasure {
    #[default]
    Gini,
    Entropy,
    Misclassification,
}

pub fn parse_impurity_measure(text: &str) -> Result<ImpurityMeasure> {
    text.trim()
        .parse::<ImpurityMeasure>()
        .map_err(|_| Error::UnknownChoice {
            kind: "impurity measure",
            value: text.to_string(),
        })
}

const ENTROPY_SMOOTHING: f64 = 1e-12;

#[inline]
fn total(counts: &[u32]) -> u64 {
    counts.iter().map(|&c| c as u64).sum()
}

pub fn gini_index(counts: &[u32]) -> f64 {
    let n = total(counts);
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

pub fn cross_entropy(counts: &[u32]) -> f64 {
    let n = total(counts);
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    -counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n + ENTROPY_SMOOTHING;
            p * p.log2()
        })
        .sum::<f64>()
}

pub fn misclassification(counts: &[u32]) -> f64 {
    let n = total(counts);
    if n == 0 {
        return 0.0;
    }
    let max = counts.iter().copied().max().unwrap_or(0);
    1.0 - max as f64 / n as f64
}

pub fn impurity(measure: ImpurityMeasure, counts: &[u32]) -> f64 {
    match measure {
        ImpurityMeasure::Gini => gini_index(counts),
        ImpurityMeasure::Entropy => cross_entropy(counts),
        ImpurityMeasure::Misclassification => misclassification(counts),
    }
}

/// Score of a candidate split given the class counts of its two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainFunction {
    /// `imp(D) - |D1|/|D| imp(D1) - |D2|/|D| imp(D2)`
    Normalized(ImpurityMeasure),
    /// `-(|D1| imp(D1) + |D2| imp(D2))`; ranks splits of one node like `Normalized`.
    Unnormalized(ImpurityMeasure),
}

impl GainFunction {
    pub fn score(&self, left: &[u32], right: &[u32]) -> f64 {
        match *self {
            GainFunction::Normalized(measure) => gain(measure, left, right),
            GainFunction::Unnormalized(measure) => gain1(measure, left, right),
        }
    }

    pub fn measure(&self) -> ImpurityMeasure {
        match *self {
            GainFunction::Normalized(m) | GainFunction::Unnormalized(m) => m,
        }
    }
}

pub fn gain(measure: ImpurityMeasure, left: &[u32], right: &[u32]) -> f64 {
    let parent: Vec<u32> = left.iter().zip(right).map(|(a, b)| a + b).collect();
    let n = total(&parent);
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let w1 = total(left) as f64 / n;
    let w2 = total(right) as f64 / n;
    impurity(measure, &parent) - w1 * impurity(measure, left) - w2 * impurity(measure, right)
}

pub fn gain1(measure: ImpurityMeasure, left: &[u32], right: &[u32]) -> f64 {
    -(total(left) as f64 * impurity(measure, left) + total(right) as f64 * impurity(measure, right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    const EPS: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() <= eps
    }

    #[test]
    fn entropy_gain_example() {
        let g = gain(ImpurityMeasure::Entropy, &[4, 0], &[2, 5]);
        assert!(approx_eq(g, 0.445, 0.1));
        assert!(approx_eq(g, 0.4450, 1e-3));
    }

    #[test]
    fn pure_counts_have_zero_impurity() {
        assert!(approx_eq(gini_index(&[5, 0]), 0.0, EPS));
        assert!(approx_eq(misclassification(&[0, 7, 0]), 0.0, EPS));
        assert!(cross_entropy(&[5, 0]).abs() < 1e-9);
    }

    #[test]
    fn uniform_counts() {
        assert!(approx_eq(gini_index(&[3, 3]), 0.5, EPS));
        assert!(approx_eq(cross_entropy(&[3, 3]), 1.0, 1e-9));
        assert!(approx_eq(misclassification(&[2, 2, 2, 2]), 0.75, EPS));
    }

    #[test]
    fn empty_counts_are_not_nan() {
        for measure in ImpurityMeasure::iter() {
            assert_eq!(impurity(measure, &[0, 0]), 0.0);
            assert_eq!(gain(measure, &[0, 0], &[0, 0]), 0.0);
        }
    }

    #[test]
    fn both_gains_rank_splits_alike() {
        let parent = [6u32, 6];
        let candidates: [[u32; 2]; 4] = [[1, 0], [3, 1], [6, 0], [4, 4]];
        for measure in ImpurityMeasure::iter() {
            let mut by_gain: Vec<usize> = (0..candidates.len()).collect();
            let mut by_gain1 = by_gain.clone();
            let score = |f: fn(ImpurityMeasure, &[u32], &[u32]) -> f64, i: usize| {
                let l = candidates[i];
                let r = [parent[0] - l[0], parent[1] - l[1]];
                f(measure, &l, &r)
            };
            by_gain.sort_by(|&a, &b| score(gain, a).total_cmp(&score(gain, b)));
            by_gain1.sort_by(|&a, &b| score(gain1, a).total_cmp(&score(gain1, b)));
            assert_eq!(by_gain, by_gain1, "{measure}");
        }
    }

    #[test]
    fn parse_measure_names() {
        assert_eq!(parse_impurity_measure("gini").unwrap(), ImpurityMeasure::Gini);
        assert_eq!(parse_impurity_measure("entropy").unwrap(), ImpurityMeasure::Entropy);
        assert_eq!(
            parse_impurity_measure("misclassification").unwrap(),
            ImpurityMeasure::Misclassification
        );
        assert!(matches!(
            parse_impurity_measure("variance"),
            Err(Error::UnknownChoice { .. })
        ));
        assert_eq!(ImpurityMeasure::Misclassification.to_string(), "misclassification");
    }
}
