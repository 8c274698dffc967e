use std::fmt;

use rand::Rng;

use crate::core::distributions::{
    CategoricalDistribution, NormalDistribution, TruncatedNormalDistribution,
};
use crate::core::error::{Error, Result};
use crate::core::missing::is_missing;
use crate::decision_trees::SplitCriterion;
use crate::utils::memory::{MemoryMeter, MemorySized, flat_vec_size};

/// Handle of a node in the arena of a [`ProbabilisticCircuit`](super::ProbabilisticCircuit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Univariate leaf of a circuit. The distributions are densities, the
/// remaining kinds are 0/1 indicators produced by expanding sum-split nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalKind {
    Categorical(CategoricalDistribution),
    Normal(NormalDistribution),
    TruncatedNormal(TruncatedNormalDistribution),
    Less(f64),
    GreaterEqual(f64),
    EqualTo(f64),
    NotEqualTo(f64),
    Subset(u32),
}

impl TerminalKind {
    pub fn name(&self) -> &'static str {
        match self {
            TerminalKind::Categorical(_) => "categorical",
            TerminalKind::Normal(_) => "normal",
            TerminalKind::TruncatedNormal(_) => "truncated_normal",
            TerminalKind::Less(_) => "less",
            TerminalKind::GreaterEqual(_) => "greater_equal",
            TerminalKind::EqualTo(_) => "equal_to",
            TerminalKind::NotEqualTo(_) => "not_equal_to",
            TerminalKind::Subset(_) => "subset",
        }
    }

    pub fn is_indicator(&self) -> bool {
        !matches!(
            self,
            TerminalKind::Categorical(_) | TerminalKind::Normal(_) | TerminalKind::TruncatedNormal(_)
        )
    }

    /// Indicator test; always false for the distributions.
    fn contains(&self, x: f64) -> bool {
        let missing = is_missing(x);
        match *self {
            TerminalKind::Less(value) => missing || x < value,
            TerminalKind::GreaterEqual(value) => missing || x >= value,
            TerminalKind::EqualTo(value) => missing || x == value,
            TerminalKind::NotEqualTo(value) => !missing && x != value,
            TerminalKind::Subset(mask) => {
                missing || (x >= 0.0 && x < 32.0 && mask & (1 << x as u32) != 0)
            }
            _ => false,
        }
    }

    /// Likelihood of the value `x`. A missing value has likelihood 1 under
    /// every distribution.
    pub fn evi(&self, x: f64) -> f64 {
        match self {
            TerminalKind::Categorical(_) | TerminalKind::Normal(_) | TerminalKind::TruncatedNormal(_)
                if is_missing(x) =>
            {
                1.0
            }
            TerminalKind::Categorical(d) => d.pdf(x),
            TerminalKind::Normal(d) => d.pdf(x),
            TerminalKind::TruncatedNormal(d) => d.pdf(x),
            indicator => {
                if indicator.contains(x) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn log_evi(&self, x: f64) -> f64 {
        match self {
            TerminalKind::Categorical(_) | TerminalKind::Normal(_) | TerminalKind::TruncatedNormal(_)
                if is_missing(x) =>
            {
                0.0
            }
            TerminalKind::Categorical(d) => d.pdf(x).ln(),
            TerminalKind::Normal(d) => d.log_pdf(x),
            TerminalKind::TruncatedNormal(d) => d.log_pdf(x),
            indicator => {
                if indicator.contains(x) {
                    0.0
                } else {
                    f64::NEG_INFINITY
                }
            }
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        match self {
            TerminalKind::Categorical(d) => Ok(d.sample(rng)),
            TerminalKind::Normal(d) => Ok(d.sample(rng)),
            TerminalKind::TruncatedNormal(d) => Ok(d.sample(rng)),
            _ => Err(Error::UnsupportedSampling(self.name())),
        }
    }

    /// The pair of indicators that select side 0 and side 1 of `split`.
    pub fn indicators(split: &SplitCriterion) -> Result<(TerminalKind, TerminalKind)> {
        match *split {
            SplitCriterion::None => Err(Error::UndefinedSplit),
            SplitCriterion::Threshold { value, .. } => {
                Ok((TerminalKind::Less(value), TerminalKind::GreaterEqual(value)))
            }
            SplitCriterion::Single { value, .. } => Ok((
                TerminalKind::EqualTo(value as f64),
                TerminalKind::NotEqualTo(value as f64),
            )),
            SplitCriterion::Subset { mask, .. } => {
                Ok((TerminalKind::Subset(mask), TerminalKind::Subset(!mask)))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PcNode {
    Sum {
        children: Vec<NodeId>,
        weights: Vec<f64>,
    },
    /// A sum in which `split` picks the single child that contributes.
    SumSplit {
        children: Vec<NodeId>,
        weights: Vec<f64>,
        split: SplitCriterion,
    },
    Product {
        children: Vec<NodeId>,
    },
    Terminal {
        scope: usize,
        kind: TerminalKind,
    },
}

impl PcNode {
    pub fn children(&self) -> &[NodeId] {
        match self {
            PcNode::Sum { children, .. }
            | PcNode::SumSplit { children, .. }
            | PcNode::Product { children } => children,
            PcNode::Terminal { .. } => &[],
        }
    }

    pub fn weights(&self) -> Option<&[f64]> {
        match self {
            PcNode::Sum { weights, .. } | PcNode::SumSplit { weights, .. } => Some(weights),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PcNode::Terminal { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            PcNode::Sum { .. } => "sum",
            PcNode::SumSplit { .. } => "sum_split",
            PcNode::Product { .. } => "product",
            PcNode::Terminal { kind, .. } => kind.name(),
        }
    }
}

impl MemorySized for PcNode {
    fn extra_heap_size(&self, _meter: &mut MemoryMeter) -> usize {
        match self {
            PcNode::Sum { children, weights } | PcNode::SumSplit { children, weights, .. } => {
                flat_vec_size(children) + flat_vec_size(weights)
            }
            PcNode::Product { children } => flat_vec_size(children),
            PcNode::Terminal {
                kind: TerminalKind::Categorical(d),
                ..
            } => std::mem::size_of_val(d.probabilities()),
            PcNode::Terminal { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::missing::MISSING;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn indicators_contain_missing_values() {
        let kinds = [
            TerminalKind::Less(1.0),
            TerminalKind::GreaterEqual(1.0),
            TerminalKind::EqualTo(1.0),
            TerminalKind::Subset(0b10),
        ];
        for kind in &kinds {
            assert_eq!(kind.evi(MISSING), 1.0, "{}", kind.name());
        }
        assert_eq!(TerminalKind::NotEqualTo(1.0).evi(MISSING), 0.0);
        assert_eq!(TerminalKind::NotEqualTo(1.0).log_evi(MISSING), f64::NEG_INFINITY);
    }

    #[test]
    fn indicator_values() {
        assert_eq!(TerminalKind::Less(2.0).evi(1.5), 1.0);
        assert_eq!(TerminalKind::Less(2.0).evi(2.0), 0.0);
        assert_eq!(TerminalKind::GreaterEqual(2.0).log_evi(2.0), 0.0);
        assert_eq!(TerminalKind::EqualTo(3.0).evi(3.0), 1.0);
        assert_eq!(TerminalKind::NotEqualTo(3.0).evi(3.0), 0.0);
        assert_eq!(TerminalKind::Subset(0b101).evi(2.0), 1.0);
        assert_eq!(TerminalKind::Subset(0b101).evi(1.0), 0.0);
        assert_eq!(TerminalKind::Subset(!0b101).evi(1.0), 1.0);
    }

    #[test]
    fn distributions_ignore_missing_values() {
        let normal = TerminalKind::Normal(NormalDistribution::new(1.0, 0.1).unwrap());
        assert_eq!(normal.evi(MISSING), 1.0);
        assert_eq!(normal.log_evi(MISSING), 0.0);
        assert!((normal.evi(1.1) - 2.41).abs() < 0.01);
        assert!((normal.log_evi(1.1) - normal.evi(1.1).ln()).abs() < 1e-12);

        let categorical = TerminalKind::Categorical(CategoricalDistribution::new(vec![0.25, 0.75]).unwrap());
        assert_eq!(categorical.evi(1.0), 0.75);
        assert_eq!(categorical.evi(0.5), 0.0);
        assert_eq!(categorical.log_evi(3.0), f64::NEG_INFINITY);
    }

    #[test]
    fn indicators_cannot_be_sampled() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = TerminalKind::Less(0.0).sample(&mut rng).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSampling("less")));
        let categorical = TerminalKind::Categorical(CategoricalDistribution::new(vec![0.0, 1.0]).unwrap());
        assert_eq!(categorical.sample(&mut rng).unwrap(), 1.0);
    }

    #[test]
    fn indicator_pairs_follow_the_split() {
        let (l, r) = TerminalKind::indicators(&SplitCriterion::Threshold { variable: 0, value: 2.5 }).unwrap();
        assert_eq!((l, r), (TerminalKind::Less(2.5), TerminalKind::GreaterEqual(2.5)));
        let (l, r) = TerminalKind::indicators(&SplitCriterion::Single { variable: 0, value: 4 }).unwrap();
        assert_eq!((l, r), (TerminalKind::EqualTo(4.0), TerminalKind::NotEqualTo(4.0)));
        let (l, r) = TerminalKind::indicators(&SplitCriterion::Subset { variable: 0, mask: 0b110 }).unwrap();
        assert_eq!((l, r), (TerminalKind::Subset(0b110), TerminalKind::Subset(!0b110)));
        assert!(TerminalKind::indicators(&SplitCriterion::None).is_err());
    }
}
