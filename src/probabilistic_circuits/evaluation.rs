use super::algorithms::topological_ordering;
use super::circuit::ProbabilisticCircuit;
use super::nodes::{NodeId, PcNode};
use crate::core::dataset::Dataset;
use crate::core::error::{Error, Result};
use crate::utils::math::log_sum_exp;

/// Likelihood of `x`, computed recursively from the root.
///
/// `x` holds one value per variable of `pc`, see
/// [`ProbabilisticCircuit::variable_count`].
pub fn evi(pc: &ProbabilisticCircuit, x: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), pc.variable_count());
    evi_node(pc, pc.root(), x)
}

/// Log-likelihood of `x`, computed recursively from the root. Same
/// precondition as [`evi`].
pub fn log_evi(pc: &ProbabilisticCircuit, x: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), pc.variable_count());
    log_evi_node(pc, pc.root(), x)
}

fn evi_node(pc: &ProbabilisticCircuit, id: NodeId, x: &[f64]) -> f64 {
    match pc.node(id) {
        PcNode::Sum { children, weights } => children
            .iter()
            .zip(weights)
            .map(|(&child, w)| w * evi_node(pc, child, x))
            .sum(),
        PcNode::SumSplit {
            children,
            weights,
            split,
        } => {
            let side = split.select(x);
            weights[side] * evi_node(pc, children[side], x)
        }
        PcNode::Product { children } => {
            let mut result = 1.0;
            for &child in children {
                result *= evi_node(pc, child, x);
                if result <= 0.0 {
                    break;
                }
            }
            result
        }
        PcNode::Terminal { scope, kind } => kind.evi(x[*scope]),
    }
}

fn log_evi_node(pc: &ProbabilisticCircuit, id: NodeId, x: &[f64]) -> f64 {
    match pc.node(id) {
        PcNode::Sum { children, weights } => {
            let terms: Vec<f64> = children
                .iter()
                .zip(weights)
                .map(|(&child, w)| w.ln() + log_evi_node(pc, child, x))
                .collect();
            log_sum_exp(&terms)
        }
        PcNode::SumSplit {
            children,
            weights,
            split,
        } => {
            let side = split.select(x);
            weights[side].ln() + log_evi_node(pc, children[side], x)
        }
        PcNode::Product { children } => {
            let mut result = 0.0;
            for &child in children {
                result += log_evi_node(pc, child, x);
                if result == f64::NEG_INFINITY {
                    break;
                }
            }
            result
        }
        PcNode::Terminal { scope, kind } => kind.log_evi(x[*scope]),
    }
}

/// Evaluates a circuit without recursion. The topological order is computed
/// once; every query then fills one value per node, children first.
#[derive(Debug, Clone)]
pub struct CircuitEvaluator<'a> {
    pc: &'a ProbabilisticCircuit,
    order: Vec<NodeId>,
    values: Vec<f64>,
}

impl<'a> CircuitEvaluator<'a> {
    pub fn new(pc: &'a ProbabilisticCircuit) -> Self {
        Self {
            pc,
            order: topological_ordering(pc),
            values: vec![0.0; pc.len()],
        }
    }

    pub fn evi(&mut self, x: &[f64]) -> f64 {
        debug_assert_eq!(x.len(), self.pc.variable_count());
        for &id in &self.order {
            let value = match self.pc.node(id) {
                PcNode::Sum { children, weights } => children
                    .iter()
                    .zip(weights)
                    .map(|(c, w)| w * self.values[c.index()])
                    .sum(),
                PcNode::SumSplit {
                    children,
                    weights,
                    split,
                } => {
                    let side = split.select(x);
                    weights[side] * self.values[children[side].index()]
                }
                PcNode::Product { children } => {
                    let mut result = 1.0;
                    for child in children {
                        result *= self.values[child.index()];
                        if result <= 0.0 {
                            break;
                        }
                    }
                    result
                }
                PcNode::Terminal { scope, kind } => kind.evi(x[*scope]),
            };
            self.values[id.index()] = value;
        }
        self.values[self.pc.root().index()]
    }

    pub fn log_evi(&mut self, x: &[f64]) -> f64 {
        debug_assert_eq!(x.len(), self.pc.variable_count());
        let mut terms = Vec::new();
        for &id in &self.order {
            let value = match self.pc.node(id) {
                PcNode::Sum { children, weights } => {
                    terms.clear();
                    terms.extend(
                        children
                            .iter()
                            .zip(weights)
                            .map(|(c, w)| w.ln() + self.values[c.index()]),
                    );
                    log_sum_exp(&terms)
                }
                PcNode::SumSplit {
                    children,
                    weights,
                    split,
                } => {
                    let side = split.select(x);
                    weights[side].ln() + self.values[children[side].index()]
                }
                PcNode::Product { children } => {
                    let mut result = 0.0;
                    for child in children {
                        result += self.values[child.index()];
                        if result == f64::NEG_INFINITY {
                            break;
                        }
                    }
                    result
                }
                PcNode::Terminal { scope, kind } => kind.log_evi(x[*scope]),
            };
            self.values[id.index()] = value;
        }
        self.values[self.pc.root().index()]
    }

    /// (Log-)likelihood of every row of `dataset`.
    pub fn evi_all(&mut self, dataset: &Dataset, log: bool) -> Result<Vec<f64>> {
        if dataset.column_count() != self.pc.variable_count() {
            return Err(Error::DimensionMismatch {
                expected: self.pc.variable_count(),
                found: dataset.column_count(),
            });
        }
        Ok(dataset
            .rows()
            .map(|x| if log { self.log_evi(x) } else { self.evi(x) })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::distributions::NormalDistribution;
    use crate::core::missing::MISSING;
    use crate::decision_trees::SplitCriterion;
    use crate::probabilistic_circuits::circuit::CircuitBuilder;
    use crate::probabilistic_circuits::nodes::TerminalKind;
    use approx::assert_abs_diff_eq;

    fn normal(mean: f64, sd: f64) -> TerminalKind {
        TerminalKind::Normal(NormalDistribution::new(mean, sd).unwrap())
    }

    fn both(pc: &ProbabilisticCircuit, x: &[f64]) -> (f64, f64) {
        let mut evaluator = CircuitEvaluator::new(pc);
        (evi(pc, x), evaluator.evi(x))
    }

    #[test]
    fn single_normal_leaf() {
        let mut b = CircuitBuilder::new(vec![0]);
        let root = b.add_terminal(0, normal(1.0, 0.1)).unwrap();
        let pc = b.finish(root).unwrap();
        let (e1, e2) = both(&pc, &[1.1]);
        assert_abs_diff_eq!(e1, 2.41, epsilon = 0.01);
        assert_abs_diff_eq!(e1, e2, epsilon = 1e-12);
    }

    #[test]
    fn product_of_normals() {
        let mut b = CircuitBuilder::new(vec![0, 0, 0]);
        let x = b.add_terminal(0, normal(0.0, 0.2_f64.sqrt())).unwrap();
        let y = b.add_terminal(1, normal(1.0, 0.5_f64.sqrt())).unwrap();
        let z = b.add_terminal(2, normal(-2.0, 0.3_f64.sqrt())).unwrap();
        let root = b.add_product(vec![x, y, z]).unwrap();
        let pc = b.finish(root).unwrap();

        let x = [0.1, -0.1, -2.2];
        let (e1, e2) = both(&pc, &x);
        assert_abs_diff_eq!(e1, 0.0997, epsilon = 0.01);
        assert_abs_diff_eq!(e1, e2, epsilon = 1e-12);

        let mut evaluator = CircuitEvaluator::new(&pc);
        assert_abs_diff_eq!(evaluator.log_evi(&x), e1.ln(), epsilon = 1e-9);
        assert_abs_diff_eq!(log_evi(&pc, &x), e1.ln(), epsilon = 1e-9);
    }

    #[test]
    fn mixture_of_normals() {
        let mut b = CircuitBuilder::new(vec![0]);
        let x = b.add_terminal(0, normal(-2.0, 2.0)).unwrap();
        let y = b.add_terminal(0, normal(2.0, 1.5)).unwrap();
        let root = b.add_sum(vec![x, y], vec![0.8, 0.2]).unwrap();
        let pc = b.finish(root).unwrap();
        let (e1, e2) = both(&pc, &[1.0]);
        assert_abs_diff_eq!(e1, 0.09, epsilon = 0.01);
        assert_abs_diff_eq!(e1, e2, epsilon = 1e-12);
        assert_abs_diff_eq!(log_evi(&pc, &[1.0]), e1.ln(), epsilon = 1e-9);
    }

    #[test]
    fn sum_split_uses_one_side() {
        let mut b = CircuitBuilder::new(vec![0]);
        let l = b.add_terminal(0, normal(0.0, 1.0)).unwrap();
        let r = b.add_terminal(0, normal(5.0, 1.0)).unwrap();
        let split = SplitCriterion::Threshold { variable: 0, value: 2.5 };
        let root = b.add_sum_split(vec![l, r], vec![0.25, 0.75], split).unwrap();
        let pc = b.finish(root).unwrap();

        let expected = 0.25 * NormalDistribution::new(0.0, 1.0).unwrap().pdf(1.0);
        let (e1, e2) = both(&pc, &[1.0]);
        assert_abs_diff_eq!(e1, expected, epsilon = 1e-12);
        assert_abs_diff_eq!(e2, expected, epsilon = 1e-12);

        // a missing value selects the right side and is ignored by the leaf
        assert_abs_diff_eq!(evi(&pc, &[MISSING]), 0.75, epsilon = 1e-12);
    }

    #[test]
    fn zero_likelihood_in_log_space() {
        let mut b = CircuitBuilder::new(vec![0, 0]);
        let x = b.add_terminal(0, TerminalKind::Less(0.0)).unwrap();
        let y = b.add_terminal(1, normal(0.0, 1.0)).unwrap();
        let root = b.add_product(vec![x, y]).unwrap();
        let pc = b.finish(root).unwrap();

        let mut evaluator = CircuitEvaluator::new(&pc);
        assert_eq!(evi(&pc, &[1.0, 0.0]), 0.0);
        assert_eq!(log_evi(&pc, &[1.0, 0.0]), f64::NEG_INFINITY);
        assert_eq!(evaluator.log_evi(&[1.0, 0.0]), f64::NEG_INFINITY);
        assert!(evaluator.evi(&[-1.0, 0.0]) > 0.0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn short_vectors_are_caught_in_debug_builds() {
        let mut b = CircuitBuilder::new(vec![0, 0]);
        let x = b.add_terminal(0, normal(0.0, 1.0)).unwrap();
        let y = b.add_terminal(1, normal(0.0, 1.0)).unwrap();
        let root = b.add_product(vec![x, y]).unwrap();
        let pc = b.finish(root).unwrap();
        evi(&pc, &[0.0]);
    }

    #[test]
    fn evi_all_checks_the_width() {
        let mut b = CircuitBuilder::new(vec![0, 2]);
        let x = b.add_terminal(0, normal(0.0, 1.0)).unwrap();
        let pc = b.finish(x).unwrap();
        let d = Dataset::from_rows(vec![vec![0.0, 1.0], vec![1.0, 0.0]], vec![0, 2]).unwrap();
        let mut evaluator = CircuitEvaluator::new(&pc);
        let values = evaluator.evi_all(&d, false).unwrap();
        assert_eq!(values.len(), 2);
        assert_abs_diff_eq!(values[0], 0.398_942_28, epsilon = 1e-6);

        let narrow = Dataset::from_rows(vec![vec![0.0]], vec![0]).unwrap();
        assert!(matches!(
            evaluator.evi_all(&narrow, true),
            Err(Error::DimensionMismatch { expected: 2, found: 1 })
        ));
    }
}
