use tracing::{debug, info};

use super::algorithms::probabilistic_circuit_size;
use super::circuit::{CircuitBuilder, ProbabilisticCircuit};
use super::nodes::{NodeId, PcNode, TerminalKind};
use crate::core::dataset::{Dataset, category_fractions, mean_standard_deviation};
use crate::core::distributions::{
    CategoricalDistribution, NormalDistribution, TruncatedNormalDistribution,
};
use crate::core::error::{Error, Result};
use crate::core::interval::Interval;
use crate::decision_trees::{DecisionTree, SplitCriterion, Vertex, topological_ordering};
use crate::random_forests::RandomForest;

#[derive(Debug, Clone, Copy)]
enum Bound {
    Lower,
    Upper,
}

impl Bound {
    fn get(self, interval: &Interval) -> f64 {
        match self {
            Bound::Lower => interval.a,
            Bound::Upper => interval.b,
        }
    }

    fn set(self, interval: &mut Interval, value: f64) {
        match self {
            Bound::Lower => interval.a = value,
            Bound::Upper => interval.b = value,
        }
    }
}

enum Step {
    Enter {
        vertex: u32,
        bound: Option<(usize, Bound, f64)>,
    },
    Undo {
        variable: usize,
        bound: Bound,
        previous: f64,
    },
}

/// Calls `report(vertex, index, intervals)` for every vertex of `tree` in
/// depth first preorder, where `intervals[i]` bounds variable `i` in the part
/// of the feature space that reaches the vertex. Only threshold splits narrow
/// the intervals.
pub fn enumerate_intervals<F>(tree: &DecisionTree, m: usize, mut report: F)
where
    F: FnMut(&Vertex, u32, &[Interval]),
{
    let mut intervals = vec![Interval::default(); m];
    let mut todo = vec![Step::Enter {
        vertex: 0,
        bound: None,
    }];

    while let Some(step) = todo.pop() {
        match step {
            Step::Undo {
                variable,
                bound,
                previous,
            } => bound.set(&mut intervals[variable], previous),
            Step::Enter { vertex, bound } => {
                if let Some((variable, side, value)) = bound {
                    let previous = side.get(&intervals[variable]);
                    todo.push(Step::Undo {
                        variable,
                        bound: side,
                        previous,
                    });
                    side.set(&mut intervals[variable], value);
                }

                let u = tree.vertex(vertex);
                report(u, vertex, &intervals);

                if let Some((left, right)) = u.children() {
                    let (left_bound, right_bound) = match u.split {
                        SplitCriterion::Threshold { variable, value } if variable < m => (
                            Some((variable, Bound::Upper, value)),
                            Some((variable, Bound::Lower, value)),
                        ),
                        _ => (None, None),
                    };
                    todo.push(Step::Enter {
                        vertex: right,
                        bound: right_bound,
                    });
                    todo.push(Step::Enter {
                        vertex: left,
                        bound: left_bound,
                    });
                }
            }
        }
    }
}

/// Normal distribution of `variable` over `samples`, truncated to `interval`
/// unless the interval is unbounded. No samples gives a standard normal.
pub fn fit_normal(
    dataset: &Dataset,
    samples: &[u32],
    variable: usize,
    interval: &Interval,
) -> Result<TerminalKind> {
    let (mu, sigma) = if samples.is_empty() {
        (0.0, 1.0)
    } else {
        mean_standard_deviation(dataset, samples, variable)
    };
    if interval.is_maximal() {
        Ok(TerminalKind::Normal(NormalDistribution::new(mu, sigma)?))
    } else {
        Ok(TerminalKind::TruncatedNormal(TruncatedNormalDistribution::new(
            mu, sigma, interval.a, interval.b,
        )?))
    }
}

/// Empirical category frequencies of `variable` over `samples`.
pub fn fit_categorical(dataset: &Dataset, samples: &[u32], variable: usize) -> Result<TerminalKind> {
    let probabilities = category_fractions(dataset, samples, variable);
    Ok(TerminalKind::Categorical(CategoricalDistribution::new(probabilities)?))
}

fn check_compatible(tree: &DecisionTree, dataset: &Dataset) -> Result<()> {
    if tree.category_counts() != dataset.category_counts() {
        return Err(Error::InvalidCircuit(format!(
            "the tree has arities {:?}, the dataset {:?}",
            tree.category_counts(),
            dataset.category_counts()
        )));
    }
    match tree.indices().iter().find(|&&i| i as usize >= dataset.len()) {
        Some(i) => Err(Error::InvalidCircuit(format!(
            "the tree refers to row {i}, the dataset has {} rows",
            dataset.len()
        ))),
        None => Ok(()),
    }
}

/// Adds the generative tree of `tree` to `builder` and returns its root.
///
/// Every leaf becomes a product with one fitted distribution per feature and
/// one for the class. Every inner vertex becomes a sum-split node with the
/// split of the vertex, weighted by the sizes of its children.
fn add_generative_tree(
    builder: &mut CircuitBuilder,
    tree: &DecisionTree,
    dataset: &Dataset,
) -> Result<NodeId> {
    check_compatible(tree, dataset)?;
    let m = tree.feature_count();
    let category_counts = dataset.category_counts();

    let mut leaves: Vec<(u32, Vec<Interval>)> = Vec::new();
    enumerate_intervals(tree, m, |u, ui, intervals| {
        if u.is_leaf() {
            leaves.push((ui, intervals.to_vec()));
        }
    });

    let mut nodes: Vec<Option<NodeId>> = vec![None; tree.len()];
    for (ui, intervals) in leaves {
        let samples = tree.samples(tree.vertex(ui));
        let mut children = Vec::with_capacity(m + 1);
        for (variable, interval) in intervals.iter().enumerate() {
            let kind = if category_counts[variable] < 2 {
                fit_normal(dataset, samples, variable, interval)?
            } else {
                fit_categorical(dataset, samples, variable)?
            };
            children.push(builder.add_terminal(variable, kind)?);
        }
        children.push(builder.add_terminal(m, fit_categorical(dataset, samples, m)?)?);
        nodes[ui as usize] = Some(builder.add_product(children)?);
    }

    let missing = |ui: u32| Error::InvalidCircuit(format!("vertex {ui} was not converted"));
    for ui in topological_ordering(tree).into_iter().rev() {
        let u = tree.vertex(ui);
        if let Some((left, right)) = u.children() {
            let size = u.range.len() as f64;
            let weights = vec![
                tree.vertex(left).range.len() as f64 / size,
                tree.vertex(right).range.len() as f64 / size,
            ];
            let children = vec![
                nodes[left as usize].ok_or_else(|| missing(left))?,
                nodes[right as usize].ok_or_else(|| missing(right))?,
            ];
            nodes[ui as usize] = Some(builder.add_sum_split(children, weights, u.split)?);
        }
    }
    nodes[0].ok_or_else(|| missing(0))
}

pub fn build_generative_tree(tree: &DecisionTree, dataset: &Dataset) -> Result<ProbabilisticCircuit> {
    let mut builder = CircuitBuilder::new(dataset.category_counts().to_vec());
    let root = add_generative_tree(&mut builder, tree, dataset)?;
    builder.finish(root)
}

/// A uniform mixture of the generative trees of `forest`.
pub fn build_generative_forest(forest: &RandomForest, dataset: &Dataset) -> Result<ProbabilisticCircuit> {
    if forest.is_empty() {
        return Err(Error::Empty("random forest"));
    }
    let mut builder = CircuitBuilder::new(dataset.category_counts().to_vec());
    let roots = forest
        .trees()
        .iter()
        .map(|tree| add_generative_tree(&mut builder, tree, dataset))
        .collect::<Result<Vec<_>>>()?;
    let weights = vec![1.0 / roots.len() as f64; roots.len()];
    let root = builder.add_sum(roots, weights)?;
    let pc = builder.finish(root)?;
    info!(
        trees = forest.len(),
        size = probabilistic_circuit_size(&pc),
        "built generative forest"
    );
    Ok(pc)
}

/// Replaces every sum-split node by a plain sum over `product(child, indicator)`,
/// where the indicator of a child accepts exactly the values that the split
/// sends to it. The likelihood of complete vectors does not change.
pub fn expand_sum_split_nodes(pc: &mut ProbabilisticCircuit) -> Result<()> {
    let mut expanded = 0;
    for index in 0..pc.len() {
        let id = NodeId(index as u32);
        let PcNode::SumSplit {
            children,
            weights,
            split,
        } = pc.node(id).clone()
        else {
            continue;
        };
        let variable = split.variable().ok_or(Error::UndefinedSplit)?;
        let (left, right) = TerminalKind::indicators(&split)?;

        let mut products = Vec::with_capacity(children.len());
        for (child, indicator) in children.into_iter().zip([left, right]) {
            let z = pc.push_node(PcNode::Terminal {
                scope: variable,
                kind: indicator,
            });
            products.push(pc.push_node(PcNode::Product {
                children: vec![child, z],
            }));
        }
        pc.replace_node(
            id,
            PcNode::Sum {
                children: products,
                weights,
            },
        );
        expanded += 1;
    }
    debug!(expanded, "expanded sum-split nodes");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::make_random_dataset;
    use crate::decision_trees::{
        DecisionTreeOptions, GainFunction, ImpurityMeasure, SplitFamily, leaf_count,
        learn_decision_tree, parse_decision_tree,
    };
    use crate::probabilistic_circuits::evaluation::{CircuitEvaluator, evi};
    use crate::probabilistic_circuits::validity::{is_decomposable, is_normalized, is_smooth};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const TREE: &str = "binary_decision_tree: 1.0
tree_size: 7
category_counts: 0 0 0 2
classes: 0 0 1 1 0 1 0 1 1 0
indices: 0 1 2 3 4 5 6 7 8 9
vertex: 0 [1 2] ThresholdSplit(2, 5.0) 0 10
vertex: 1 [3 4] ThresholdSplit(0, 3.0) 0 5
vertex: 2 [5 6] ThresholdSplit(1, 4.0) 5 10
vertex: 3 [] NoSplit() 0 2
vertex: 4 [] NoSplit() 2 5
vertex: 5 [] NoSplit() 5 8
vertex: 6 [] NoSplit() 8 10
";

    fn intervals_of(tree: &DecisionTree) -> Vec<(u32, Vec<(f64, f64)>)> {
        let mut result = Vec::new();
        enumerate_intervals(tree, 3, |_, ui, intervals| {
            result.push((ui, intervals.iter().map(|i| (i.a, i.b)).collect()));
        });
        result
    }

    #[test]
    fn intervals_follow_threshold_splits() {
        const LO: f64 = f64::MIN;
        const HI: f64 = f64::MAX;
        let tree = parse_decision_tree(TREE).unwrap();
        let expected = vec![
            (0, vec![(LO, HI), (LO, HI), (LO, HI)]),
            (1, vec![(LO, HI), (LO, HI), (LO, 5.0)]),
            (3, vec![(LO, 3.0), (LO, HI), (LO, 5.0)]),
            (4, vec![(3.0, HI), (LO, HI), (LO, 5.0)]),
            (2, vec![(LO, HI), (LO, HI), (5.0, HI)]),
            (5, vec![(LO, HI), (LO, 4.0), (5.0, HI)]),
            (6, vec![(LO, HI), (4.0, HI), (5.0, HI)]),
        ];
        assert_eq!(intervals_of(&tree), expected);
    }

    #[test]
    fn other_splits_leave_intervals_alone() {
        let text = TREE
            .replace("category_counts: 0 0 0 2", "category_counts: 0 5 0 2")
            .replace("ThresholdSplit(1, 4.0)", "SingleSplit(1, 4)");
        let tree = parse_decision_tree(&text).unwrap();
        let intervals = intervals_of(&tree);
        assert_eq!(intervals[5].0, 5);
        assert_eq!(intervals[5].1[1], (f64::MIN, f64::MAX));
        assert_eq!(intervals[5].1[2], (5.0, f64::MAX));
    }

    #[test]
    fn fitted_leaf_distributions() {
        let d = Dataset::from_rows(
            vec![vec![1.0, 0.0], vec![3.0, 1.0], vec![5.0, 1.0]],
            vec![0, 2],
        )
        .unwrap();
        let maximal = Interval::default();
        match fit_normal(&d, &[0, 1, 2], 0, &maximal).unwrap() {
            TerminalKind::Normal(n) => {
                assert!((n.mean() - 3.0).abs() < 1e-12);
                assert!((n.standard_deviation() - (8.0_f64 / 3.0).sqrt()).abs() < 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }
        match fit_normal(&d, &[], 0, &Interval::new(0.0, 2.0)).unwrap() {
            TerminalKind::TruncatedNormal(t) => {
                assert_eq!((t.normal().mean(), t.normal().standard_deviation()), (0.0, 1.0));
                assert_eq!((t.a(), t.b()), (0.0, 2.0));
            }
            other => panic!("unexpected {other:?}"),
        }
        match fit_categorical(&d, &[0, 1, 2], 1).unwrap() {
            TerminalKind::Categorical(c) => {
                assert!((c.probabilities()[0] - 1.0 / 3.0).abs() < 1e-12);
                assert!((c.probabilities()[1] - 2.0 / 3.0).abs() < 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    fn learned_forest(d: &Dataset, trees: usize) -> RandomForest {
        let options = DecisionTreeOptions {
            max_depth: 4,
            min_samples_leaf: 3,
            max_features: d.feature_count(),
            ..Default::default()
        };
        let gain = GainFunction::Unnormalized(ImpurityMeasure::Gini);
        let trees = (0..trees as u64)
            .map(|seed| {
                learn_decision_tree(d, d.all_indices(), &options, SplitFamily::ThresholdSingle, gain, seed).unwrap()
            })
            .collect();
        RandomForest::new(trees)
    }

    #[test]
    fn circuit_size_matches_the_forest() {
        let mut rng = StdRng::seed_from_u64(11);
        let m = 3;
        let d = make_random_dataset(40, m, &mut rng);
        let forest = learned_forest(&d, 3);
        let pc = build_generative_forest(&forest, &d).unwrap();

        let expected: usize = 1 + forest
            .trees()
            .iter()
            .map(|t| t.len() + (m + 1) * leaf_count(t))
            .sum::<usize>();
        assert_eq!(probabilistic_circuit_size(&pc), expected);
        assert!(is_smooth(&pc));
        assert!(is_decomposable(&pc));
        assert!(is_normalized(&pc));
    }

    #[test]
    fn single_tree_circuit_has_no_mixture_root() {
        let mut rng = StdRng::seed_from_u64(2);
        let d = make_random_dataset(20, 2, &mut rng);
        let forest = learned_forest(&d, 1);
        let tree = &forest.trees()[0];
        let pc = build_generative_tree(tree, &d).unwrap();
        assert_eq!(probabilistic_circuit_size(&pc), tree.len() + 3 * leaf_count(tree));
        assert!(!matches!(pc.node(pc.root()), PcNode::Sum { .. }));
    }

    #[test]
    fn mismatched_dataset_is_rejected() {
        let mut rng = StdRng::seed_from_u64(2);
        let d = make_random_dataset(20, 2, &mut rng);
        let forest = learned_forest(&d, 1);
        let other = make_random_dataset(10, 3, &mut rng);
        assert!(build_generative_forest(&forest, &other).is_err());
        assert!(matches!(
            build_generative_forest(&RandomForest::new(vec![]), &d),
            Err(Error::Empty(_))
        ));
    }

    #[test]
    fn constant_leaves_keep_finite_likelihoods() {
        let d = crate::core::dataset::parse_dataset(
            "dataset: 1.0\ncategory_counts: 0 0 2\n1 2 0\n1 2 0\n5 7 1\n5 7 1\n",
        )
        .unwrap();
        let tree = learn_decision_tree(
            &d,
            d.all_indices(),
            &DecisionTreeOptions::default(),
            SplitFamily::Threshold,
            GainFunction::Unnormalized(ImpurityMeasure::Gini),
            0,
        )
        .unwrap();
        assert_eq!(tree.len(), 3);

        let pc = build_generative_tree(&tree, &d).unwrap();
        let mut evaluator = CircuitEvaluator::new(&pc);
        for x in d.rows() {
            let p = evi(&pc, x);
            assert!(p.is_finite() && p > 1.0, "{p}");
            assert!(evaluator.evi(x).is_finite());
            let lp = crate::probabilistic_circuits::evaluation::log_evi(&pc, x);
            assert!((lp - p.ln()).abs() < 1e-9);

            let nearby: Vec<f64> = x.iter().enumerate().map(|(j, &v)| if j < 2 { v + 1e-4 } else { v }).collect();
            assert!(evi(&pc, &nearby) > 0.0);
        }
    }

    #[test]
    fn expansion_preserves_likelihood() {
        let mut rng = StdRng::seed_from_u64(5);
        let d = make_random_dataset(50, 4, &mut rng);
        let forest = learned_forest(&d, 2);
        let pc = build_generative_forest(&forest, &d).unwrap();
        let mut expanded = pc.clone();
        expand_sum_split_nodes(&mut expanded).unwrap();

        assert!(!expanded.nodes().iter().any(|u| matches!(u, PcNode::SumSplit { .. })));
        assert!(is_smooth(&expanded));
        assert!(is_normalized(&expanded));

        let mut evaluator = CircuitEvaluator::new(&expanded);
        for x in d.rows() {
            let before = evi(&pc, x);
            let after = evaluator.evi(x);
            assert!((before - after).abs() <= 1e-9 * before.abs().max(1.0), "{before} {after}");
        }
    }
}
