use std::collections::VecDeque;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;
use tracing::{debug, info};

use super::decision_tree::{DecisionTree, Vertex};
use super::impurity::{GainFunction, misclassification};
use super::index_range::apply_split;
use super::options::DecisionTreeOptions;
use super::split_criterion::SplitCriterion;
use super::splitters::{SplitFamily, SplitScratch};
use crate::core::dataset::Dataset;
use crate::core::error::{Error, Result};

/// A vertex whose misclassification rate is at most this value is not split.
pub const PURITY_THRESHOLD: f64 = 0.01;

/// Stop criterion of the induction loop.
pub fn node_is_finished(
    size: usize,
    class_counts: &[u32],
    depth: usize,
    options: &DecisionTreeOptions,
) -> bool {
    size <= options.min_samples_leaf
        || misclassification(class_counts) <= PURITY_THRESHOLD
        || depth >= options.max_depth
}

pub(crate) fn check_class_column(dataset: &Dataset) -> Result<()> {
    if dataset.class_count() < 2 {
        return Err(Error::InvalidOption(format!(
            "the class column must be categorical, its arity is {}",
            dataset.class_count()
        )));
    }
    Ok(())
}

/// Draws `amount` distinct variables out of `0..m`, in increasing order.
pub fn sample_variables<R: Rng + ?Sized>(m: usize, amount: usize, rng: &mut R) -> Vec<usize> {
    let mut variables = index::sample(rng, m, amount.min(m)).into_vec();
    variables.sort_unstable();
    variables
}

/// Grows a decision tree over the samples `indices` of `dataset`.
///
/// Vertices are expanded breadth first, so the vertex list of the result is
/// in topological order. The same seed gives the same tree.
pub fn learn_decision_tree(
    dataset: &Dataset,
    indices: Vec<u32>,
    options: &DecisionTreeOptions,
    family: SplitFamily,
    gain: GainFunction,
    seed: u64,
) -> Result<DecisionTree> {
    options.validate()?;
    check_class_column(dataset)?;

    let mut tree = DecisionTree::new(dataset, indices);
    let m = dataset.feature_count();
    let max_features = options.max_features.min(m);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut scratch = SplitScratch::new(dataset.class_count());
    let mut counts = vec![0; dataset.class_count()];

    let mut todo: VecDeque<u32> = VecDeque::from([0]);
    let mut depth = 0;
    let mut level_count = 1;

    while let Some(ui) = todo.pop_front() {
        level_count -= 1;
        let range = tree.vertex(ui).range;
        dataset.fill_class_counts(range.of(tree.indices()), &mut counts);
        debug!(vertex = ui, depth, "visit {}", tree.vertex(ui));

        if !node_is_finished(range.len(), &counts, depth, options) {
            let variables = sample_variables(m, max_features, &mut rng);

            let mut best_score = f64::MIN;
            let mut best_split = SplitCriterion::None;
            family.enumerate(
                dataset,
                range.of_mut(tree.indices_mut()),
                &variables,
                options,
                &mut scratch,
                |split, left, right| {
                    let score = gain.score(left, right);
                    if score > best_score {
                        best_score = score;
                        best_split = *split;
                    }
                },
            )?;
            debug!(vertex = ui, best_score, "best split {best_split}");

            if best_split.is_defined() {
                let (r1, r2) = apply_split(
                    &best_split,
                    dataset,
                    tree.indices_mut(),
                    range,
                    &mut rng,
                    options.support_missing_values,
                )?;
                let left = tree.add_vertex(Vertex::new(r1));
                let right = tree.add_vertex(Vertex::new(r2));
                let u = tree.vertex_mut(ui);
                u.split = best_split;
                u.left = Some(left);
                u.right = Some(right);
                if depth < options.max_depth {
                    todo.push_back(left);
                    todo.push_back(right);
                }
            }
        }

        if level_count == 0 {
            depth += 1;
            level_count = todo.len();
            debug!(depth, vertices = level_count, "next level");
        }
    }

    info!(vertices = tree.len(), size = tree.indices().len(), "learned decision tree");
    Ok(tree)
}
