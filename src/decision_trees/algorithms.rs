use std::collections::VecDeque;

use rand::Rng;

use super::decision_tree::{DecisionTree, Vertex};
use super::impurity::{cross_entropy, gini_index, misclassification};
use crate::core::dataset::Dataset;

/// Calls `f(vertex, index, depth)` for every vertex, breadth first from the root.
pub fn visit_nodes_bfs<F>(tree: &DecisionTree, mut f: F)
where
    F: FnMut(&Vertex, u32, usize),
{
    let mut depth = 0;
    let mut todo: VecDeque<u32> = VecDeque::from([0]);
    let mut level = 1;

    while let Some(ui) = todo.pop_front() {
        level -= 1;
        let u = tree.vertex(ui);
        if let Some(left) = u.left {
            todo.push_back(left);
        }
        if let Some(right) = u.right {
            todo.push_back(right);
        }
        f(u, ui, depth);
        if level == 0 {
            depth += 1;
            level = todo.len();
        }
    }
}

pub fn leaf_count(tree: &DecisionTree) -> usize {
    let mut result = 0;
    visit_nodes_bfs(tree, |u, _, _| {
        if u.is_leaf() {
            result += 1;
        }
    });
    result
}

/// Vertex indices in breadth first order; parents precede their children.
pub fn topological_ordering(tree: &DecisionTree) -> Vec<u32> {
    let mut result = Vec::with_capacity(tree.len());
    visit_nodes_bfs(tree, |_, ui, _| result.push(ui));
    result
}

/// Depth of every vertex, indexed by vertex.
pub fn decision_tree_depth(tree: &DecisionTree) -> Vec<usize> {
    let mut result = vec![0; tree.len()];
    visit_nodes_bfs(tree, |_, ui, depth| result[ui as usize] = depth);
    result
}

/// Index of the leaf that `x` ends up in.
pub fn execute(tree: &DecisionTree, x: &[f64]) -> u32 {
    let mut index = 0;
    loop {
        let u = tree.vertex(index);
        match u.children() {
            Some((left, right)) => {
                index = if u.split.select(x) == 0 { left } else { right };
            }
            None => return index,
        }
    }
}

/// Most frequent class among the samples of `u`; ties are broken at random.
pub fn majority_class<R: Rng + ?Sized>(tree: &DecisionTree, u: &Vertex, rng: &mut R) -> u32 {
    let samples = tree.samples(u);
    if samples.len() == 1 {
        return tree.classes()[samples[0] as usize];
    }

    let counts = tree.class_counts(u);
    let max = counts.iter().copied().max().unwrap_or(0);
    let candidates: Vec<u32> = (0..counts.len() as u32)
        .filter(|&k| counts[k as usize] == max)
        .collect();
    match candidates.len() {
        0 => 0,
        1 => candidates[0],
        n => candidates[rng.random_range(0..n)],
    }
}

pub fn predict<R: Rng + ?Sized>(tree: &DecisionTree, x: &[f64], rng: &mut R) -> u32 {
    let leaf = execute(tree, x);
    majority_class(tree, tree.vertex(leaf), rng)
}

/// Predicts with the majority class of every vertex computed up front, so
/// repeated predictions agree with each other.
#[derive(Debug, Clone)]
pub struct DecisionTreePredictor<'a> {
    tree: &'a DecisionTree,
    values: Vec<u32>,
}

impl<'a> DecisionTreePredictor<'a> {
    pub fn new<R: Rng + ?Sized>(tree: &'a DecisionTree, rng: &mut R) -> Self {
        let mut values = vec![0; tree.len()];
        visit_nodes_bfs(tree, |u, ui, _| {
            values[ui as usize] = majority_class(tree, u, rng);
        });
        Self { tree, values }
    }

    pub fn predict(&self, x: &[f64]) -> u32 {
        self.values[execute(self.tree, x) as usize]
    }
}

/// Fraction of the rows `indices` of `dataset` that the tree classifies correctly.
pub fn accuracy<R: Rng + ?Sized>(
    tree: &DecisionTree,
    indices: &[u32],
    dataset: &Dataset,
    rng: &mut R,
) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    let predictor = DecisionTreePredictor::new(tree, rng);
    let correct = indices
        .iter()
        .filter(|&&i| predictor.predict(dataset.row(i as usize)) as usize == dataset.label(i as usize))
        .count();
    correct as f64 / indices.len() as f64
}

/// One line per vertex, breadth first, with its depth, range, split and impurities.
pub fn vertex_report(tree: &DecisionTree) -> Vec<String> {
    let mut lines = Vec::with_capacity(tree.len());
    visit_nodes_bfs(tree, |u, ui, depth| {
        let counts = tree.class_counts(u);
        lines.push(format!(
            "node {ui}: depth = {depth} {u} split = {} cross_entropy = {:.6} gini_index = {:.6} mis_classification = {:.6}",
            u.split,
            cross_entropy(&counts),
            gini_index(&counts),
            misclassification(&counts),
        ));
    });
    lines
}
