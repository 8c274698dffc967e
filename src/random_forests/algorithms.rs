use rand::Rng;
use rayon::prelude::*;

use super::random_forest::RandomForest;
use crate::core::dataset::Dataset;
use crate::decision_trees::{DecisionTreePredictor, predict as predict_tree};

/// Index of the largest count; the lowest index wins a tie.
fn vote(counts: &[u32]) -> u32 {
    let mut best = 0;
    for (k, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = k;
        }
    }
    best as u32
}

/// Majority vote over the predictions of the trees.
pub fn predict<R: Rng + ?Sized>(forest: &RandomForest, x: &[f64], rng: &mut R) -> u32 {
    let mut counts = vec![0; forest.class_count()];
    for tree in forest.trees() {
        counts[predict_tree(tree, x, rng) as usize] += 1;
    }
    vote(&counts)
}

#[derive(Debug, Clone)]
pub struct RandomForestPredictor<'a> {
    predictors: Vec<DecisionTreePredictor<'a>>,
    class_count: usize,
}

impl<'a> RandomForestPredictor<'a> {
    pub fn new<R: Rng + ?Sized>(forest: &'a RandomForest, rng: &mut R) -> Self {
        let predictors = forest
            .trees()
            .iter()
            .map(|tree| DecisionTreePredictor::new(tree, rng))
            .collect();
        Self {
            predictors,
            class_count: forest.class_count(),
        }
    }

    pub fn predict(&self, x: &[f64]) -> u32 {
        let mut counts = vec![0; self.class_count];
        for predictor in &self.predictors {
            counts[predictor.predict(x) as usize] += 1;
        }
        vote(&counts)
    }

    fn is_correct(&self, dataset: &Dataset, i: u32) -> bool {
        self.predict(dataset.row(i as usize)) as usize == dataset.label(i as usize)
    }
}

pub fn accuracy<R: Rng + ?Sized>(
    forest: &RandomForest,
    indices: &[u32],
    dataset: &Dataset,
    rng: &mut R,
) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    let predictor = RandomForestPredictor::new(forest, rng);
    let correct = indices
        .iter()
        .filter(|&&i| predictor.is_correct(dataset, i))
        .count();
    correct as f64 / indices.len() as f64
}

/// Same as [`accuracy`], with the rows evaluated on the rayon thread pool.
pub fn accuracy_parallel<R: Rng + ?Sized>(
    forest: &RandomForest,
    indices: &[u32],
    dataset: &Dataset,
    rng: &mut R,
) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    let predictor = RandomForestPredictor::new(forest, rng);
    let correct: usize = indices
        .par_iter()
        .map(|&i| predictor.is_correct(dataset, i) as usize)
        .sum();
    correct as f64 / indices.len() as f64
}
