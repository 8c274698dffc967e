use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::{debug, info};

use super::random_forest::RandomForest;
use super::sampling::{DatasetSampler, SampleTechnique};
use crate::core::dataset::Dataset;
use crate::core::error::{Error, Result};
use crate::decision_trees::{
    DecisionTree, DecisionTreeOptions, GainFunction, SplitFamily, learn_decision_tree,
};
use crate::decision_trees::learning::check_class_column;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RandomForestOptions {
    #[schemars(title = "Forest Size", range(min = 1))]
    pub forest_size: usize,

    #[schemars(
        title = "Sample Fraction",
        description = "Fraction of the samples drawn for every tree",
        range(min = 0.0, max = 1.0)
    )]
    pub sample_fraction: f64,

    #[schemars(title = "Sample Technique")]
    pub sample_technique: SampleTechnique,
}

impl Default for RandomForestOptions {
    fn default() -> Self {
        Self {
            forest_size: 100,
            sample_fraction: 1.0,
            sample_technique: SampleTechnique::Stratified,
        }
    }
}

impl RandomForestOptions {
    pub fn validate(&self) -> Result<()> {
        if self.forest_size == 0 {
            return Err(Error::InvalidOption("forest_size must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.sample_fraction) {
            return Err(Error::InvalidOption(format!(
                "sample_fraction must lie in [0, 1], got {}",
                self.sample_fraction
            )));
        }
        Ok(())
    }
}

impl fmt::Display for RandomForestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "forest_size = {}", self.forest_size)?;
        writeln!(f, "sample_fraction = {}", self.sample_fraction)?;
        write!(f, "sample_technique = {}", self.sample_technique)
    }
}

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
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

/// Learns `forest_options.forest_size` trees, each from its own sample of
/// `indices`.
///
/// All samples and tree seeds are drawn up front from one generator seeded with
/// `seed`, so both execution modes produce the same forest.
#[allow(clippy::too_many_arguments)]
pub fn learn_random_forest(
    dataset: &Dataset,
    indices: &[u32],
    forest_options: &RandomForestOptions,
    tree_options: &DecisionTreeOptions,
    family: SplitFamily,
    gain: GainFunction,
    seed: u64,
    mode: ExecutionMode,
) -> Result<RandomForest> {
    forest_options.validate()?;
    tree_options.validate()?;
    check_class_column(dataset)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut sampler = DatasetSampler::new(dataset, indices, forest_options.sample_technique, rng.random());
    let jobs: Vec<(Vec<u32>, u64)> = (0..forest_options.forest_size)
        .map(|_| (sampler.sample(forest_options.sample_fraction), rng.random()))
        .collect();
    debug!(trees = jobs.len(), %mode, "drew forest samples");

    let learn = |(sample, tree_seed): (Vec<u32>, u64)| -> Result<DecisionTree> {
        learn_decision_tree(dataset, sample, tree_options, family, gain, tree_seed)
    };
    let trees = match mode {
        ExecutionMode::Sequential => jobs.into_iter().map(learn).collect::<Result<Vec<_>>>()?,
        ExecutionMode::Parallel => jobs.into_par_iter().map(learn).collect::<Result<Vec<_>>>()?,
    };

    info!(trees = trees.len(), "learned random forest");
    Ok(RandomForest::new(trees))
}
