use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::impurity::ImpurityMeasure;
use crate::core::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DecisionTreeOptions {
    #[schemars(title = "Impurity Measure")]
    pub impurity_measure: ImpurityMeasure,

    #[schemars(
        title = "Min Samples Leaf",
        description = "Minimum number of samples on each side of a split",
        range(min = 1)
    )]
    pub min_samples_leaf: usize,

    #[schemars(
        title = "Max Features",
        description = "Number of variables sampled at every node",
        range(min = 1)
    )]
    pub max_features: usize,

    #[schemars(title = "Max Depth")]
    pub max_depth: usize,

    #[schemars(
        title = "Max Categorical Size",
        description = "Categorical variables with more categories use threshold splits"
    )]
    pub max_categorical_size: usize,

    #[schemars(title = "Support Missing Values")]
    pub support_missing_values: bool,

    #[schemars(
        title = "Optimization",
        description = "Skip threshold candidates between two runs of the same class"
    )]
    pub optimization: bool,
}

impl Default for DecisionTreeOptions {
    fn default() -> Self {
        Self {
            impurity_measure: ImpurityMeasure::Gini,
            min_samples_leaf: 1,
            max_features: 1_000_000,
            max_depth: 1_000_000,
            max_categorical_size: 10,
            support_missing_values: false,
            optimization: false,
        }
    }
}

impl DecisionTreeOptions {
    pub fn validate(&self) -> Result<()> {
        if self.min_samples_leaf == 0 {
            return Err(Error::InvalidOption("min_samples_leaf must be at least 1".into()));
        }
        if self.max_features == 0 {
            return Err(Error::InvalidOption("max_features must be at least 1".into()));
        }
        Ok(())
    }
}

impl fmt::Display for DecisionTreeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "impurity_measure = {}", self.impurity_measure)?;
        writeln!(f, "min_samples_leaf = {}", self.min_samples_leaf)?;
        writeln!(f, "max_features = {}", self.max_features)?;
        writeln!(f, "max_depth = {}", self.max_depth)?;
        writeln!(f, "max_categorical_size = {}", self.max_categorical_size)?;
        writeln!(f, "support_missing_values = {}", self.support_missing_values)?;
        write!(f, "optimization = {}", self.optimization)
    }
}
