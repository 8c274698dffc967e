use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::core::dataset::Dataset;
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
pub enum SampleTechnique {
    WithoutReplacement,
    WithReplacement,
    /// Draws from every class separately, with replacement.
    #[default]
    Stratified,
}

pub fn parse_sample_technique(text: &str) -> Result<SampleTechnique> {
    text.trim()
        .parse::<SampleTechnique>()
        .map_err(|_| Error::UnknownChoice {
            kind: "sample technique",
            value: text.to_string(),
        })
}

/// Draws the training samples of the trees of a forest.
#[derive(Debug, Clone)]
pub struct DatasetSampler<'a> {
    indices: &'a [u32],
    technique: SampleTechnique,
    classes: Vec<Vec<u32>>,
    rng: StdRng,
}

impl<'a> DatasetSampler<'a> {
    pub fn new(dataset: &Dataset, indices: &'a [u32], technique: SampleTechnique, seed: u64) -> Self {
        let mut classes = vec![Vec::new(); dataset.class_count()];
        if technique == SampleTechnique::Stratified {
            for &i in indices {
                classes[dataset.label(i as usize)].push(i);
            }
        }
        Self {
            indices,
            technique,
            classes,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn sample_size(&self, fraction: f64, n: usize) -> usize {
        (fraction * n as f64).round() as usize
    }

    pub fn sample(&mut self, fraction: f64) -> Vec<u32> {
        match self.technique {
            SampleTechnique::WithoutReplacement => self.sample_without_replacement(fraction),
            SampleTechnique::WithReplacement => self.sample_with_replacement(fraction),
            SampleTechnique::Stratified => self.sample_stratified(fraction),
        }
    }

    /// A uniformly chosen subset that keeps the order of the indices.
    fn sample_without_replacement(&mut self, fraction: f64) -> Vec<u32> {
        let n = self.sample_size(fraction, self.indices.len()).min(self.indices.len());
        let mut positions = index::sample(&mut self.rng, self.indices.len(), n).into_vec();
        positions.sort_unstable();
        positions.into_iter().map(|p| self.indices[p]).collect()
    }

    fn sample_with_replacement(&mut self, fraction: f64) -> Vec<u32> {
        let n = self.sample_size(fraction, self.indices.len());
        draw_with_replacement(self.indices, n, &mut self.rng)
    }

    fn sample_stratified(&mut self, fraction: f64) -> Vec<u32> {
        let total = self.sample_size(fraction, self.indices.len());
        let mut result = Vec::with_capacity(total);
        for class in &self.classes {
            let count = if total == self.indices.len() {
                class.len()
            } else {
                self.sample_size(fraction, class.len())
            };
            result.extend(draw_with_replacement(class, count, &mut self.rng));
        }
        result
    }
}

fn draw_with_replacement<R: Rng + ?Sized>(values: &[u32], n: usize, rng: &mut R) -> Vec<u32> {
    if values.is_empty() {
        return Vec::new();
    }
    (0..n).map(|_| values[rng.random_range(0..values.len())]).collect()
}

/// Shuffled k-fold partition of a set of indices.
#[derive(Debug, Clone)]
pub struct KFold {
    indices: Vec<u32>,
    k: usize,
    fold_size: usize,
}

impl KFold {
    pub fn new(mut indices: Vec<u32>, k: usize, seed: u64) -> Result<Self> {
        if k == 0 || k > indices.len() {
            return Err(Error::InvalidOption(format!(
                "cannot split {} samples into {k} folds",
                indices.len()
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
        let fold_size = indices.len() / k;
        Ok(Self {
            indices,
            k,
            fold_size,
        })
    }

    pub fn len(&self) -> usize {
        self.k
    }

    pub fn is_empty(&self) -> bool {
        self.k == 0
    }

    /// Returns `(test, training)` for fold `i`. The last fold takes the remainder.
    pub fn folds(&self, i: usize) -> (Vec<u32>, Vec<u32>) {
        let first = i * self.fold_size;
        let last = if i + 1 == self.k {
            self.indices.len()
        } else {
            (i + 1) * self.fold_size
        };
        let test = self.indices[first..last].to_vec();
        let training = self.indices[..first]
            .iter()
            .chain(&self.indices[last..])
            .copied()
            .collect();
        (test, training)
    }
}
