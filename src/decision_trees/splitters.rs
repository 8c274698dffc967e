use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::trace;

use super::options::DecisionTreeOptions;
use super::split_criterion::{MAX_SUBSET_SIZE, SplitCriterion};
use crate::core::dataset::Dataset;
use crate::core::error::{Error, Result};
use crate::core::missing::is_missing;

/// Class-count buffers shared by the enumerators of one tree.
///
/// The enumerators hand `left` and `right` to the report callback and put them
/// back into a consistent state before moving on to the next candidate.
#[derive(Debug, Clone, Default)]
pub struct SplitScratch {
    left: Vec<u32>,
    right: Vec<u32>,
    parent: Vec<u32>,
    table: Vec<u32>,
}

impl SplitScratch {
    pub fn new(class_count: usize) -> Self {
        Self {
            left: vec![0; class_count],
            right: vec![0; class_count],
            parent: vec![0; class_count],
            table: Vec::new(),
        }
    }

    fn ensure(&mut self, class_count: usize) {
        if self.left.len() != class_count {
            *self = SplitScratch::new(class_count);
        }
    }
}

/// Moves the samples with a missing value for `variable` to the back and
/// returns the number of samples that have a value.
fn move_missing_to_back(dataset: &Dataset, indices: &mut [u32], variable: usize) -> usize {
    let mut pivot = 0;
    for i in 0..indices.len() {
        if !is_missing(dataset.value(indices[i] as usize, variable)) {
            indices.swap(pivot, i);
            pivot += 1;
        }
    }
    pivot
}

fn sort_by_value(dataset: &Dataset, indices: &mut [u32], variable: usize) {
    indices.sort_by(|&a, &b| {
        dataset
            .value(a as usize, variable)
            .total_cmp(&dataset.value(b as usize, variable))
    });
}

/// Reports every `ThresholdSplit(v, value)` of the samples in `indices`, where
/// `value` ranges over the distinct values of `v` that leave at least
/// `min_samples_leaf` samples on both sides.
///
/// Samples without a value for `v` are moved to the back. With missing value
/// support they take no part in the counts; without it they are counted on the
/// right side, which is where `select` sends them.
pub fn enumerate_threshold_splits<F>(
    dataset: &Dataset,
    indices: &mut [u32],
    v: usize,
    options: &DecisionTreeOptions,
    scratch: &mut SplitScratch,
    mut report: F,
) where
    F: FnMut(&SplitCriterion, &[u32], &[u32]),
{
    trace!(variable = v, size = indices.len(), "enumerate threshold splits");
    scratch.ensure(dataset.class_count());

    let present = move_missing_to_back(dataset, indices, v);
    sort_by_value(dataset, &mut indices[..present], v);

    let msl = options.min_samples_leaf.max(1);
    let end = if options.support_missing_values {
        present
    } else {
        indices.len()
    };
    if end < msl {
        return;
    }
    let first = msl;
    let last = (end + 1 - msl).min(present);
    if last <= first {
        return;
    }

    let SplitScratch { left, right, .. } = scratch;
    dataset.fill_class_counts(&indices[..first], left);
    dataset.fill_class_counts(&indices[first..end], right);

    let x = |i: usize| dataset.value(indices[i] as usize, v);
    let y = |i: usize| dataset.label(indices[i] as usize);

    let mut same_y = false;
    for i in first..last {
        let value = x(i);

        if i != first {
            let k = y(i - 1);
            left[k] += 1;
            right[k] -= 1;
        }

        // no split between equal values
        if x(i - 1) == value {
            if y(i - 1) != y(i) {
                same_y = false;
            }
            continue;
        }

        if options.optimization {
            let next_same_y = i + 1 != last && y(i) == y(i + 1) && value != x(i + 1);
            if same_y && next_same_y {
                trace!(variable = v, value, "skipping threshold between equal labels");
                continue;
            }
            same_y = next_same_y;
        }

        report(&SplitCriterion::Threshold { variable: v, value }, left, right);
    }
}

/// Reports `SingleSplit(v, value)` for every category `value` of `v` that is
/// present in `indices`, subject to the leaf size constraint.
///
/// Missing values are treated as in [`enumerate_threshold_splits`].
pub fn enumerate_single_splits<F>(
    dataset: &Dataset,
    indices: &mut [u32],
    v: usize,
    options: &DecisionTreeOptions,
    scratch: &mut SplitScratch,
    mut report: F,
) where
    F: FnMut(&SplitCriterion, &[u32], &[u32]),
{
    trace!(variable = v, size = indices.len(), "enumerate single splits");
    scratch.ensure(dataset.class_count());

    let present = move_missing_to_back(dataset, indices, v);
    sort_by_value(dataset, &mut indices[..present], v);

    let total = if options.support_missing_values {
        present
    } else {
        indices.len()
    };
    let SplitScratch { left, right, .. } = scratch;
    left.fill(0);
    dataset.fill_class_counts(&indices[..total], right);
    let msl = options.min_samples_leaf;

    let x = |i: usize| dataset.value(indices[i] as usize, v);

    let mut first = 0;
    while first < present {
        let value = x(first);
        let mut last = first + 1;
        while last < present && x(last) == value {
            last += 1;
        }

        let count = last - first;
        if count >= msl && total - count >= msl {
            let group = &indices[first..last];
            for &i in group {
                let k = dataset.label(i as usize);
                left[k] += 1;
                right[k] -= 1;
            }

            report(
                &SplitCriterion::Single {
                    variable: v,
                    value: value as u32,
                },
                left,
                right,
            );

            for &i in group {
                let k = dataset.label(i as usize);
                left[k] -= 1;
                right[k] += 1;
            }
        }

        first = last;
    }
}

/// Reports the subset splits of the categories of `v` that occur in `indices`.
///
/// The first category present is always on the left side, so a bipartition and
/// its complement are reported once. Counts are assembled from a category by
/// class table built in a single pass. Missing values are treated as in
/// [`enumerate_threshold_splits`].
pub fn enumerate_subset_splits<F>(
    dataset: &Dataset,
    indices: &mut [u32],
    v: usize,
    options: &DecisionTreeOptions,
    scratch: &mut SplitScratch,
    mut report: F,
) -> Result<()>
where
    F: FnMut(&SplitCriterion, &[u32], &[u32]),
{
    trace!(variable = v, size = indices.len(), "enumerate subset splits");
    let ncat = dataset.category_count(v);
    if ncat > MAX_SUBSET_SIZE {
        return Err(Error::TooManyCategories {
            variable: v,
            count: ncat,
            max: MAX_SUBSET_SIZE,
        });
    }

    let k_count = dataset.class_count();
    scratch.ensure(k_count);

    let present = move_missing_to_back(dataset, indices, v);
    if present == 0 {
        return Ok(());
    }

    let SplitScratch {
        left,
        right,
        parent,
        table,
    } = scratch;

    table.clear();
    table.resize(ncat as usize * k_count, 0);
    for &i in &indices[..present] {
        let x = dataset.value(i as usize, v);
        if x < 0.0 || x >= ncat as f64 || x.fract() != 0.0 {
            return Err(Error::InvalidCategory { variable: v, value: x });
        }
        table[x as usize * k_count + dataset.label(i as usize)] += 1;
    }
    let end = if options.support_missing_values {
        present
    } else {
        indices.len()
    };
    dataset.fill_class_counts(&indices[..end], parent);

    let pos: Vec<usize> = (0..ncat as usize)
        .filter(|&j| table[j * k_count..(j + 1) * k_count].iter().any(|&c| c > 0))
        .collect();
    trace!(variable = v, ?pos, "categories present");

    let add = |counts: &mut [u32], j: usize| {
        for (c, w) in counts.iter_mut().zip(&table[j * k_count..(j + 1) * k_count]) {
            *c += w;
        }
    };

    let p = pos.len() - 1;
    let n: u64 = (1u64 << p) - 1;
    let msl = options.min_samples_leaf;

    for i in 0..n {
        left.fill(0);
        add(left, pos[0]);
        let mut mask: u32 = 1 << pos[0];

        for (j, &category) in pos[1..].iter().enumerate() {
            if (i >> j) & 1 == 1 {
                mask |= 1 << category;
                add(left, category);
            }
        }

        for ((r, &d), &l) in right.iter_mut().zip(parent.iter()).zip(left.iter()) {
            *r = d - l;
        }

        let left_size: u32 = left.iter().sum();
        let right_size: u32 = right.iter().sum();
        if left_size as usize >= msl && right_size as usize >= msl {
            report(&SplitCriterion::Subset { variable: v, mask }, left, right);
        }
    }

    Ok(())
}

/// Policy that picks the enumerator for each candidate variable.
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
pub enum SplitFamily {
    /// Threshold splits for every variable.
    #[default]
    Threshold,
    /// Single splits for small categorical variables, threshold splits otherwise.
    ThresholdSingle,
    /// Subset splits for small categorical variables, threshold splits otherwise.
    ThresholdSubset,
}

pub fn parse_split_family(text: &str) -> Result<SplitFamily> {
    text.trim()
        .parse::<SplitFamily>()
        .map_err(|_| Error::UnknownChoice {
            kind: "split family",
            value: text.to_string(),
        })
}

impl SplitFamily {
    /// Enumerates the candidate splits of `indices` over `variables`.
    pub fn enumerate<F>(
        &self,
        dataset: &Dataset,
        indices: &mut [u32],
        variables: &[usize],
        options: &DecisionTreeOptions,
        scratch: &mut SplitScratch,
        mut report: F,
    ) -> Result<()>
    where
        F: FnMut(&SplitCriterion, &[u32], &[u32]),
    {
        for &v in variables {
            let ncat = dataset.category_count(v) as usize;
            let small_categorical = 2 <= ncat && ncat <= options.max_categorical_size;
            match self {
                SplitFamily::ThresholdSingle if small_categorical => {
                    enumerate_single_splits(dataset, indices, v, options, scratch, &mut report)
                }
                SplitFamily::ThresholdSubset if small_categorical => {
                    enumerate_subset_splits(dataset, indices, v, options, scratch, &mut report)?
                }
                _ => enumerate_threshold_splits(dataset, indices, v, options, scratch, &mut report),
            }
        }
        Ok(())
    }
}
