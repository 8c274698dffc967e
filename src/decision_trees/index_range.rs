use std::fmt;

use rand::Rng;

use super::split_criterion::SplitCriterion;
use crate::core::dataset::Dataset;
use crate::core::error::{Error, Result};
use crate::core::missing::is_missing;

/// Half-open view `[begin, end)` into the index array owned by a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexRange {
    pub begin: usize,
    pub end: usize,
}

impl IndexRange {
    pub fn new(begin: usize, end: usize) -> Self {
        debug_assert!(begin <= end);
        Self { begin, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Splits into `[begin, begin + mid)` and `[begin + mid, end)`.
    pub fn split_at(&self, mid: usize) -> (IndexRange, IndexRange) {
        let pivot = self.begin + mid;
        (
            IndexRange::new(self.begin, pivot),
            IndexRange::new(pivot, self.end),
        )
    }

    #[inline]
    pub fn of<'a>(&self, indices: &'a [u32]) -> &'a [u32] {
        &indices[self.begin..self.end]
    }

    #[inline]
    pub fn of_mut<'a>(&self, indices: &'a mut [u32]) -> &'a mut [u32] {
        &mut indices[self.begin..self.end]
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}

/// Reorders `indices` in a single pass so that samples with `select == 0`
/// come first, and returns the size of that prefix. With `support_missing`, a
/// sample that is missing the split variable goes left on a fair coin flip.
/// Left samples keep their relative order.
pub fn partition_indices<R: Rng + ?Sized>(
    split: &SplitCriterion,
    dataset: &Dataset,
    indices: &mut [u32],
    rng: &mut R,
    support_missing: bool,
) -> Result<usize> {
    let variable = split.variable().ok_or(Error::UndefinedSplit)?;

    let mut pivot = 0;
    for i in 0..indices.len() {
        let row = dataset.row(indices[i] as usize);
        let left = split.select(row) == 0
            || (support_missing && is_missing(row[variable]) && rng.random_bool(0.5));
        if left {
            indices.swap(pivot, i);
            pivot += 1;
        }
    }
    Ok(pivot)
}

/// Partitions the samples of `range` in place and returns the two sub-ranges.
pub fn apply_split<R: Rng + ?Sized>(
    split: &SplitCriterion,
    dataset: &Dataset,
    indices: &mut [u32],
    range: IndexRange,
    rng: &mut R,
    support_missing: bool,
) -> Result<(IndexRange, IndexRange)> {
    let pivot = partition_indices(split, dataset, range.of_mut(indices), rng, support_missing)?;
    Ok(range.split_at(pivot))
}
