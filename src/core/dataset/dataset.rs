use crate::core::error::{Error, Result};
use crate::core::missing::is_missing;
use crate::utils::memory::{MemoryMeter, MemorySized, flat_vec_size};

/// Row-major table of `f64` values. `category_counts[j]` is the arity of
/// column `j` (`0` for continuous, `k >= 2` for `k` categories). The last
/// column holds the class label.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    values: Vec<f64>,
    category_counts: Vec<u32>,
    features: Option<Vec<String>>,
}

impl Dataset {
    pub fn new(category_counts: Vec<u32>) -> Self {
        Self {
            values: Vec::new(),
            category_counts,
            features: None,
        }
    }

    pub fn from_rows(rows: Vec<Vec<f64>>, category_counts: Vec<u32>) -> Result<Self> {
        let mut dataset = Dataset::new(category_counts);
        dataset.values.reserve(rows.len() * dataset.column_count());
        for row in &rows {
            dataset.push_row(row)?;
        }
        Ok(dataset)
    }

    /// `values` must hold a whole number of rows of width `category_counts.len()`.
    pub(crate) fn from_raw_parts(values: Vec<f64>, category_counts: Vec<u32>) -> Self {
        debug_assert!(category_counts.is_empty() || values.len() % category_counts.len() == 0);
        Self {
            values,
            category_counts,
            features: None,
        }
    }

    pub fn push_row(&mut self, row: &[f64]) -> Result<()> {
        if row.len() != self.column_count() {
            return Err(Error::DimensionMismatch {
                expected: self.column_count(),
                found: row.len(),
            });
        }
        for (variable, &x) in row.iter().enumerate() {
            self.check_value(variable, x)?;
        }
        self.values.extend_from_slice(row);
        Ok(())
    }

    /// A categorical value must be a whole number below the arity of its
    /// column, or missing. A categorical label must be present.
    fn check_value(&self, variable: usize, x: f64) -> Result<()> {
        let k = self.category_counts[variable];
        if k < 2 {
            return Ok(());
        }
        if is_missing(x) {
            if variable + 1 == self.column_count() {
                return Err(Error::InvalidCategory { variable, value: x });
            }
            return Ok(());
        }
        if x < 0.0 || x >= k as f64 || x.fract() != 0.0 {
            return Err(Error::InvalidCategory { variable, value: x });
        }
        Ok(())
    }

    pub fn set_feature_names(&mut self, names: Vec<String>) -> Result<()> {
        if names.len() != self.column_count() {
            return Err(Error::DimensionMismatch {
                expected: self.column_count(),
                found: names.len(),
            });
        }
        self.features = Some(names);
        Ok(())
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.features.as_deref()
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.category_counts.len()
    }

    /// Number of explanatory columns, i.e. all columns except the label.
    #[inline]
    pub fn feature_count(&self) -> usize {
        self.column_count().saturating_sub(1)
    }

    #[inline]
    pub fn class_count(&self) -> usize {
        self.category_counts.last().copied().unwrap_or(0) as usize
    }

    #[inline]
    pub fn len(&self) -> usize {
        if self.column_count() == 0 {
            0
        } else {
            self.values.len() / self.column_count()
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn category_counts(&self) -> &[u32] {
        &self.category_counts
    }

    #[inline]
    pub fn category_count(&self, variable: usize) -> u32 {
        self.category_counts[variable]
    }

    pub fn is_categorical(&self, variable: usize) -> bool {
        self.category_counts[variable] >= 2
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        let m = self.column_count();
        &self.values[i * m..(i + 1) * m]
    }

    #[inline]
    pub fn value(&self, i: usize, variable: usize) -> f64 {
        self.values[i * self.column_count() + variable]
    }

    #[inline]
    pub fn label(&self, i: usize) -> usize {
        self.value(i, self.feature_count()) as usize
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.column_count().max(1))
    }

    pub fn all_indices(&self) -> Vec<u32> {
        (0..self.len() as u32).collect()
    }

    /// Labels of every row, in row order.
    pub fn classes(&self) -> Vec<u32> {
        (0..self.len()).map(|i| self.label(i) as u32).collect()
    }

    pub fn class_counts(&self, indices: &[u32]) -> Vec<u32> {
        let mut counts = vec![0; self.class_count()];
        self.fill_class_counts(indices, &mut counts);
        counts
    }

    pub fn fill_class_counts(&self, indices: &[u32], counts: &mut [u32]) {
        counts.fill(0);
        for &i in indices {
            counts[self.label(i as usize)] += 1;
        }
    }

    /// Per-category counts of `variable` over `indices`, skipping missing values.
    pub fn categorical_counts(&self, indices: &[u32], variable: usize) -> Vec<u32> {
        let mut counts = vec![0; self.category_count(variable) as usize];
        for &i in indices {
            let x = self.value(i as usize, variable);
            if !is_missing(x) {
                counts[x as usize] += 1;
            }
        }
        counts
    }

    pub fn has_missing_values(&self) -> bool {
        self.values.iter().any(|&x| is_missing(x))
    }

    pub fn missing_value_count(&self, variable: usize) -> usize {
        (0..self.len())
            .filter(|&i| is_missing(self.value(i, variable)))
            .count()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

impl MemorySized for Dataset {
    fn extra_heap_size(&self, meter: &mut MemoryMeter) -> usize {
        flat_vec_size(&self.values)
            + flat_vec_size(&self.category_counts)
            + meter.measure_field(&self.features)
    }
}
