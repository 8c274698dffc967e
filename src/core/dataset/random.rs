use rand::Rng;

use super::Dataset;
use crate::core::distributions::Distribution;

/// Dataset with `n` rows and `m` features. Each feature is either categorical
/// with 2 to 10 categories or uniformly continuous; the label has 2 or 3 classes.
pub fn make_random_dataset<R: Rng + ?Sized>(n: usize, m: usize, rng: &mut R) -> Dataset {
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(m + 1);
    let mut category_counts = Vec::with_capacity(m + 1);

    for _ in 0..m {
        if rng.random_bool(0.5) {
            let k: u32 = rng.random_range(2..=10);
            category_counts.push(k);
            columns.push((0..n).map(|_| rng.random_range(0..k) as f64).collect());
        } else {
            let low = rng.random_range(10.0..100.0);
            let high = rng.random_range(110.0..200.0);
            category_counts.push(0);
            columns.push((0..n).map(|_| rng.random_range(low..high)).collect());
        }
    }

    let k: u32 = rng.random_range(2..=3);
    category_counts.push(k);
    columns.push((0..n).map(|_| rng.random_range(0..k) as f64).collect());

    from_columns(&columns, category_counts)
}

/// Dataset whose column `j` is drawn from `distributions[j]`.
pub fn make_dataset_from_distributions<R: Rng + ?Sized>(
    distributions: &[Distribution],
    n: usize,
    rng: &mut R,
) -> Dataset {
    let category_counts = distributions.iter().map(Distribution::category_count).collect();
    let columns: Vec<Vec<f64>> = distributions
        .iter()
        .map(|d| (0..n).map(|_| d.sample(rng)).collect())
        .collect();
    from_columns(&columns, category_counts)
}

fn from_columns(columns: &[Vec<f64>], category_counts: Vec<u32>) -> Dataset {
    let n = columns.first().map_or(0, Vec::len);
    let mut values = Vec::with_capacity(n * columns.len());
    for i in 0..n {
        values.extend(columns.iter().map(|column| column[i]));
    }
    Dataset::from_raw_parts(values, category_counts)
}
