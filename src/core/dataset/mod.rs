mod dataset;
pub mod io;
pub mod random;
pub mod statistics;

pub use dataset::Dataset;
pub use io::{load_dataset, parse_dataset, save_dataset};
pub use random::{make_dataset_from_distributions, make_random_dataset};
pub use statistics::{category_fractions, mean_standard_deviation};
