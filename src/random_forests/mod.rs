pub mod algorithms;
pub mod io;
pub mod learning;
pub mod random_forest;
pub mod sampling;

pub use algorithms::{RandomForestPredictor, accuracy, accuracy_parallel, predict};
pub use io::{load_random_forest, parse_random_forest, parse_random_forest_or_tree, save_random_forest};
pub use learning::{ExecutionMode, RandomForestOptions, learn_random_forest};
pub use random_forest::RandomForest;
pub use sampling::{DatasetSampler, KFold, SampleTechnique, parse_sample_technique};
