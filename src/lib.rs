pub mod core;
pub mod decision_trees;
pub mod probabilistic_circuits;
pub mod random_forests;
pub mod ui;
pub mod utils;
