pub mod algorithms;
pub mod decision_tree;
pub mod impurity;
pub mod index_range;
pub mod io;
pub mod learning;
pub mod options;
pub mod split_criterion;
pub mod splitters;

pub use algorithms::{
    DecisionTreePredictor, accuracy, decision_tree_depth, execute, leaf_count, majority_class,
    predict, topological_ordering, vertex_report, visit_nodes_bfs,
};
pub use decision_tree::{DecisionTree, Vertex};
pub use impurity::{GainFunction, ImpurityMeasure, parse_impurity_measure};
pub use index_range::{IndexRange, apply_split, partition_indices};
pub use io::{load_decision_tree, parse_decision_tree, save_decision_tree};
pub use learning::{learn_decision_tree, node_is_finished};
pub use options::DecisionTreeOptions;
pub use split_criterion::SplitCriterion;
pub use splitters::{SplitFamily, SplitScratch, parse_split_family};
