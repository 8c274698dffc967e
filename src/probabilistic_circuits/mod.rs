pub mod algorithms;
pub mod circuit;
pub mod evaluation;
pub mod generative_forest;
pub mod io;
pub mod nodes;
pub mod sampling;
pub mod validity;

pub use algorithms::{node_numbering, probabilistic_circuit_size, topological_ordering, visit_nodes_bfs};
pub use circuit::{CircuitBuilder, ProbabilisticCircuit};
pub use evaluation::{CircuitEvaluator, evi, log_evi};
pub use generative_forest::{
    build_generative_forest, build_generative_tree, enumerate_intervals, expand_sum_split_nodes,
    fit_categorical, fit_normal,
};
pub use io::{load_probabilistic_circuit, parse_probabilistic_circuit, save_probabilistic_circuit};
pub use nodes::{NodeId, PcNode, TerminalKind};
pub use sampling::{sample, sample_dataset};
pub use validity::{is_decomposable, is_normalized, is_smooth, is_valid};
