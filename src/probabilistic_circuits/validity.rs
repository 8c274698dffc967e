use std::collections::BTreeSet;

use tracing::debug;

use super::algorithms::topological_ordering;
use super::circuit::ProbabilisticCircuit;
use super::nodes::PcNode;

pub const NORMALIZATION_TOLERANCE: f64 = 1e-10;

/// Every child handle refers to a node of the arena.
pub fn is_valid(pc: &ProbabilisticCircuit) -> bool {
    pc.root().index() < pc.len()
        && pc
            .nodes()
            .iter()
            .flat_map(|node| node.children())
            .all(|child| child.index() < pc.len())
}

/// The variables each reachable node depends on, indexed by arena position.
/// Unreachable nodes get an empty scope.
fn scopes(pc: &ProbabilisticCircuit) -> Vec<BTreeSet<usize>> {
    let mut result = vec![BTreeSet::new(); pc.len()];
    for id in topological_ordering(pc) {
        let scope = match pc.node(id) {
            PcNode::Terminal { scope, .. } => BTreeSet::from([*scope]),
            node => node
                .children()
                .iter()
                .flat_map(|c| result[c.index()].iter().copied())
                .collect(),
        };
        result[id.index()] = scope;
    }
    result
}

/// The children of every sum and sum-split node have the same scope.
pub fn is_smooth(pc: &ProbabilisticCircuit) -> bool {
    let scopes = scopes(pc);
    let mut result = true;
    for id in topological_ordering(pc) {
        if let PcNode::Sum { children, .. } | PcNode::SumSplit { children, .. } = pc.node(id) {
            let first = &scopes[children[0].index()];
            if children.iter().any(|c| scopes[c.index()] != *first) {
                debug!(node = %id, "children of a sum have different scopes");
                result = false;
            }
        }
    }
    result
}

/// The children of every product node have pairwise disjoint scopes.
pub fn is_decomposable(pc: &ProbabilisticCircuit) -> bool {
    let scopes = scopes(pc);
    let mut result = true;
    for id in topological_ordering(pc) {
        if let PcNode::Product { children } = pc.node(id) {
            let mut seen = BTreeSet::new();
            let disjoint = children
                .iter()
                .flat_map(|c| scopes[c.index()].iter())
                .all(|v| seen.insert(*v));
            if !disjoint {
                debug!(node = %id, "children of a product share a variable");
                result = false;
            }
        }
    }
    result
}

/// The weights of every sum and sum-split node add up to 1.
pub fn is_normalized(pc: &ProbabilisticCircuit) -> bool {
    let mut result = true;
    for id in topological_ordering(pc) {
        if let Some(weights) = pc.node(id).weights() {
            let total: f64 = weights.iter().sum();
            if (total - 1.0).abs() > NORMALIZATION_TOLERANCE {
                debug!(node = %id, total, "weights do not add up to 1");
                result = false;
            }
        }
    }
    result
}
