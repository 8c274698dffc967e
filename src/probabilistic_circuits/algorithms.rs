use std::collections::VecDeque;

use super::circuit::ProbabilisticCircuit;
use super::nodes::{NodeId, PcNode};

/// Calls `f(id, node, depth)` once for every node reachable from the root,
/// breadth first. A node shared by several parents is reported at the depth
/// it is first reached.
pub fn visit_nodes_bfs<F>(pc: &ProbabilisticCircuit, mut f: F)
where
    F: FnMut(NodeId, &PcNode, usize),
{
    let mut discovered = vec![false; pc.len()];
    let mut todo: VecDeque<(NodeId, usize)> = VecDeque::from([(pc.root(), 0)]);
    discovered[pc.root().index()] = true;

    while let Some((id, depth)) = todo.pop_front() {
        let node = pc.node(id);
        for &child in node.children() {
            if !discovered[child.index()] {
                discovered[child.index()] = true;
                todo.push_back((child, depth + 1));
            }
        }
        f(id, node, depth);
    }
}

/// Number of nodes reachable from the root.
pub fn probabilistic_circuit_size(pc: &ProbabilisticCircuit) -> usize {
    let mut result = 0;
    visit_nodes_bfs(pc, |_, _, _| result += 1);
    result
}

/// Breadth first number of every reachable node, indexed by arena position.
/// The root gets number 0.
pub fn node_numbering(pc: &ProbabilisticCircuit) -> Vec<Option<usize>> {
    let mut result = vec![None; pc.len()];
    let mut next = 0;
    visit_nodes_bfs(pc, |id, _, _| {
        result[id.index()] = Some(next);
        next += 1;
    });
    result
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Reachable nodes ordered such that every node comes after all of its
/// children. Children are explored in order, so the root is always last.
pub fn topological_ordering(pc: &ProbabilisticCircuit) -> Vec<NodeId> {
    let mut color = vec![Color::White; pc.len()];
    let mut result = Vec::new();
    // (node, index of the next child to explore)
    let mut stack: Vec<(NodeId, usize)> = vec![(pc.root(), 0)];
    color[pc.root().index()] = Color::Gray;

    while let Some(&(id, next)) = stack.last() {
        match pc.node(id).children().get(next) {
            Some(&child) => {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                if color[child.index()] == Color::White {
                    color[child.index()] = Color::Gray;
                    stack.push((child, 0));
                }
            }
            None => {
                color[id.index()] = Color::Black;
                result.push(id);
                stack.pop();
            }
        }
    }
    result
}
