use super::nodes::{NodeId, PcNode, TerminalKind};
use crate::core::error::{Error, Result};
use crate::decision_trees::SplitCriterion;
use crate::utils::memory::{MemoryMeter, MemorySized, flat_vec_size};

/// A probabilistic circuit stored as an arena of nodes. Children are handles
/// into the same arena.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilisticCircuit {
    nodes: Vec<PcNode>,
    root: NodeId,
    category_counts: Vec<u32>,
}

impl ProbabilisticCircuit {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &PcNode {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> &[PcNode] {
        &self.nodes
    }

    /// Number of nodes in the arena, reachable or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn category_counts(&self) -> &[u32] {
        &self.category_counts
    }

    /// Number of entries of the vectors the circuit is evaluated on.
    pub fn variable_count(&self) -> usize {
        self.category_counts.len()
    }

    pub(crate) fn push_node(&mut self, node: PcNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub(crate) fn replace_node(&mut self, id: NodeId, node: PcNode) {
        self.nodes[id.index()] = node;
    }
}

impl MemorySized for ProbabilisticCircuit {
    fn extra_heap_size(&self, meter: &mut MemoryMeter) -> usize {
        meter.measure_field(&self.nodes) + flat_vec_size(&self.category_counts)
    }
}

/// Assembles a [`ProbabilisticCircuit`] bottom-up. Every child must be added
/// before its parent.
#[derive(Debug, Clone, Default)]
pub struct CircuitBuilder {
    nodes: Vec<PcNode>,
    category_counts: Vec<u32>,
}

impl CircuitBuilder {
    pub fn new(category_counts: Vec<u32>) -> Self {
        Self {
            nodes: Vec::new(),
            category_counts,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&PcNode> {
        self.nodes.get(id.index())
    }

    fn push(&mut self, node: PcNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn check_children(&self, children: &[NodeId]) -> Result<()> {
        if children.is_empty() {
            return Err(Error::InvalidCircuit("an inner node needs at least one child".into()));
        }
        match children.iter().find(|c| c.index() >= self.nodes.len()) {
            Some(c) => Err(Error::InvalidCircuit(format!("child {c} does not exist"))),
            None => Ok(()),
        }
    }

    fn check_weights(children: &[NodeId], weights: &[f64]) -> Result<()> {
        if children.len() != weights.len() {
            return Err(Error::InvalidCircuit(format!(
                "{} children but {} weights",
                children.len(),
                weights.len()
            )));
        }
        if let Some(w) = weights.iter().find(|w| !(**w >= 0.0)) {
            return Err(Error::InvalidCircuit(format!("weight {w} is negative")));
        }
        Ok(())
    }

    pub fn add_sum(&mut self, children: Vec<NodeId>, weights: Vec<f64>) -> Result<NodeId> {
        self.check_children(&children)?;
        Self::check_weights(&children, &weights)?;
        Ok(self.push(PcNode::Sum { children, weights }))
    }

    /// A sum-split node has one child per side of `split`.
    pub fn add_sum_split(
        &mut self,
        children: Vec<NodeId>,
        weights: Vec<f64>,
        split: SplitCriterion,
    ) -> Result<NodeId> {
        self.check_children(&children)?;
        Self::check_weights(&children, &weights)?;
        if !split.is_defined() {
            return Err(Error::UndefinedSplit);
        }
        if children.len() != 2 {
            return Err(Error::InvalidCircuit(format!(
                "a sum_split node needs two children, got {}",
                children.len()
            )));
        }
        if split.variable().is_some_and(|v| v >= self.category_counts.len()) {
            return Err(Error::InvalidCircuit(format!("split {split} is out of scope")));
        }
        Ok(self.push(PcNode::SumSplit {
            children,
            weights,
            split,
        }))
    }

    pub fn add_product(&mut self, children: Vec<NodeId>) -> Result<NodeId> {
        self.check_children(&children)?;
        Ok(self.push(PcNode::Product { children }))
    }

    pub fn add_terminal(&mut self, scope: usize, kind: TerminalKind) -> Result<NodeId> {
        if scope >= self.category_counts.len() {
            return Err(Error::InvalidCircuit(format!(
                "scope {scope} is out of range for {} variables",
                self.category_counts.len()
            )));
        }
        Ok(self.push(PcNode::Terminal { scope, kind }))
    }

    pub fn finish(self, root: NodeId) -> Result<ProbabilisticCircuit> {
        if root.index() >= self.nodes.len() {
            return Err(Error::InvalidCircuit(format!("root {root} does not exist")));
        }
        Ok(ProbabilisticCircuit {
            nodes: self.nodes,
            root,
            category_counts: self.category_counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::distributions::NormalDistribution;

    fn normal(mean: f64, sd: f64) -> TerminalKind {
        TerminalKind::Normal(NormalDistribution::new(mean, sd).unwrap())
    }

    #[test]
    fn builds_bottom_up() {
        let mut b = CircuitBuilder::new(vec![0, 0]);
        let x = b.add_terminal(0, normal(0.0, 1.0)).unwrap();
        let y = b.add_terminal(1, normal(1.0, 2.0)).unwrap();
        let p = b.add_product(vec![x, y]).unwrap();
        let s = b.add_sum(vec![p], vec![1.0]).unwrap();
        let pc = b.finish(s).unwrap();

        assert_eq!(pc.len(), 4);
        assert_eq!(pc.root(), s);
        assert_eq!(pc.node(p).children(), &[x, y]);
        assert_eq!(pc.node(s).weights(), Some(&[1.0][..]));
        assert_eq!(pc.variable_count(), 2);
    }

    #[test]
    fn rejects_dangling_children_and_bad_weights() {
        let mut b = CircuitBuilder::new(vec![0]);
        let x = b.add_terminal(0, normal(0.0, 1.0)).unwrap();
        assert!(b.add_product(vec![x, NodeId(7)]).is_err());
        assert!(b.add_product(vec![]).is_err());
        assert!(b.add_sum(vec![x], vec![0.5, 0.5]).is_err());
        assert!(b.add_sum(vec![x], vec![-1.0]).is_err());
        assert!(b.add_terminal(1, normal(0.0, 1.0)).is_err());
        assert!(b.clone().finish(NodeId(3)).is_err());
    }

    #[test]
    fn sum_split_needs_a_defined_binary_split() {
        let mut b = CircuitBuilder::new(vec![0]);
        let x = b.add_terminal(0, normal(0.0, 1.0)).unwrap();
        let y = b.add_terminal(0, normal(5.0, 1.0)).unwrap();
        let split = SplitCriterion::Threshold { variable: 0, value: 2.5 };
        assert!(matches!(
            b.add_sum_split(vec![x, y], vec![0.5, 0.5], SplitCriterion::None),
            Err(Error::UndefinedSplit)
        ));
        assert!(b.add_sum_split(vec![x], vec![1.0], split).is_err());
        let out_of_scope = SplitCriterion::Threshold { variable: 3, value: 2.5 };
        assert!(b.add_sum_split(vec![x, y], vec![0.5, 0.5], out_of_scope).is_err());
        assert!(b.add_sum_split(vec![x, y], vec![0.5, 0.5], split).is_ok());
    }

    #[test]
    fn memory_counts_every_node() {
        let mut b = CircuitBuilder::new(vec![0, 0]);
        let x = b.add_terminal(0, normal(0.0, 1.0)).unwrap();
        let small = b.clone().finish(x).unwrap();
        let y = b.add_terminal(1, normal(1.0, 2.0)).unwrap();
        let p = b.add_product(vec![x, y]).unwrap();
        let large = b.finish(p).unwrap();
        assert!(small.deep_size() >= std::mem::size_of::<ProbabilisticCircuit>() + std::mem::size_of::<PcNode>());
        assert!(large.deep_size() > small.deep_size());
    }
}
