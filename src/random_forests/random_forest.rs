use crate::decision_trees::DecisionTree;
use crate::utils::memory::{MemoryMeter, MemorySized};

/// A collection of decision trees learned from the same dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(trees: Vec<DecisionTree>) -> Self {
        Self { trees }
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn into_trees(self) -> Vec<DecisionTree> {
        self.trees
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Number of classes, taken from the first tree.
    pub fn class_count(&self) -> usize {
        self.trees.first().map_or(0, DecisionTree::class_count)
    }

    pub fn category_counts(&self) -> &[u32] {
        match self.trees.first() {
            Some(tree) => tree.category_counts(),
            None => &[],
        }
    }
}

impl From<DecisionTree> for RandomForest {
    fn from(tree: DecisionTree) -> Self {
        Self { trees: vec![tree] }
    }
}

impl MemorySized for RandomForest {
    fn extra_heap_size(&self, meter: &mut MemoryMeter) -> usize {
        meter.measure_field(&self.trees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision_trees::{IndexRange, Vertex};

    fn leaf(classes: Vec<u32>) -> DecisionTree {
        let n = classes.len();
        let vertices = vec![Vertex::new(IndexRange::new(0, n))];
        DecisionTree::from_parts(vertices, (0..n as u32).collect(), classes, vec![0, 3]).unwrap()
    }

    #[test]
    fn forest_metadata_comes_from_the_first_tree() {
        let forest = RandomForest::new(vec![leaf(vec![0, 2]), leaf(vec![1])]);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest.class_count(), 3);
        assert_eq!(forest.category_counts(), &[0, 3]);
        assert!(RandomForest::default().category_counts().is_empty());
        assert_eq!(RandomForest::from(leaf(vec![1])).len(), 1);
    }

    #[test]
    fn memory_grows_with_the_trees() {
        let one = RandomForest::new(vec![leaf(vec![0, 1])]);
        let two = RandomForest::new(vec![leaf(vec![0, 1]), leaf(vec![0, 1, 2, 2])]);
        assert!(one.deep_size() > std::mem::size_of::<RandomForest>());
        assert!(two.deep_size() > one.deep_size());
    }
}
