use std::fmt;

use super::index_range::IndexRange;
use super::split_criterion::SplitCriterion;
use crate::core::dataset::Dataset;
use crate::core::error::{Error, Result};
use crate::utils::memory::{MemoryMeter, MemorySized, flat_vec_size};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vertex {
    /// Samples of this vertex, as a range of the tree's index array.
    pub range: IndexRange,
    pub left: Option<u32>,
    pub right: Option<u32>,
    pub split: SplitCriterion,
}

impl Vertex {
    pub fn new(range: IndexRange) -> Self {
        Self {
            range,
            ..Default::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn children(&self) -> Option<(u32, u32)> {
        self.left.zip(self.right)
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |i: Option<u32>| i.map_or_else(|| "u".to_string(), |i| i.to_string());
        write!(
            f,
            "left = {}, right = {}, I = {}",
            show(self.left),
            show(self.right),
            self.range
        )
    }
}

/// Binary decision tree stored as an arena of vertices.
///
/// The tree owns the sample indices it was learned from. Every vertex refers
/// to a contiguous range of that array, and the ranges of two children
/// partition the range of their parent. Vertex 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    classes: Vec<u32>,
    category_counts: Vec<u32>,
}

impl DecisionTree {
    /// A tree with a single root vertex holding all of `indices`.
    pub fn new(dataset: &Dataset, indices: Vec<u32>) -> Self {
        let root = Vertex::new(IndexRange::new(0, indices.len()));
        let mut vertices = Vec::with_capacity(16);
        vertices.push(root);
        Self {
            vertices,
            indices,
            classes: dataset.classes(),
            category_counts: dataset.category_counts().to_vec(),
        }
    }

    /// Assembles a tree from its parts and checks that the vertices are consistent.
    pub fn from_parts(
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        classes: Vec<u32>,
        category_counts: Vec<u32>,
    ) -> Result<Self> {
        if vertices.is_empty() {
            return Err(Error::Empty("decision tree"));
        }
        if category_counts.is_empty() {
            return Err(Error::InvalidOption("a tree needs at least the class column".into()));
        }
        let n = vertices.len() as u32;
        let feature_count = category_counts.len() - 1;
        for (i, u) in vertices.iter().enumerate() {
            if u.range.begin > u.range.end || u.range.end > indices.len() {
                return Err(Error::InvalidOption(format!(
                    "vertex {i} has range {} outside of the {} indices",
                    u.range,
                    indices.len()
                )));
            }
            match (u.left, u.right) {
                (None, None) => {}
                (Some(l), Some(r)) if l < n && r < n && l as usize > i && r as usize > i => {
                    let variable = u.split.variable().ok_or(Error::UndefinedSplit)?;
                    if variable >= feature_count {
                        return Err(Error::InvalidOption(format!(
                            "vertex {i} splits on variable {variable}, there are {feature_count} features"
                        )));
                    }
                    let (left, right) = (vertices[l as usize].range, vertices[r as usize].range);
                    if left.begin != u.range.begin
                        || left.end != right.begin
                        || right.end != u.range.end
                    {
                        return Err(Error::InvalidOption(format!(
                            "children {left} and {right} of vertex {i} do not partition {}",
                            u.range
                        )));
                    }
                }
                _ => {
                    return Err(Error::InvalidOption(format!(
                        "vertex {i} has invalid children"
                    )));
                }
            }
        }
        if let Some(&i) = indices.iter().find(|&&i| i as usize >= classes.len()) {
            return Err(Error::InvalidOption(format!(
                "index {i} has no class, there are {} classes",
                classes.len()
            )));
        }
        let class_count = category_counts.last().copied().unwrap_or(0);
        if let Some(&k) = classes.iter().find(|&&k| k >= class_count) {
            return Err(Error::InvalidOption(format!(
                "class {k} is outside of the {class_count} classes"
            )));
        }
        Ok(Self {
            vertices,
            indices,
            classes,
            category_counts,
        })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex(&self, i: u32) -> &Vertex {
        &self.vertices[i as usize]
    }

    pub(crate) fn vertex_mut(&mut self, i: u32) -> &mut Vertex {
        &mut self.vertices[i as usize]
    }

    pub fn root(&self) -> &Vertex {
        &self.vertices[0]
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn add_vertex(&mut self, u: Vertex) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(u);
        index
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub(crate) fn indices_mut(&mut self) -> &mut [u32] {
        &mut self.indices
    }

    /// Class labels of the dataset the tree was learned from, by row.
    pub fn classes(&self) -> &[u32] {
        &self.classes
    }

    pub fn category_counts(&self) -> &[u32] {
        &self.category_counts
    }

    pub fn feature_count(&self) -> usize {
        self.category_counts.len() - 1
    }

    pub fn class_count(&self) -> usize {
        self.category_counts.last().copied().unwrap_or(0) as usize
    }

    /// Dataset rows belonging to `u`.
    pub fn samples(&self, u: &Vertex) -> &[u32] {
        u.range.of(&self.indices)
    }

    pub fn class_counts(&self, u: &Vertex) -> Vec<u32> {
        let mut counts = vec![0; self.class_count()];
        for &i in self.samples(u) {
            counts[self.classes[i as usize] as usize] += 1;
        }
        counts
    }
}

impl MemorySized for DecisionTree {
    fn extra_heap_size(&self, _meter: &mut MemoryMeter) -> usize {
        flat_vec_size(&self.vertices)
            + flat_vec_size(&self.indices)
            + flat_vec_size(&self.classes)
            + flat_vec_size(&self.category_counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::parse_dataset;

    fn dataset() -> Dataset {
        parse_dataset("dataset: 1.0\ncategory_counts: 0 2\n0.5 0\n1.5 1\n2.5 1\n").unwrap()
    }

    #[test]
    fn new_tree_has_a_root_over_all_indices() {
        let d = dataset();
        let tree = DecisionTree::new(&d, d.all_indices());
        assert_eq!(tree.len(), 1);
        assert!(tree.root().is_leaf());
        assert_eq!(tree.root().range, IndexRange::new(0, 3));
        assert_eq!(tree.classes(), &[0, 1, 1]);
        assert_eq!(tree.class_counts(tree.root()), vec![1, 2]);
        assert_eq!(tree.feature_count(), 1);
        assert_eq!(tree.class_count(), 2);
    }

    #[test]
    fn from_parts_rejects_bad_children() {
        let root = Vertex {
            range: IndexRange::new(0, 3),
            left: Some(1),
            right: Some(5),
            split: SplitCriterion::Threshold { variable: 0, value: 1.0 },
        };
        let result = DecisionTree::from_parts(vec![root], vec![0, 1, 2], vec![0, 1, 1], vec![0, 2]);
        assert!(matches!(result, Err(Error::InvalidOption(_))));
    }

    #[test]
    fn from_parts_rejects_undefined_split() {
        let vertices = vec![
            Vertex {
                range: IndexRange::new(0, 3),
                left: Some(1),
                right: Some(2),
                split: SplitCriterion::None,
            },
            Vertex::new(IndexRange::new(0, 1)),
            Vertex::new(IndexRange::new(1, 3)),
        ];
        let result = DecisionTree::from_parts(vertices, vec![0, 1, 2], vec![0, 1, 1], vec![0, 2]);
        assert!(matches!(result, Err(Error::UndefinedSplit)));
    }

    fn stump(split: SplitCriterion, left: IndexRange, right: IndexRange) -> Result<DecisionTree> {
        let vertices = vec![
            Vertex {
                range: IndexRange::new(0, 3),
                left: Some(1),
                right: Some(2),
                split,
            },
            Vertex::new(left),
            Vertex::new(right),
        ];
        DecisionTree::from_parts(vertices, vec![0, 1, 2], vec![0, 1, 1], vec![0, 0, 2])
    }

    #[test]
    fn from_parts_checks_split_variables_and_ranges() {
        let threshold = |variable| SplitCriterion::Threshold { variable, value: 1.5 };
        let (a, b) = (IndexRange::new(0, 1), IndexRange::new(1, 3));
        assert!(stump(threshold(1), a, b).is_ok());

        assert!(matches!(stump(threshold(2), a, b), Err(Error::InvalidOption(_))));
        assert!(matches!(stump(threshold(7), a, b), Err(Error::InvalidOption(_))));

        for (left, right) in [
            (IndexRange::new(0, 1), IndexRange::new(2, 3)),
            (IndexRange::new(1, 2), IndexRange::new(2, 3)),
            (IndexRange::new(0, 2), IndexRange::new(2, 2)),
            (IndexRange::new(0, 2), IndexRange::new(1, 3)),
        ] {
            assert!(matches!(stump(threshold(0), left, right), Err(Error::InvalidOption(_))));
        }
    }

    #[test]
    fn from_parts_checks_classes() {
        let vertices = vec![Vertex::new(IndexRange::new(0, 2))];
        let result = DecisionTree::from_parts(vertices, vec![0, 1], vec![0, 2], vec![0, 2]);
        assert!(matches!(result, Err(Error::InvalidOption(_))));
    }

    #[test]
    fn vertex_display() {
        let u = Vertex {
            range: IndexRange::new(2, 5),
            left: Some(3),
            right: None,
            split: SplitCriterion::None,
        };
        assert_eq!(u.to_string(), "left = 3, right = u, I = [2, 5)");
    }
}
