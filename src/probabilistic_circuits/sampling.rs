use rand::Rng;

use super::circuit::ProbabilisticCircuit;
use super::nodes::PcNode;
use crate::core::dataset::Dataset;
use crate::core::error::Result;
use crate::core::missing::MISSING;
use crate::utils::math::find_categorical_section;

/// Draws one vector from the distribution of `pc`. Sums pick a child by
/// weight, products sample every child, and terminals fill in their own
/// variable. Variables that no sampled terminal covers stay missing.
pub fn sample<R: Rng + ?Sized>(pc: &ProbabilisticCircuit, rng: &mut R) -> Result<Vec<f64>> {
    let mut x = vec![MISSING; pc.variable_count()];
    let mut todo = vec![pc.root()];
    while let Some(id) = todo.pop() {
        match pc.node(id) {
            PcNode::Sum { children, weights } | PcNode::SumSplit { children, weights, .. } => {
                let u: f64 = rng.random();
                todo.push(children[find_categorical_section(weights, u)]);
            }
            PcNode::Product { children } => todo.extend(children.iter().rev()),
            PcNode::Terminal { scope, kind } => x[*scope] = kind.sample(rng)?,
        }
    }
    Ok(x)
}

/// A dataset of `n` vectors drawn with [`sample`], with the arities of `pc`.
pub fn sample_dataset<R: Rng + ?Sized>(
    pc: &ProbabilisticCircuit,
    n: usize,
    rng: &mut R,
) -> Result<Dataset> {
    let mut dataset = Dataset::new(pc.category_counts().to_vec());
    for _ in 0..n {
        dataset.push_row(&sample(pc, rng)?)?;
    }
    Ok(dataset)
}
