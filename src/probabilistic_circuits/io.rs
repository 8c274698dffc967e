use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use super::algorithms::{node_numbering, topological_ordering};
use super::circuit::{CircuitBuilder, ProbabilisticCircuit};
use super::nodes::{NodeId, PcNode, TerminalKind};
use crate::core::distributions::{
    CategoricalDistribution, NormalDistribution, TruncatedNormalDistribution,
};
use crate::core::error::{Error, Result};
use crate::decision_trees::SplitCriterion;
use crate::utils::text::{
    format_number, join, join_numbers, parse_sequence, parse_value, split_bracketed, strip_key,
};

/// Writes the circuit with its nodes numbered breadth first from the root,
/// listed children first.
impl fmt::Display for ProbabilisticCircuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numbers = node_numbering(self);
        let number = |id: &NodeId| numbers[id.index()].unwrap_or_default();
        let order = topological_ordering(self);

        writeln!(f, "probabilistic_circuit: 1.0")?;
        writeln!(f, "pc_size: {}", order.len())?;
        writeln!(f, "category_counts: {}", join(self.category_counts()))?;
        for id in &order {
            let node = self.node(*id);
            let children: Vec<usize> = node.children().iter().map(number).collect();
            write!(f, "{}: {} [{}]", node.name(), number(id), join(&children))?;
            match node {
                PcNode::Sum { weights, .. } => writeln!(f, " [{}]", join_numbers(weights))?,
                PcNode::SumSplit { weights, split, .. } => {
                    writeln!(f, " [{}] {split}", join_numbers(weights))?
                }
                PcNode::Product { .. } => writeln!(f)?,
                PcNode::Terminal { scope, kind } => {
                    write!(f, " {scope} ")?;
                    match kind {
                        TerminalKind::Categorical(d) => {
                            writeln!(f, "[{}]", join_numbers(d.probabilities()))?
                        }
                        TerminalKind::Normal(d) => writeln!(
                            f,
                            "{} {}",
                            format_number(d.mean()),
                            format_number(d.standard_deviation())
                        )?,
                        TerminalKind::TruncatedNormal(d) => writeln!(
                            f,
                            "{} {} {} {}",
                            format_number(d.normal().mean()),
                            format_number(d.normal().standard_deviation()),
                            format_number(d.a()),
                            format_number(d.b())
                        )?,
                        TerminalKind::Less(v)
                        | TerminalKind::GreaterEqual(v)
                        | TerminalKind::EqualTo(v)
                        | TerminalKind::NotEqualTo(v) => writeln!(f, "{}", format_number(*v))?,
                        TerminalKind::Subset(mask) => writeln!(f, "{mask:032b}")?,
                    }
                }
            }
        }
        Ok(())
    }
}

struct CircuitParser {
    size: Option<usize>,
    builder: Option<CircuitBuilder>,
    ids: HashMap<usize, NodeId>,
}

impl CircuitParser {
    fn new() -> Self {
        Self {
            size: None,
            builder: None,
            ids: HashMap::new(),
        }
    }

    fn builder(&mut self, line: usize) -> Result<&mut CircuitBuilder> {
        self.builder
            .as_mut()
            .ok_or_else(|| Error::parse(line, "category_counts must precede the nodes"))
    }

    fn children(&self, text: &str, line: usize) -> Result<Vec<NodeId>> {
        parse_sequence::<usize>(text, line)?
            .into_iter()
            .map(|c| {
                self.ids
                    .get(&c)
                    .copied()
                    .ok_or_else(|| Error::parse(line, format!("node {c} is used before it is defined")))
            })
            .collect()
    }

    fn parse_line(&mut self, text: &str, line: usize) -> Result<()> {
        if strip_key(text, "probabilistic_circuit:").is_some() {
            return Ok(());
        }
        if let Some(rest) = strip_key(text, "pc_size:") {
            self.size = Some(parse_value(rest, line)?);
            return Ok(());
        }
        if let Some(rest) = strip_key(text, "category_counts:") {
            self.builder = Some(CircuitBuilder::new(parse_sequence(rest, line)?));
            return Ok(());
        }

        let (name, rest) = text
            .split_once(':')
            .ok_or_else(|| Error::parse(line, format!("unexpected line '{text}'")))?;
        let (index, rest) = rest
            .trim()
            .split_once(char::is_whitespace)
            .ok_or_else(|| Error::parse(line, "expected a node index"))?;
        let index: usize = parse_value(index, line)?;
        if self.ids.contains_key(&index) {
            return Err(Error::parse(line, format!("node {index} is defined twice")));
        }
        let (children, rest) = split_bracketed(rest, line)?;
        let children = self.children(children, line)?;
        let invalid = |e: Error| Error::parse(line, e.to_string());

        let id = match name.trim() {
            "sum" => {
                let (weights, _) = split_bracketed(rest, line)?;
                let weights = parse_sequence(weights, line)?;
                self.builder(line)?.add_sum(children, weights).map_err(invalid)?
            }
            "sum_split" => {
                let (weights, split) = split_bracketed(rest, line)?;
                let weights = parse_sequence(weights, line)?;
                let split: SplitCriterion = split.parse().map_err(invalid)?;
                self.builder(line)?
                    .add_sum_split(children, weights, split)
                    .map_err(invalid)?
            }
            "product" => self.builder(line)?.add_product(children).map_err(invalid)?,
            name => {
                if !children.is_empty() {
                    return Err(Error::parse(line, format!("a {name} node has no children")));
                }
                let (scope, kind) = parse_terminal(name, rest, line)?;
                self.builder(line)?.add_terminal(scope, kind).map_err(invalid)?
            }
        };
        self.ids.insert(index, id);
        Ok(())
    }

    fn finish(self, line: usize) -> Result<ProbabilisticCircuit> {
        let builder = self
            .builder
            .ok_or_else(|| Error::parse(line, "missing category_counts"))?;
        let size = self.size.ok_or_else(|| Error::parse(line, "missing pc_size"))?;
        if self.ids.len() != size {
            return Err(Error::parse(
                line,
                format!("expected {size} nodes, found {}", self.ids.len()),
            ));
        }
        let root = self
            .ids
            .get(&0)
            .copied()
            .ok_or_else(|| Error::parse(line, "missing root node 0"))?;
        builder.finish(root).map_err(|e| Error::parse(line, e.to_string()))
    }
}

fn parse_terminal(name: &str, text: &str, line: usize) -> Result<(usize, TerminalKind)> {
    let (scope, rest) = text
        .trim()
        .split_once(char::is_whitespace)
        .ok_or_else(|| Error::parse(line, format!("expected the scope and parameters of a {name} node")))?;
    let scope: usize = parse_value(scope, line)?;
    let invalid = |e: Error| Error::parse(line, e.to_string());

    let kind = match name {
        "categorical" => {
            let (probabilities, _) = split_bracketed(rest, line)?;
            let probabilities = parse_sequence(probabilities, line)?;
            TerminalKind::Categorical(CategoricalDistribution::new(probabilities).map_err(invalid)?)
        }
        "normal" => {
            let [mu, sigma] = parse_numbers::<2>(rest, line)?;
            TerminalKind::Normal(NormalDistribution::new(mu, sigma).map_err(invalid)?)
        }
        "truncated_normal" => {
            let [mu, sigma, a, b] = parse_numbers::<4>(rest, line)?;
            TerminalKind::TruncatedNormal(
                TruncatedNormalDistribution::new(mu, sigma, a, b).map_err(invalid)?,
            )
        }
        "less" => TerminalKind::Less(parse_value(rest, line)?),
        "greater_equal" => TerminalKind::GreaterEqual(parse_value(rest, line)?),
        "equal_to" => TerminalKind::EqualTo(parse_value(rest, line)?),
        "not_equal_to" => TerminalKind::NotEqualTo(parse_value(rest, line)?),
        "subset" => TerminalKind::Subset(
            u32::from_str_radix(rest.trim(), 2)
                .map_err(|_| Error::parse(line, format!("invalid mask '{}'", rest.trim())))?,
        ),
        _ => return Err(Error::parse(line, format!("unknown node type '{name}'"))),
    };
    Ok((scope, kind))
}

fn parse_numbers<const N: usize>(text: &str, line: usize) -> Result<[f64; N]> {
    let values: Vec<f64> = parse_sequence(text, line)?;
    let found = values.len();
    values
        .try_into()
        .map_err(|_| Error::parse(line, format!("expected {N} numbers, found {found}")))
}

pub fn parse_probabilistic_circuit(text: &str) -> Result<ProbabilisticCircuit> {
    let mut parser = CircuitParser::new();
    let mut last_line = 0;
    for (i, line) in text.lines().enumerate() {
        last_line = i + 1;
        let line = line.trim();
        if !line.is_empty() {
            parser.parse_line(line, last_line)?;
        }
    }
    parser.finish(last_line)
}

pub fn load_probabilistic_circuit(path: impl AsRef<Path>) -> Result<ProbabilisticCircuit> {
    let text = fs::read_to_string(path)?;
    parse_probabilistic_circuit(&text)
}

pub fn save_probabilistic_circuit(path: impl AsRef<Path>, pc: &ProbabilisticCircuit) -> Result<()> {
    fs::write(path, pc.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probabilistic_circuits::evaluation::{CircuitEvaluator, evi};
    use crate::probabilistic_circuits::generative_forest::expand_sum_split_nodes;
    use crate::probabilistic_circuits::validity::{is_decomposable, is_normalized, is_smooth};
    use approx::assert_abs_diff_eq;

    const GENERATIVE_TREE: &str = "probabilistic_circuit: 1.0
pc_size: 15
category_counts: 0 0 0
categorical: 9 [] 0 [0.0714286 0.142857 0.214286 0.142857 0.285714 0.142857]
truncated_normal: 10 [] 1 78.5493 14.0491 -1.7976931348623157e308 109.296
truncated_normal: 11 [] 2 58.5521 23.5572 -1.7976931348623157e308 107.415
product: 4 [9 10 11]
categorical: 12 [] 0 [0 0.25 0.5 0 0.25 0]
truncated_normal: 13 [] 1 50.5498 12.065 -1.7976931348623157e308 109.296
truncated_normal: 14 [] 2 132.173 19.3011 107.415 1.7976931348623157e308
product: 5 [12 13 14]
sum_split: 2 [4 5] [0.777778 0.222222] ThresholdSplit(2, 107.415)
categorical: 6 [] 0 [0.5 0 0 0 0 0.5]
truncated_normal: 7 [] 1 110.28 0.983799 109.296 1.7976931348623157e308
normal: 8 [] 2 36.5643 4.59506
product: 3 [6 7 8]
sum_split: 1 [2 3] [0.9 0.1] ThresholdSplit(1, 109.296)
sum: 0 [1] [1]
";

    // the nodes are not numbered breadth first
    const EXAMPLE: &str = "probabilistic_circuit: 1.0
pc_size: 23
category_counts: 0 0 0 0
normal: 1 [] 0  -1 2
normal: 2 [] 0  -2 0.1
normal: 3 [] 1 0.6 0.1
normal: 4 [] 1 0 1
normal: 5 [] 2 -1.5 0.2
normal: 6 [] 2 -1 0.5
normal: 7 [] 3 0 1
normal: 8 [] 3 0 0.1
sum: 9 [3 4] [0.8 0.2]
sum: 10 [3 4] [0.7 0.3]
sum: 11 [1 2] [0.5 0.5]
sum: 12 [1 2] [0.1 0.9]
product: 13 [9 11]
product: 14 [10 12]
sum: 15 [13 14] [0.4 0.6]
sum: 16 [13 14] [0.5 0.5]
product: 17 [5 15]
product: 18 [6 16]
sum: 19 [17 18] [0.5 0.5]
sum: 20 [17 18] [0.2 0.8]
product: 21 [7 19]
product: 22 [8 20]
sum: 0 [21 22] [0.2 0.8]
";

    #[test]
    fn text_round_trip() {
        let pc = parse_probabilistic_circuit(GENERATIVE_TREE).unwrap();
        assert_eq!(pc.to_string(), GENERATIVE_TREE);
    }

    #[test]
    fn renumbers_breadth_first() {
        let pc = parse_probabilistic_circuit(EXAMPLE).unwrap();
        let text = pc.to_string();
        assert!(text.ends_with("sum: 0 [1 2] [0.2 0.8]\n"));
        let again = parse_probabilistic_circuit(&text).unwrap();
        assert_eq!(again.to_string(), text);

        let x = [-1.85, 0.5, -1.3, 0.2];
        let expected = evi(&pc, &x);
        assert_abs_diff_eq!(expected, 0.75, epsilon = 0.01);
        assert_abs_diff_eq!(CircuitEvaluator::new(&pc).evi(&x), expected, epsilon = 1e-12);
        assert_abs_diff_eq!(evi(&again, &x), expected, epsilon = 1e-12);

        assert!(is_smooth(&pc));
        assert!(is_decomposable(&pc));
        assert!(is_normalized(&pc));
    }

    #[test]
    fn expanded_circuit_round_trips() {
        let mut pc = parse_probabilistic_circuit(GENERATIVE_TREE).unwrap();
        expand_sum_split_nodes(&mut pc).unwrap();
        let text = pc.to_string();
        assert!(!text.contains("sum_split"));
        assert!(text.contains("less: "));
        assert!(text.contains("greater_equal: "));
        let again = parse_probabilistic_circuit(&text).unwrap();
        assert_eq!(again.to_string(), text);
    }

    #[test]
    fn indicator_lines() {
        let text = "probabilistic_circuit: 1.0
pc_size: 4
category_counts: 0 4
product: 0 [1 2 3]
";
        // children must come first
        assert!(matches!(
            parse_probabilistic_circuit(text),
            Err(Error::Parse { line: 4, .. })
        ));

        let text = "probabilistic_circuit: 1.0
pc_size: 5
category_counts: 0 4
equal_to: 1 [] 1 2
not_equal_to: 2 [] 1 3
subset: 3 [] 1 00000000000000000000000000000101
sum: 4 [1 3] [0.5 0.5]
product: 0 [4 2]
";
        let pc = parse_probabilistic_circuit(text).unwrap();
        assert_eq!(evi(&pc, &[0.0, 2.0]), 1.0);
        assert_eq!(evi(&pc, &[0.0, 0.0]), 0.5);
        assert_eq!(evi(&pc, &[0.0, 3.0]), 0.0);
        assert!(pc.to_string().contains("subset: 4 [] 1 00000000000000000000000000000101"));
    }

    #[test]
    fn malformed_circuits_are_rejected() {
        let dangling = GENERATIVE_TREE.replace("product: 3 [6 7 8]", "product: 3 [6 7 16]");
        assert!(matches!(
            parse_probabilistic_circuit(&dangling),
            Err(Error::Parse { line: 16, .. })
        ));

        let size = GENERATIVE_TREE.replace("pc_size: 15", "pc_size: 16");
        assert!(parse_probabilistic_circuit(&size).is_err());

        let unknown = GENERATIVE_TREE.replace("normal: 8", "poisson: 8");
        assert!(parse_probabilistic_circuit(&unknown).is_err());

        let weights = GENERATIVE_TREE.replace("[0.9 0.1]", "[0.9]");
        assert!(parse_probabilistic_circuit(&weights).is_err());
    }

    #[test]
    fn file_round_trip() {
        let pc = parse_probabilistic_circuit(GENERATIVE_TREE).unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        save_probabilistic_circuit(file.path(), &pc).unwrap();
        assert_eq!(load_probabilistic_circuit(file.path()).unwrap(), pc);
    }
}
