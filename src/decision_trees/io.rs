use std::fmt;
use std::fs;
use std::path::Path;

use super::decision_tree::{DecisionTree, Vertex};
use super::index_range::IndexRange;
use super::split_criterion::SplitCriterion;
use crate::core::error::{Error, Result};
use crate::utils::text::{join, parse_sequence, parse_value, split_bracketed, strip_key};

impl fmt::Display for DecisionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "binary_decision_tree: 1.0")?;
        writeln!(f, "tree_size: {}", self.len())?;
        writeln!(f, "category_counts: {}", join(self.category_counts()))?;
        writeln!(f, "classes: {}", join(self.classes()))?;
        writeln!(f, "indices: {}", join(self.indices()))?;
        for (i, u) in self.vertices().iter().enumerate() {
            match u.children() {
                Some((l, r)) => write!(f, "vertex: {i} [{l} {r}] ")?,
                None => write!(f, "vertex: {i} [] ")?,
            }
            writeln!(f, "{} {} {}", u.split, u.range.begin, u.range.end)?;
        }
        Ok(())
    }
}

fn parse_vertex(text: &str, line: usize) -> Result<(usize, Vertex)> {
    let (index, rest) = text
        .split_once(char::is_whitespace)
        .ok_or_else(|| Error::parse(line, "expected a vertex index"))?;
    let index: usize = parse_value(index, line)?;

    let (children, rest) = split_bracketed(rest, line)?;
    let children: Vec<u32> = parse_sequence(children, line)?;
    let (left, right) = match children[..] {
        [] => (None, None),
        [l, r] => (Some(l), Some(r)),
        _ => return Err(Error::parse(line, "a vertex has zero or two children")),
    };

    let close = rest
        .rfind(')')
        .ok_or_else(|| Error::parse(line, "expected a split"))?;
    let split: SplitCriterion = rest[..=close]
        .parse()
        .map_err(|e: Error| Error::parse(line, e.to_string()))?;
    let bounds: Vec<usize> = parse_sequence(&rest[close + 1..], line)?;
    let [begin, end] = bounds[..] else {
        return Err(Error::parse(line, "expected the begin and end of the index range"));
    };
    if begin > end {
        return Err(Error::parse(line, format!("empty range {begin} {end}")));
    }

    let vertex = Vertex {
        range: IndexRange::new(begin, end),
        left,
        right,
        split,
    };
    Ok((index, vertex))
}

/// Reads a tree from the lines of `lines` until `tree_size` vertices are read.
pub(crate) fn parse_decision_tree_lines<'a, I>(lines: &mut I) -> Result<DecisionTree>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let mut size: Option<usize> = None;
    let mut category_counts: Option<Vec<u32>> = None;
    let mut classes: Option<Vec<u32>> = None;
    let mut indices: Option<Vec<u32>> = None;
    let mut vertices: Vec<Vertex> = Vec::new();
    let mut last_line = 0;

    for (line, text) in lines.by_ref() {
        last_line = line;
        let text = text.trim();
        if text.is_empty() || strip_key(text, "binary_decision_tree:").is_some() {
            continue;
        }
        if let Some(rest) = strip_key(text, "tree_size:") {
            size = Some(parse_value(rest, line)?);
        } else if let Some(rest) = strip_key(text, "category_counts:") {
            category_counts = Some(parse_sequence(rest, line)?);
        } else if let Some(rest) = strip_key(text, "classes:") {
            classes = Some(parse_sequence(rest, line)?);
        } else if let Some(rest) = strip_key(text, "indices:") {
            indices = Some(parse_sequence(rest, line)?);
        } else if let Some(rest) = strip_key(text, "vertex:") {
            let (index, vertex) = parse_vertex(rest, line)?;
            if index != vertices.len() {
                return Err(Error::parse(
                    line,
                    format!("expected vertex {}, found {index}", vertices.len()),
                ));
            }
            vertices.push(vertex);
        } else {
            return Err(Error::parse(line, format!("unexpected line '{text}'")));
        }

        if size.is_some_and(|n| vertices.len() == n) {
            break;
        }
    }

    let missing = |key: &str| Error::parse(last_line, format!("missing {key}"));
    let size = size.ok_or_else(|| missing("tree_size"))?;
    if vertices.len() != size {
        return Err(Error::parse(
            last_line,
            format!("expected {size} vertices, found {}", vertices.len()),
        ));
    }
    DecisionTree::from_parts(
        vertices,
        indices.ok_or_else(|| missing("indices"))?,
        classes.ok_or_else(|| missing("classes"))?,
        category_counts.ok_or_else(|| missing("category_counts"))?,
    )
    .map_err(|e| Error::parse(last_line, e.to_string()))
}

pub fn parse_decision_tree(text: &str) -> Result<DecisionTree> {
    let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line));
    parse_decision_tree_lines(&mut lines)
}

pub fn load_decision_tree(path: impl AsRef<Path>) -> Result<DecisionTree> {
    let text = fs::read_to_string(path)?;
    parse_decision_tree(&text)
}

pub fn save_decision_tree(path: impl AsRef<Path>, tree: &DecisionTree) -> Result<()> {
    fs::write(path, tree.to_string())?;
    Ok(())
}
