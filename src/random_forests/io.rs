use std::fmt;
use std::fs;
use std::path::Path;

use super::random_forest::RandomForest;
use crate::core::error::{Error, Result};
use crate::decision_trees::io::parse_decision_tree_lines;
use crate::utils::text::{parse_value, strip_key};

impl fmt::Display for RandomForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "random_forest: 1.0")?;
        writeln!(f, "forest_size: {}", self.len())?;
        for tree in self.trees() {
            write!(f, "{tree}")?;
        }
        Ok(())
    }
}

pub fn parse_random_forest(text: &str) -> Result<RandomForest> {
    let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line));

    let mut forest_size: Option<usize> = None;
    for (line, text) in lines.by_ref() {
        let text = text.trim();
        if text.is_empty() || strip_key(text, "random_forest:").is_some() {
            continue;
        }
        if let Some(rest) = strip_key(text, "forest_size:") {
            forest_size = Some(parse_value(rest, line)?);
            break;
        }
        return Err(Error::parse(line, format!("unexpected line '{text}'")));
    }
    let forest_size = forest_size.ok_or_else(|| Error::parse(0, "missing forest_size"))?;

    let trees = (0..forest_size)
        .map(|_| parse_decision_tree_lines(&mut lines))
        .collect::<Result<Vec<_>>>()?;

    if let Some((line, text)) = lines.find(|(_, text)| !text.trim().is_empty()) {
        return Err(Error::parse(line, format!("unexpected line '{}'", text.trim())));
    }
    Ok(RandomForest::new(trees))
}

/// Parses either a forest or a single tree, which becomes a forest of size one.
pub fn parse_random_forest_or_tree(text: &str) -> Result<RandomForest> {
    let first = text.lines().map(str::trim).find(|line| !line.is_empty());
    match first {
        Some(line) if line.starts_with("binary_decision_tree:") => {
            crate::decision_trees::parse_decision_tree(text).map(RandomForest::from)
        }
        _ => parse_random_forest(text),
    }
}

pub fn load_random_forest(path: impl AsRef<Path>) -> Result<RandomForest> {
    let text = fs::read_to_string(path)?;
    parse_random_forest_or_tree(&text)
}

pub fn save_random_forest(path: impl AsRef<Path>, forest: &RandomForest) -> Result<()> {
    fs::write(path, forest.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOREST: &str = "random_forest: 1.0
forest_size: 2
binary_decision_tree: 1.0
tree_size: 3
category_counts: 0 2
classes: 0 1 1
indices: 0 1 2
vertex: 0 [1 2] ThresholdSplit(0, 1.5) 0 3
vertex: 1 [] NoSplit() 0 1
vertex: 2 [] NoSplit() 1 3
binary_decision_tree: 1.0
tree_size: 1
category_counts: 0 2
classes: 0 1 1
indices: 2 2 0
vertex: 0 [] NoSplit() 0 3
";

    #[test]
    fn text_round_trip() {
        let forest = parse_random_forest(FOREST).unwrap();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest.trees()[0].len(), 3);
        assert_eq!(forest.trees()[1].indices(), &[2, 2, 0]);
        assert_eq!(forest.to_string(), FOREST);
    }

    #[test]
    fn single_tree_becomes_a_forest() {
        let tree_text = FOREST.split_once("forest_size: 2\n").unwrap().1;
        let tree_text = &tree_text[..tree_text.rfind("binary_decision_tree").unwrap()];
        let forest = parse_random_forest_or_tree(tree_text).unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest.class_count(), 2);
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let text = format!("{FOREST}vertex: 1 [] NoSplit() 0 1\n");
        assert!(matches!(parse_random_forest(&text), Err(Error::Parse { line: 17, .. })));
    }

    #[test]
    fn file_round_trip() {
        let forest = parse_random_forest(FOREST).unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        save_random_forest(file.path(), &forest).unwrap();
        assert_eq!(load_random_forest(file.path()).unwrap(), forest);
    }
}
