use std::fmt;
use std::fs;
use std::path::Path;

use super::Dataset;
use crate::core::error::{Error, Result};
use crate::core::missing::is_missing;
use crate::utils::text::{join, parse_sequence, parse_value, strip_key};

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "dataset: 1.0")?;
        writeln!(f, "category_counts: {}", join(self.category_counts()))?;
        if let Some(names) = self.feature_names() {
            writeln!(f, "features: {}", names.join(" "))?;
        }
        for row in self.rows() {
            let cells: Vec<String> = row
                .iter()
                .map(|&x| {
                    if is_missing(x) {
                        "nan".to_string()
                    } else {
                        x.to_string()
                    }
                })
                .collect();
            writeln!(f, "{}", cells.join(" "))?;
        }
        Ok(())
    }
}

pub fn parse_dataset(text: &str) -> Result<Dataset> {
    let mut dataset: Option<Dataset> = None;
    let mut feature_names: Option<Vec<String>> = None;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() || strip_key(line, "dataset:").is_some() {
            continue;
        }
        if let Some(rest) = strip_key(line, "category_counts:") {
            dataset = Some(Dataset::new(parse_sequence(rest, line_no)?));
        } else if let Some(rest) = strip_key(line, "features:") {
            feature_names = Some(rest.split_whitespace().map(str::to_string).collect());
        } else {
            let d = dataset
                .as_mut()
                .ok_or_else(|| Error::parse(line_no, "row found before category_counts"))?;
            let row: Vec<f64> = line
                .split_whitespace()
                .map(|token| parse_value(token, line_no))
                .collect::<Result<_>>()?;
            d.push_row(&row).map_err(|e| Error::parse(line_no, e.to_string()))?;
        }
    }

    let mut dataset = dataset.ok_or_else(|| Error::parse(0, "missing category_counts"))?;
    if let Some(names) = feature_names {
        dataset
            .set_feature_names(names)
            .map_err(|e| Error::parse(0, format!("features: {e}")))?;
    }
    Ok(dataset)
}

pub fn load_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let text = fs::read_to_string(path)?;
    parse_dataset(&text)
}

pub fn save_dataset(path: impl AsRef<Path>, dataset: &Dataset) -> Result<()> {
    fs::write(path, dataset.to_string())?;
    Ok(())
}
