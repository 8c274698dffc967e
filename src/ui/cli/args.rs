use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use serde_json::{Map, Value};
use tracing::level_filters::LevelFilter;

use crate::ui::types::LearningConfig;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Learn decision trees and random forests, and turn them into generative forests"
)]
pub struct Cli {
    /// More output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Learn a decision tree from a dataset
    LearnTree(LearnTreeArgs),
    /// Learn a random forest from a dataset
    LearnForest(LearnForestArgs),
    /// Build a generative forest from a random forest or decision tree
    BuildGef(BuildGefArgs),
    /// Replace every sum-split node of a circuit by a sum over indicators
    ExpandSumSplit(ExpandSumSplitArgs),
    /// Report whether a circuit is smooth, decomposable, normalized and valid
    Check(CheckArgs),
    /// Print the likelihood of every row of a dataset under a circuit
    Evaluate(EvaluateArgs),
    /// Draw a dataset from a circuit
    Sample(SampleArgs),
    /// Generate a random dataset
    MakeDataset(MakeDatasetArgs),
    /// Print per-feature statistics of a dataset
    DatasetInfo(DatasetInfoArgs),
    /// Print the accuracy of a decision tree or random forest on a dataset
    Accuracy(AccuracyArgs),
    /// Print the JSON schema of the learning options
    Schema(SchemaArgs),
}

/// Learning options shared by `learn-tree` and `learn-forest`.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// JSON file with learning options
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Override an option (key=value, nested keys with dots, e.g. tree.max_depth=5)
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub params: Vec<KeyValue>,

    /// Seed of the random generator
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,
}

impl ConfigArgs {
    /// Defaults, then the config file, then the `--param` overrides, then `--seed`.
    pub fn learning_config(&self) -> Result<LearningConfig> {
        let mut value = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("config file {} is not valid JSON", path.display()))?
            }
            None => Value::Object(Map::new()),
        };
        apply_overrides(&mut value, &self.params)?;
        if let Some(seed) = self.seed {
            set_path(&mut value, "seed", Value::from(seed))?;
        }
        LearningConfig::from_value(value)
    }
}

#[derive(Debug, Args)]
pub struct LearnTreeArgs {
    /// Dataset to learn from
    #[arg(value_hint = ValueHint::FilePath)]
    pub dataset: PathBuf,

    /// File to save the decision tree to
    #[arg(value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Args)]
pub struct LearnForestArgs {
    /// Dataset to learn from
    #[arg(value_hint = ValueHint::FilePath)]
    pub dataset: PathBuf,

    /// File to save the random forest to
    #[arg(value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Fraction of the features sampled at every node
    #[arg(short = 'f', long, default_value_t = 0.3, value_name = "FRACTION")]
    pub variable_fraction: f64,

    /// Use at most this many leading rows of the dataset
    #[arg(long, default_value_t = 1_000_000, value_name = "N")]
    pub max_rows: usize,

    /// Run a k-fold cross validation and save one forest per fold
    #[arg(long, default_value_t = 0, value_name = "K")]
    pub folds: usize,
}

#[derive(Debug, Args)]
pub struct BuildGefArgs {
    /// Random forest or decision tree file
    #[arg(value_hint = ValueHint::FilePath)]
    pub forest: PathBuf,

    /// Dataset the forest was learned from
    #[arg(value_hint = ValueHint::FilePath)]
    pub dataset: PathBuf,

    /// File to save the generative forest to
    #[arg(value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct ExpandSumSplitArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    #[arg(value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Probabilistic circuit file
    #[arg(value_hint = ValueHint::FilePath)]
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct EvaluateArgs {
    /// Probabilistic circuit file
    #[arg(value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    #[arg(value_hint = ValueHint::FilePath)]
    pub dataset: PathBuf,

    /// Print log-likelihoods
    #[arg(long)]
    pub log: bool,
}

#[derive(Debug, Args)]
pub struct SampleArgs {
    /// Probabilistic circuit file
    #[arg(value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// File to save the samples to
    #[arg(value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// Number of samples
    #[arg(long, value_name = "N")]
    pub size: usize,

    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,
}

#[derive(Debug, Args)]
pub struct MakeDatasetArgs {
    /// File to save the dataset to
    #[arg(value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// Number of rows
    #[arg(long, default_value_t = 100, value_name = "N")]
    pub rows: usize,

    /// Number of features
    #[arg(long, default_value_t = 5, value_name = "M", conflicts_with = "distributions")]
    pub features: usize,

    /// File with one column distribution per line, e.g. NormalDistribution(0,1)
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub distributions: Option<PathBuf>,

    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,
}

#[derive(Debug, Args)]
pub struct DatasetInfoArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    pub dataset: PathBuf,
}

#[derive(Debug, Args)]
pub struct AccuracyArgs {
    /// Random forest or decision tree file
    #[arg(value_hint = ValueHint::FilePath)]
    pub model: PathBuf,

    #[arg(value_hint = ValueHint::FilePath)]
    pub dataset: PathBuf,

    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// List the options as dotted keys instead of printing the schema
    #[arg(long)]
    pub list: bool,
}

#[derive(Clone, Debug)]
pub struct KeyValue {
    key: String,
    value: Value,
}

fn apply_overrides(target: &mut Value, overrides: &[KeyValue]) -> Result<()> {
    for kv in overrides {
        set_path(target, &kv.key, kv.value.clone())
            .with_context(|| format!("failed to set '{}'", kv.key))?;
    }
    Ok(())
}

fn set_path(target: &mut Value, path: &str, new_value: Value) -> Result<()> {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        bail!("empty key is not allowed");
    };

    let mut current = target;
    for seg in parents {
        current = ensure_object(current)?
            .entry((*seg).to_string())
            .or_insert(Value::Null);
    }
    ensure_object(current)?.insert((*last).to_string(), new_value);
    Ok(())
}

fn ensure_object(value: &mut Value) -> Result<&mut Map<String, Value>> {
    if value.is_null() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => Ok(map),
        other => bail!("cannot set nested field on non-object value: {other}"),
    }
}

fn parse_key_value(raw: &str) -> Result<KeyValue, String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| "expected KEY=VALUE".to_string())?;
    let key = key.trim();
    if key.is_empty() {
        return Err("key cannot be empty".to_string());
    }

    Ok(KeyValue {
        key: key.to_string(),
        value: parse_literal(value.trim()),
    })
}

/// JSON literals keep their type, anything else becomes a string.
fn parse_literal(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision_trees::{ImpurityMeasure, SplitFamily};
    use crate::random_forests::ExecutionMode;
    use clap::CommandFactory;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_learn_forest_with_overrides() {
        let cli = Cli::try_parse_from([
            "genforest",
            "learn-forest",
            "data.txt",
            "forest.txt",
            "--param",
            "forest.forest_size=10",
            "--param",
            "execution_mode=parallel",
            "-f",
            "0.5",
            "--seed",
            "3",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_level(), LevelFilter::DEBUG);
        let Command::LearnForest(args) = cli.command else {
            panic!("expected learn-forest");
        };
        assert_eq!(args.dataset, PathBuf::from("data.txt"));
        assert_eq!(args.variable_fraction, 0.5);
        assert_eq!(args.max_rows, 1_000_000);
        assert_eq!(args.folds, 0);

        let config = args.config.learning_config().unwrap();
        assert_eq!(config.forest.forest_size, 10);
        assert_eq!(config.execution_mode, ExecutionMode::Parallel);
        assert_eq!(config.seed, Some(3));
    }

    #[test]
    fn sample_requires_a_size() {
        assert!(Cli::try_parse_from(["genforest", "sample", "pc.txt", "out.txt"]).is_err());
        let cli = Cli::try_parse_from(["genforest", "sample", "pc.txt", "out.txt", "--size", "5"])
            .unwrap();
        assert!(matches!(cli.command, Command::Sample(SampleArgs { size: 5, .. })));
        assert_eq!(cli.log_level(), LevelFilter::WARN);
    }

    #[test]
    fn make_dataset_features_conflict_with_distributions() {
        let args = [
            "genforest",
            "make-dataset",
            "out.txt",
            "--features",
            "3",
            "--distributions",
            "d.txt",
        ];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn config_file_is_layered_under_params() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "tree": {{ "impurity_measure": "entropy", "max_depth": 3 }}, "split_family": "threshold-single", "seed": 1 }}"#
        )
        .unwrap();

        let args = ConfigArgs {
            config: Some(file.path().to_path_buf()),
            params: vec![parse_key_value("tree.max_depth=8").unwrap()],
            seed: None,
        };
        let config = args.learning_config().unwrap();
        assert_eq!(config.tree.impurity_measure, ImpurityMeasure::Entropy);
        assert_eq!(config.tree.max_depth, 8);
        assert_eq!(config.split_family, SplitFamily::ThresholdSingle);
        assert_eq!(config.seed, Some(1));

        let args = ConfigArgs {
            config: Some(file.path().to_path_buf()),
            params: vec![],
            seed: Some(9),
        };
        assert_eq!(args.learning_config().unwrap().seed, Some(9));
    }

    #[test]
    fn bad_overrides_are_reported() {
        let args = ConfigArgs {
            config: None,
            params: vec![parse_key_value("tree.min_samples_leaf=0").unwrap()],
            seed: None,
        };
        assert!(args.learning_config().is_err());

        let args = ConfigArgs {
            config: None,
            params: vec![parse_key_value("tree.impurity_measure=variance").unwrap()],
            seed: None,
        };
        assert!(args.learning_config().is_err());
    }

    #[test]
    fn set_path_creates_nested_objects() {
        let mut v = json!({ "a": 1 });
        set_path(&mut v, "b.c.d", json!(true)).unwrap();
        set_path(&mut v, "a", json!("x")).unwrap();
        assert_eq!(v, json!({ "a": "x", "b": { "c": { "d": true } } }));

        assert!(set_path(&mut v, "a.z", json!(1)).is_err());
        assert!(set_path(&mut v, "..", json!(1)).is_err());
    }

    #[test]
    fn key_values_keep_json_types() {
        let kv = parse_key_value(" tree.max_depth = 5 ").unwrap();
        assert_eq!(kv.key, "tree.max_depth");
        assert_eq!(kv.value, json!(5));
        assert_eq!(parse_key_value("a=gini").unwrap().value, json!("gini"));
        assert_eq!(parse_key_value("a=").unwrap().value, json!(""));
        assert_eq!(parse_key_value("a=false").unwrap().value, json!(false));
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=1").is_err());
    }
}
