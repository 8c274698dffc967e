use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;

use genforest::core::Dataset;
use genforest::core::dataset::{
    category_fractions, load_dataset, make_dataset_from_distributions, make_random_dataset,
    mean_standard_deviation, save_dataset,
};
use genforest::core::distributions::parse_distribution_list;
use genforest::decision_trees::{
    GainFunction, learn_decision_tree, save_decision_tree, vertex_report,
};
use genforest::probabilistic_circuits::{
    CircuitEvaluator, ProbabilisticCircuit, build_generative_forest, expand_sum_split_nodes,
    is_decomposable, is_normalized, is_smooth, is_valid, load_probabilistic_circuit,
    sample_dataset, save_probabilistic_circuit,
};
use genforest::random_forests::{
    ExecutionMode, KFold, RandomForest, accuracy, accuracy_parallel, learn_random_forest,
    parse_random_forest_or_tree, save_random_forest,
};
use genforest::ui::cli::args::{
    AccuracyArgs, BuildGefArgs, CheckArgs, Cli, Command, DatasetInfoArgs, EvaluateArgs,
    ExpandSumSplitArgs, LearnForestArgs, LearnTreeArgs, MakeDatasetArgs, SampleArgs, SchemaArgs,
};
use genforest::ui::types::{LearningConfig, config_schema, option_specs};
use genforest::utils::memory::{MemorySized, format_bytes};
use genforest::utils::text::{format_number, join_numbers};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level())?;

    match cli.command {
        Command::LearnTree(args) => learn_tree(args),
        Command::LearnForest(args) => learn_forest(args),
        Command::BuildGef(args) => build_gef(args),
        Command::ExpandSumSplit(args) => expand_sum_split(args),
        Command::Check(args) => check(args),
        Command::Evaluate(args) => evaluate(args),
        Command::Sample(args) => sample(args),
        Command::MakeDataset(args) => make_dataset(args),
        Command::DatasetInfo(args) => dataset_info(args),
        Command::Accuracy(args) => print_accuracy(args),
        Command::Schema(args) => schema(args),
    }
}

fn init_logging(level: LevelFilter) -> Result<()> {
    let subscriber = tracing_subscriber::registry().with(level).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false),
    );
    tracing::subscriber::set_global_default(subscriber).context("failed to install the logger")
}

fn read_dataset(path: &Path) -> Result<Dataset> {
    let dataset = load_dataset(path)
        .with_context(|| format!("failed to load dataset {}", path.display()))?;
    info!(
        rows = dataset.len(),
        features = dataset.feature_count(),
        classes = dataset.class_count(),
        "loaded {}",
        path.display()
    );
    Ok(dataset)
}

fn read_forest(path: &Path) -> Result<RandomForest> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_random_forest_or_tree(&text)
        .with_context(|| format!("{} is not a random forest or decision tree", path.display()))
}

fn read_circuit(path: &Path) -> Result<ProbabilisticCircuit> {
    load_probabilistic_circuit(path)
        .with_context(|| format!("failed to load probabilistic circuit {}", path.display()))
}

fn write_circuit(path: &Path, pc: &ProbabilisticCircuit) -> Result<()> {
    save_probabilistic_circuit(path, pc)
        .with_context(|| format!("failed to save probabilistic circuit to {}", path.display()))
}

fn resolve_seed(seed: Option<u64>) -> u64 {
    let seed = seed.unwrap_or_else(rand::random);
    info!(seed, "random generator");
    seed
}

fn report_memory<T: MemorySized>(what: &str, value: &T) {
    let bytes = value.deep_size();
    info!(bytes, "{what} uses {}", format_bytes(bytes));
}

/// `dir/forest.txt` becomes `dir/forest-3.txt`.
fn numbered_path(path: &Path, i: usize) -> PathBuf {
    let stem = path.file_stem().map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{i}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{i}"),
    };
    path.with_file_name(name)
}

fn log_config(config: &LearningConfig) {
    debug!("tree options:\n{}", config.tree);
    debug!(
        split_family = %config.split_family,
        execution_mode = %config.execution_mode,
        "learning options"
    );
}

fn learn_tree(args: LearnTreeArgs) -> Result<()> {
    let dataset = read_dataset(&args.dataset)?;
    let mut config = args.config.learning_config()?;
    config.tree.max_features = dataset.feature_count().max(1);
    config.tree.support_missing_values |= dataset.has_missing_values();
    log_config(&config);

    let seed = resolve_seed(config.seed);
    let gain = GainFunction::Unnormalized(config.tree.impurity_measure);
    let tree = learn_decision_tree(
        &dataset,
        dataset.all_indices(),
        &config.tree,
        config.split_family,
        gain,
        seed,
    )
    .context("failed to learn decision tree")?;
    for line in vertex_report(&tree) {
        debug!("{line}");
    }
    report_memory("decision tree", &tree);

    save_decision_tree(&args.output, &tree)
        .with_context(|| format!("failed to save decision tree to {}", args.output.display()))
}

fn learn_forest(args: LearnForestArgs) -> Result<()> {
    if !(0.0..=1.0).contains(&args.variable_fraction) {
        bail!(
            "the variable fraction must lie in [0, 1], got {}",
            args.variable_fraction
        );
    }
    let dataset = read_dataset(&args.dataset)?;
    let mut config = args.config.learning_config()?;
    let m = dataset.feature_count();
    config.tree.max_features = ((args.variable_fraction * m as f64).round() as usize).max(1);
    config.tree.support_missing_values |= dataset.has_missing_values();
    log_config(&config);
    debug!("forest options:\n{}", config.forest);

    let seed = resolve_seed(config.seed);
    let n = args.max_rows.min(dataset.len());
    let indices: Vec<u32> = (0..n as u32).collect();
    let gain = GainFunction::Unnormalized(config.tree.impurity_measure);
    let learn = |training: &[u32]| -> Result<RandomForest> {
        learn_random_forest(
            &dataset,
            training,
            &config.forest,
            &config.tree,
            config.split_family,
            gain,
            seed,
            config.execution_mode,
        )
        .context("failed to learn random forest")
    };

    if args.folds == 0 {
        let forest = learn(&indices)?;
        for (i, tree) in forest.trees().iter().enumerate() {
            debug!(tree = i, vertices = tree.len(), "learned tree");
        }
        report_memory("random forest", &forest);
        return save_random_forest(&args.output, &forest)
            .with_context(|| format!("failed to save random forest to {}", args.output.display()));
    }

    let kfold = KFold::new(indices, args.folds, seed).context("invalid number of folds")?;
    let mut rng = StdRng::seed_from_u64(seed);
    for i in 0..kfold.len() {
        let (test, training) = kfold.folds(i);
        let forest = learn(&training)?;
        let output = numbered_path(&args.output, i);
        save_random_forest(&output, &forest)
            .with_context(|| format!("failed to save random forest to {}", output.display()))?;
        let score = |indices: &[u32], rng: &mut StdRng| match config.execution_mode {
            ExecutionMode::Sequential => accuracy(&forest, indices, &dataset, rng),
            ExecutionMode::Parallel => accuracy_parallel(&forest, indices, &dataset, rng),
        };
        println!("accuracy test set     {i} = {}", score(&test, &mut rng));
        println!("accuracy training set {i} = {}", score(&training, &mut rng));
    }
    Ok(())
}

fn build_gef(args: BuildGefArgs) -> Result<()> {
    let forest = read_forest(&args.forest)?;
    let dataset = read_dataset(&args.dataset)?;
    let pc = build_generative_forest(&forest, &dataset)
        .context("failed to build generative forest")?;
    report_memory("generative forest", &pc);
    write_circuit(&args.output, &pc)
}

fn expand_sum_split(args: ExpandSumSplitArgs) -> Result<()> {
    let mut pc = read_circuit(&args.input)?;
    expand_sum_split_nodes(&mut pc).context("failed to expand sum-split nodes")?;
    write_circuit(&args.output, &pc)
}

fn check(args: CheckArgs) -> Result<()> {
    let pc = read_circuit(&args.input)?;
    println!("is_smooth = {}", is_smooth(&pc));
    println!("is_decomposable = {}", is_decomposable(&pc));
    println!("is_normalized = {}", is_normalized(&pc));
    println!("is_valid = {}", is_valid(&pc));
    Ok(())
}

fn evaluate(args: EvaluateArgs) -> Result<()> {
    let pc = read_circuit(&args.input)?;
    let dataset = read_dataset(&args.dataset)?;
    let values = CircuitEvaluator::new(&pc)
        .evi_all(&dataset, args.log)
        .context("failed to evaluate the dataset")?;
    for value in values {
        println!("{}", format_number(value));
    }
    Ok(())
}

fn sample(args: SampleArgs) -> Result<()> {
    let pc = read_circuit(&args.input)?;
    let mut rng = StdRng::seed_from_u64(resolve_seed(args.seed));
    let dataset = sample_dataset(&pc, args.size, &mut rng).context("failed to sample circuit")?;
    save_dataset(&args.output, &dataset)
        .with_context(|| format!("failed to save dataset to {}", args.output.display()))
}

fn make_dataset(args: MakeDatasetArgs) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(resolve_seed(args.seed));
    let dataset = match &args.distributions {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let distributions = parse_distribution_list(&text)
                .with_context(|| format!("invalid distributions in {}", path.display()))?;
            make_dataset_from_distributions(&distributions, args.rows, &mut rng)
        }
        None => make_random_dataset(args.rows, args.features, &mut rng),
    };
    save_dataset(&args.output, &dataset)
        .with_context(|| format!("failed to save dataset to {}", args.output.display()))
}

fn dataset_info(args: DatasetInfoArgs) -> Result<()> {
    let dataset = read_dataset(&args.dataset)?;
    let indices = dataset.all_indices();
    let m = dataset.feature_count();
    let missing = |v: usize| match dataset.missing_value_count(v) {
        0 => String::new(),
        k => format!(" |missing| = {k}"),
    };

    println!("dataset: {}", args.dataset.display());
    println!("number of samples: {}", dataset.len());
    println!("number of features: {m}");
    for v in 0..m {
        if dataset.is_categorical(v) {
            let fractions = category_fractions(&dataset, &indices, v);
            println!(
                "feature {v}: ncat = {} fractions = [{}]{}",
                dataset.category_count(v),
                join_numbers(&fractions),
                missing(v)
            );
        } else {
            let (mean, sd) = mean_standard_deviation(&dataset, &indices, v);
            println!(
                "feature {v}: ncat = 0 mean = {} stddev = {}{}",
                format_number(mean),
                format_number(sd),
                missing(v)
            );
        }
    }
    let fractions = category_fractions(&dataset, &indices, m);
    println!(
        "class: ncat = {} fractions = [{}]{}",
        dataset.class_count(),
        join_numbers(&fractions),
        missing(m)
    );
    report_memory("dataset", &dataset);
    Ok(())
}

fn print_accuracy(args: AccuracyArgs) -> Result<()> {
    let forest = read_forest(&args.model)?;
    let dataset = read_dataset(&args.dataset)?;
    if forest.category_counts() != dataset.category_counts() {
        bail!(
            "the model was learned on category counts {:?}, the dataset has {:?}",
            forest.category_counts(),
            dataset.category_counts()
        );
    }
    let mut rng = StdRng::seed_from_u64(resolve_seed(args.seed));
    let score = accuracy_parallel(&forest, &dataset.all_indices(), &dataset, &mut rng);
    println!("accuracy = {score}");
    Ok(())
}

fn schema(args: SchemaArgs) -> Result<()> {
    if !args.list {
        let text = serde_json::to_string_pretty(&config_schema())
            .context("failed to serialize the schema")?;
        println!("{text}");
        return Ok(());
    }
    for spec in option_specs()? {
        let mut line = format!("{} ({:?})", spec.path, spec.kind);
        if let Some(default) = &spec.default {
            line.push_str(&format!(" default = {default}"));
        }
        if let Some(allowed) = &spec.allowed {
            line.push_str(&format!(" one of {}", allowed.join("|")));
        }
        match (spec.min, spec.max) {
            (Some(min), Some(max)) => line.push_str(&format!(" in [{min}, {max}]")),
            (Some(min), None) => line.push_str(&format!(" >= {min}")),
            (None, Some(max)) => line.push_str(&format!(" <= {max}")),
            (None, None) => {}
        }
        println!("{line}: {}", spec.description.as_deref().unwrap_or(&spec.title));
    }
    Ok(())
}
