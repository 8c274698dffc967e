pub mod config;

pub use config::{LearningConfig, OptionKind, OptionSpec, config_schema, option_specs};
