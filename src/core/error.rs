use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown {kind} '{value}'")]
    UnknownChoice { kind: &'static str, value: String },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("cannot apply an undefined split")]
    UndefinedSplit,

    #[error("subset splits can handle at most {max} categories, variable {variable} has {count}")]
    TooManyCategories {
        variable: usize,
        count: u32,
        max: u32,
    },

    #[error("value {value} of variable {variable} is not a valid category")]
    InvalidCategory { variable: usize, value: f64 },

    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),

    #[error("{0} nodes do not support sampling")]
    UnsupportedSampling(&'static str),

    #[error("expected {expected} values, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("invalid circuit: {0}")]
    InvalidCircuit(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("{0} is empty")]
    Empty(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
