pub mod dataset;
pub mod distributions;
pub mod error;
pub mod interval;
pub mod missing;

pub use dataset::Dataset;
pub use error::{Error, Result};
pub use interval::Interval;
pub use missing::{MISSING, is_missing};
