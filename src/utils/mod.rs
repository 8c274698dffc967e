pub mod math;
pub mod memory;
pub mod text;
