pub mod normalizer;
pub mod rules;
pub mod scanner;
pub mod similarity;
pub mod types;

pub use types::*;

// Module-level constants
pub const TARGET_MATCH: &str = "match";
