pub mod db;
pub mod error;
pub mod logging;
pub mod matching;
pub mod merge;
pub mod review;

pub const TARGET_DB: &str = "db_query";

pub use error::DedupeError;
pub use matching::scanner::check_for_duplicates;
pub use merge::merge_clients;
pub use review::{dismiss_duplicate, get_pending_duplicates, save_potential_duplicates};
