// Re-export the Database struct and other public items
pub mod client;
pub mod core;
pub mod duplicate;
mod schema;

// Re-export Database and essential traits
pub use self::core::Database;
pub use self::core::DbUniqueViolationExt;
pub use sqlx::Row;
