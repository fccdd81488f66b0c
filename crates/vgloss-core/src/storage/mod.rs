pub mod content_store;
pub mod models;
pub mod queries;
pub mod sqlite;

pub use content_store::{IndexTransaction, StaleContent};
pub use sqlite::Database;
