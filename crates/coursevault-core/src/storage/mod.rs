pub mod models;
mod queries;
mod sqlite;

pub use models::*;
pub use sqlite::Database;
