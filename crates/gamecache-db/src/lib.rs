//! SQLite persistence for the depot catalog and download history.
//!
//! `Database` runs every query on a single dedicated thread reached through
//! a channel, so SQLite's single-writer constraint is never fought against
//! and the Tokio runtime is never blocked on disk I/O.
//!
//! ```ignore
//! let db = Database::open(path).await?;
//! let count = db.call(|conn| queries::depot_mappings::count(conn)).await?;
//! ```
//!
//! Only SQL queries and row mapping should run inside `db.call()`.

mod error;
mod executor;
mod migrations;
mod models;
pub mod queries;

pub use error::{DatabaseError, DatabaseResult};
pub use executor::Database;
pub use migrations::run_migrations;
pub use models::*;
