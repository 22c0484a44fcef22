//! Database access layer.

mod models;
mod pool;
mod property;

pub use pool::{AsyncSqliteConnection, DieselError, SqlitePool};
pub use property::{cost_per_area, PropertyRepository, UpsertOutcome};
