use sqlx::SqlitePool;

/// Executes the query structs in [`crate::entities`] against a SQLite pool.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: SqlitePool,
}
