//! Persistence errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Any failure reported by SQLite, including unreadable rows
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("Schema setup failed at {step}: {source}")]
    Migration {
        step: &'static str,
        #[source]
        source: sqlx::Error,
    },
}
