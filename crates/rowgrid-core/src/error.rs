//! Core error types.

use thiserror::Error;

/// Core gateway errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Database driver error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Schema discovery found no columns for the table.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// The table declares no primary key.
    #[error("table {0} has no primary key")]
    NoPrimaryKey(String),

    /// A column referenced by the caller is not part of the table.
    #[error("unknown column {column} on table {table}")]
    UnknownColumn {
        /// Table the lookup ran against.
        table: String,
        /// The column that failed the lookup.
        column: String,
    },

    /// A write payload that cannot be applied.
    #[error("invalid write payload: {0}")]
    InvalidPayload(String),
}
