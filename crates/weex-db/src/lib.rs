//! Database access layer for the WeeWX SQLite schema
//!
//! Reads an existing archive created by WeeWX - NO migrations. The table
//! helpers in [`queries`] exist to seed empty databases, not to evolve one.

pub mod client;
pub mod provider;
pub mod queries;
pub mod schema;

pub use client::*;
pub use schema::*;

use thiserror::Error;
use weex_core::ProviderError;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Unknown observation type: {0}")]
    UnknownObservation(String),

    #[error("No such table: {0}")]
    MissingTable(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for ProviderError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UnknownObservation(obs) | DbError::MissingTable(obs) => {
                ProviderError::UnknownType(obs)
            }
            other => ProviderError::Query(other.to_string()),
        }
    }
}
