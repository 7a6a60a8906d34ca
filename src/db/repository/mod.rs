//! Repository Module
//!
//! CRUD and transactional primitives over the SQLite store. Functions take
//! `&SqlitePool` for standalone reads/writes and `&mut SqliteConnection`
//! where they must compose into a caller-owned transaction.

pub mod cancellation;
pub mod coupon;
pub mod design;
pub mod device;
pub mod fabric_color;
pub mod notification;
pub mod order;
pub mod payment;
pub mod settings;
pub mod user;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound("row not found".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Duplicate(db.message().to_string())
            }
            _ => RepoError::Database(err.to_string()),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
