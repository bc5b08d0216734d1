//! Database-specific error types and conversions.

use hermod_core::error::HermodError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
}

impl From<DbError> for HermodError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => HermodError::NotFound { entity, id },
            DbError::UniqueViolation(message) => HermodError::Validation { message },
            other => HermodError::Database(other.to_string()),
        }
    }
}

/// Translate a raw SurrealDB failure into a unique-violation error when
/// a unique index rejected the write; duplicate checks race with
/// concurrent creates, so the index is the authority of last resort.
pub(crate) fn map_write_error(err: surrealdb::Error, what: &str) -> DbError {
    let text = err.to_string();
    if text.contains("already contains") {
        DbError::UniqueViolation(format!("{what} already exists"))
    } else {
        DbError::Surreal(err)
    }
}
