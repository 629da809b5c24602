//! Postgres store error types.

use uuid::Uuid;

/// Errors raised by the Postgres store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    /// Migration failure at startup.
    #[error("Migration failed")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A referenced entity row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// A constraint violation during an upsert; the batch is aborted
    /// without a partial commit.
    #[error("Data integrity violation: {0}")]
    Integrity(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        StoreError::NotFound { entity, id }
    }
}
