use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A second preference row for the same user and notification type.
    #[error("Uniqueness violation: {0}")]
    UniqueViolation(String),
    /// Reference to a user or child that does not exist.
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("Missing required value: {0}")]
    NotNullViolation(String),
    #[error("No user with telegram id {0}")]
    UserNotFound(i64),
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl StoreError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StoreError::UniqueViolation(_)
                | StoreError::ForeignKeyViolation(_)
                | StoreError::NotNullViolation(_)
        )
    }
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => {
                return StoreError::UniqueViolation(msg);
            }
            Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
                return StoreError::ForeignKeyViolation(msg);
            }
            _ => {}
        }

        // sea-orm only classifies unique and foreign key errors; the rest is matched on
        // the driver message (SQLite first, then Postgres).
        let msg = err.to_string();
        if msg.contains("UNIQUE constraint failed") || msg.contains("duplicate key value") {
            StoreError::UniqueViolation(msg)
        } else if msg.contains("FOREIGN KEY constraint failed")
            || msg.contains("violates foreign key constraint")
        {
            StoreError::ForeignKeyViolation(msg)
        } else if msg.contains("NOT NULL constraint failed")
            || msg.contains("violates not-null constraint")
        {
            StoreError::NotNullViolation(msg)
        } else {
            StoreError::Database(err)
        }
    }
}
