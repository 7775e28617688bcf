use thiserror::Error;

/// Unified error type for database operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// Unique constraint violation
    #[error("Unique constraint violation")]
    UniqueViolation {
        table: Option<String>,
        column: Option<String>,
        message: String,
    },

    /// Foreign key constraint violation
    #[error("Foreign key constraint violation")]
    ForeignKeyViolation { message: String },

    /// Check constraint violation
    #[error("Check constraint violation")]
    CheckViolation { message: String },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convert from sqlx::Error using proper sqlx error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                if db_err.is_unique_violation() {
                    let (table, column) = match failed_column(&message) {
                        Some((table, column)) => (Some(table), Some(column)),
                        None => (None, None),
                    };
                    DbError::UniqueViolation { table, column, message }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation { message }
                } else if db_err.is_check_violation() {
                    DbError::CheckViolation { message }
                } else {
                    // All other database errors are non-recoverable - convert to anyhow
                    DbError::Other(anyhow::Error::from(err))
                }
            }
            // All other sqlx errors are non-recoverable - convert to anyhow with context
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Extract the offending `table.column` from a SQLite constraint message.
///
/// SQLite reports unique violations as "UNIQUE constraint failed: tools.endpoint" and does not
/// expose the constraint name, so this is the only place the column can be recovered from.
fn failed_column(message: &str) -> Option<(String, String)> {
    let (_, target) = message.split_once("constraint failed: ")?;
    // Composite constraints list every column; the first one identifies the table
    let first = target.split(',').next()?.trim();
    let (table, column) = first.split_once('.')?;
    Some((table.to_string(), column.to_string()))
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;
