//! # Error Handling for Generated Endpoints
//!
//! Two error types live here:
//! - [`CrudError`]: what a caller sees. Each one becomes an `{message, code}` entry
//!   in the response envelope.
//! - [`StoreError`]: what a persistence backend reports. Driver errors are
//!   classified into unique and foreign-key violations so the generator can word
//!   them for the model at hand.
//!
//! ## Philosophy
//!
//! **Never expose internal errors to users**. Database failures other than
//! constraint violations are logged server-side and reported with a generic
//! message.
//!
//! ## Logging
//!
//! Internal errors are logged using the `tracing` crate when they are turned into
//! envelope entries. Install a subscriber in the host application to see them:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt()
//!     .with_target(false)
//!     .compact()
//!     .init();
//! ```

use crate::envelope::ErrorEntry;
use crate::params::display_value;
use axum::http::StatusCode;
use sea_orm::{DbErr, SqlErr};
use serde_json::Value;
use std::fmt;

/// Error reported to the caller inside the envelope's `errors` list.
#[derive(Debug)]
pub enum CrudError {
    /// 404 Not Found - a referenced record or the target record doesn't exist
    NotFound {
        /// User-facing error message
        message: String,
    },

    /// 400 Bad Request - parameters don't match the schema
    BadRequest {
        /// User-facing error message
        message: String,
    },

    /// Constraint violation while persisting. The code is configurable per model.
    Constraint {
        /// User-facing error message
        message: String,
        status: StatusCode,
    },

    /// 500 Internal Server Error - store failure (details logged, not exposed)
    Database {
        /// User-facing generic message
        message: String,
        /// Internal error (logged, not sent to user)
        internal: StoreError,
    },
}

impl CrudError {
    /// A foreign-key value that does not resolve to a record of the referenced model.
    pub fn related_not_found(field: &str, value: &Value) -> Self {
        Self::NotFound {
            message: format!("{field} with id: {} was not found", display_value(value)),
        }
    }

    /// The record addressed by the primary key does not exist.
    pub fn record_not_found(model: &str, key: &Value) -> Self {
        Self::NotFound {
            message: format!("{model} with key: {} was not found", display_value(key)),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn invalid_value(field: &str, value: &Value) -> Self {
        Self::bad_request(format!(
            "{field} has an invalid value: {}",
            display_value(value)
        ))
    }

    pub fn constraint(message: impl Into<String>, status: StatusCode) -> Self {
        Self::Constraint {
            message: message.into(),
            status,
        }
    }

    /// Wrap a store failure. The store error is logged, never sent to the user.
    pub fn database(err: StoreError) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    /// Get the status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Constraint { status, .. } => *status,
            Self::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the user-facing error message (sanitized)
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::NotFound { message }
            | Self::BadRequest { message }
            | Self::Constraint { message, .. }
            | Self::Database { message, .. } => message,
        }
    }

    /// Log internal error details (not sent to user)
    fn log_internal(&self) {
        match self {
            Self::Database { internal, .. } => {
                tracing::error!(error = %internal, "Database error occurred");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "CRUD error"
                );
            }
        }
    }
}

impl fmt::Display for CrudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.user_message())
    }
}

impl std::error::Error for CrudError {}

impl From<CrudError> for ErrorEntry {
    fn from(err: CrudError) -> Self {
        err.log_internal();
        ErrorEntry {
            code: err.status_code().as_u16(),
            message: err.user_message().to_string(),
        }
    }
}

/// Failure reported by a [`Store`](crate::store::Store) backend.
#[derive(Debug)]
pub enum StoreError {
    /// The addressed record does not exist.
    NotFound(String),
    /// A unique value is already taken.
    UniqueViolation(String),
    /// A reference points nowhere, or a referenced record still has dependents.
    ForeignKeyViolation(String),
    /// Any other database error.
    Database(DbErr),
    /// Backend failure that isn't a database error (poisoned lock, bad statement).
    Backend(String),
}

impl StoreError {
    /// Unique and foreign-key violations are reported to callers; everything else is internal.
    #[must_use]
    pub fn is_constraint(&self) -> bool {
        matches!(self, Self::UniqueViolation(_) | Self::ForeignKeyViolation(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(detail) => write!(f, "record not found: {detail}"),
            Self::UniqueViolation(detail) => write!(f, "unique constraint violated: {detail}"),
            Self::ForeignKeyViolation(detail) => {
                write!(f, "foreign key constraint violated: {detail}")
            }
            Self::Database(err) => write!(f, "{err}"),
            Self::Backend(detail) => f.write_str(detail),
        }
    }
}

impl std::error::Error for StoreError {}

/// Convert SeaORM `DbErr` to `StoreError`
///
/// **Conversion Rules:**
/// - Unique constraint violations → `UniqueViolation`
/// - Foreign key constraint violations → `ForeignKeyViolation`
/// - `DbErr::RecordNotFound` → `NotFound`
/// - All other `DbErr` variants → `Database`
impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => Self::UniqueViolation(detail),
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                Self::ForeignKeyViolation(detail)
            }
            _ => match err {
                DbErr::RecordNotFound(detail) => Self::NotFound(detail),
                other => Self::Database(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_related_not_found_message() {
        let err = CrudError::related_not_found("author_id", &json!(999));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.user_message(), "author_id with id: 999 was not found");
    }

    #[test]
    fn test_record_not_found_message() {
        let err = CrudError::record_not_found("Book", &json!("abc"));
        assert_eq!(err.user_message(), "Book with key: abc was not found");
    }

    #[test]
    fn test_constraint_uses_configured_status() {
        let err = CrudError::constraint("Book could not be created", StatusCode::CONFLICT);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_database_error_is_sanitized() {
        let err = CrudError::database(StoreError::Backend("disk on fire".to_string()));
        let entry = ErrorEntry::from(err);
        assert_eq!(entry.code, 500);
        assert_eq!(entry.message, "A database error occurred");
    }

    #[test]
    fn test_entry_from_bad_request() {
        let entry = ErrorEntry::from(CrudError::invalid_value("price", &json!("cheap")));
        assert_eq!(entry.code, 400);
        assert_eq!(entry.message, "price has an invalid value: cheap");
    }

    #[test]
    fn test_dberr_record_not_found_conversion() {
        let err: StoreError = DbErr::RecordNotFound("book not found".to_string()).into();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(!err.is_constraint());
    }

    #[test]
    fn test_dberr_custom_becomes_database() {
        let err: StoreError = DbErr::Custom("Something went wrong".to_string()).into();
        assert!(matches!(err, StoreError::Database(_)));
        assert!(err.to_string().contains("Something went wrong"));
    }

    #[test]
    fn test_constraint_classification() {
        assert!(StoreError::UniqueViolation("isbn".to_string()).is_constraint());
        assert!(StoreError::ForeignKeyViolation("author_id".to_string()).is_constraint());
        assert!(!StoreError::Backend("lock".to_string()).is_constraint());
    }
}
