use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod builder;
pub mod storage;

pub use builder::{ErrorBuilder, ErrorItem};
pub use storage::{parse_storage_error, StorageErrorInfo};

/// Error classification used when logging an error on its way out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Failures of the service itself
    Critical,
    /// Failures of a dependency the caller cannot fix
    Important,
    /// Caller mistakes
    Minor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Storage driver and connection issues
    Database,
    /// Query string, body and path validation
    Validation,
    /// Configuration and setup issues
    Config,
    /// Request shape problems (missing headers etc.)
    Request,
}

/// Common trait for all custom error types in the application
pub trait AppError: std::error::Error + Send + Sync + 'static {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get the error code for frontend handling
    fn error_code(&self) -> &'static str;

    fn error_category(&self) -> ErrorCategory;

    fn error_severity(&self) -> ErrorSeverity;

    /// Log the error with a level matching its severity
    fn log(&self) {
        match self.error_severity() {
            ErrorSeverity::Critical => tracing::error!(
                category = ?self.error_category(),
                code = self.error_code(),
                "{}",
                self
            ),
            ErrorSeverity::Important => tracing::warn!(
                category = ?self.error_category(),
                code = self.error_code(),
                "{}",
                self
            ),
            ErrorSeverity::Minor => tracing::debug!(
                category = ?self.error_category(),
                code = self.error_code(),
                "{}",
                self
            ),
        }
    }
}

/// Macro to implement IntoResponse for all AppError types
/// This provides consistent HTTP response formatting
macro_rules! impl_into_response {
    ($error_type:ty) => {
        impl axum::response::IntoResponse for $error_type {
            fn into_response(self) -> axum::response::Response {
                use crate::errors::AppError;
                use axum::response::Json;
                use serde_json::json;

                self.log();

                let status = self.status_code();
                let body = Json(json!({
                    "error": self.user_message(),
                    "code": self.error_code(),
                    "status": status.as_u16()
                }));

                (status, body).into_response()
            }
        }
    };
}

pub(crate) use impl_into_response;

/// Generic API error for cases where specific error types don't apply
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Resource not found")]
    NotFound,

    #[error("Internal server error: {message}")]
    InternalServerError { message: String },
}

impl AppError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn user_message(&self) -> String {
        match self {
            ApiError::BadRequest { message } => message.clone(),
            ApiError::NotFound => "Resource not found".to_string(),
            ApiError::InternalServerError { .. } => "An internal error occurred".to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "BAD_REQUEST",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::InternalServerError { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    fn error_category(&self) -> ErrorCategory {
        match self {
            ApiError::BadRequest { .. } | ApiError::NotFound => ErrorCategory::Validation,
            ApiError::InternalServerError { .. } => ErrorCategory::Config,
        }
    }

    fn error_severity(&self) -> ErrorSeverity {
        match self {
            ApiError::InternalServerError { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::Minor,
        }
    }
}

impl_into_response!(ApiError);

impl ApiError {
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::BadRequest { message: message.into() }
    }

    pub fn internal_server_error<S: Into<String>>(message: S) -> Self {
        Self::InternalServerError { message: message.into() }
    }
}

/// Errors raised while bringing up the storage connection
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("need config mongodb url")]
    MissingUrl,

    #[error("mongodb url '{url}' does not name a database")]
    MissingDatabaseName { url: String },

    #[error("failed to connect to mongodb: {0}")]
    Connection(#[from] mongodb::error::Error),
}

impl AppError for DatabaseError {
    fn status_code(&self) -> StatusCode {
        StatusCode::SERVICE_UNAVAILABLE
    }

    fn user_message(&self) -> String {
        "Database is not available".to_string()
    }

    fn error_code(&self) -> &'static str {
        match self {
            DatabaseError::MissingUrl => "DATABASE_MISSING_URL",
            DatabaseError::MissingDatabaseName { .. } => "DATABASE_MISSING_NAME",
            DatabaseError::Connection(_) => "DATABASE_CONNECTION_FAILED",
        }
    }

    fn error_category(&self) -> ErrorCategory {
        match self {
            DatabaseError::Connection(_) => ErrorCategory::Database,
            _ => ErrorCategory::Config,
        }
    }

    fn error_severity(&self) -> ErrorSeverity {
        match self {
            DatabaseError::Connection(_) => ErrorSeverity::Important,
            _ => ErrorSeverity::Critical,
        }
    }
}

impl_into_response!(DatabaseError);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(ApiError::bad_request("bad").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::internal_server_error("boom").into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_database_error_classification() {
        let missing = DatabaseError::MissingUrl;
        assert_eq!(missing.error_category(), ErrorCategory::Config);
        assert_eq!(missing.error_severity(), ErrorSeverity::Critical);

        let driver = mongodb::error::Error::custom("socket closed");
        let connection = DatabaseError::from(driver);
        assert_eq!(connection.error_category(), ErrorCategory::Database);
        assert_eq!(connection.error_severity(), ErrorSeverity::Important);
        assert_eq!(connection.error_code(), "DATABASE_CONNECTION_FAILED");
    }
}
