/// Application Error Handling
///
/// Every fallible path in the service returns `AppError`. The enum keeps
/// domain-specific failures in their own sub-types and maps each of them to
/// exactly one HTTP status:
///
/// | variant                                   | status |
/// |-------------------------------------------|--------|
/// | `Validation`, `Auth(InvalidRecoveryToken)`| 400    |
/// | `Auth(..)`                                | 401    |
/// | `Forbidden`                               | 403    |
/// | `NotFound`                                | 404    |
/// | `Conflict`, unique violations             | 409    |
/// | `Auth(PasswordChangeRequired)`            | 423    |
/// | `RateLimited`                             | 429    |
/// | storage, config, email, internal          | 5xx    |
///
/// Server-side failures are logged with full detail and reach the client as
/// a generic message.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

use crate::logger::current_request_id;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone)]
pub enum ValidationError {
    MissingField(String),
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    OutOfRange(String),
    SuspiciousContent(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingField(field) => write!(f, "{} is required", field),
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::OutOfRange(field) => write!(f, "{} is out of range", field),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains suspicious content", field)
            }
        }
    }
}

impl StdError for ValidationError {}

/// Database operation errors
#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    QueryExecution(String),
    ConnectionPool(String),
    Migration(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => {
                write!(f, "Duplicate entry: {}", msg)
            }
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::Migration(msg) => write!(f, "Migration error: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Email service errors
#[derive(Debug, Clone)]
pub enum EmailError {
    SendFailed(String),
    InvalidRecipient(String),
    ServiceUnavailable(String),
}

impl fmt::Display for EmailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailError::SendFailed(msg) => write!(f, "Failed to send email: {}", msg),
            EmailError::InvalidRecipient(msg) => write!(f, "Invalid recipient: {}", msg),
            EmailError::ServiceUnavailable(msg) => {
                write!(f, "Email service unavailable: {}", msg)
            }
        }
    }
}

impl StdError for EmailError {}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

/// Authentication errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown email or wrong password. Both cases share this variant.
    InvalidCredentials,
    TokenExpired,
    TokenInvalid,
    MissingToken,
    /// Handler reached without an identity attached.
    Unauthenticated,
    /// Password-reset or email-verify token unknown or expired.
    InvalidRecoveryToken,
    /// Provisioned agent still holding a temporary password.
    PasswordChangeRequired,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid email or password"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::TokenInvalid => write!(f, "Invalid token"),
            AuthError::MissingToken => write!(f, "Missing authentication token"),
            AuthError::Unauthenticated => write!(f, "Authentication required"),
            AuthError::InvalidRecoveryToken => write!(f, "Invalid or expired token"),
            AuthError::PasswordChangeRequired => {
                write!(f, "Password change required before continuing")
            }
        }
    }
}

impl StdError for AuthError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    RateLimited(String),
    Database(DatabaseError),
    Email(EmailError),
    Config(ConfigError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Email(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }
}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        AppError::Email(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            // 23505: unique_violation
            if db_err.code().as_deref() == Some("23505") {
                return AppError::Database(DatabaseError::UniqueConstraintViolation(
                    db_err.message().to_string(),
                ));
            }
        }

        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                AppError::Database(DatabaseError::ConnectionPool(err.to_string()))
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                AppError::Database(DatabaseError::ConnectionPool(err.to_string()))
            }
            sqlx::Error::Database(_) | sqlx::Error::ColumnDecode { .. } => {
                AppError::Database(DatabaseError::QueryExecution(err.to_string()))
            }
            _ => AppError::Database(DatabaseError::UnexpectedError(err.to_string())),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(DatabaseError::Migration(err.to_string()))
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl AppError {
    /// Status, machine-readable code and client-safe message.
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),

            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    e.to_string(),
                ),
                AuthError::TokenExpired | AuthError::TokenInvalid => (
                    StatusCode::UNAUTHORIZED,
                    "TOKEN_INVALID",
                    "Invalid or expired token".to_string(),
                ),
                AuthError::MissingToken | AuthError::Unauthenticated => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", e.to_string())
                }
                AuthError::InvalidRecoveryToken => {
                    (StatusCode::BAD_REQUEST, "INVALID_TOKEN", e.to_string())
                }
                AuthError::PasswordChangeRequired => (
                    StatusCode::LOCKED,
                    "PASSWORD_CHANGE_REQUIRED",
                    e.to_string(),
                ),
            },

            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::RateLimited(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", msg.clone())
            }

            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => (
                    StatusCode::CONFLICT,
                    "DUPLICATE_ENTRY",
                    "Resource already exists".to_string(),
                ),
                DatabaseError::ConnectionPool(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service temporarily unavailable".to_string(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SERVER_ERROR",
                    "Internal server error".to_string(),
                ),
            },

            AppError::Email(_) | AppError::Config(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERVER_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }
}

impl AppError {
    fn to_body(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = self.classify();
        let body = ErrorResponse::new(
            request_id.to_string(),
            message,
            code.to_string(),
            status.as_u16(),
        );
        (status, body)
    }

    fn log(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(request_id = request_id, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Forbidden(_) | AppError::NotFound(_) | AppError::Conflict(_) => {
                tracing::info!(request_id = request_id, error = %self, "Request rejected");
            }
            AppError::RateLimited(_) => {
                tracing::warn!(request_id = request_id, error = %self, "Request throttled");
            }
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                tracing::warn!(request_id = request_id, error = %self, "Duplicate entry attempt");
            }
            AppError::Database(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::Email(e) => {
                tracing::error!(request_id = request_id, error = %e, "Email service error");
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = current_request_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.log(&request_id);

        let (status, body) = self.to_body(&request_id);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.classify().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::MissingField("email".to_string());
        assert_eq!(err.to_string(), "email is required");
    }

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (
                AppError::Validation(ValidationError::MissingField("email".to_string())),
                400,
            ),
            (AppError::Auth(AuthError::InvalidCredentials), 401),
            (AppError::Auth(AuthError::MissingToken), 401),
            (AppError::Auth(AuthError::InvalidRecoveryToken), 400),
            (AppError::Auth(AuthError::PasswordChangeRequired), 423),
            (AppError::Forbidden("role".to_string()), 403),
            (AppError::not_found("property"), 404),
            (AppError::Conflict("state".to_string()), 409),
            (AppError::RateLimited("slow down".to_string()), 429),
            (
                AppError::Database(DatabaseError::UniqueConstraintViolation("x".to_string())),
                409,
            ),
            (AppError::Internal("boom".to_string()), 500),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status_code().as_u16(), expected, "{:?}", err);
        }
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err = AppError::Database(DatabaseError::QueryExecution(
            "relation users does not exist".to_string(),
        ));
        let (_, body) = err.to_body("req-1");
        assert_eq!(body.message, "Internal server error");
        assert_eq!(body.code, "SERVER_ERROR");
    }

    #[test]
    fn test_error_response_creation() {
        let response = ErrorResponse::new(
            "test-123".to_string(),
            "Test error".to_string(),
            "TEST_ERROR".to_string(),
            400,
        );

        assert_eq!(response.error_id, "test-123");
        assert_eq!(response.code, "TEST_ERROR");
        assert_eq!(response.status, 400);
    }
}
