use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Upstream error: {0}")]
    ProxyError(#[from] ProxyError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn forbidden() -> Self {
        AppError::AuthError(AuthError::Forbidden)
    }

    /// Message sent to clients. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::DatabaseError(DatabaseError::ConnectionError(_))
            | AppError::DatabaseError(DatabaseError::QueryError(_))
            | AppError::InternalError(_)
            | AppError::ConfigError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

// Postgres SQLSTATE codes we translate into client errors
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::DatabaseError(DatabaseError::NotFound),
            sqlx::Error::Database(ref db_err) => match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => AppError::DatabaseError(DatabaseError::Duplicate),
                Some(FOREIGN_KEY_VIOLATION) => {
                    AppError::DatabaseError(DatabaseError::InvalidReference)
                }
                _ => AppError::DatabaseError(DatabaseError::QueryError(err.to_string())),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::DatabaseError(DatabaseError::ConnectionError(err.to_string()))
            }
            _ => AppError::DatabaseError(DatabaseError::QueryError(err.to_string())),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(DatabaseError::MigrationError(err.to_string()))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AppError::AuthError(AuthError::TokenExpired),
            _ => AppError::AuthError(AuthError::InvalidToken),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ProxyError(ProxyError::RequestFailed(err.to_string()))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed with {}: {}", status.as_u16(), self);
        }
        let response = json!({
            "error": {
                "status": status.as_u16(),
                "message": self.public_message()
            }
        });
        HttpResponse::build(status).json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
                AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::Forbidden => StatusCode::FORBIDDEN,
                AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            },
            AppError::ProxyError(e) => match e {
                ProxyError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
                ProxyError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            },
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DatabaseError(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(DatabaseError::Duplicate) => StatusCode::CONFLICT,
            AppError::DatabaseError(DatabaseError::InvalidReference) => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ConfigError(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Too many login attempts, try again later")]
    RateLimited,
}

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Upstream returned status {status}: {message}")]
    ResponseError { status: u16, message: String },

    #[error("Upstream rate limited")]
    RateLimited,

    #[error("Unexpected response format: {0}")]
    InvalidFormat(String),

    #[error("{0} is not configured")]
    NotConfigured(String),
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,

    #[error("Referenced record does not exist")]
    InvalidReference,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::InternalError(_)));

        let config_err = config::ConfigError::NotFound(String::from("key not found"));
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::ConfigError(_)));

        let db_err = sqlx::Error::RowNotFound;
        let app_err: AppError = db_err.into();
        assert!(matches!(app_err, AppError::DatabaseError(DatabaseError::NotFound)));

        let app_err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(
            app_err,
            AppError::DatabaseError(DatabaseError::ConnectionError(_))
        ));
    }

    #[test]
    fn test_error_status_codes() {
        let err = AppError::AuthError(AuthError::InvalidCredentials);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = AppError::AuthError(AuthError::MissingToken);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = AppError::forbidden();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err = AppError::AuthError(AuthError::RateLimited);
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let err = AppError::validation("invalid input");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = AppError::DatabaseError(DatabaseError::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = AppError::DatabaseError(DatabaseError::Duplicate);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err = AppError::ProxyError(ProxyError::RequestFailed("timeout".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let err = AppError::ProxyError(ProxyError::NotConfigured("Google Places".into()));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_error_display() {
        let err = AppError::validation("test error");
        assert_eq!(err.to_string(), "Validation error: test error");

        let err = AppError::AuthError(AuthError::InvalidCredentials);
        assert_eq!(err.to_string(), "Authentication error: Invalid credentials");

        let err = AppError::not_found("Property");
        assert_eq!(err.to_string(), "Property not found");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::DatabaseError(DatabaseError::QueryError(
            "relation \"users\" does not exist".into(),
        ));
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Conflict("Username already taken".into());
        assert_eq!(err.public_message(), "Conflict: Username already taken");
    }
}
