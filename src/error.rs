use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;

/// Message shown for every failed login, whatever the underlying cause.
pub const INVALID_LOGIN_MESSAGE: &str = "Invalid username or password";

/// Message shown when the store fails in a way the caller cannot recover from.
pub const UNAVAILABLE_MESSAGE: &str = "Service unavailable";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.into())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(DatabaseError::MigrationError(err.to_string()))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AppError::AuthError(AuthError::InvalidSession)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl AppError {
    /// Text handed to the client. Login failures collapse to one message and
    /// storage faults never leak their details.
    pub fn public_message(&self) -> String {
        match self {
            AppError::AuthError(AuthError::InvalidCredentials)
            | AppError::AuthError(AuthError::UserNotFound) => INVALID_LOGIN_MESSAGE.to_string(),
            AppError::AuthError(e) => e.to_string(),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::DatabaseError(_) => UNAVAILABLE_MESSAGE.to_string(),
            AppError::ConfigError(_) | AppError::InternalError(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
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
                AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::InvalidSession => StatusCode::UNAUTHORIZED,
                AuthError::UserExists => StatusCode::CONFLICT,
                AuthError::Unauthorized => StatusCode::FORBIDDEN,
            },
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ConfigError(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    /// No row matches the username and hash pair.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The salt lookup found no such user.
    #[error("User not found")]
    UserNotFound,

    #[error("Username already exists")]
    UserExists,

    #[error("You must be logged in to view this page!")]
    Unauthorized,

    #[error("Invalid session")]
    InvalidSession,
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}
