use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;
use tracing::error;

/// Message sent to clients for every failure whose details stay server-side.
const INTERNAL_MESSAGE: &str = "Internal server error.";
const CONFLICT_MESSAGE: &str = "Username or email already in use.";

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

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("External service error: {0}")]
    ExternalError(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::InternalError(message.into())
    }

    pub fn external(message: impl Into<String>) -> Self {
        AppError::ExternalError(message.into())
    }

    /// The text placed in the `message` field of the JSON error body.
    pub fn client_message(&self) -> String {
        match self {
            AppError::AuthError(e) => e.to_string(),
            AppError::ValidationError(message) => message.clone(),
            AppError::Conflict(message) => message.clone(),
            AppError::DatabaseError(DatabaseError::Duplicate(_)) => CONFLICT_MESSAGE.to_string(),
            _ => INTERNAL_MESSAGE.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(format!("blocking task failed: {}", err))
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        HttpResponse::build(status).json(json!({ "message": self.client_message() }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::MissingCredentials => StatusCode::UNAUTHORIZED,
                AuthError::TokenExpired => StatusCode::FORBIDDEN,
                AuthError::InvalidToken => StatusCode::FORBIDDEN,
            },
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(DatabaseError::Duplicate(_)) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalError(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

// Display strings double as the client-facing messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials.")]
    InvalidCredentials,

    #[error("Authentication token or session required.")]
    MissingCredentials,

    #[error("Invalid or expired token.")]
    TokenExpired,

    #[error("Invalid or expired token.")]
    InvalidToken,
}

/// Which uniqueness constraint an insert or update ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    Username,
    Email,
    GoogleId,
}

impl UniqueKey {
    /// Maps a Postgres constraint name from the initial migration.
    pub fn from_constraint(name: &str) -> Option<Self> {
        match name {
            "users_username_key" => Some(UniqueKey::Username),
            "users_email_key" => Some(UniqueKey::Email),
            "users_google_id_key" => Some(UniqueKey::GoogleId),
            _ => None,
        }
    }
}

impl std::fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UniqueKey::Username => "username",
            UniqueKey::Email => "email",
            UniqueKey::GoogleId => "google id",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate {0}")]
    Duplicate(UniqueKey),

    #[error("Referenced record does not exist: {0}")]
    MissingReference(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    if let Some(key) = db_err.constraint().and_then(UniqueKey::from_constraint) {
                        return DatabaseError::Duplicate(key);
                    }
                }
                if db_err.is_foreign_key_violation() {
                    let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                    return DatabaseError::MissingReference(constraint);
                }
                DatabaseError::QueryError(db_err.to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationError(err.to_string())
    }
}
