use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Postgres error code for insufficient privilege, kept so callers can
/// match permission failures the same way regardless of backend.
pub const PERMISSION_DENIED_CODE: &str = "42501";

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Assistant error: {0}")]
    Assistant(#[from] ProxyError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl StorageError {
    /// Database error code, if the failure carries one.
    pub fn code(&self) -> Option<String> {
        match self {
            StorageError::PermissionDenied { .. } => Some(PERMISSION_DENIED_CODE.to_string()),
            StorageError::Sqlx(sqlx::Error::Database(db)) => db.code().map(|c| c.into_owned()),
            _ => None,
        }
    }

    /// True for ownership and privilege failures.
    pub fn is_permission_denied(&self) -> bool {
        self.code().as_deref() == Some(PERMISSION_DENIED_CODE)
    }
}

/// Error codes returned by the assistant proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    ServerError,
    OpenaiError,
    InvalidJson,
    ApiKeyMissing,
    InvalidApiKey,
    Timeout,
    RateLimit,
    UnknownError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::ServerError => "server_error",
            ErrorCode::OpenaiError => "openai_error",
            ErrorCode::InvalidJson => "invalid_json",
            ErrorCode::ApiKeyMissing => "api_key_missing",
            ErrorCode::InvalidApiKey => "invalid_api_key",
            ErrorCode::Timeout => "timeout",
            ErrorCode::RateLimit => "rate_limit",
            ErrorCode::UnknownError => "unknown_error",
        };
        write!(f, "{}", s)
    }
}

/// Structured assistant failure, serialized as `{error, details, errorCode}`.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[error("{error} ({error_code})")]
pub struct ProxyError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(rename = "errorCode")]
    pub error_code: ErrorCode,
}

impl ProxyError {
    pub fn new(error_code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            error_code,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Client-side validation failure for a form or submission
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Validation failed: {field} - {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for assistant operations
pub type ProxyResult<T> = Result<T, ProxyError>;
