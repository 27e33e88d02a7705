// Error types - per-backend failures vs. caller mistakes
//
// Backend failures never escape the coordinator: they are folded into
// SyncOutcome slots. SyncError is reserved for programmer errors (unknown
// entity kind, payload that does not fit the entity, invalid record).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::FieldError;

// ============================================================================
// FAILURE KIND (caller-visible classification)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Store unreachable, timed out, or locked
    Connectivity,

    /// Store rejected the shape or contents of the write
    Validation,

    /// Target record does not exist (update/delete)
    NotFound,

    /// Anything we could not classify
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Connectivity => "connectivity",
            FailureKind::Validation => "validation",
            FailureKind::NotFound => "not_found",
            FailureKind::Unknown => "unknown",
        }
    }
}

// ============================================================================
// BACKEND ERROR
// ============================================================================

/// Error raised by a single backend attempt.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    #[error("{0}")]
    Connectivity(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unknown(String),
}

impl BackendError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BackendError::Connectivity(_) => FailureKind::Connectivity,
            BackendError::Validation(_) => FailureKind::Validation,
            BackendError::NotFound(_) => FailureKind::NotFound,
            BackendError::Unknown(_) => FailureKind::Unknown,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            BackendError::Connectivity(msg)
            | BackendError::Validation(msg)
            | BackendError::NotFound(msg)
            | BackendError::Unknown(msg) => msg,
        }
    }

    pub fn not_found(collection: &str, id: &str) -> Self {
        BackendError::NotFound(format!("{} record '{}' not found", collection, id))
    }
}

impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::QueryReturnedNoRows => BackendError::NotFound(err.to_string()),
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::NotADatabase
                | ErrorCode::SystemIoFailure => BackendError::Connectivity(err.to_string()),
                ErrorCode::ConstraintViolation
                | ErrorCode::TypeMismatch
                | ErrorCode::TooBig => BackendError::Validation(err.to_string()),
                _ => BackendError::Unknown(err.to_string()),
            },
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::ToSqlConversionFailure(_) => BackendError::Validation(err.to_string()),
            _ => BackendError::Unknown(err.to_string()),
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::NotFound => BackendError::NotFound(err.to_string()),
            ErrorKind::InvalidData | ErrorKind::InvalidInput => {
                BackendError::Validation(err.to_string())
            }
            ErrorKind::PermissionDenied
            | ErrorKind::TimedOut
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::BrokenPipe => BackendError::Connectivity(err.to_string()),
            _ => BackendError::Unknown(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Validation(err.to_string())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            return BackendError::Connectivity(err.to_string());
        }
        if err.is_decode() {
            return BackendError::Validation(err.to_string());
        }
        match err.status().map(|s| s.as_u16()) {
            Some(404) => BackendError::NotFound(err.to_string()),
            Some(400) | Some(422) => BackendError::Validation(err.to_string()),
            Some(502) | Some(503) | Some(504) => BackendError::Connectivity(err.to_string()),
            _ => BackendError::Unknown(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for BackendError {
    fn from(err: tokio::task::JoinError) -> Self {
        BackendError::Unknown(format!("backend task failed: {}", err))
    }
}

// ============================================================================
// SYNC ERROR (programmer errors only)
// ============================================================================

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Unsupported entity type: {0}")]
    UnsupportedEntity(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Malformed {kind} payload: {reason}")]
    MalformedPayload { kind: String, reason: String },

    #[error("Invalid {kind}: {}", format_field_errors(.errors))]
    InvalidRecord { kind: String, errors: Vec<FieldError> },

    #[error("Empty patch for {0}")]
    EmptyPatch(String),

    #[error("No identifier for {0} on either backend")]
    MissingIdentifier(String),
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
