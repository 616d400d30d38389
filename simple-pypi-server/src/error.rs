//! # Error Handling and Response Types
//!
//! Errors raised while scanning the package directory, building the index and
//! serving requests. Every [`AppError`] maps onto an [`ErrorCode`] which
//! carries the machine-readable name and the HTTP status of the failure.
//!
//! Responses are plain text, matching the rest of the simple index surface.
//! An unknown path always renders the body `Not Found`.
//!
//! ```rust,no_run
//! use simple_pypi_server::{AppError, AppResult};
//!
//! fn lookup(name: &str) -> AppResult<()> {
//!     Err(AppError::NotFound(format!("no package named {name}")))
//! }
//! ```

use std::path::PathBuf;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::filename::FilenameError;

/// Error code classification for machine-readable error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UnrecognizedFilename,
    FileUnreadable,
    NotFound,
    ConfigError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnrecognizedFilename => "unrecognized_filename",
            ErrorCode::FileUnreadable => "file_unreadable",
            ErrorCode::NotFound => "not_found",
            ErrorCode::ConfigError => "config_error",
            ErrorCode::InternalError => "internal_error",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::UnrecognizedFilename
            | ErrorCode::FileUnreadable
            | ErrorCode::ConfigError
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application-specific error types with error codes
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    UnrecognizedFilename(#[from] FilenameError),

    #[error("cannot read package file {filename}: {source}")]
    FileUnreadable {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot list package directory {}: {}", path.display(), source)]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Get the appropriate error code for this error type
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::UnrecognizedFilename(_) => ErrorCode::UnrecognizedFilename,
            AppError::FileUnreadable { .. } | AppError::DirectoryUnreadable { .. } => {
                ErrorCode::FileUnreadable
            }
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Config(_) | AppError::Json(_) => ErrorCode::ConfigError,
            AppError::InternalError(_) => ErrorCode::InternalError,
        }
    }

    /// Body sent to the client for this error.
    pub fn response_body(&self) -> String {
        match self {
            AppError::NotFound(_) => "Not Found".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.error_code();
        let status = code.http_status();

        if code == ErrorCode::NotFound {
            tracing::debug!(error = %self, "Resource not found");
        } else {
            tracing::error!(error = %self, code = code.as_str(), "Request failed");
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.response_body(),
        )
            .into_response()
    }
}

/// Convenient result type for application operations.
pub type AppResult<T> = Result<T, AppError>;
