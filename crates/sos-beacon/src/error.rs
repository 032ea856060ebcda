//! Error types for sos-beacon.
//!
//! This module defines all error types used throughout the crate, grouped by
//! the component that raises them.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for sos-beacon operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Store Errors ===
    /// Failed to open or create the settings database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Contact Book Errors ===
    /// A contact was rejected before being stored.
    #[error("invalid contact: {reason}")]
    InvalidContact {
        /// User-facing explanation.
        reason: String,
    },

    /// A contact position outside the list was addressed.
    #[error("no contact at position {index} (have {len})")]
    ContactIndex {
        /// The requested position.
        index: usize,
        /// Number of contacts currently held.
        len: usize,
    },

    /// An operation was switched off in the feature settings.
    #[error("{feature} is disabled")]
    FeatureDisabled {
        /// Name of the disabled feature.
        feature: &'static str,
    },

    // === Motion Errors ===
    /// Required platform permission is missing.
    #[error("missing permission: {permission}. {instructions}")]
    PermissionMissing {
        /// Name of the required permission.
        permission: String,
        /// Instructions for granting the permission.
        instructions: String,
    },

    /// An acceleration reading could not be parsed.
    #[error("invalid acceleration reading '{input}'")]
    InvalidReading {
        /// The offending input.
        input: String,
    },

    // === Alert Log Errors ===
    /// An existing log file does not hold a JSON array.
    #[error("log file {path} is corrupt: {source}")]
    LogCorrupt {
        /// Path of the log file.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The remote alert log rejected or failed a request.
    #[error("remote alert log error: {0}")]
    Remote(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for sos-beacon operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Remote(err.to_string())
    }
}

impl Error {
    /// Create a new invalid contact error.
    #[must_use]
    pub fn invalid_contact(reason: impl Into<String>) -> Self {
        Self::InvalidContact {
            reason: reason.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a permission missing error with instructions.
    #[must_use]
    pub fn permission_missing(
        permission: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self::PermissionMissing {
            permission: permission.into(),
            instructions: instructions.into(),
        }
    }

    /// Check if this error is a contact validation failure.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::InvalidContact { .. })
    }

    /// Check if this error is a permission issue.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionMissing { .. })
    }
}
