//! Domain-level error types for imessage-export.
//!
//! Only run-fatal conditions are modelled here. A single missing attachment
//! or a failed per-conversation query is reported through
//! [`AttachmentOutcome`](super::AttachmentOutcome) or an empty reader result
//! and never becomes an `AppError`.

use std::path::PathBuf;
use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// chat.db does not exist at the configured location.
    #[error("iMessage database not found at: {path}")]
    DatabaseNotFound { path: PathBuf },

    /// chat.db exists but could not be opened (usually missing Full Disk Access).
    #[error("Failed to open database {path}: {message}")]
    DatabaseAccess {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    /// Failed to query the database.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    /// The database contained no conversations to export.
    #[error("No chats found in database")]
    NoConversations,

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create a database error from rusqlite error.
    pub fn database(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an access error for a database that exists but cannot be read.
    pub fn database_access(path: impl Into<PathBuf>, err: rusqlite::Error) -> Self {
        Self::DatabaseAccess {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Operator-facing fix for fatal conditions, if one is known.
    #[must_use]
    pub const fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::DatabaseNotFound { .. } => {
                Some("Make sure you're running this on macOS with iMessage enabled.")
            }
            Self::DatabaseAccess { .. } => Some(
                "Full Disk Access is required:\n  \
                 1. Open System Settings → Privacy & Security → Full Disk Access\n  \
                 2. Click the + button\n  \
                 3. Add your terminal application\n  \
                 4. Quit and reopen the terminal\n  \
                 5. Run the export again",
            ),
            Self::NoConversations => {
                Some("Check that --db points at the right chat.db and that filters are not too strict.")
            }
            _ => None,
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors_carry_remediation() {
        let missing = AppError::DatabaseNotFound {
            path: PathBuf::from("/nope/chat.db"),
        };
        assert!(missing.remediation().is_some());
        assert!(missing.to_string().contains("/nope/chat.db"));

        let access = AppError::DatabaseAccess {
            path: PathBuf::from("/x/chat.db"),
            message: "unable to open database file".into(),
            source: None,
        };
        assert!(access
            .remediation()
            .is_some_and(|r| r.contains("Full Disk Access")));

        let cfg = AppError::Config {
            message: "bad".into(),
        };
        assert!(cfg.remediation().is_none());
    }
}
