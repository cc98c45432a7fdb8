//! Error handling for userforge

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// Main error type for userforge
#[derive(Error, Debug, Clone)]
pub enum UserForgeError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    #[error("Checkpoint error: {message}")]
    Checkpoint {
        message: String,
        path: Option<String>,
    },

    #[error("Probe error for '{username}': {message}")]
    Probe { username: String, message: String },

    #[error("Timeout error: {operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl UserForgeError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an IO error
    pub fn io(message: impl Into<String>, path: Option<String>) -> Self {
        Self::Io {
            message: message.into(),
            path,
        }
    }

    /// Create an IO error from a `std::io::Error` raised while touching `path`
    pub fn io_at(err: std::io::Error, path: &Path) -> Self {
        Self::io(err.to_string(), Some(path.to_string_lossy().to_string()))
    }

    /// Create a checkpoint error
    pub fn checkpoint(message: impl Into<String>, path: Option<String>) -> Self {
        Self::Checkpoint {
            message: message.into(),
            path,
        }
    }

    /// Create a probe error
    pub fn probe(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Probe {
            username: username.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message } => {
                format!("Configuration problem: {}\nhint: check your flags, environment or .env file", message)
            }
            Self::Validation { message } => {
                format!("Validation error: {}\nhint: check your input lists and format level", message)
            }
            Self::Io { message, path } => {
                let path_info = path.as_ref().map_or(String::new(), |p| format!(" ({})", p));
                format!("File error{}: {}\nhint: check file permissions and paths", path_info, message)
            }
            Self::Checkpoint { message, path } => {
                let path_info = path.as_ref().map_or(String::new(), |p| format!(" ({})", p));
                format!("Checkpoint error{}: {}\nhint: the run cannot be resumed from this point", path_info, message)
            }
            Self::Probe { username, message } => {
                format!("Could not probe '{}': {}", username, message)
            }
            Self::Timeout { operation, timeout } => {
                format!("Operation '{}' timed out after {:?}", operation, timeout)
            }
            Self::Internal { message } => {
                format!("Internal error: {}\nhint: this is a bug, please report it", message)
            }
        }
    }
}

impl From<std::io::Error> for UserForgeError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string(), None)
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, UserForgeError>;

/// Helper macros for common error patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::UserForgeError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::UserForgeError::config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr) => {
        $crate::error::UserForgeError::validation($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::UserForgeError::validation(format!($fmt, $($arg)*))
    };
}
