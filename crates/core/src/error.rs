//! Error types for Tessera.

use thiserror::Error;

/// Result type alias for Tessera operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for selector computations and state access.
#[derive(Debug, Error)]
pub enum Error {
    /// A selector's combining function failed.
    #[error("selector {selector} failed: {message}")]
    Computation { selector: String, message: String },
    /// A state path could not be parsed or resolved for writing.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
    /// A value had a different shape than the operation required.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// Configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Error raised by user code.
    #[error(transparent)]
    Custom(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Creates a computation error.
    pub fn computation(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Computation {
            selector: selector.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: &'static str, found: &'static str) -> Self {
        Error::TypeMismatch { expected, found }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Wraps an arbitrary error raised inside a selector or callback.
    pub fn custom<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Custom(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::computation("visible_text", "boom");
        assert!(err.to_string().contains("visible_text"));
        assert!(err.to_string().contains("boom"));

        let err = Error::invalid_path("a..b", "empty segment");
        assert!(err.to_string().contains("a..b"));

        let err = Error::type_mismatch("array", "string");
        assert_eq!(err.to_string(), "type mismatch: expected array, found string");
    }

    #[test]
    fn test_error_constructors() {
        match Error::config("bad") {
            Error::Config(msg) => assert_eq!(msg, "bad"),
            _ => panic!("Wrong error type"),
        }

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        match Error::custom(io) {
            Error::Custom(inner) => assert_eq!(inner.to_string(), "disk"),
            _ => panic!("Wrong error type"),
        }
    }
}
