//! Error types for the hot reloading runtime

use std::fmt;
use thiserror::Error;

/// Main error type for quickreload
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Runtime error raised by the object model or by module code
    #[error("{kind}: {message}")]
    RuntimeError { kind: ErrorKind, message: String },

    /// Module resolution or loading failed
    #[error("ModuleError: {0}")]
    ModuleError(String),

    /// A module id was expected in the cache or registry but is not there
    #[error("ModuleNotFound: {0}")]
    ModuleNotFound(String),

    /// Module body failed while executing
    #[error("ModuleError: failed to evaluate '{module}': {message}")]
    EvaluationError { module: String, message: String },

    /// Stash data could not be encoded or decoded
    #[error("SerializationError: {0}")]
    SerializationError(String),

    /// Invalid configuration (bad JSON, bad exclude pattern)
    #[error("ConfigError: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IOError: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

/// Runtime error kinds, named after their JavaScript counterparts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum ErrorKind {
    /// TypeError - wrong type for operation
    TypeError,
    /// Generic Error - user-thrown errors
    GenericError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::TypeError => write!(f, "TypeError"),
            ErrorKind::GenericError => write!(f, "Error"),
        }
    }
}

impl Error {
    /// Create a TypeError
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::TypeError,
            message: message.into(),
        }
    }

    /// Create a generic user error, as thrown by module code
    pub fn thrown(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::GenericError,
            message: message.into(),
        }
    }

    /// Wrap a failure raised while a module body was executing
    pub fn evaluation(module: impl Into<String>, cause: &Error) -> Self {
        Error::EvaluationError {
            module: module.into(),
            message: cause.to_string(),
        }
    }
}

/// Result type alias for quickreload
pub type Result<T> = std::result::Result<T, Error>;

/// Standardized error message templates
pub mod messages {
    pub const NOT_A_FUNCTION: &str = "is not a function";
    pub const NOT_A_CONSTRUCTOR: &str = "is not a constructor";
    pub const NOT_AN_OBJECT: &str = "is not an object";

    /// Format a "X is not a function" error message
    pub fn not_a_function(name: &str) -> String {
        format!("'{}' {}", name, NOT_A_FUNCTION)
    }

    /// Format a "X is not a constructor" error message
    pub fn not_a_constructor(name: &str) -> String {
        format!("'{}' {}", name, NOT_A_CONSTRUCTOR)
    }

    /// Format a "X is not an object" error message
    pub fn not_an_object(name: &str) -> String {
        format!("'{}' {}", name, NOT_AN_OBJECT)
    }

    /// Format a "X.Y is not a function" error message for method calls
    pub fn method_not_a_function(obj: &str, method: &str) -> String {
        format!("'{}.{}' {}", obj, method, NOT_A_FUNCTION)
    }
}
