//! Error types for reflection lookups and member invocation

use thiserror::Error;

/// Result type for reflection operations
pub type Result<T> = std::result::Result<T, ReflectError>;

/// Errors raised by the type registry and by reflected members
#[derive(Debug, Clone, Error)]
pub enum ReflectError {
    /// Type key cannot be used in a serialized member name
    #[error("Invalid type key '{0}': type keys may not contain '.'")]
    InvalidTypeKey(String),

    /// A value of the wrong type was supplied
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Argument at `index` could not be converted to the parameter type
    #[error("Argument {index} of '{member}' is not a {expected}")]
    ArgumentType {
        member: String,
        index: usize,
        expected: String,
    },

    /// Wrong number of arguments
    #[error("'{member}' takes {expected} argument(s) but {found} were supplied")]
    ArgumentCount {
        member: String,
        expected: usize,
        found: usize,
    },

    /// Instance member invoked without a target
    #[error("'{0}' is an instance member and requires a target")]
    MissingTarget(String),

    /// Field has no setter
    #[error("Field '{0}' is read-only")]
    ReadOnlyField(String),

    /// Error raised by the member body itself
    #[error("{0}")]
    Invocation(String),
}

impl ReflectError {
    /// Create an invocation error
    pub fn invocation(message: impl Into<String>) -> Self {
        ReflectError::Invocation(message.into())
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        ReflectError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
