//! Error types for persistent events

use thiserror::Error;
use void_reflect::ReflectError;

/// Result type for event operations
pub type Result<T> = std::result::Result<T, EventError>;

/// Event errors
#[derive(Debug, Error)]
pub enum EventError {
    /// The bound member raised an error
    #[error("Error invoking '{member}': {source}")]
    Invocation {
        member: String,
        #[source]
        source: ReflectError,
    },

    /// Parameter link beyond the event's arity
    #[error("Parameter index {index} is out of range for an event with {arity} parameter(s)")]
    ParameterOutOfRange { index: usize, arity: usize },

    /// No persistent call at the index
    #[error("Call index {index} is out of range ({len} persistent call(s))")]
    CallOutOfRange { index: usize, len: usize },

    /// No argument at the index
    #[error("Argument index {index} is out of range ({len} argument(s))")]
    ArgumentOutOfRange { index: usize, len: usize },

    /// Return value link to a call that does not run earlier
    #[error("Call {consumer} cannot link to the return value of call {producer}")]
    ForwardLink { consumer: usize, producer: usize },

    /// Linked value type is not assignable to the argument
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Method cannot listen to this event
    #[error("'{member}' cannot be bound to this event: {reason}")]
    IncompatibleListener { member: String, reason: String },

    /// A dynamic call failed
    #[error("Dynamic call failed: {0}")]
    Listener(String),

    /// A listener panicked
    #[error("Listener panicked: {0}")]
    Panicked(String),

    /// Record (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventError {
    /// Wrap an error raised by a reflected member
    pub fn invocation(member: impl Into<String>, source: ReflectError) -> Self {
        EventError::Invocation {
            member: member.into(),
            source,
        }
    }

    /// Create a listener error
    pub fn listener(message: impl Into<String>) -> Self {
        EventError::Listener(message.into())
    }
}
