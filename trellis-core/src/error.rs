use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Usage error: {0}")]
    Usage(String),
}

impl Error {
    /// Returns a stable error code for this error variant.
    /// These codes are stable and can be used by clients for error classification.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Schema(_) => "SCHEMA_ERROR",
            Error::Connection(_) => "CONNECTION_ERROR",
            Error::Store(_) => "STORE_ERROR",
            Error::Usage(_) => "USAGE_ERROR",
        }
    }

    /// Returns true if this error is potentially retryable.
    ///
    /// A store error aborts the whole enclosing transaction; the caller may
    /// retry the whole operation. Schema, connection and usage errors are
    /// permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Store(_) => true,
            Error::Schema(_) => false,
            Error::Connection(_) => false,
            Error::Usage(_) => false,
        }
    }

    /// Adds operation context to a store error message.
    pub fn with_context(self, context: &str) -> Error {
        match self {
            Error::Store(msg) => Error::Store(format!("{}: {}", context, msg)),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
