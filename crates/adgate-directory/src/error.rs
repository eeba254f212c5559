//! Directory error types
//!
//! Every failure surfaced by the pool, the mapper and the domain operations is a
//! [`DirectoryError`]. Each kind carries a stable machine code and an HTTP-style
//! status so an outer surface can map it without inspecting messages.

use std::time::Duration;

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Error that can occur while talking to the directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No directory entry matched the query.
    #[error("no object matched '{target}'")]
    NotFound { target: String },

    /// An account name or proxy address is already taken.
    #[error("object '{target}' already exists")]
    AlreadyExists { target: String },

    /// Pool exhaustion or a protocol call exceeded its deadline.
    #[error("{operation} timeout after {}s", timeout.as_secs())]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// Domain, zone or identifier type outside what is configured or known.
    #[error("unsupported {what}: '{value}'")]
    Unsupported { what: String, value: String },

    /// Malformed distinguished name, binary attribute or identifier.
    #[error("invalid {what} format: '{value}'")]
    InvalidFormat { what: String, value: String },

    /// Reserved account name.
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// A named protocol operation failed.
    #[error("failed to {operation}: {message}")]
    OptFailed {
        operation: String,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The bind credentials were rejected.
    #[error("authentication failed: invalid bind credentials")]
    AuthenticationFailed,

    /// The directory server could not be reached.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Unexpected or unclassified failure.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DirectoryError {
    pub fn not_found(target: impl Into<String>) -> Self {
        DirectoryError::NotFound {
            target: target.into(),
        }
    }

    pub fn already_exists(target: impl Into<String>) -> Self {
        DirectoryError::AlreadyExists {
            target: target.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        DirectoryError::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    pub fn unsupported(what: impl Into<String>, value: impl Into<String>) -> Self {
        DirectoryError::Unsupported {
            what: what.into(),
            value: value.into(),
        }
    }

    pub fn invalid_format(what: impl Into<String>, value: impl Into<String>) -> Self {
        DirectoryError::InvalidFormat {
            what: what.into(),
            value: value.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        DirectoryError::Forbidden {
            message: message.into(),
        }
    }

    pub fn opt_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        DirectoryError::OptFailed {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation failure wrapping the transport error.
    pub fn opt_failed_with_source(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::OptFailed {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        DirectoryError::Internal {
            message: message.into(),
        }
    }

    /// Check if retrying the whole operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DirectoryError::Timeout { .. } | DirectoryError::ConnectionFailed { .. }
        )
    }

    /// Machine-readable code. Protocol-derived kinds reuse the LDAP result code.
    pub fn error_code(&self) -> u32 {
        match self {
            DirectoryError::NotFound { .. } => 96,
            DirectoryError::AlreadyExists { .. } => 68,
            DirectoryError::Timeout { .. } => 85,
            DirectoryError::Unsupported { .. } => 1001,
            DirectoryError::InvalidFormat { .. } => 1002,
            DirectoryError::Forbidden { .. } => 1003,
            DirectoryError::OptFailed { .. } => 1004,
            DirectoryError::AuthenticationFailed => 49,
            DirectoryError::ConnectionFailed { .. } => 91,
            DirectoryError::Internal { .. } => 1000,
        }
    }

    /// HTTP status an outer surface should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            DirectoryError::NotFound { .. } => 404,
            DirectoryError::AlreadyExists { .. } => 409,
            DirectoryError::Timeout { .. } => 504,
            DirectoryError::Unsupported { .. } | DirectoryError::InvalidFormat { .. } => 400,
            DirectoryError::Forbidden { .. } => 403,
            DirectoryError::AuthenticationFailed => 401,
            DirectoryError::ConnectionFailed { .. } => 502,
            DirectoryError::OptFailed { .. } | DirectoryError::Internal { .. } => 500,
        }
    }

    /// Message safe to show to a caller. Internal details are replaced by a generic text.
    pub fn public_message(&self) -> String {
        match self {
            DirectoryError::Internal { .. } => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
