//! Error types for Astra connection brokering.

use thiserror::Error;

/// Result type for Astra driver operations.
pub type AstraResult<T> = Result<T, AstraError>;

/// Errors that can occur while parsing, resolving or connecting.
///
/// The enum is `Clone` because a single failed session build is reported to
/// every caller that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AstraError {
    /// The connection string could not be parsed.
    #[error("Malformed Astra URL: {0}")]
    MalformedUrl(String),

    /// More than one database carries the requested name.
    #[error("Ambiguous database '{name}': {count} databases share this name, use the database id instead")]
    AmbiguousTarget {
        /// The name that was looked up.
        name: String,
        /// How many databases matched.
        count: usize,
    },

    /// Neither a name nor an id lookup found the database.
    #[error("Database not found: {0}")]
    TargetNotFound(String),

    /// The secure connect bundle could not be obtained.
    #[error("Bundle download failed: {0}")]
    BundleDownload(String),

    /// The control plane rejected or failed a request.
    #[error("Control plane error: {0}")]
    ControlPlane(String),

    /// The session handshake failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Missing or rejected credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Query execution error reported by the session.
    #[error("Query error: {0}")]
    Query(String),

    /// The connection handle was already closed.
    #[error("Connection is closed")]
    ConnectionClosed,

    /// No registered driver accepts the URL.
    #[error("No suitable driver found for '{0}'")]
    NoSuitableDriver(String),

    /// A deliberately unimplemented optional operation.
    #[error("Astra driver does not support this method '{0}'")]
    Unsupported(String),

    /// Wrapper introspection asked for a type this object is not.
    #[error("No object was found that matched the provided interface: {0}")]
    NotAWrapper(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AstraError {
    /// Create a malformed URL error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedUrl(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::TargetNotFound(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a control plane error.
    pub fn control_plane(msg: impl Into<String>) -> Self {
        Self::ControlPlane(msg.into())
    }

    /// Create a bundle download error.
    pub fn bundle(msg: impl Into<String>) -> Self {
        Self::BundleDownload(msg.into())
    }

    /// Create an unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported(operation.into())
    }

    /// Check if a later attempt could succeed without changing the request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::BundleDownload(_) | Self::ControlPlane(_)
        )
    }

    /// Check if error is authentication related.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Check if the caller has to change the URL or its overrides.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedUrl(_) | Self::AmbiguousTarget { .. } | Self::TargetNotFound(_)
        )
    }
}

#[cfg(feature = "scylla")]
impl From<scylla::transport::errors::NewSessionError> for AstraError {
    fn from(err: scylla::transport::errors::NewSessionError) -> Self {
        Self::Connection(err.to_string())
    }
}

#[cfg(feature = "scylla")]
impl From<scylla::transport::errors::QueryError> for AstraError {
    fn from(err: scylla::transport::errors::QueryError) -> Self {
        use scylla::transport::errors::{DbError, QueryError};

        match &err {
            QueryError::DbError(DbError::AuthenticationError, msg) => {
                Self::Authentication(msg.clone())
            }
            QueryError::DbError(db_err, msg) => Self::Query(format!("{db_err}: {msg}")),
            _ => Self::Query(err.to_string()),
        }
    }
}

#[cfg(feature = "devops")]
impl From<reqwest::Error> for AstraError {
    fn from(err: reqwest::Error) -> Self {
        Self::ControlPlane(err.to_string())
    }
}
