use std::fmt;

use thiserror::Error;

/// Top-level error type for the Ingatini client.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for IngatiniError` where they need `?` to cross
/// crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IngatiniError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Remote(#[from] RemoteServiceError),

    #[error("Session error: {0}")]
    Session(String),
}

impl From<toml::de::Error> for IngatiniError {
    fn from(err: toml::de::Error) -> Self {
        IngatiniError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for IngatiniError {
    fn from(err: toml::ser::Error) -> Self {
        IngatiniError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for IngatiniError {
    fn from(err: serde_json::Error) -> Self {
        IngatiniError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Ingatini operations.
pub type Result<T> = std::result::Result<T, IngatiniError>;

// =============================================================================
// ValidationError
// =============================================================================

/// Locally detectable bad input. Never reaches the remote service.
///
/// The display text is what the user sees next to the triggering control.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a username")]
    EmptyUsername,
    #[error("Please enter a question")]
    EmptyQuestion,
    #[error("Question exceeds maximum length of {0} characters")]
    QuestionTooLong(usize),
    #[error("Please select a file")]
    MissingFile,
    #[error("User ID is required")]
    NoIdentity,
}

// =============================================================================
// RemoteServiceError
// =============================================================================

/// The external call a [`RemoteServiceError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    CreateUser,
    FetchUser,
    ListDocuments,
    UploadDocument,
    Query,
    QueryHistory,
    HealthCheck,
}

impl RemoteOperation {
    /// Message shown when the service did not supply a `detail`.
    pub fn fallback_message(self) -> &'static str {
        match self {
            RemoteOperation::CreateUser => "Failed to create user",
            RemoteOperation::FetchUser => "Failed to load user",
            RemoteOperation::ListDocuments => "Failed to load documents",
            RemoteOperation::UploadDocument => "Failed to upload document",
            RemoteOperation::Query => "Failed to get response",
            RemoteOperation::QueryHistory => "Failed to load query history",
            RemoteOperation::HealthCheck => "API Disconnected",
        }
    }

    /// Short name used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteOperation::CreateUser => "create_user",
            RemoteOperation::FetchUser => "fetch_user",
            RemoteOperation::ListDocuments => "list_documents",
            RemoteOperation::UploadDocument => "upload_document",
            RemoteOperation::Query => "query",
            RemoteOperation::QueryHistory => "query_history",
            RemoteOperation::HealthCheck => "health_check",
        }
    }
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a remote call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFailure {
    /// The service answered with a non-2xx status.
    Status(u16),
    /// The request never produced a response (connect error, timeout, ...).
    Transport(String),
    /// A 2xx response whose body did not match the contract.
    Decode(String),
}

/// Non-2xx or transport failure from any external call. Never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteServiceError {
    pub operation: RemoteOperation,
    pub failure: RemoteFailure,
    /// The service-provided `detail`, when the body carried a string one.
    pub detail: Option<String>,
}

impl RemoteServiceError {
    pub fn status(operation: RemoteOperation, status: u16, detail: Option<String>) -> Self {
        Self {
            operation,
            failure: RemoteFailure::Status(status),
            detail,
        }
    }

    pub fn transport(operation: RemoteOperation, cause: impl Into<String>) -> Self {
        Self {
            operation,
            failure: RemoteFailure::Transport(cause.into()),
            detail: None,
        }
    }

    pub fn decode(operation: RemoteOperation, cause: impl Into<String>) -> Self {
        Self {
            operation,
            failure: RemoteFailure::Decode(cause.into()),
            detail: None,
        }
    }

    /// HTTP status, if the service answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self.failure {
            RemoteFailure::Status(code) => Some(code),
            _ => None,
        }
    }

    /// The text to surface: the service's detail, else the per-operation fallback.
    pub fn user_message(&self) -> String {
        match &self.detail {
            Some(detail) if !detail.trim().is_empty() => detail.clone(),
            _ => self.operation.fallback_message().to_string(),
        }
    }
}

impl fmt::Display for RemoteServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message())
    }
}

impl std::error::Error for RemoteServiceError {}
