//! Error types for session operations.

use ingatini_core::{IngatiniError, RemoteServiceError, ValidationError};

use crate::orchestrator::RequestId;

/// Errors from the session layer.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Bad input caught before any remote call.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The remote service refused or could not be reached.
    #[error(transparent)]
    Remote(#[from] RemoteServiceError),
    /// A resolution arrived for a request that is no longer pending.
    #[error("no pending request {0}")]
    UnknownRequest(RequestId),
}

impl SessionError {
    pub fn is_validation(&self) -> bool {
        matches!(self, SessionError::Validation(_))
    }
}

impl From<SessionError> for IngatiniError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Validation(e) => IngatiniError::Validation(e),
            SessionError::Remote(e) => IngatiniError::Remote(e),
            SessionError::UnknownRequest(id) => {
                IngatiniError::Session(format!("no pending request {}", id))
            }
        }
    }
}
