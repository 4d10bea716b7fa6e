//! Persisted query history for the active identity.

use ingatini_client::RagService;
use ingatini_core::config::SessionConfig;
use ingatini_core::{HistoryEntry, UserId, ValidationError};

use crate::error::SessionError;

/// Read-only view of the user's past queries, newest first as served.
#[derive(Debug, Clone)]
pub struct HistoryLoader {
    entries: Vec<HistoryEntry>,
    error: Option<String>,
    loaded_for: Option<UserId>,
    limit: u32,
}

impl HistoryLoader {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            entries: Vec::new(),
            error: None,
            loaded_for: None,
            limit: config.history_limit,
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dismissible error from the last failed load.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Fetch the user's history and replace the current entries wholesale.
    ///
    /// On failure the previous entries stay and the error is recorded.
    pub async fn load(
        &mut self,
        service: &dyn RagService,
        user_id: &UserId,
    ) -> Result<&[HistoryEntry], SessionError> {
        if self.loaded_for.as_ref() != Some(user_id) {
            self.entries.clear();
        }
        self.loaded_for = Some(user_id.clone());

        match service.query_history(user_id, self.limit).await {
            Ok(entries) => {
                tracing::debug!(user_id = %user_id, count = entries.len(), "History loaded");
                self.entries = entries;
                self.error = None;
                Ok(&self.entries)
            }
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = ?err, "Failed to load history");
                self.error = Some(err.user_message());
                Err(err.into())
            }
        }
    }

    /// Reload for the identity last loaded.
    pub async fn refresh(
        &mut self,
        service: &dyn RagService,
    ) -> Result<&[HistoryEntry], SessionError> {
        let user_id = self.loaded_for.clone().ok_or(ValidationError::NoIdentity)?;
        self.load(service, &user_id).await
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.error = None;
        self.loaded_for = None;
    }
}
