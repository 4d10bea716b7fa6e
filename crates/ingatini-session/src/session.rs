//! The session: one identity and everything scoped to it.
//!
//! Establishing an identity populates the document scope and history;
//! signing out clears all of it, including in-flight exchanges.

use std::sync::Arc;

use ingatini_client::RagService;
use ingatini_core::{
    ApiStatus, DocumentRef, HistoryEntry, Identity, IngatiniConfig, Turn, UploadFile, UserId,
    ValidationError,
};

use crate::error::SessionError;
use crate::history::HistoryLoader;
use crate::identity::IdentityHolder;
use crate::orchestrator::{QueryDispatch, QueryOrchestrator, QueryResolution};
use crate::scope::DocumentScope;

pub struct Session {
    service: Arc<dyn RagService>,
    identity: IdentityHolder,
    scope: DocumentScope,
    orchestrator: QueryOrchestrator,
    history: HistoryLoader,
    api_status: ApiStatus,
}

impl Session {
    pub fn new(service: Arc<dyn RagService>, config: &IngatiniConfig) -> Self {
        Self {
            service,
            identity: IdentityHolder::new(config.service.email_domain.clone()),
            scope: DocumentScope::new(),
            orchestrator: QueryOrchestrator::new(&config.session),
            history: HistoryLoader::new(&config.session),
            api_status: ApiStatus::default(),
        }
    }

    /// Handle to the backing service, for running dispatches off the session.
    pub fn service(&self) -> Arc<dyn RagService> {
        Arc::clone(&self.service)
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.current()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.identity.user_id()
    }

    pub fn scope(&self) -> &DocumentScope {
        &self.scope
    }

    pub fn orchestrator(&self) -> &QueryOrchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut QueryOrchestrator {
        &mut self.orchestrator
    }

    pub fn transcript(&self) -> &[Turn] {
        self.orchestrator.transcript()
    }

    pub fn history(&self) -> &HistoryLoader {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryLoader {
        &mut self.history
    }

    pub fn api_status(&self) -> ApiStatus {
        self.api_status
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Probe the service once and record the result.
    pub async fn probe_health(&mut self) -> ApiStatus {
        self.api_status = ApiStatus::Checking;
        self.api_status = match self.service.health().await {
            Ok(()) => ApiStatus::Connected,
            Err(err) => {
                tracing::warn!(error = ?err, "Health probe failed");
                ApiStatus::Disconnected
            }
        };
        tracing::debug!(status = %self.api_status, "Health probed");
        self.api_status
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Create or fetch a user by name and load what belongs to it.
    ///
    /// An existing identity is signed out first, so the new one never
    /// inherits its documents or transcript.
    pub async fn establish(&mut self, display_name_input: &str) -> Result<Identity, SessionError> {
        if display_name_input.trim().is_empty() {
            return Err(ValidationError::EmptyUsername.into());
        }
        if self.identity.is_established() {
            self.sign_out();
        }
        let identity = self
            .identity
            .establish(self.service.as_ref(), display_name_input)
            .await?
            .clone();
        self.load_identity_state(&identity.id).await;
        Ok(identity)
    }

    /// Re-establish a known user by id.
    pub async fn resume(&mut self, user_id: &UserId) -> Result<Identity, SessionError> {
        if self.identity.is_established() {
            self.sign_out();
        }
        let identity = self
            .identity
            .resume(self.service.as_ref(), user_id)
            .await?
            .clone();
        self.load_identity_state(&identity.id).await;
        Ok(identity)
    }

    async fn load_identity_state(&mut self, user_id: &UserId) {
        let documents = self.scope.populate(self.service.as_ref(), user_id).await;
        // History failure is recorded on the loader and never blocks sign-in.
        let _ = self.history.load(self.service.as_ref(), user_id).await;
        tracing::info!(
            user_id = %user_id,
            documents,
            history = self.history.entries().len(),
            "Session ready"
        );
    }

    /// Clear the identity and everything scoped to it.
    pub fn sign_out(&mut self) {
        if let Some(previous) = self.identity.clear() {
            tracing::info!(
                user_id = %previous.id,
                in_flight = self.orchestrator.pending_count(),
                "Signed out"
            );
        }
        self.scope.clear();
        self.orchestrator.clear();
        self.history.clear();
    }

    // =========================================================================
    // Documents
    // =========================================================================

    pub async fn attach(&mut self, file: Option<UploadFile>) -> Result<DocumentRef, SessionError> {
        self.scope
            .attach(self.service.as_ref(), self.identity.user_id(), file)
            .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn submit(&mut self, text: &str) -> Result<QueryDispatch, ValidationError> {
        self.orchestrator
            .submit(self.identity.user_id(), &self.scope, text)
    }

    pub fn submit_input(&mut self) -> Result<QueryDispatch, ValidationError> {
        self.orchestrator
            .submit_input(self.identity.user_id(), &self.scope)
    }

    /// Merge a resolution. Resolutions for exchanges dropped by sign-out are rejected.
    pub fn resolve(&mut self, resolution: QueryResolution) -> Result<Turn, SessionError> {
        let request_id = resolution.request_id;
        match self.orchestrator.resolve(resolution) {
            Ok(turn) => Ok(turn.clone()),
            Err(err) => {
                tracing::debug!(request_id = %request_id, "Discarding stale resolution");
                Err(err)
            }
        }
    }

    /// Submit, send, and merge one question in a single step.
    pub async fn ask(&mut self, text: &str) -> Result<Turn, SessionError> {
        let dispatch = self.submit(text)?;
        let service = self.service();
        let resolution = dispatch.run(service.as_ref()).await;
        self.resolve(resolution)
    }

    // =========================================================================
    // History
    // =========================================================================

    pub async fn load_history(&mut self) -> Result<&[HistoryEntry], SessionError> {
        let user_id = self
            .identity
            .user_id()
            .cloned()
            .ok_or(ValidationError::NoIdentity)?;
        self.history.load(self.service.as_ref(), &user_id).await
    }

    pub async fn refresh_history(&mut self) -> Result<&[HistoryEntry], SessionError> {
        self.history.refresh(self.service.as_ref()).await
    }
}
