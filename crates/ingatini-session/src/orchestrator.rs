//! Query orchestrator: the conversation transcript and its in-flight exchanges.
//!
//! An exchange moves through two separate transitions:
//!
//! 1. [`QueryOrchestrator::submit`] validates the question, appends the
//!    `user` turn, opens a pending request, and hands back a
//!    [`QueryDispatch`].
//! 2. [`QueryOrchestrator::resolve`] takes the [`QueryResolution`] produced
//!    by running that dispatch and appends exactly one terminal turn.
//!
//! The network call between the two borrows nothing from the orchestrator,
//! so several exchanges may be in flight at once. Terminal turns land at
//! the end of the transcript in the order resolutions are applied, not in
//! submission order.

use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use ingatini_client::{RagService, ServiceResult};
use ingatini_core::config::SessionConfig;
use ingatini_core::{DocumentId, QueryAnswer, QueryRequest, Turn, UserId, ValidationError};

use crate::error::SessionError;
use crate::scope::DocumentScope;

/// Session-level error text set alongside every failed exchange.
pub const QUERY_FAILED_MESSAGE: &str = "Failed to send query";

// =============================================================================
// Request lifecycle types
// =============================================================================

/// Correlates a dispatched query with its pending request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An exchange between submission and resolution. Never leaves the orchestrator.
#[derive(Debug, Clone)]
struct PendingRequest {
    correlated_user_turn: usize,
    question: String,
    scope: Option<Vec<DocumentId>>,
}

/// A query ready to be sent, produced by a successful submit.
#[derive(Debug, Clone)]
#[must_use = "a dispatch that is never run leaves its exchange pending"]
pub struct QueryDispatch {
    request_id: RequestId,
    request: QueryRequest,
}

impl QueryDispatch {
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    /// Send the query and capture its outcome, success or failure.
    pub async fn run(self, service: &dyn RagService) -> QueryResolution {
        tracing::debug!(request_id = %self.request_id, "Dispatching query");
        let outcome = service.query(self.request).await;
        QueryResolution {
            request_id: self.request_id,
            outcome,
        }
    }
}

/// The outcome of a dispatched query, waiting to be merged.
#[derive(Debug, Clone)]
pub struct QueryResolution {
    pub request_id: RequestId,
    pub outcome: ServiceResult<QueryAnswer>,
}

// =============================================================================
// QueryOrchestrator
// =============================================================================

/// Owns the append-only transcript and every pending exchange.
pub struct QueryOrchestrator {
    transcript: Vec<Turn>,
    pending: HashMap<RequestId, PendingRequest>,
    input: String,
    error: Option<String>,
    max_evidence: usize,
    max_question_length: Option<usize>,
}

impl QueryOrchestrator {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            transcript: Vec::new(),
            pending: HashMap::new(),
            input: String::new(),
            error: None,
            max_evidence: config.max_evidence,
            max_question_length: config.max_question_length,
        }
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// The question being composed.
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Whether the submit affordance is enabled. In-flight exchanges do not disable it.
    pub fn can_submit(&self) -> bool {
        !self.input.trim().is_empty()
    }

    /// True while any exchange is unresolved.
    pub fn is_awaiting_response(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// The question of a pending exchange.
    pub fn pending_question(&self, request_id: RequestId) -> Option<&str> {
        self.pending.get(&request_id).map(|p| p.question.as_str())
    }

    /// Session-level error flag, set whenever an exchange fails.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Submit the composing buffer.
    pub fn submit_input(
        &mut self,
        user_id: Option<&UserId>,
        scope: &DocumentScope,
    ) -> Result<QueryDispatch, ValidationError> {
        let text = self.input.clone();
        self.submit(user_id, scope, &text)
    }

    /// Accept a question: append the `user` turn and open a pending request.
    ///
    /// Rejected questions leave the transcript, the pending set, and the
    /// input buffer untouched.
    pub fn submit(
        &mut self,
        user_id: Option<&UserId>,
        scope: &DocumentScope,
        text: &str,
    ) -> Result<QueryDispatch, ValidationError> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }
        let user_id = user_id.ok_or(ValidationError::NoIdentity)?;
        if let Some(max) = self.max_question_length {
            if text.chars().count() > max {
                return Err(ValidationError::QuestionTooLong(max));
            }
        }

        let correlated_user_turn = self.transcript.len();
        self.transcript.push(Turn::user(text));
        self.input.clear();
        self.error = None;

        let document_ids = scope.request_scope();
        let request_id = RequestId::new();
        self.pending.insert(
            request_id,
            PendingRequest {
                correlated_user_turn,
                question: text.to_string(),
                scope: document_ids.clone(),
            },
        );

        tracing::debug!(
            request_id = %request_id,
            turn = correlated_user_turn,
            scoped_documents = document_ids.as_ref().map_or(0, Vec::len),
            in_flight = self.pending.len(),
            "Question submitted"
        );

        Ok(QueryDispatch {
            request_id,
            request: QueryRequest {
                user_id: user_id.clone(),
                query_text: text.to_string(),
                document_ids,
            },
        })
    }

    /// Merge a resolution: close its pending request and append one terminal turn.
    pub fn resolve(&mut self, resolution: QueryResolution) -> Result<&Turn, SessionError> {
        let pending = self
            .pending
            .remove(&resolution.request_id)
            .ok_or(SessionError::UnknownRequest(resolution.request_id))?;

        let turn = match resolution.outcome {
            Ok(answer) => {
                let total = answer.evidence.len();
                let evidence: Vec<_> = answer
                    .evidence
                    .into_iter()
                    .take(self.max_evidence)
                    .collect();
                tracing::info!(
                    request_id = %resolution.request_id,
                    turn = pending.correlated_user_turn,
                    evidence = evidence.len(),
                    evidence_total = total,
                    "Answer received"
                );
                Turn::assistant(answer.answer_text, evidence)
            }
            Err(err) => {
                tracing::warn!(
                    request_id = %resolution.request_id,
                    turn = pending.correlated_user_turn,
                    question = %pending.question,
                    scoped = pending.scope.is_some(),
                    error = ?err,
                    "Query failed"
                );
                self.error = Some(QUERY_FAILED_MESSAGE.to_string());
                Turn::error(err.user_message())
            }
        };

        self.transcript.push(turn);
        Ok(&self.transcript[self.transcript.len() - 1])
    }

    /// Drop the transcript, every pending exchange, the input, and the error flag.
    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            tracing::info!(
                abandoned = self.pending.len(),
                "Clearing transcript with exchanges in flight"
            );
        }
        self.transcript.clear();
        self.pending.clear();
        self.input.clear();
        self.error = None;
    }
}

// =============================================================================
// Tests
// =============================================================================
