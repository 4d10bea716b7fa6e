//! In-memory [`RagService`] for offline use and tests.
//!
//! Keeps users, documents, and history in process. Answers can be
//! scripted per question, individual operations can be made to fail,
//! and a question can be held so its answer is released on demand.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;

use ingatini_core::{
    DocumentId, DocumentRef, EvidenceRef, HistoryEntry, Identity, QueryAnswer, QueryRequest,
    RemoteOperation, RemoteServiceError, UploadFile, UserId,
};

use crate::service::{RagService, ServiceResult};

/// Bytes of upload per reported chunk.
const CHUNK_SIZE: usize = 1000;

/// Longest `query_text` the service accepts, in characters.
const MAX_QUERY_CHARS: usize = 2000;

#[derive(Default)]
struct MockState {
    next_id: i64,
    users: Vec<Identity>,
    documents: HashMap<UserId, Vec<DocumentRef>>,
    history: HashMap<UserId, Vec<HistoryEntry>>,
    answers: HashMap<String, ServiceResult<QueryAnswer>>,
    failures: HashMap<RemoteOperation, RemoteServiceError>,
    holds: HashMap<String, oneshot::Receiver<()>>,
    queries: Vec<QueryRequest>,
    unhealthy: bool,
}

impl MockState {
    fn mint_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, operation: RemoteOperation) -> ServiceResult<()> {
        match self.failures.get(&operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// In-memory stand-in for the remote service.
#[derive(Default)]
pub struct MockRagService {
    state: Mutex<MockState>,
}

impl MockRagService {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Script the answer for an exact question text.
    pub fn answer(&self, question: &str, answer_text: &str, evidence: &[&str]) {
        let answer = QueryAnswer {
            answer_text: answer_text.to_string(),
            evidence: evidence
                .iter()
                .map(|id| EvidenceRef {
                    document_id: DocumentId::from(*id),
                })
                .collect(),
        };
        self.lock().answers.insert(question.to_string(), Ok(answer));
    }

    /// Script a failure for an exact question text.
    pub fn answer_with_error(&self, question: &str, detail: Option<&str>) {
        let err =
            RemoteServiceError::status(RemoteOperation::Query, 500, detail.map(str::to_string));
        self.lock().answers.insert(question.to_string(), Err(err));
    }

    /// Make every call of `operation` fail with `status` and `detail`.
    pub fn fail(&self, operation: RemoteOperation, status: u16, detail: Option<&str>) {
        let err = RemoteServiceError::status(operation, status, detail.map(str::to_string));
        self.lock().failures.insert(operation, err);
    }

    /// Undo a previous [`fail`](Self::fail).
    pub fn recover(&self, operation: RemoteOperation) {
        self.lock().failures.remove(&operation);
    }

    /// Hold the next query for `question` until the returned sender fires
    /// (or is dropped).
    pub fn hold(&self, question: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().holds.insert(question.to_string(), rx);
        tx
    }

    /// Mark the health endpoint as failing.
    pub fn set_healthy(&self, healthy: bool) {
        self.lock().unhealthy = !healthy;
    }

    /// Seed a document for a user without going through upload.
    pub fn seed_document(&self, user_id: &UserId, document: DocumentRef) {
        self.lock()
            .documents
            .entry(user_id.clone())
            .or_default()
            .push(document);
    }

    /// Every query request received, in arrival order.
    pub fn recorded_queries(&self) -> Vec<QueryRequest> {
        self.lock().queries.clone()
    }
}

#[async_trait]
impl RagService for MockRagService {
    async fn create_user(&self, username: &str, _email: &str) -> ServiceResult<Identity> {
        let mut state = self.lock();
        state.check(RemoteOperation::CreateUser)?;
        if let Some(existing) = state.users.iter().find(|u| u.display_name == username) {
            return Ok(existing.clone());
        }
        let id = UserId::from(state.mint_id());
        let identity = Identity::new(id, Some(username.to_string()));
        state.users.push(identity.clone());
        Ok(identity)
    }

    async fn get_user(&self, user_id: &UserId) -> ServiceResult<Identity> {
        let state = self.lock();
        state.check(RemoteOperation::FetchUser)?;
        state
            .users
            .iter()
            .find(|u| &u.id == user_id)
            .cloned()
            .ok_or_else(|| {
                RemoteServiceError::status(
                    RemoteOperation::FetchUser,
                    404,
                    Some("User not found".to_string()),
                )
            })
    }

    async fn list_documents(&self, user_id: &UserId) -> ServiceResult<Vec<DocumentRef>> {
        let state = self.lock();
        state.check(RemoteOperation::ListDocuments)?;
        Ok(state.documents.get(user_id).cloned().unwrap_or_default())
    }

    async fn upload_document(
        &self,
        user_id: &UserId,
        file: UploadFile,
    ) -> ServiceResult<DocumentRef> {
        let mut state = self.lock();
        state.check(RemoteOperation::UploadDocument)?;
        let id = DocumentId::from(state.mint_id());
        let chunk_count = file.bytes.len().div_ceil(CHUNK_SIZE).max(1) as u32;
        let document = DocumentRef {
            id,
            chunk_count,
            file_name: Some(file.file_name),
        };
        state
            .documents
            .entry(user_id.clone())
            .or_default()
            .push(document.clone());
        Ok(document)
    }

    async fn query(&self, request: QueryRequest) -> ServiceResult<QueryAnswer> {
        let hold = {
            let mut state = self.lock();
            state.queries.push(request.clone());
            state.holds.remove(&request.query_text)
        };
        if let Some(release) = hold {
            let _ = release.await;
        }

        let mut state = self.lock();
        state.check(RemoteOperation::Query)?;
        if request.query_text.chars().count() > MAX_QUERY_CHARS {
            // Request validation failures carry a list detail, never a string.
            return Err(RemoteServiceError::status(RemoteOperation::Query, 422, None));
        }
        let outcome = state
            .answers
            .get(&request.query_text)
            .cloned()
            .unwrap_or_else(|| {
                let evidence = request
                    .document_ids
                    .iter()
                    .flatten()
                    .map(|id| EvidenceRef {
                        document_id: id.clone(),
                    })
                    .collect();
                Ok(QueryAnswer {
                    answer_text: format!("No stored answer for: {}", request.query_text),
                    evidence,
                })
            });

        if let Ok(answer) = &outcome {
            let entry = HistoryEntry {
                query_text: request.query_text.clone(),
                answer_text: answer.answer_text.clone(),
                retrieved_chunk_count: answer.evidence.len() as u32,
                created_at: Some(Utc::now()),
            };
            // Newest first, matching the service.
            state
                .history
                .entry(request.user_id.clone())
                .or_default()
                .insert(0, entry);
        }
        outcome
    }

    async fn query_history(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> ServiceResult<Vec<HistoryEntry>> {
        let state = self.lock();
        state.check(RemoteOperation::QueryHistory)?;
        Ok(state
            .history
            .get(user_id)
            .map(|entries| entries.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn health(&self) -> ServiceResult<()> {
        let state = self.lock();
        state.check(RemoteOperation::HealthCheck)?;
        if state.unhealthy {
            return Err(RemoteServiceError::status(
                RemoteOperation::HealthCheck,
                503,
                None,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_user_is_create_or_get() {
        let mock = MockRagService::new();
        let a = mock.create_user("alice", "alice@x").await.unwrap();
        let b = mock.create_user("alice", "alice@x").await.unwrap();
        let c = mock.create_user("bob", "bob@x").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[tokio::test]
    async fn test_get_unknown_user_is_404() {
        let mock = MockRagService::new();
        let err = mock.get_user(&UserId::from(99)).await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.to_string(), "User not found");
    }

    #[tokio::test]
    async fn test_upload_then_list() {
        let mock = MockRagService::new();
        let user = mock.create_user("alice", "a@x").await.unwrap();
        let doc = mock
            .upload_document(&user.id, UploadFile::new("a.txt", vec![b'x'; 2500]))
            .await
            .unwrap();
        assert_eq!(doc.chunk_count, 3);
        let docs = mock.list_documents(&user.id).await.unwrap();
        assert_eq!(docs, vec![doc]);
    }

    #[tokio::test]
    async fn test_scripted_failure_and_recovery() {
        let mock = MockRagService::new();
        mock.fail(RemoteOperation::CreateUser, 400, Some("Username already taken"));
        let err = mock.create_user("alice", "a@x").await.unwrap_err();
        assert_eq!(err.to_string(), "Username already taken");
        mock.recover(RemoteOperation::CreateUser);
        assert!(mock.create_user("alice", "a@x").await.is_ok());
    }

    #[tokio::test]
    async fn test_query_records_history_newest_first() {
        let mock = MockRagService::new();
        let user = mock.create_user("alice", "a@x").await.unwrap();
        mock.answer("q1", "a1", &["d1"]);
        for q in ["q1", "q2"] {
            mock.query(QueryRequest {
                user_id: user.id.clone(),
                query_text: q.to_string(),
                document_ids: None,
            })
            .await
            .unwrap();
        }
        let history = mock.query_history(&user.id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].query_text, "q2");
        assert_eq!(history[1].answer_text, "a1");
        assert_eq!(history[1].retrieved_chunk_count, 1);

        let limited = mock.query_history(&user.id, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_over_long_query_is_unprocessable() {
        let mock = MockRagService::new();
        let err = mock
            .query(QueryRequest {
                user_id: UserId::from(1),
                query_text: "a".repeat(MAX_QUERY_CHARS + 1),
                document_ids: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(422));
        assert_eq!(err.to_string(), "Failed to get response");
    }

    #[tokio::test]
    async fn test_health_toggle() {
        let mock = MockRagService::new();
        assert!(mock.health().await.is_ok());
        mock.set_healthy(false);
        assert!(mock.health().await.is_err());
    }
}
