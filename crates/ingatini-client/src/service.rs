//! The service trait every external call goes through.

use async_trait::async_trait;

use ingatini_core::{
    DocumentRef, HistoryEntry, Identity, QueryAnswer, QueryRequest, RemoteServiceError,
    UploadFile, UserId,
};

/// Result of a single remote call.
pub type ServiceResult<T> = Result<T, RemoteServiceError>;

/// The external identity, ingestion, retrieval, and history services.
///
/// Every method is one suspend point: it returns once the service has
/// answered or the transport has failed. Implementations never retry.
#[async_trait]
pub trait RagService: Send + Sync {
    /// Create a user record (`POST /users/`).
    async fn create_user(&self, username: &str, email: &str) -> ServiceResult<Identity>;

    /// Fetch an existing user record (`GET /users/{id}`).
    async fn get_user(&self, user_id: &UserId) -> ServiceResult<Identity>;

    /// Documents already ingested for a user (`GET /documents/{user_id}`).
    async fn list_documents(&self, user_id: &UserId) -> ServiceResult<Vec<DocumentRef>>;

    /// Ingest a file for a user (`POST /documents/upload?user_id=`).
    async fn upload_document(&self, user_id: &UserId, file: UploadFile)
        -> ServiceResult<DocumentRef>;

    /// Answer a scoped question (`POST /query/`).
    async fn query(&self, request: QueryRequest) -> ServiceResult<QueryAnswer>;

    /// Past exchanges for a user, newest first (`GET /query/history/{user_id}`).
    async fn query_history(&self, user_id: &UserId, limit: u32) -> ServiceResult<Vec<HistoryEntry>>;

    /// One-shot liveness probe (`GET /health`).
    async fn health(&self) -> ServiceResult<()>;
}
