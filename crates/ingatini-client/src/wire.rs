//! JSON records exchanged with the RAG service.
//!
//! Only the fields the client reads are modelled; everything else in a
//! response body is ignored.

use serde::{Deserialize, Serialize};

use ingatini_core::{
    parse_timestamp, DocumentId, DocumentRef, EvidenceRef, HistoryEntry, Identity, QueryAnswer,
    UserId,
};

/// Body of `POST /users/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub email: String,
}

/// A user as returned by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
}

impl From<UserRecord> for Identity {
    fn from(record: UserRecord) -> Self {
        Identity::new(record.id, record.username)
    }
}

/// A document as returned by both the list and the upload endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub total_chunks: u32,
}

impl From<DocumentRecord> for DocumentRef {
    fn from(record: DocumentRecord) -> Self {
        DocumentRef {
            id: record.id,
            chunk_count: record.total_chunks,
            file_name: record.filename,
        }
    }
}

/// One retrieved chunk inside a query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub document_id: DocumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Body of a successful `POST /query/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponseBody {
    pub response: String,
    #[serde(default)]
    pub retrieved_chunks: Vec<ChunkRecord>,
}

impl From<QueryResponseBody> for QueryAnswer {
    fn from(body: QueryResponseBody) -> Self {
        QueryAnswer {
            answer_text: body.response,
            evidence: body
                .retrieved_chunks
                .into_iter()
                .map(|chunk| EvidenceRef {
                    document_id: chunk.document_id,
                })
                .collect(),
        }
    }
}

/// One persisted exchange.
///
/// The history endpoint has shipped with two spellings of its fields;
/// both are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(alias = "query")]
    pub query_text: String,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default, alias = "chunks_count")]
    pub retrieved_chunks_count: Option<u32>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl From<HistoryRecord> for HistoryEntry {
    fn from(record: HistoryRecord) -> Self {
        HistoryEntry {
            query_text: record.query_text,
            answer_text: record.response.unwrap_or_default(),
            retrieved_chunk_count: record.retrieved_chunks_count.unwrap_or(0),
            created_at: record.created_at.as_deref().and_then(parse_timestamp),
        }
    }
}

/// Body of `GET /query/history/{user_id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryBody {
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
}

/// Error body. `detail` is a string for handled errors but a list of
/// objects for request validation failures; only the string form is shown.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

/// Extract a displayable `detail` from a raw error body, if there is one.
pub fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(detail) if !detail.trim().is_empty() => Some(detail),
        _ => None,
    }
}
