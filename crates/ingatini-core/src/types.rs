use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// An identifier minted by the remote service.
///
/// The service currently hands out integers, but nothing in the client
/// depends on that; whatever shape arrives is echoed back unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteId::Number(n) => write!(f, "{}", n),
            RemoteId::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for RemoteId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<i64>() {
            Ok(n) => RemoteId::Number(n),
            Err(_) => RemoteId::Text(s.to_string()),
        })
    }
}

macro_rules! remote_id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub RemoteId);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map($name)
            }
        }

        impl From<i64> for $name {
            fn from(n: i64) -> Self {
                $name(RemoteId::Number(n))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(RemoteId::Text(s.to_string()))
            }
        }
    };
}

remote_id_newtype!(
    /// Opaque user identifier issued by the identity service.
    UserId
);

remote_id_newtype!(
    /// Opaque document identifier issued by the ingestion service.
    DocumentId
);

// =============================================================================
// Session data
// =============================================================================

/// The established user of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub display_name: String,
}

impl Identity {
    /// Build an identity, falling back to `User {id}` when the service gave no name.
    pub fn new(id: UserId, display_name: Option<String>) -> Self {
        let display_name = display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("User {}", id));
        Self { id, display_name }
    }
}

/// A document attached to the session scope. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: DocumentId,
    pub chunk_count: u32,
    /// File name as reported by the ingestion service, if any.
    pub file_name: Option<String>,
}

/// A file selected for upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

// =============================================================================
// Transcript
// =============================================================================

/// Author of a transcript turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A question typed by the user.
    User,
    /// A generated answer.
    Assistant,
    /// A failed exchange.
    Error,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Error => "error",
        }
    }

    /// Whether a turn with this role closes an exchange.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Role::User)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pointer to a source chunk that informed an answer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub document_id: DocumentId,
}

/// One entry of the append-only conversation transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub evidence: Option<Vec<EvidenceRef>>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            evidence: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, evidence: Vec<EvidenceRef>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            evidence: Some(evidence),
            created_at: Utc::now(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            role: Role::Error,
            content: content.into(),
            evidence: None,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Query contract
// =============================================================================

/// A scoped question sent to the retrieval+generation service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub user_id: UserId,
    pub query_text: String,
    /// Omitted entirely when the session scope is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<DocumentId>>,
}

/// A successful answer from the retrieval+generation service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryAnswer {
    pub answer_text: String,
    /// Every chunk the service reports, in service order. Not yet truncated.
    pub evidence: Vec<EvidenceRef>,
}

/// A past exchange as persisted by the history service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub query_text: String,
    pub answer_text: String,
    pub retrieved_chunk_count: u32,
    pub created_at: Option<DateTime<Utc>>,
}

/// Connectivity indicator set by the one-shot health probe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStatus {
    #[default]
    Checking,
    Connected,
    Disconnected,
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApiStatus::Checking => "Checking...",
            ApiStatus::Connected => "API Connected",
            ApiStatus::Disconnected => "API Disconnected",
        })
    }
}

/// Parse a service timestamp.
///
/// Accepts RFC 3339 and the naive ISO 8601 form the service emits for
/// timezone-less columns (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
