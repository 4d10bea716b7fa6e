//! Document scope: the documents attached to the active identity.
//!
//! The scope only grows while an identity is active. It is replaced on
//! identity establishment and emptied on sign-out; nothing else removes
//! an entry.

use ingatini_client::RagService;
use ingatini_core::{DocumentId, DocumentRef, UploadFile, UserId, ValidationError};

use crate::error::SessionError;

/// Ordered set of documents attached to the session.
#[derive(Debug, Clone, Default)]
pub struct DocumentScope {
    documents: Vec<DocumentRef>,
}

impl DocumentScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> &[DocumentRef] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn ids(&self) -> Vec<DocumentId> {
        self.documents.iter().map(|d| d.id.clone()).collect()
    }

    /// The scope to put on a query: every attached id, or `None` when empty.
    pub fn request_scope(&self) -> Option<Vec<DocumentId>> {
        if self.documents.is_empty() {
            None
        } else {
            Some(self.ids())
        }
    }

    pub(crate) fn push(&mut self, document: DocumentRef) {
        self.documents.push(document);
    }

    /// Ingest a file and append the resulting document.
    ///
    /// Every successful call appends, even for a file uploaded before.
    pub async fn attach(
        &mut self,
        service: &dyn RagService,
        user_id: Option<&UserId>,
        file: Option<UploadFile>,
    ) -> Result<DocumentRef, SessionError> {
        let file = file.ok_or(ValidationError::MissingFile)?;
        let user_id = user_id.ok_or(ValidationError::NoIdentity)?;

        let file_name = file.file_name.clone();
        let size = file.bytes.len();
        match service.upload_document(user_id, file).await {
            Ok(document) => {
                tracing::info!(
                    user_id = %user_id,
                    document_id = %document.id,
                    file = %file_name,
                    bytes = size,
                    chunks = document.chunk_count,
                    "Document attached"
                );
                self.push(document.clone());
                Ok(document)
            }
            Err(err) => {
                tracing::warn!(
                    user_id = %user_id,
                    file = %file_name,
                    error = ?err,
                    "Upload failed"
                );
                Err(err.into())
            }
        }
    }

    /// Best-effort reload of the user's documents from the service.
    ///
    /// Failure is logged and leaves the scope empty; it never blocks the
    /// session. Returns the number of documents now in scope.
    pub async fn populate(&mut self, service: &dyn RagService, user_id: &UserId) -> usize {
        match service.list_documents(user_id).await {
            Ok(documents) => {
                tracing::debug!(
                    user_id = %user_id,
                    count = documents.len(),
                    "Document scope loaded"
                );
                self.documents = documents;
            }
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = ?err, "Failed to load documents");
                self.documents.clear();
            }
        }
        self.documents.len()
    }

    pub fn clear(&mut self) {
        self.documents.clear();
    }
}
