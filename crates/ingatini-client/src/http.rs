//! `reqwest`-backed implementation of [`RagService`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use ingatini_core::config::ServiceConfig;
use ingatini_core::{
    DocumentRef, HistoryEntry, Identity, IngatiniError, QueryAnswer, QueryRequest,
    RemoteOperation, RemoteServiceError, UploadFile, UserId,
};

use crate::service::{RagService, ServiceResult};
use crate::wire::{
    error_detail, DocumentRecord, HistoryBody, QueryResponseBody, UserCreate, UserRecord,
};

/// HTTP client for the RAG service.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct HttpRagClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRagClient {
    /// Build a client from the `[service]` configuration section.
    pub fn new(config: &ServiceConfig) -> Result<Self, IngatiniError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| IngatiniError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, &config.base_url))
    }

    /// Wrap an existing `reqwest` client.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and hand back the response only if it is 2xx.
    async fn send(
        &self,
        operation: RemoteOperation,
        request: RequestBuilder,
    ) -> ServiceResult<Response> {
        tracing::debug!(operation = %operation, "Dispatching request");
        let response = request.send().await.map_err(|error| {
            tracing::warn!(operation = %operation, error = %error, "Request failed");
            RemoteServiceError::transport(operation, error.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(&body);
        tracing::warn!(
            operation = %operation,
            status = status.as_u16(),
            detail = detail.as_deref().unwrap_or(""),
            "Service returned an error"
        );
        Err(RemoteServiceError::status(operation, status.as_u16(), detail))
    }

    /// Send a request and decode its JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: RemoteOperation,
        request: RequestBuilder,
    ) -> ServiceResult<T> {
        let response = self.send(operation, request).await?;
        let body = response.bytes().await.map_err(|error| {
            RemoteServiceError::transport(operation, format!("body read failed: {error}"))
        })?;
        serde_json::from_slice(&body).map_err(|error| {
            tracing::warn!(
                operation = %operation,
                error = %error,
                "Response did not match contract"
            );
            RemoteServiceError::decode(operation, error.to_string())
        })
    }
}

#[async_trait]
impl RagService for HttpRagClient {
    async fn create_user(&self, username: &str, email: &str) -> ServiceResult<Identity> {
        let body = UserCreate {
            username: username.to_string(),
            email: email.to_string(),
        };
        let record: UserRecord = self
            .send_json(
                RemoteOperation::CreateUser,
                self.client.post(self.url("/users/")).json(&body),
            )
            .await?;
        Ok(record.into())
    }

    async fn get_user(&self, user_id: &UserId) -> ServiceResult<Identity> {
        let record: UserRecord = self
            .send_json(
                RemoteOperation::FetchUser,
                self.client.get(self.url(&format!("/users/{user_id}"))),
            )
            .await?;
        Ok(record.into())
    }

    async fn list_documents(&self, user_id: &UserId) -> ServiceResult<Vec<DocumentRef>> {
        let records: Vec<DocumentRecord> = self
            .send_json(
                RemoteOperation::ListDocuments,
                self.client.get(self.url(&format!("/documents/{user_id}"))),
            )
            .await?;
        Ok(records.into_iter().map(DocumentRef::from).collect())
    }

    async fn upload_document(
        &self,
        user_id: &UserId,
        file: UploadFile,
    ) -> ServiceResult<DocumentRef> {
        let part = Part::bytes(file.bytes).file_name(file.file_name);
        let form = Form::new().part("file", part);
        let record: DocumentRecord = self
            .send_json(
                RemoteOperation::UploadDocument,
                self.client
                    .post(self.url("/documents/upload"))
                    .query(&[("user_id", user_id.to_string())])
                    .multipart(form),
            )
            .await?;
        Ok(record.into())
    }

    async fn query(&self, request: QueryRequest) -> ServiceResult<QueryAnswer> {
        let body: QueryResponseBody = self
            .send_json(
                RemoteOperation::Query,
                self.client.post(self.url("/query/")).json(&request),
            )
            .await?;
        Ok(body.into())
    }

    async fn query_history(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> ServiceResult<Vec<HistoryEntry>> {
        let body: HistoryBody = self
            .send_json(
                RemoteOperation::QueryHistory,
                self.client
                    .get(self.url(&format!("/query/history/{user_id}")))
                    .query(&[("limit", limit)]),
            )
            .await?;
        Ok(body.history.into_iter().map(HistoryEntry::from).collect())
    }

    async fn health(&self) -> ServiceResult<()> {
        self.send(
            RemoteOperation::HealthCheck,
            self.client.get(self.url("/health")),
        )
        .await
        .map(|_| ())
    }
}
