// crates/core/src/client.rs
//! List service endpoints used by job trackers.

use async_trait::async_trait;
use lists_jobs_types::{JobKind, JobRecord, ListDetails};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// The list service as seen by a tracker.
///
/// Implementations include:
/// - `HttpJobClient`: talks to the list service over HTTP
/// - test doubles that script responses
#[async_trait]
pub trait JobApi: Send + Sync {
    /// `POST /lists/{listId}/{jobKind}`: start a job, returning its first record.
    async fn start_job(&self, list_id: &str, kind: JobKind) -> Result<JobRecord, ClientError>;

    /// `GET /lists/{listId}/{jobKind}/{jobId}`: current record of a job.
    async fn job_status(
        &self,
        list_id: &str,
        kind: JobKind,
        job_id: &str,
    ) -> Result<JobRecord, ClientError>;

    /// `POST /lists/{listId}/{jobKind}/{jobId}/cancel`. `None` when the
    /// service confirms without a body.
    async fn cancel_job(
        &self,
        list_id: &str,
        kind: JobKind,
        job_id: &str,
    ) -> Result<Option<JobRecord>, ClientError>;

    /// `GET /lists/{listId}`: list details, including its refresh records.
    async fn list_details(&self, list_id: &str) -> Result<ListDetails, ClientError>;
}

/// `JobApi` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpJobClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpJobClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(tenant) = &config.tenant {
            headers.insert(
                HeaderName::from_static("x-okapi-tenant"),
                header_value("tenant", tenant)?,
            );
        }
        if let Some(token) = &config.token {
            headers.insert(
                HeaderName::from_static("x-okapi-token"),
                header_value("token", token)?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::InvalidConfig {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, ClientError> {
        let resp = request.send().await.map_err(ClientError::transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(ClientError::transport)?;
        if !status.is_success() {
            tracing::debug!(%status, body_len = body.len(), "list service returned an error");
            return Err(ClientError::status(status.as_u16(), body));
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let body = self.send(request).await?;
        decode(&body)
    }
}

#[async_trait]
impl JobApi for HttpJobClient {
    async fn start_job(&self, list_id: &str, kind: JobKind) -> Result<JobRecord, ClientError> {
        let url = self.url(&format!("lists/{list_id}/{}", kind.path_segment()));
        tracing::debug!(%list_id, %kind, "requesting job start");
        self.send_json(self.client.post(url)).await
    }

    async fn job_status(
        &self,
        list_id: &str,
        kind: JobKind,
        job_id: &str,
    ) -> Result<JobRecord, ClientError> {
        let url = self.url(&format!("lists/{list_id}/{}/{job_id}", kind.path_segment()));
        tracing::debug!(%list_id, %kind, %job_id, "fetching job status");
        self.send_json(self.client.get(url)).await
    }

    async fn cancel_job(
        &self,
        list_id: &str,
        kind: JobKind,
        job_id: &str,
    ) -> Result<Option<JobRecord>, ClientError> {
        let url = self.url(&format!(
            "lists/{list_id}/{}/{job_id}/cancel",
            kind.path_segment()
        ));
        tracing::debug!(%list_id, %kind, %job_id, "requesting job cancel");
        let body = self.send(self.client.post(url)).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        decode(&body).map(Some)
    }

    async fn list_details(&self, list_id: &str) -> Result<ListDetails, ClientError> {
        let url = self.url(&format!("lists/{list_id}"));
        self.send_json(self.client.get(url)).await
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ClientError> {
    HeaderValue::from_str(value).map_err(|e| ClientError::InvalidConfig {
        message: format!("invalid {name} header: {e}"),
    })
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(500).collect();
        tracing::warn!(body = %preview, "list service returned unexpected JSON");
        ClientError::Decode {
            message: e.to_string(),
        }
    })
}
