//! HTTP client for the job control plane.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::credential::Credential;
use crate::error::JobError;
use crate::job_id::JobId;

/// Default timeout for a single control-plane or storage request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Lightweight check of whether a credential is still accepted.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, credential: &Credential) -> Result<(), JobError>;
}

/// Job-scoped operations of the control plane.
///
/// `suffix` is appended to the job's path (`""` addresses the job root).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn post(
        &self,
        job: &JobId,
        suffix: &str,
        body: &Value,
        credential: &Credential,
    ) -> Result<(), JobError>;

    async fn get(
        &self,
        job: &JobId,
        credential: &Credential,
    ) -> Result<Value, JobError>;

    async fn delete(
        &self,
        job: &JobId,
        credential: &Credential,
    ) -> Result<(), JobError>;
}

/// reqwest-backed [`ControlPlane`].
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: Client,
    base_url: String,
    validate_path: String,
}

impl HttpControlPlane {
    pub fn new(
        base_url: impl Into<String>,
        validate_path: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, JobError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, validate_path))
    }

    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        validate_path: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            validate_path: validate_path
                .into()
                .trim_start_matches('/')
                .to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `job`, optionally followed by `/{suffix}`.
    pub fn job_url(&self, job: &JobId, suffix: &str) -> String {
        let suffix = suffix.trim_matches('/');
        if suffix.is_empty() {
            format!("{}/{}", self.base_url, job.control_path())
        } else {
            format!("{}/{}/{}", self.base_url, job.control_path(), suffix)
        }
    }

    fn authorize(
        builder: RequestBuilder,
        credential: &Credential,
    ) -> RequestBuilder {
        builder.header(reqwest::header::AUTHORIZATION, credential.bearer())
    }
}

/// Map a response onto the per-job error taxonomy: 403 is kept apart from
/// every other non-success status.
pub(crate) async fn check_status(
    response: Response,
) -> Result<Response, JobError> {
    let status = response.status();
    if status == StatusCode::FORBIDDEN {
        return Err(JobError::Forbidden);
    }
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(JobError::Remote {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl CredentialValidator for HttpControlPlane {
    async fn validate(&self, credential: &Credential) -> Result<(), JobError> {
        let url = format!("{}/{}", self.base_url, self.validate_path);
        debug!(%url, "Validating credential");
        let request = Self::authorize(self.client.get(&url), credential);
        check_status(request.send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn post(
        &self,
        job: &JobId,
        suffix: &str,
        body: &Value,
        credential: &Credential,
    ) -> Result<(), JobError> {
        let url = self.job_url(job, suffix);
        debug!(%url, "POST");
        let request = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "*/*")
            .json(body);
        check_status(Self::authorize(request, credential).send().await?)
            .await?;
        Ok(())
    }

    async fn get(
        &self,
        job: &JobId,
        credential: &Credential,
    ) -> Result<Value, JobError> {
        let url = self.job_url(job, "");
        debug!(%url, "GET");
        let request = Self::authorize(self.client.get(&url), credential);
        let response = check_status(request.send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn delete(
        &self,
        job: &JobId,
        credential: &Credential,
    ) -> Result<(), JobError> {
        let url = self.job_url(job, "");
        debug!(%url, "DELETE");
        let request = self
            .client
            .delete(&url)
            .json(&serde_json::json!({}));
        check_status(Self::authorize(request, credential).send().await?)
            .await?;
        Ok(())
    }
}
