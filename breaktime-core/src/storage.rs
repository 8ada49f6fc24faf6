//! Object-store directory listing and stale-prefix discovery.
//!
//! Listings use delimiter grouping so the store reports "directories"
//! (prefixes) rather than individual objects. All pages for a job are
//! accumulated in the order the store returns them, then the newest entries
//! are trimmed off the tail so they are never offered as cleanup candidates.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::control_plane::{CredentialValidator, check_status};
use crate::credential::Credential;
use crate::error::JobError;
use crate::job_id::JobId;

pub const DEFAULT_STORAGE_BASE_URL: &str =
    "https://storage.googleapis.com/storage/v1";

/// Largest page size the list endpoint accepts.
pub const MAX_PAGE_SIZE: i32 = i32::MAX;

/// One page of a delimiter listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryPage {
    #[serde(default)]
    pub prefixes: Vec<String>,
    /// Empty when this is the last page.
    #[serde(default)]
    pub next_page_token: String,
}

/// Query parameters of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub delimiter: String,
    pub prefix: String,
    pub page_token: String,
    pub max_results: i32,
}

impl ListQuery {
    /// First-page query for the directories directly under `prefix`.
    pub fn directories(prefix: impl Into<String>) -> Self {
        Self {
            delimiter: "/".to_string(),
            prefix: prefix.into(),
            page_token: String::new(),
            max_results: MAX_PAGE_SIZE,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_page(
        &self,
        bucket: &str,
        query: &ListQuery,
        credential: &Credential,
    ) -> Result<DirectoryPage, JobError>;
}

/// JSON API client for a GCS-compatible store.
#[derive(Debug, Clone)]
pub struct GcsObjectStore {
    client: Client,
    base_url: String,
}

impl GcsObjectStore {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, JobError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!("{}/b/{}", self.base_url, bucket)
    }

    /// Bucket metadata request, used as a cheap credential check.
    pub async fn probe(
        &self,
        bucket: &str,
        credential: &Credential,
    ) -> Result<(), JobError> {
        let request = self
            .client
            .get(self.bucket_url(bucket))
            .header(reqwest::header::AUTHORIZATION, credential.bearer());
        check_status(request.send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn list_page(
        &self,
        bucket: &str,
        query: &ListQuery,
        credential: &Credential,
    ) -> Result<DirectoryPage, JobError> {
        let url = format!("{}/o", self.bucket_url(bucket));
        debug!(%url, prefix = %query.prefix, "Listing directories");
        let request = self
            .client
            .get(&url)
            .query(query)
            .header(reqwest::header::AUTHORIZATION, credential.bearer())
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        let response = check_status(request.send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// A store bound to one bucket, validating credentials against it.
#[derive(Debug, Clone)]
pub struct BucketAccess {
    store: Arc<GcsObjectStore>,
    bucket: String,
}

impl BucketAccess {
    pub fn new(store: Arc<GcsObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl CredentialValidator for BucketAccess {
    async fn validate(&self, credential: &Credential) -> Result<(), JobError> {
        self.store.probe(&self.bucket, credential).await
    }
}

/// Drop the last `count` entries. Fewer than `count` entries leaves nothing.
pub fn trim_newest(mut dirs: Vec<String>, count: usize) -> Vec<String> {
    let keep = dirs.len().saturating_sub(count);
    dirs.truncate(keep);
    dirs
}

/// Paginated directory listing with tail trimming.
#[derive(Clone)]
pub struct DirectoryPager {
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for DirectoryPager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryPager").finish_non_exhaustive()
    }
}

impl DirectoryPager {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Every directory under `prefix`, in store order.
    ///
    /// The first failed page request ends the listing; whatever was
    /// accumulated up to that point is returned.
    pub async fn list_all(
        &self,
        bucket: &str,
        prefix: &str,
        credential: &Credential,
    ) -> Vec<String> {
        let mut dirs = Vec::new();
        let mut query = ListQuery::directories(prefix);
        let mut pages = 0usize;

        loop {
            let page = match self
                .store
                .list_page(bucket, &query, credential)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        bucket,
                        prefix,
                        pages,
                        "Directory listing stopped early: {}",
                        e
                    );
                    break;
                }
            };

            pages += 1;
            debug!(
                prefix,
                pages,
                fetched = page.prefixes.len(),
                "Fetched directory page"
            );
            dirs.extend(page.prefixes);

            if page.next_page_token.is_empty() {
                break;
            }
            query.page_token = page.next_page_token;
        }

        dirs
    }

    /// Directories under the job's `subpath` that are safe to clean up:
    /// everything except the last `trim_count` entries.
    ///
    /// Invalid identifiers yield an empty list.
    pub async fn list_and_prune(
        &self,
        bucket: &str,
        job: &str,
        subpath: &str,
        credential: &Credential,
        trim_count: usize,
    ) -> Vec<String> {
        let job = match JobId::parse(job) {
            Ok(job) => job,
            Err(e) => {
                warn!("Skipping directory audit: {}", e);
                return Vec::new();
            }
        };

        let prefix = job.storage_prefix(subpath);
        let dirs = self.list_all(bucket, &prefix, credential).await;
        trim_newest(dirs, trim_count)
    }
}
