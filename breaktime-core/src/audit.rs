//! Stale storage prefix audit, run through the dispatcher.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::credential::Credential;
use crate::dispatcher::JobHandler;
use crate::error::JobError;
use crate::storage::DirectoryPager;

/// Cleanup candidates found for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditFinding {
    pub position: usize,
    pub job: String,
    pub candidates: Vec<String>,
}

/// Collects cleanup candidates for every job it is handed.
#[derive(Debug)]
pub struct AuditHandler {
    pager: DirectoryPager,
    bucket: String,
    subpath: String,
    trim_count: usize,
    findings: Mutex<Vec<AuditFinding>>,
}

impl AuditHandler {
    pub fn new(
        pager: DirectoryPager,
        bucket: impl Into<String>,
        subpath: impl Into<String>,
        trim_count: usize,
    ) -> Self {
        Self {
            pager,
            bucket: bucket.into(),
            subpath: subpath.into(),
            trim_count,
            findings: Mutex::new(Vec::new()),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Drain the findings collected so far, ordered by job position.
    pub async fn take_findings(&self) -> Vec<AuditFinding> {
        let mut findings = std::mem::take(&mut *self.findings.lock().await);
        findings.sort_by_key(|finding| finding.position);
        findings
    }
}

#[async_trait]
impl JobHandler for AuditHandler {
    /// Listing problems degrade to fewer candidates; this never fails.
    async fn handle(
        &self,
        job: &str,
        position: usize,
        credential: &Credential,
    ) -> Result<(), JobError> {
        let candidates = self
            .pager
            .list_and_prune(
                &self.bucket,
                job,
                &self.subpath,
                credential,
                self.trim_count,
            )
            .await;

        info!(
            position,
            job,
            candidates = candidates.len(),
            "Directory audit finished"
        );
        self.findings.lock().await.push(AuditFinding {
            position,
            job: job.to_string(),
            candidates,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DirectoryPage, MockObjectStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn findings_are_sorted_by_position() {
        let mut store = MockObjectStore::new();
        store.expect_list_page().returning(|_, query, _| {
            Ok(DirectoryPage {
                prefixes: vec![
                    format!("{}old/", query.prefix),
                    format!("{}new/", query.prefix),
                ],
                next_page_token: String::new(),
            })
        });
        let handler = AuditHandler::new(
            DirectoryPager::new(Arc::new(store)),
            "lake",
            "transactions",
            1,
        );
        let credential = Credential::new("t");

        handler.handle("a.b.c.d.f", 2, &credential).await.unwrap();
        handler.handle("a.b.c.d.e", 1, &credential).await.unwrap();
        handler.handle("bogus", 3, &credential).await.unwrap();

        let findings = handler.take_findings().await;
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].job, "a.b.c.d.e");
        assert_eq!(
            findings[0].candidates,
            vec!["a/b/c/d/e/transactions/old/".to_string()]
        );
        assert_eq!(findings[1].position, 2);
        assert!(findings[2].candidates.is_empty());
        assert!(handler.take_findings().await.is_empty());
    }
}
