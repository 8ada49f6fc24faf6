//! Five-segment job identifiers.
//!
//! A job identifier has the shape
//! `source.technology.database.datasetPrefix.datasetSuffix`. It is validated
//! before any network call is made and rendered into control-plane paths and
//! object-store prefixes.

use std::fmt;
use std::str::FromStr;

use crate::error::JobError;

/// A parsed job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId {
    pub source: String,
    pub technology: String,
    pub database: String,
    pub dataset_prefix: String,
    pub dataset_suffix: String,
}

impl JobId {
    /// Split `raw` on `.`; succeeds iff exactly five non-empty segments
    /// result. No trimming or case-folding is applied.
    pub fn parse(raw: &str) -> Result<Self, JobError> {
        let segments: Vec<&str> = raw.split('.').collect();
        let [source, technology, database, prefix, suffix] = segments[..]
        else {
            return Err(JobError::InvalidIdentifier(raw.to_string()));
        };

        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(JobError::InvalidIdentifier(raw.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            technology: technology.to_string(),
            database: database.to_string(),
            dataset_prefix: prefix.to_string(),
            dataset_suffix: suffix.to_string(),
        })
    }

    /// Cheap validity check used for up-front reporting.
    pub fn is_valid(raw: &str) -> bool {
        Self::parse(raw).is_ok()
    }

    /// `{prefix}.{suffix}`, the job's name inside its database.
    pub fn dataset(&self) -> String {
        format!("{}.{}", self.dataset_prefix, self.dataset_suffix)
    }

    /// Control-plane path of the job, relative to the service base URL.
    pub fn control_path(&self) -> String {
        format!(
            "sources/{}/technologies/{}/databases/{}/jobs/{}",
            self.source,
            self.technology,
            self.database,
            self.dataset()
        )
    }

    /// Object-store prefix for the job's data under `subpath`, always
    /// terminated by the `/` delimiter.
    pub fn storage_prefix(&self, subpath: &str) -> String {
        let root = format!(
            "{}/{}/{}/{}/{}",
            self.source,
            self.technology,
            self.database,
            self.dataset_prefix,
            self.dataset_suffix
        );
        let subpath = subpath.trim_matches('/');
        if subpath.is_empty() {
            format!("{root}/")
        } else {
            format!("{root}/{subpath}/")
        }
    }
}

impl FromStr for JobId {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}",
            self.source,
            self.technology,
            self.database,
            self.dataset_prefix,
            self.dataset_suffix
        )
    }
}
