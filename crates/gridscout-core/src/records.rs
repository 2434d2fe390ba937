//! Job lifecycle and result record types shared by the pipeline, storage,
//! and HTTP layers.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a scrape job.
///
/// `Complete` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Starting,
    InProgress,
    Complete,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::InProgress => "in_progress",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starting" => Ok(JobStatus::Starting),
            "in_progress" => Ok(JobStatus::InProgress),
            "complete" => Ok(JobStatus::Complete),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// Boundary within which a `place_id` counts as already seen.
///
/// `Job` collapses a place matching several brands into one record (the first
/// brand to find it wins). `Brand` keeps one record per brand, so the same
/// store can appear once for every brand whose search surfaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupScope {
    Job,
    Brand,
}

impl DedupScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DedupScope::Job => "job",
            DedupScope::Brand => "brand",
        }
    }
}

impl std::fmt::Display for DedupScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DedupScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "job" | "global" => Ok(DedupScope::Job),
            "brand" | "per_brand" => Ok(DedupScope::Brand),
            other => Err(format!("expected job or brand, got '{other}'")),
        }
    }
}

/// One place found for one brand, as persisted and streamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub job_id: String,
    pub search_brand: String,
    pub search_sku: String,
    pub search_category: String,
    pub gmaps_category: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub business_status: Option<String>,
    pub place_url: String,
    pub place_id: String,
    pub is_brand_match: bool,
}
