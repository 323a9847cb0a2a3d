use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::review::{Finding, ScanReport, Severity};

pub mod file_store;

/// Report fields a listing can be ordered by.
///
/// Only the numeric report fields are orderable; any other field name maps to
/// [`SortBy::Unordered`], which leaves the store's insertion order untouched.
/// Sorting by `owner` or `repo` is therefore deliberately a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    ScannedAt,
    PullNumber,
    FilesScanned,
    FindingCount,
    Unordered,
}

impl SortBy {
    /// Map a caller-supplied field name (snake_case or camelCase) to a sort
    /// key. Unknown and non-numeric names fall back to `Unordered`.
    pub fn from_field(name: &str) -> Self {
        match name {
            "scanned_at" | "scannedAt" => SortBy::ScannedAt,
            "pull_number" | "pullNumber" => SortBy::PullNumber,
            "files_scanned" | "filesScanned" => SortBy::FilesScanned,
            "finding_count" | "findingCount" => SortBy::FindingCount,
            _ => SortBy::Unordered,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        match input {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(anyhow::anyhow!(
                "sort order must be `asc` or `desc` (got `{other}`)"
            )),
        }
    }
}

/// Parameters for a paginated report listing.
#[derive(Debug, Clone)]
pub struct ListQuery {
    /// 1-based page index.
    pub page: usize,
    pub limit: usize,
    /// Exact `owner/repo` filter.
    pub repo: Option<String>,
    pub sort_by: SortBy,
    pub order: SortOrder,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            repo: None,
            sort_by: SortBy::ScannedAt,
            order: SortOrder::Desc,
        }
    }
}

/// One page of reports plus the total match count before pagination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanPage {
    pub reports: Vec<ScanReport>,
    pub total: usize,
}

/// Finding counts broken down by severity tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }
}

/// Store-wide statistics for the dashboard header.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_scans: usize,
    pub total_findings: usize,
    pub by_severity: SeverityCounts,
    /// `None` when no scan has completed yet.
    pub last_scan_at: Option<DateTime<Utc>>,
}

/// A critical or high finding paired with the scan that produced it, for the
/// cross-scan attention feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotableFinding {
    pub scan_id: String,
    pub repository: String,
    pub pull_number: u64,
    pub scanned_at: DateTime<Utc>,
    pub finding: Finding,
}

/// Persistence seam for completed scan reports.
///
/// Reports are write-once: `save_scan` is the only mutation and there are no
/// deletions. Implementations decide the durability backend; callers only see
/// these operations.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert a freshly created report and persist the store's state.
    async fn save_scan(&self, report: ScanReport) -> Result<()>;

    /// Fetch a single report by id.
    async fn get_scan(&self, id: &str) -> Result<Option<ScanReport>>;

    /// Paginated, optionally filtered and sorted listing.
    async fn list_scans(&self, query: &ListQuery) -> Result<ScanPage>;

    /// Store-wide counts and the most recent scan time.
    async fn stats(&self) -> Result<StoreStats>;

    /// Critical findings first, then high; newest scans first within a tier.
    async fn notable_findings(&self, limit: usize) -> Result<Vec<NotableFinding>>;

    /// Every `owner/repo` key the store has seen.
    async fn repos(&self) -> Result<Vec<String>>;
}
