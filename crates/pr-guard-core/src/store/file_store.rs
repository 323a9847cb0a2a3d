use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::{
    ListQuery, NotableFinding, ReportStore, ScanPage, SeverityCounts, SortBy, SortOrder,
    StoreStats,
};
use crate::review::{ScanReport, Severity};

const DATA_FILE_ENV: &str = "PR_GUARD_DATA_FILE";
const DEFAULT_DATA_FILE: &str = "./data/scan-reports.json";

/// Flat-file report store: an in-memory, insertion-ordered list with id and
/// repository indexes, serialized wholesale to one JSON file on every save.
///
/// Durability is best-effort. A missing or corrupt snapshot at startup means
/// an empty store, and a failed persist leaves the in-memory state
/// authoritative for the rest of the process lifetime; neither is fatal.
pub struct FileReportStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    /// Insertion-ordered; the snapshot file is exactly this list as JSON.
    reports: Vec<ScanReport>,
    by_id: HashMap<String, usize>,
    /// `owner/repo` → insertion-ordered report ids.
    by_repo: BTreeMap<String, Vec<String>>,
}

impl StoreState {
    fn from_reports(reports: Vec<ScanReport>) -> Self {
        let mut state = Self::default();
        for report in reports {
            state.insert(report);
        }
        state
    }

    fn insert(&mut self, report: ScanReport) {
        self.by_id.insert(report.id.clone(), self.reports.len());
        self.by_repo
            .entry(report.repo_key())
            .or_default()
            .push(report.id.clone());
        self.reports.push(report);
    }
}

impl FileReportStore {
    /// Open the store at `path`, loading any existing snapshot.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = StoreState::from_reports(load_snapshot(&path));
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// Open the store at the path named by `PR_GUARD_DATA_FILE`, falling back
    /// to `./data/scan-reports.json`.
    pub fn from_env() -> Self {
        let path = std::env::var(DATA_FILE_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_FILE.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&state.reports)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

fn load_snapshot(path: &std::path::Path) -> Vec<ScanReport> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no snapshot file; starting with an empty store");
            return Vec::new();
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read snapshot; starting with an empty store");
            return Vec::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(reports) => reports,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "snapshot is not a valid report array; starting with an empty store");
            Vec::new()
        }
    }
}

#[async_trait]
impl ReportStore for FileReportStore {
    async fn save_scan(&self, report: ScanReport) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.by_id.contains_key(&report.id) {
            bail!("scan report `{}` already exists", report.id);
        }
        state.insert(report);

        if let Err(err) = self.persist(&state) {
            warn!(
                path = %self.path.display(),
                error = %format!("{err:#}"),
                "failed to persist snapshot; in-memory state remains authoritative"
            );
        }
        Ok(())
    }

    async fn get_scan(&self, id: &str) -> Result<Option<ScanReport>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .by_id
            .get(id)
            .map(|slot| state.reports[*slot].clone()))
    }

    async fn list_scans(&self, query: &ListQuery) -> Result<ScanPage> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<&ScanReport> = state
            .reports
            .iter()
            .filter(|report| match &query.repo {
                Some(repo) => report.repo_key() == *repo,
                None => true,
            })
            .collect();

        match query.sort_by {
            SortBy::ScannedAt => rows.sort_by_key(|report| report.scanned_at),
            SortBy::PullNumber => rows.sort_by_key(|report| report.pull_number),
            SortBy::FilesScanned => rows.sort_by_key(|report| report.files_scanned),
            SortBy::FindingCount => rows.sort_by_key(|report| report.finding_count()),
            SortBy::Unordered => {}
        }
        if query.order == SortOrder::Desc && query.sort_by != SortBy::Unordered {
            rows.reverse();
        }

        let total = rows.len();
        let page = query.page.max(1);
        let reports = rows
            .into_iter()
            .skip((page - 1) * query.limit)
            .take(query.limit)
            .cloned()
            .collect();
        Ok(ScanPage { reports, total })
    }

    async fn stats(&self) -> Result<StoreStats> {
        let state = self.state.lock().unwrap();
        let mut by_severity = SeverityCounts::default();
        let mut total_findings = 0;
        for report in &state.reports {
            for finding in &report.findings {
                by_severity.record(finding.severity);
                total_findings += 1;
            }
        }
        Ok(StoreStats {
            total_scans: state.reports.len(),
            total_findings,
            by_severity,
            last_scan_at: state.reports.iter().map(|report| report.scanned_at).max(),
        })
    }

    async fn notable_findings(&self, limit: usize) -> Result<Vec<NotableFinding>> {
        let state = self.state.lock().unwrap();
        let mut notable: Vec<NotableFinding> = state
            .reports
            .iter()
            .flat_map(|report| {
                report
                    .findings
                    .iter()
                    .filter(|finding| {
                        matches!(finding.severity, Severity::Critical | Severity::High)
                    })
                    .map(|finding| NotableFinding {
                        scan_id: report.id.clone(),
                        repository: report.repo_key(),
                        pull_number: report.pull_number,
                        scanned_at: report.scanned_at,
                        finding: finding.clone(),
                    })
            })
            .collect();

        notable.sort_by_key(|entry| {
            let tier = match entry.finding.severity {
                Severity::Critical => 0u8,
                _ => 1,
            };
            (tier, std::cmp::Reverse(entry.scanned_at))
        });
        notable.truncate(limit);
        Ok(notable)
    }

    async fn repos(&self) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.by_repo.keys().cloned().collect())
    }
}
