use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod aggregate;
pub mod normalize;
pub mod orchestrator;

/// Severity ladder for a single finding. Variants are declared in ascending
/// order so `Ord::max` picks the worst tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Tiers in the order they appear in summaries and feeds (worst first).
    pub const DISPLAY_ORDER: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Overall risk of a scan. Total order `critical > high > medium > low > none`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "critical",
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
            RiskLevel::None => "none",
        }
    }
}

impl From<Severity> for RiskLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Critical => RiskLevel::Critical,
            Severity::High => RiskLevel::High,
            Severity::Medium => RiskLevel::Medium,
            Severity::Low => RiskLevel::Low,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One suspected security issue reported by the model for a changed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Free-text category, e.g. "SQL Injection".
    #[serde(rename = "type")]
    pub finding_type: String,
    pub severity: Severity,
    /// Path of the changed file; stamped by the normalizer, never trusted
    /// from the model.
    #[serde(default)]
    pub file: String,
    /// Line in the new version of the file.
    pub line: u32,
    pub description: String,
    #[serde(default)]
    pub suggestion: String,
    /// Model self-assessed confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwe_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owasp_category: Option<String>,
}

/// Aggregated outcome of analyzing every changed file of one pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub findings: Vec<Finding>,
    pub summary: String,
    pub overall_risk: RiskLevel,
}

/// Persisted record of one completed scan. Created exactly once per scan and
/// immutable afterwards; owned exclusively by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub id: String,
    pub owner: String,
    pub repo: String,
    pub pull_number: u64,
    pub head_sha: String,
    pub scanned_at: DateTime<Utc>,
    pub files_scanned: usize,
    pub findings: Vec<Finding>,
    pub summary: String,
    pub overall_risk: RiskLevel,
}

impl ScanReport {
    /// Key used by the repository-scoped index, `owner/repo`.
    pub fn repo_key(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn finding_count(&self) -> usize {
        self.findings.len()
    }
}

/// Parsed `owner/name` repository reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

/// Rejection of a malformed repository reference, surfaced to the caller
/// before any network call is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepoRefError {
    #[error("repository must be in `owner/name` form (got `{0}`)")]
    Malformed(String),
}

impl FromStr for RepoRef {
    type Err = RepoRefError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut parts = input.splitn(2, '/');
        let owner = parts.next().unwrap_or_default().trim();
        let name = parts.next().unwrap_or_default().trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(RepoRefError::Malformed(input.to_string()));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn finding(severity: Severity, confidence: f64) -> Finding {
        Finding {
            finding_type: "SQL Injection".into(),
            severity,
            file: "src/db.rs".into(),
            line: 42,
            description: "User input concatenated into a query".into(),
            suggestion: "Use a parameterized query".into(),
            confidence,
            cwe_id: Some("CWE-89".into()),
            owasp_category: None,
        }
    }

    pub fn report(id: &str, owner: &str, repo: &str, findings: Vec<Finding>) -> ScanReport {
        let analysis = crate::review::aggregate::aggregate(findings);
        ScanReport {
            id: id.into(),
            owner: owner.into(),
            repo: repo.into(),
            pull_number: 7,
            head_sha: "abc123".into(),
            scanned_at: Utc::now(),
            files_scanned: 3,
            findings: analysis.findings,
            summary: analysis.summary,
            overall_risk: analysis.overall_risk,
        }
    }
}
