use super::{AnalysisResult, Finding, RiskLevel, Severity};

/// Summary line used when a scan produced no findings.
pub const NO_ISSUES_SUMMARY: &str = "No security issues found.";

/// Reduce the findings from every analyzed file to an overall risk level and
/// a one-line summary.
///
/// The risk level is the worst severity present (`none` when empty). The
/// summary is deterministic for a given multiset of severities: tiers are
/// always listed critical, high, medium, low, with zero-count tiers omitted.
pub fn aggregate(findings: Vec<Finding>) -> AnalysisResult {
    let overall_risk = findings
        .iter()
        .map(|finding| finding.severity)
        .max()
        .map(RiskLevel::from)
        .unwrap_or(RiskLevel::None);

    AnalysisResult {
        summary: summarize(&findings),
        overall_risk,
        findings,
    }
}

fn summarize(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return NO_ISSUES_SUMMARY.to_string();
    }

    let breakdown: Vec<String> = Severity::DISPLAY_ORDER
        .iter()
        .filter_map(|severity| {
            let count = findings
                .iter()
                .filter(|finding| finding.severity == *severity)
                .count();
            (count > 0).then(|| format!("{count} {severity}"))
        })
        .collect();

    format!(
        "Found {} security issue(s): {}",
        findings.len(),
        breakdown.join(", ")
    )
}
