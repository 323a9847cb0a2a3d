use std::fmt::Write;

use crate::review::ScanReport;

/// Format styles supported in default reporter implementations.
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Produce a report string from a `ScanReport` using the desired format.
pub fn render_report(report: &ScanReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(report),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

fn render_human(report: &ScanReport) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "Scan {}", report.id)?;
    writeln!(
        out,
        "Repository: {}#{} @ {}",
        report.repo_key(),
        report.pull_number,
        if report.head_sha.is_empty() {
            "unknown"
        } else {
            &report.head_sha
        }
    )?;
    writeln!(out, "Scanned At: {}", report.scanned_at.to_rfc3339())?;
    writeln!(out, "Overall Risk: {}", report.overall_risk)?;
    writeln!(out, "Files Scanned: {}", report.files_scanned)?;
    writeln!(out, "{}", report.summary)?;
    writeln!(out)?;

    if report.findings.is_empty() {
        writeln!(out, "No findings detected.")?;
    } else {
        writeln!(out, "Findings:")?;
        for finding in &report.findings {
            writeln!(
                out,
                "  - [{severity}] {kind} @ {file}:{line} (confidence {confidence:.2})",
                severity = finding.severity,
                kind = finding.finding_type,
                file = finding.file,
                line = finding.line,
                confidence = finding.confidence,
            )?;
            if !finding.description.trim().is_empty() {
                writeln!(out, "    {}", single_line(&finding.description))?;
            }
            if !finding.suggestion.trim().is_empty() {
                writeln!(out, "    Fix: {}", single_line(&finding.suggestion))?;
            }
        }
    }

    Ok(out)
}

/// Render the markdown comment posted back to the pull request.
pub fn render_review_comment(report: &ScanReport, pull_title: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("## Security Scan\n\n");
    if let Some(title) = pull_title {
        out.push_str(&format!("**{}** — ", single_line(title)));
    }
    out.push_str(&format!(
        "overall risk: **{}**\n\n{}\n",
        report.overall_risk, report.summary
    ));

    if !report.findings.is_empty() {
        out.push('\n');
        for finding in &report.findings {
            out.push_str(&format!(
                "- **{severity}** {kind} — `{file}:{line}` (confidence {confidence:.2})\n",
                severity = finding.severity,
                kind = finding.finding_type,
                file = finding.file,
                line = finding.line,
                confidence = finding.confidence,
            ));
            if !finding.description.trim().is_empty() {
                out.push_str(&format!("  {}\n", single_line(&finding.description)));
            }
            if !finding.suggestion.trim().is_empty() {
                out.push_str(&format!(
                    "  _Suggested fix:_ {}\n",
                    single_line(&finding.suggestion)
                ));
            }
        }
    }
    out
}

fn single_line(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}
