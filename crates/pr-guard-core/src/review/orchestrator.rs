use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::aggregate::aggregate;
use super::normalize::{extract_json_array, normalize_findings};
use super::{Finding, RepoRef, RiskLevel, ScanReport};
use crate::github::{ChangedFile, CommitState, GitHubClient, PullRequestInfo};
use crate::llm::LlmClient;
use crate::report::render_review_comment;
use crate::store::ReportStore;

/// Files analyzed concurrently per batch; batches run strictly one after
/// another.
pub const ANALYSIS_BATCH_SIZE: usize = 5;

const MAX_STATUS_DESCRIPTION_CHARS: usize = 140;

const SYSTEM_PROMPT: &str = "You are a security code reviewer. Analyze the given diff and respond with a JSON array of findings. Each finding is an object: {\"type\": \"category such as SQL Injection\", \"severity\": \"critical|high|medium|low\", \"line\": line number in the new file version, \"description\": \"what is wrong\", \"suggestion\": \"how to fix it\", \"confidence\": 0.0-1.0, \"cweId\": \"CWE-NNN\" (optional), \"owaspCategory\": \"...\" (optional)}. Respond with [] when the diff introduces no security issues. Respond with JSON only.";

/// Drives one pull request scan end to end: fetch changed files, analyze
/// them in bounded batches, aggregate, persist, notify GitHub.
pub struct ScanOrchestrator<G, L, S> {
    github: Arc<G>,
    llm: Arc<L>,
    store: Arc<S>,
}

impl<G, L, S> ScanOrchestrator<G, L, S>
where
    G: GitHubClient,
    L: LlmClient,
    S: ReportStore,
{
    pub fn new(github: Arc<G>, llm: Arc<L>, store: Arc<S>) -> Self {
        Self { github, llm, store }
    }

    /// Run a scan and return the persisted report.
    ///
    /// Collaborator failures degrade: a file whose analysis fails contributes
    /// zero findings, and an unreachable GitHub API yields an empty report
    /// rather than an error. Only the store insert can fail the scan.
    #[instrument(name = "scan_pull_request", skip(self), fields(repo = %repo, pull_number))]
    pub async fn scan_pull_request(&self, repo: &RepoRef, pull_number: u64) -> Result<ScanReport> {
        let pull = match self.github.get_pull_request(repo, pull_number).await {
            Ok(pull) => Some(pull),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to fetch pull request metadata");
                None
            }
        };
        let files = match self.github.list_pull_request_files(repo, pull_number).await {
            Ok(files) => files,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to list changed files; recording an empty scan");
                Vec::new()
            }
        };

        let analyzable: Vec<&ChangedFile> = files
            .iter()
            .filter(|file| file.status != "removed" && file.patch.is_some())
            .collect();
        debug!(
            changed = files.len(),
            analyzable = analyzable.len(),
            "collected changed files"
        );

        let mut findings = Vec::new();
        for batch in analyzable.chunks(ANALYSIS_BATCH_SIZE) {
            let batch_findings =
                join_all(batch.iter().map(|file| self.analyze_file(file))).await;
            findings.extend(batch_findings.into_iter().flatten());
        }

        let analysis = aggregate(findings);
        let report = ScanReport {
            id: Uuid::new_v4().to_string(),
            owner: repo.owner.clone(),
            repo: repo.name.clone(),
            pull_number,
            head_sha: pull
                .as_ref()
                .map(|pull| pull.head_sha.clone())
                .unwrap_or_default(),
            scanned_at: Utc::now(),
            files_scanned: analyzable.len(),
            findings: analysis.findings,
            summary: analysis.summary,
            overall_risk: analysis.overall_risk,
        };

        self.store.save_scan(report.clone()).await?;
        self.notify(repo, pull_number, pull.as_ref(), &report).await;
        Ok(report)
    }

    async fn analyze_file(&self, file: &ChangedFile) -> Vec<Finding> {
        let Some(patch) = file.patch.as_deref() else {
            return Vec::new();
        };
        let user_prompt = format!("File: {}\n\nDiff:\n{}", file.filename, patch);

        let response = match self.llm.complete(SYSTEM_PROMPT, &user_prompt).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    file = %file.filename,
                    error = %format!("{err:#}"),
                    "analysis call failed; file contributes no findings"
                );
                return Vec::new();
            }
        };
        let Some(raw) = extract_json_array(&response) else {
            warn!(
                file = %file.filename,
                "response contained no JSON array; file contributes no findings"
            );
            return Vec::new();
        };
        normalize_findings(raw, &file.filename)
    }

    /// Fan out the GitHub side effects and log any failures; a scan never
    /// fails because a notification did.
    async fn notify(
        &self,
        repo: &RepoRef,
        pull_number: u64,
        pull: Option<&PullRequestInfo>,
        report: &ScanReport,
    ) {
        let comment = render_review_comment(report, pull.map(|pull| pull.title.as_str()));
        let (state, description) = commit_status_for(report);

        let post_status = async {
            if report.head_sha.is_empty() {
                debug!("head sha unknown; skipping commit status");
                return Ok(());
            }
            self.github
                .post_commit_status(repo, &report.head_sha, state, &description)
                .await
        };
        let (comment_result, status_result) = futures::join!(
            self.github.post_review_comment(repo, pull_number, &comment),
            post_status,
        );

        for (side_effect, result) in [
            ("review comment", comment_result),
            ("commit status", status_result),
        ] {
            if let Err(err) = result {
                warn!(
                    side_effect,
                    error = %format!("{err:#}"),
                    "notification failed"
                );
            }
        }
    }
}

fn commit_status_for(report: &ScanReport) -> (CommitState, String) {
    let state = match report.overall_risk {
        RiskLevel::Critical | RiskLevel::High => CommitState::Failure,
        _ => CommitState::Success,
    };
    (state, truncate(&report.summary, MAX_STATUS_DESCRIPTION_CHARS))
}

fn truncate(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    input.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::PullRequestInfo;
    use crate::store::file_store::FileReportStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubGitHub {
        files: Result<Vec<ChangedFile>>,
        statuses: Mutex<Vec<(String, String)>>,
        comments: Mutex<Vec<String>>,
        fail_notifications: bool,
    }

    impl StubGitHub {
        fn with_files(files: Vec<ChangedFile>) -> Self {
            Self {
                files: Ok(files),
                statuses: Mutex::new(Vec::new()),
                comments: Mutex::new(Vec::new()),
                fail_notifications: false,
            }
        }

        fn unreachable() -> Self {
            Self {
                files: Err(anyhow!("github is down")),
                statuses: Mutex::new(Vec::new()),
                comments: Mutex::new(Vec::new()),
                fail_notifications: false,
            }
        }
    }

    #[async_trait]
    impl GitHubClient for StubGitHub {
        async fn get_pull_request(
            &self,
            _repo: &RepoRef,
            _number: u64,
        ) -> Result<PullRequestInfo> {
            match &self.files {
                Ok(_) => Ok(PullRequestInfo {
                    head_sha: "abc123".into(),
                    title: "Add login".into(),
                }),
                Err(_) => Err(anyhow!("github is down")),
            }
        }

        async fn list_pull_request_files(
            &self,
            _repo: &RepoRef,
            _number: u64,
        ) -> Result<Vec<ChangedFile>> {
            match &self.files {
                Ok(files) => Ok(files.clone()),
                Err(_) => Err(anyhow!("github is down")),
            }
        }

        async fn post_review_comment(
            &self,
            _repo: &RepoRef,
            _number: u64,
            body: &str,
        ) -> Result<()> {
            if self.fail_notifications {
                return Err(anyhow!("comment rejected"));
            }
            self.comments.lock().unwrap().push(body.to_string());
            Ok(())
        }

        async fn post_commit_status(
            &self,
            _repo: &RepoRef,
            sha: &str,
            state: CommitState,
            _description: &str,
        ) -> Result<()> {
            if self.fail_notifications {
                return Err(anyhow!("status rejected"));
            }
            self.statuses
                .lock()
                .unwrap()
                .push((sha.to_string(), state.as_str().to_string()));
            Ok(())
        }
    }

    struct ScriptedLlm {
        response: Result<String>,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _system_prompt: &str, user_prompt: &str) -> Result<String> {
            match &self.response {
                Ok(text) => Ok(text.replace("{file}", first_line_file(user_prompt))),
                Err(err) => Err(anyhow!("{err}")),
            }
        }
    }

    fn first_line_file(user_prompt: &str) -> &str {
        user_prompt
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("File: "))
            .unwrap_or_default()
    }

    fn changed(filename: &str, status: &str, patch: Option<&str>) -> ChangedFile {
        ChangedFile {
            filename: filename.into(),
            status: status.into(),
            patch: patch.map(str::to_string),
            additions: 1,
            deletions: 0,
        }
    }

    fn repo() -> RepoRef {
        "octo/widgets".parse().unwrap()
    }

    fn orchestrator(
        github: StubGitHub,
        llm: ScriptedLlm,
        dir: &tempfile::TempDir,
    ) -> ScanOrchestrator<StubGitHub, ScriptedLlm, FileReportStore> {
        ScanOrchestrator::new(
            Arc::new(github),
            Arc::new(llm),
            Arc::new(FileReportStore::new(dir.path().join("reports.json"))),
        )
    }

    #[tokio::test]
    async fn scan_persists_normalized_findings() {
        let dir = tempfile::tempdir().unwrap();
        let github = StubGitHub::with_files(vec![
            changed("src/db.rs", "modified", Some("@@ -1 +1 @@")),
            changed("logo.png", "added", None),
            changed("old.rs", "removed", Some("@@ -1 +0 @@")),
        ]);
        let llm = ScriptedLlm {
            response: Ok(r#"Sure! [{"type": "SQL Injection", "severity": "critical", "line": 3, "description": "d", "suggestion": "s", "confidence": 0.9}, {"type": "Guess", "severity": "low", "line": 9, "description": "d", "suggestion": "s", "confidence": 0.2}]"#.into()),
        };
        let orchestrator = orchestrator(github, llm, &dir);

        let report = orchestrator.scan_pull_request(&repo(), 7).await.unwrap();
        assert_eq!(report.files_scanned, 1);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].file, "src/db.rs");
        assert_eq!(report.overall_risk, RiskLevel::Critical);
        assert_eq!(report.head_sha, "abc123");

        let stored = orchestrator
            .store
            .get_scan(&report.id)
            .await
            .unwrap()
            .expect("report should be persisted");
        assert_eq!(stored, report);
    }

    #[tokio::test]
    async fn github_outage_degrades_to_an_empty_scan() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(
            StubGitHub::unreachable(),
            ScriptedLlm {
                response: Ok("[]".into()),
            },
            &dir,
        );

        let report = orchestrator.scan_pull_request(&repo(), 7).await.unwrap();
        assert_eq!(report.files_scanned, 0);
        assert!(report.findings.is_empty());
        assert_eq!(report.overall_risk, RiskLevel::None);
        assert_eq!(report.head_sha, "");
    }

    #[tokio::test]
    async fn failed_analysis_contributes_no_findings() {
        let dir = tempfile::tempdir().unwrap();
        let github = StubGitHub::with_files(vec![changed(
            "src/db.rs",
            "modified",
            Some("@@ -1 +1 @@"),
        )]);
        let orchestrator = orchestrator(
            github,
            ScriptedLlm {
                response: Err(anyhow!("model timeout")),
            },
            &dir,
        );

        let report = orchestrator.scan_pull_request(&repo(), 7).await.unwrap();
        assert_eq!(report.files_scanned, 1);
        assert!(report.findings.is_empty());
        assert_eq!(report.summary, crate::review::aggregate::NO_ISSUES_SUMMARY);
    }

    #[tokio::test]
    async fn notifications_record_comment_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let github = StubGitHub::with_files(vec![changed(
            "src/db.rs",
            "modified",
            Some("@@ -1 +1 @@"),
        )]);
        let llm = ScriptedLlm {
            response: Ok(r#"[{"type": "XSS", "severity": "high", "line": 1, "description": "d", "suggestion": "s", "confidence": 0.8}]"#.into()),
        };
        let orchestrator = orchestrator(github, llm, &dir);

        orchestrator.scan_pull_request(&repo(), 7).await.unwrap();
        let statuses = orchestrator.github.statuses.lock().unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0], ("abc123".to_string(), "failure".to_string()));
        let comments = orchestrator.github.comments.lock().unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].contains("1 high"));
    }

    #[tokio::test]
    async fn notification_failures_do_not_fail_the_scan() {
        let dir = tempfile::tempdir().unwrap();
        let mut github = StubGitHub::with_files(vec![changed(
            "src/db.rs",
            "modified",
            Some("@@ -1 +1 @@"),
        )]);
        github.fail_notifications = true;
        let orchestrator = orchestrator(
            github,
            ScriptedLlm {
                response: Ok("[]".into()),
            },
            &dir,
        );

        let report = orchestrator.scan_pull_request(&repo(), 7).await.unwrap();
        assert!(orchestrator
            .store
            .get_scan(&report.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn clean_scan_posts_a_success_status() {
        let dir = tempfile::tempdir().unwrap();
        let github = StubGitHub::with_files(vec![changed(
            "src/db.rs",
            "modified",
            Some("@@ -1 +1 @@"),
        )]);
        let orchestrator = orchestrator(
            github,
            ScriptedLlm {
                response: Ok("[]".into()),
            },
            &dir,
        );

        orchestrator.scan_pull_request(&repo(), 7).await.unwrap();
        let statuses = orchestrator.github.statuses.lock().unwrap();
        assert_eq!(statuses[0].1, "success");
    }

    #[test]
    fn truncate_caps_long_descriptions() {
        let long = "x".repeat(200);
        let capped = truncate(&long, MAX_STATUS_DESCRIPTION_CHARS);
        assert_eq!(
            capped.chars().count(),
            MAX_STATUS_DESCRIPTION_CHARS + 1
        );
        assert!(capped.ends_with('…'));
        assert_eq!(truncate("short", 140), "short");
    }
}
