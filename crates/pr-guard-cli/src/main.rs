use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use pr_guard_core::github::{GitHubSettings, RestGitHubClient};
use pr_guard_core::llm::{client_for_provider, LlmSettings};
use pr_guard_core::report::{render_report, OutputFormat};
use pr_guard_core::{
    FileReportStore, ListQuery, RepoRef, ReportStore, ScanOrchestrator, SortBy, SortOrder,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "pr-guard",
    author,
    version,
    about = "LLM-backed pull request security scanner"
)]
struct Cli {
    /// Scan report snapshot file (default: PR_GUARD_DATA_FILE or ./data/scan-reports.json)
    #[arg(long = "data-file", value_name = "FILE", global = true)]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a pull request now and store the report
    Scan {
        /// Repository in owner/name form
        #[arg(long)]
        repo: String,
        /// Pull request number
        #[arg(long)]
        pr: u64,
        /// Emit the report as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
    /// List stored scan reports
    Scans {
        /// 1-based page index
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Only reports for this owner/name repository
        #[arg(long)]
        repo: Option<String>,
        /// Numeric field to order by: scanned_at, pull_number, files_scanned,
        /// finding_count. Any other field keeps insertion order.
        #[arg(long = "sort-by", value_name = "FIELD", default_value = "scanned_at")]
        sort_by: String,
        /// asc or desc
        #[arg(long, default_value = "desc")]
        order: String,
        #[arg(long)]
        json: bool,
    },
    /// Show one scan report by id
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Store-wide statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Cross-scan feed of critical and high findings
    Notable {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// List known repositories
    Repos,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let store = match &cli.data_file {
        Some(path) => FileReportStore::new(path.clone()),
        None => FileReportStore::from_env(),
    };

    match cli.command {
        Commands::Scan { repo, pr, json } => scan(store, &repo, pr, json).await?,
        Commands::Scans {
            page,
            limit,
            repo,
            sort_by,
            order,
            json,
        } => {
            let query = ListQuery {
                page,
                limit,
                repo,
                sort_by: SortBy::from_field(&sort_by),
                order: order.parse::<SortOrder>()?,
            };
            list_scans(store, &query, json).await?
        }
        Commands::Show { id, json } => show(store, &id, json).await?,
        Commands::Stats { json } => stats(store, json).await?,
        Commands::Notable { limit, json } => notable(store, limit, json).await?,
        Commands::Repos => {
            for repo in store.repos().await? {
                println!("{repo}");
            }
        }
    }
    Ok(())
}

async fn scan(store: FileReportStore, repo: &str, pr: u64, json: bool) -> Result<()> {
    let repo: RepoRef = repo.parse()?;
    let github = RestGitHubClient::new(&GitHubSettings::from_env()?)?;
    let llm = client_for_provider(&LlmSettings::from_env()?)?;
    let orchestrator = ScanOrchestrator::new(Arc::new(github), Arc::new(llm), Arc::new(store));

    let report = orchestrator.scan_pull_request(&repo, pr).await?;
    print!("{}", render_report(&report, output_format(json))?);
    if json {
        println!();
    }
    Ok(())
}

async fn list_scans(store: FileReportStore, query: &ListQuery, json: bool) -> Result<()> {
    let page = store.list_scans(query).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    println!("{} of {} scan(s)", page.reports.len(), page.total);
    for report in &page.reports {
        println!(
            "- {id}  {repo}#{pr}  [{risk}]  {summary}  ({scanned_at})",
            id = report.id,
            repo = report.repo_key(),
            pr = report.pull_number,
            risk = report.overall_risk,
            summary = report.summary,
            scanned_at = report.scanned_at.to_rfc3339(),
        );
    }
    Ok(())
}

async fn show(store: FileReportStore, id: &str, json: bool) -> Result<()> {
    match store.get_scan(id).await? {
        Some(report) => {
            print!("{}", render_report(&report, output_format(json))?);
            if json {
                println!();
            }
            Ok(())
        }
        None => bail!("scan report `{id}` not found"),
    }
}

async fn stats(store: FileReportStore, json: bool) -> Result<()> {
    let stats = store.stats().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Scans: {}", stats.total_scans);
    println!(
        "Findings: {} ({} critical, {} high, {} medium, {} low)",
        stats.total_findings,
        stats.by_severity.critical,
        stats.by_severity.high,
        stats.by_severity.medium,
        stats.by_severity.low,
    );
    match stats.last_scan_at {
        Some(at) => println!("Last scan: {}", at.to_rfc3339()),
        None => println!("Last scan: never"),
    }
    Ok(())
}

async fn notable(store: FileReportStore, limit: usize, json: bool) -> Result<()> {
    let notable = store.notable_findings(limit).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&notable)?);
        return Ok(());
    }

    if notable.is_empty() {
        println!("No notable findings.");
        return Ok(());
    }
    for entry in &notable {
        println!(
            "- [{severity}] {kind} @ {file}:{line}  ({repo}#{pr}, scanned {scanned_at})",
            severity = entry.finding.severity,
            kind = entry.finding.finding_type,
            file = entry.finding.file,
            line = entry.finding.line,
            repo = entry.repository,
            pr = entry.pull_number,
            scanned_at = entry.scanned_at.to_rfc3339(),
        );
    }
    Ok(())
}

fn output_format(json: bool) -> OutputFormat {
    if json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
