pub mod github;
pub mod llm;
pub mod report;
pub mod review;
pub mod store;

pub use review::{
    aggregate::aggregate, orchestrator::ScanOrchestrator, AnalysisResult, Finding, RepoRef,
    RepoRefError, RiskLevel, ScanReport, Severity,
};
pub use store::{
    file_store::FileReportStore, ListQuery, NotableFinding, ReportStore, ScanPage, SortBy,
    SortOrder, StoreStats,
};
