//! Insight generator trait

use rigscan_core::{CorrosionFinding, Metadata, RiskAssessment, SensorReading};

/// Result type for advisory operations
pub type AdvisoryResult<T> = Result<T, AdvisoryError>;

/// Advisory error types
#[derive(Debug, thiserror::Error)]
pub enum AdvisoryError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("advisor unavailable: {0}")]
    Unavailable(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Everything a summary is written from.
#[derive(Clone, Copy, Debug)]
pub struct SummaryContext<'a> {
    pub platform_id: &'a str,
    pub inspection_area: &'a str,
    pub readings: &'a [SensorReading],
    pub findings: &'a [CorrosionFinding],
    pub assessment: Option<&'a RiskAssessment>,
}

/// Source of qualitative commentary. Calls are synchronous and single-shot.
pub trait InsightGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Free-form analysis keyed by topic (`severity_assessment`,
    /// `root_causes`, `environmental_factors`, `trend_prediction`,
    /// `technical_insights`).
    fn analyze(
        &self,
        readings: &[SensorReading],
        findings: &[CorrosionFinding],
    ) -> AdvisoryResult<Metadata>;

    fn summarize(&self, context: &SummaryContext<'_>) -> AdvisoryResult<String>;

    /// Up to five actionable maintenance lines for an assessment.
    fn maintenance_insights(&self, assessment: &RiskAssessment) -> AdvisoryResult<Vec<String>>;
}
