//! Primary advisor with a local safety net.

use crate::local::LocalAdvisor;
use crate::provider::{AdvisoryResult, InsightGenerator, SummaryContext};
use rigscan_core::{CorrosionFinding, Metadata, RiskAssessment, SensorReading};
use tracing::warn;

/// Delegates to `primary`; any error is logged and answered by the local
/// advisor instead, so callers only see an `Err` if both fail.
pub struct FallbackAdvisor {
    primary: Box<dyn InsightGenerator>,
    local: LocalAdvisor,
}

impl FallbackAdvisor {
    pub fn new(primary: impl InsightGenerator + 'static) -> Self {
        Self {
            primary: Box::new(primary),
            local: LocalAdvisor::new(),
        }
    }

    pub fn primary_name(&self) -> &str {
        self.primary.name()
    }
}

impl InsightGenerator for FallbackAdvisor {
    fn name(&self) -> &str {
        "fallback"
    }

    fn analyze(
        &self,
        readings: &[SensorReading],
        findings: &[CorrosionFinding],
    ) -> AdvisoryResult<Metadata> {
        self.primary.analyze(readings, findings).or_else(|e| {
            warn!(advisor = self.primary.name(), error = %e, "analysis failed, using local advisor");
            self.local.analyze(readings, findings)
        })
    }

    fn summarize(&self, context: &SummaryContext<'_>) -> AdvisoryResult<String> {
        self.primary.summarize(context).or_else(|e| {
            warn!(advisor = self.primary.name(), error = %e, "summary failed, using local advisor");
            self.local.summarize(context)
        })
    }

    fn maintenance_insights(&self, assessment: &RiskAssessment) -> AdvisoryResult<Vec<String>> {
        self.primary.maintenance_insights(assessment).or_else(|e| {
            warn!(advisor = self.primary.name(), error = %e, "insights failed, using local advisor");
            self.local.maintenance_insights(assessment)
        })
    }
}
