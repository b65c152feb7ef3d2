//! Deterministic advisor that works from the numbers alone.

use crate::provider::{AdvisoryResult, InsightGenerator, SummaryContext};
use rigscan_core::{CorrosionFinding, Metadata, RiskAssessment, SensorReading};
use serde_json::Value;

const ROUTINE_MONITORING: &str = "continue routine monitoring";

#[derive(Clone, Copy, Debug, Default)]
pub struct LocalAdvisor;

impl LocalAdvisor {
    pub fn new() -> Self {
        Self
    }
}

impl InsightGenerator for LocalAdvisor {
    fn name(&self) -> &str {
        "local"
    }

    fn analyze(
        &self,
        readings: &[SensorReading],
        findings: &[CorrosionFinding],
    ) -> AdvisoryResult<Metadata> {
        let severity = if findings.is_empty() {
            "no corrosion sites detected".to_string()
        } else {
            format!("{} corrosion site(s) detected", findings.len())
        };

        let mut map = Metadata::new();
        map.insert("severity_assessment".into(), severity.into());
        map.insert(
            "root_causes".into(),
            Value::Array(vec!["marine atmospheric corrosion".into(), "coating ageing".into()]),
        );
        map.insert("environmental_factors".into(), "high humidity and salt spray".into());
        map.insert("trend_prediction".into(), "periodic monitoring required".into());
        map.insert(
            "technical_insights".into(),
            format!(
                "derived from {} sensor reading(s) without a language model; \
                 a detailed engineering review is recommended",
                readings.len()
            )
            .into(),
        );
        map.insert("source".into(), "local".into());
        Ok(map)
    }

    fn summarize(&self, ctx: &SummaryContext<'_>) -> AdvisoryResult<String> {
        let findings = if ctx.findings.is_empty() {
            "no significant corrosion was found".to_string()
        } else {
            format!("{} corrosion site(s) were found", ctx.findings.len())
        };
        let (risk, advice) = match ctx.assessment {
            Some(a) => (
                format!("risk level {} with score {:.2}", a.level, a.risk_score),
                a.recommendations.first().map(String::as_str).unwrap_or(ROUTINE_MONITORING),
            ),
            None => ("risk was not assessed".to_string(), ROUTINE_MONITORING),
        };
        Ok(format!(
            "[Overview] Corrosion inspection of {} on platform {} collected {} sensor reading(s). \
             [Findings] {}. [Risk] {}. [Recommendation] {}.",
            ctx.inspection_area,
            ctx.platform_id,
            ctx.readings.len(),
            findings,
            risk,
            advice,
        ))
    }

    fn maintenance_insights(&self, assessment: &RiskAssessment) -> AdvisoryResult<Vec<String>> {
        if assessment.recommendations.is_empty() {
            return Ok(vec![ROUTINE_MONITORING.to_string()]);
        }
        Ok(assessment.recommendations.clone())
    }
}
