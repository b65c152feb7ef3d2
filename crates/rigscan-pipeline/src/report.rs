//! Report-assembly stage: maintenance plan, summary, next inspection date,
//! and persistence through the report sink.

use crate::sink::ReportSink;
use chrono::{DateTime, Duration, Months, Utc};
use rigscan_advisory::{InsightGenerator, SummaryContext};
use rigscan_core::{InspectionReport, MaintenanceRecommendation, RiskAssessment, RiskLevel, SharedState};
use rigscan_graph::{Stage, StageOutcome};
use std::sync::Arc;
use tracing::{info, warn};

pub const STAGE_NAME: &str = "report";

pub const INSPECTOR: &str = "rigscan inspection agent";

/// Advisory summaries this short are not worth replacing the computed one.
const MIN_ADVISORY_SUMMARY_CHARS: usize = 50;

pub struct ReportStage {
    advisor: Arc<dyn InsightGenerator>,
    sink: Arc<dyn ReportSink>,
}

impl ReportStage {
    pub fn new(advisor: Arc<dyn InsightGenerator>, sink: Arc<dyn ReportSink>) -> Self {
        Self { advisor, sink }
    }

    fn summary(&self, state: &SharedState) -> String {
        let computed = deterministic_summary(state);
        let context = SummaryContext {
            platform_id: &state.platform_id,
            inspection_area: &state.inspection_area,
            readings: &state.sensor_readings,
            findings: &state.findings,
            assessment: state.risk_assessment.as_ref(),
        };
        match self.advisor.summarize(&context) {
            Ok(text) if text.trim().chars().count() > MIN_ADVISORY_SUMMARY_CHARS => text.trim().to_string(),
            Ok(_) => computed,
            Err(e) => {
                warn!(advisor = self.advisor.name(), error = %e, "advisory summary failed");
                computed
            }
        }
    }
}

impl Stage for ReportStage {
    fn run(&self, state: &SharedState) -> StageOutcome {
        let mut next = state.clone();
        next.mark_stage(STAGE_NAME);

        let now = Utc::now();
        let report = InspectionReport {
            report_id: format!("report_{}", state.session_id),
            timestamp: now,
            inspector: INSPECTOR.to_string(),
            platform_id: state.platform_id.clone(),
            area_inspected: state.inspection_area.clone(),
            sensor_readings: state.sensor_readings.clone(),
            images: state.images.clone(),
            findings: state.findings.clone(),
            risk_assessment: state.risk_assessment.clone(),
            maintenance: maintenance_plan(state.risk_assessment.as_ref()),
            summary: self.summary(state),
            next_inspection: next_inspection(now, state.risk_assessment.as_ref().map(|a| a.level)),
        };

        match self.sink.save(&report) {
            Ok(path) => info!(report = %report.report_id, path = %path.display(), "report saved"),
            Err(e) => warn!(report = %report.report_id, error = %e, "failed to save report"),
        }

        next.report = Some(report);
        StageOutcome::Updated(next)
    }
}

pub fn maintenance_plan(assessment: Option<&RiskAssessment>) -> Vec<MaintenanceRecommendation> {
    let Some(assessment) = assessment else {
        return Vec::new();
    };
    match assessment.level {
        RiskLevel::Low => vec![record(
            "maint_001",
            2,
            "preventive maintenance",
            "continue periodic inspection and coating maintenance",
            5_000.0,
            8,
            &["inspection equipment", "anti-corrosion materials"],
        )],
        RiskLevel::Medium => vec![corrective_repair()],
        RiskLevel::High => vec![
            corrective_repair(),
            record(
                "maint_003",
                4,
                "structural reinforcement",
                "structural assessment and reinforcement of heavily damaged areas",
                50_000.0,
                72,
                &["structural engineer", "reinforcement materials", "specialist equipment"],
            ),
        ],
        RiskLevel::Critical => vec![record(
            "maint_004",
            5,
            "emergency repair",
            "stop the affected equipment and carry out emergency repair or replacement",
            100_000.0,
            120,
            &["emergency repair team", "replacement parts", "heavy equipment"],
        )],
    }
}

fn corrective_repair() -> MaintenanceRecommendation {
    record(
        "maint_002",
        3,
        "corrective maintenance",
        "local repair and recoating of corroded areas",
        15_000.0,
        24,
        &["repair tools", "anti-corrosion paint", "qualified personnel"],
    )
}

fn record(
    id: &str,
    priority: u8,
    action_type: &str,
    description: &str,
    cost: f64,
    hours: u32,
    resources: &[&str],
) -> MaintenanceRecommendation {
    MaintenanceRecommendation {
        recommendation_id: id.to_string(),
        priority,
        action_type: action_type.to_string(),
        description: description.to_string(),
        estimated_cost: Some(cost),
        estimated_duration_hours: Some(hours),
        required_resources: resources.iter().map(|s| s.to_string()).collect(),
    }
}

/// 6 / 3 / 1 months or 1 week out by level; 6 months without an assessment.
pub fn next_inspection(from: DateTime<Utc>, level: Option<RiskLevel>) -> DateTime<Utc> {
    let months = match level {
        Some(RiskLevel::Critical) => return from + Duration::weeks(1),
        Some(RiskLevel::High) => 1,
        Some(RiskLevel::Medium) => 3,
        Some(RiskLevel::Low) | None => 6,
    };
    from.checked_add_months(Months::new(months))
        .unwrap_or_else(|| from + Duration::days(30 * months as i64))
}

pub fn deterministic_summary(state: &SharedState) -> String {
    let mut lines = vec![
        format!("Inspection area: {}", state.inspection_area),
        format!("Started: {}", state.started_at.format("%Y-%m-%d %H:%M:%S")),
        format!("Sensor data: {} reading(s) collected", state.sensor_readings.len()),
        format!("Image data: {} image(s) processed", state.images.len()),
    ];
    match state.max_finding_depth() {
        Some(max_depth) => {
            lines.push(format!("Corrosion: {} site(s) found", state.findings.len()));
            lines.push(format!("Total corroded area: {:.2} mm²", state.total_finding_area()));
            lines.push(format!("Maximum depth: {:.2} mm", max_depth));
        }
        None => lines.push("Corrosion: no significant corrosion found".to_string()),
    }
    if let Some(a) = &state.risk_assessment {
        lines.push(format!("Risk level: {}", a.level));
        lines.push(format!("Risk score: {:.2}", a.risk_score));
        lines.push(format!("Urgency: {}", a.urgency));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_inspection_offsets() {
        let from = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(
            next_inspection(from, Some(RiskLevel::Low)),
            Utc.with_ymd_and_hms(2024, 7, 31, 12, 0, 0).unwrap()
        );
        assert_eq!(
            next_inspection(from, Some(RiskLevel::Medium)),
            Utc.with_ymd_and_hms(2024, 4, 30, 12, 0, 0).unwrap()
        );
        // month-end clamps to the last day of February
        assert_eq!(
            next_inspection(from, Some(RiskLevel::High)),
            Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap()
        );
        assert_eq!(next_inspection(from, Some(RiskLevel::Critical)), from + Duration::weeks(1));
        assert_eq!(next_inspection(from, None), next_inspection(from, Some(RiskLevel::Low)));
    }

    #[test]
    fn summary_mentions_findings_state() {
        let state = SharedState::new("P", "riser");
        let text = deterministic_summary(&state);
        assert!(text.contains("riser"));
        assert!(text.contains("no significant corrosion"));
        assert!(!text.contains("Risk level"));
    }

    #[test]
    fn no_assessment_no_plan() {
        assert!(maintenance_plan(None).is_empty());
    }
}
