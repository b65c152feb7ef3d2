//! Risk-scoring stage.
//!
//! score = 0.3 area + 0.4 depth + 0.2 count + 0.1 environment, each factor
//! normalized to [0, 1]. The level is a step function of the score under the
//! configured thresholds.

use crate::config::InspectionConfig;
use chrono::Utc;
use rigscan_advisory::InsightGenerator;
use rigscan_core::{clamp_unit, MeasurementKind, RiskAssessment, RiskLevel, SharedState, Urgency};
use rigscan_graph::{Stage, StageOutcome};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

pub const STAGE_NAME: &str = "risk_scoring";

/// Score given to a scan with no findings.
pub const CLEAN_SCAN_SCORE: f64 = 0.1;

const AREA_WEIGHT: f64 = 0.3;
const DEPTH_WEIGHT: f64 = 0.4;
const COUNT_WEIGHT: f64 = 0.2;
const ENVIRONMENT_WEIGHT: f64 = 0.1;

/// Used for an environmental sub-factor whose readings are absent.
const NEUTRAL_FACTOR: f64 = 0.5;

pub struct RiskStage {
    config: Arc<InspectionConfig>,
    advisor: Arc<dyn InsightGenerator>,
}

impl RiskStage {
    pub fn new(config: Arc<InspectionConfig>, advisor: Arc<dyn InsightGenerator>) -> Self {
        Self { config, advisor }
    }

    fn insights(&self, assessment: &RiskAssessment) -> Option<Vec<String>> {
        match self.advisor.maintenance_insights(assessment) {
            Ok(lines) if !lines.is_empty() => Some(lines),
            Ok(_) => None,
            Err(e) => {
                warn!(advisor = self.advisor.name(), error = %e, "maintenance insights failed");
                None
            }
        }
    }
}

impl Stage for RiskStage {
    fn run(&self, state: &SharedState) -> StageOutcome {
        let mut next = state.clone();
        next.mark_stage(STAGE_NAME);

        let mut assessment = assess(&self.config, state);
        if !state.findings.is_empty() {
            if let Some(lines) = self.insights(&assessment) {
                assessment.recommendations = lines;
            }
        }

        info!(
            level = %assessment.level,
            score = assessment.risk_score,
            urgency = %assessment.urgency,
            "risk assessed"
        );
        next.risk_assessment = Some(assessment);
        StageOutcome::Updated(next)
    }
}

/// Deterministic assessment of the state's findings and readings.
pub fn assess(config: &InspectionConfig, state: &SharedState) -> RiskAssessment {
    if state.findings.is_empty() {
        let mut factors = BTreeMap::new();
        factors.insert("no_corrosion_detected".to_string(), 1.0);
        return RiskAssessment {
            assessment_id: new_id(),
            level: RiskLevel::Low,
            risk_score: CLEAN_SCAN_SCORE,
            factors,
            recommendations: vec![
                "continue the scheduled inspection plan".to_string(),
                "maintain the anti-corrosion coating".to_string(),
            ],
            urgency: Urgency::Low,
            timestamp: Utc::now(),
        };
    }

    let r = &config.risk;
    let max_depth = state.max_finding_depth().unwrap_or(0.0);
    let area = (state.total_finding_area() / r.area_scale_mm2).min(1.0);
    let depth = (max_depth / r.depth_scale_mm).min(1.0);
    let count = (state.findings.len() as f64 / r.count_scale as f64).min(1.0);
    let environmental = environmental_factor(state);

    let risk_score = clamp_unit(
        AREA_WEIGHT * area + DEPTH_WEIGHT * depth + COUNT_WEIGHT * count + ENVIRONMENT_WEIGHT * environmental,
    );
    let level = config.level_for(risk_score);

    let factors = BTreeMap::from([
        ("area_factor".to_string(), area),
        ("depth_factor".to_string(), depth),
        ("count_factor".to_string(), count),
        ("environmental_factor".to_string(), environmental),
    ]);

    RiskAssessment {
        assessment_id: new_id(),
        level,
        risk_score,
        factors,
        recommendations: recommendations_for(level),
        urgency: urgency_for(config, level, max_depth),
        timestamp: Utc::now(),
    }
}

/// 0.3 temperature + 0.4 humidity + 0.3 pH deviation from seawater.
pub fn environmental_factor(state: &SharedState) -> f64 {
    let temperature = state
        .mean_reading(MeasurementKind::Temperature)
        .map(|t| clamp_unit((t - 15.0) / 20.0))
        .unwrap_or(NEUTRAL_FACTOR);
    let humidity = state
        .mean_reading(MeasurementKind::Humidity)
        .map(|h| clamp_unit((h - 60.0) / 30.0))
        .unwrap_or(NEUTRAL_FACTOR);
    let ph = state
        .mean_reading(MeasurementKind::Ph)
        .map(|p| clamp_unit((p - 8.0).abs() / 2.0))
        .unwrap_or(NEUTRAL_FACTOR);
    0.3 * temperature + 0.4 * humidity + 0.3 * ph
}

pub fn urgency_for(config: &InspectionConfig, level: RiskLevel, max_depth_mm: f64) -> Urgency {
    let r = &config.risk;
    if level == RiskLevel::Critical || max_depth_mm > r.urgent_depth_mm {
        Urgency::Urgent
    } else if level == RiskLevel::High || max_depth_mm > r.high_depth_mm {
        Urgency::High
    } else if level == RiskLevel::Medium {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}

pub fn recommendations_for(level: RiskLevel) -> Vec<String> {
    let lines: &[&str] = match level {
        RiskLevel::Low => &[
            "continue the scheduled inspection plan",
            "maintain the anti-corrosion coating",
            "monitor changes in environmental conditions",
        ],
        RiskLevel::Medium => &[
            "increase inspection frequency to every 3 months",
            "treat the detected corrosion areas locally",
            "review and update corrosion protection measures",
            "assess the environmental control systems",
        ],
        RiskLevel::High => &[
            "repair severely corroded areas immediately",
            "perform detailed inspections monthly",
            "replace or reinforce the protective coating",
            "consider additional cathodic protection",
            "prepare a detailed repair plan",
        ],
        RiskLevel::Critical => &[
            "stop operation of the affected equipment",
            "dispatch a specialist repair team immediately",
            "perform safety inspections weekly",
            "re-evaluate overall structural integrity",
            "consider partial structural replacement",
        ],
    };
    lines.iter().map(|s| s.to_string()).collect()
}

fn new_id() -> String {
    format!("risk_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigscan_core::{CorrosionFinding, CorrosionKind, Location, SensorReading};

    fn finding(area: f64, depth: f64) -> CorrosionFinding {
        CorrosionFinding {
            finding_id: "f".into(),
            image_id: None,
            area_mm2: area,
            depth_mm: depth,
            kind: CorrosionKind::Uniform,
            confidence: 0.6,
            regions: vec![],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn clean_scan_is_low() {
        let a = assess(&InspectionConfig::default(), &SharedState::new("P", "A"));
        assert_eq!(a.level, RiskLevel::Low);
        assert_eq!(a.risk_score, CLEAN_SCAN_SCORE);
        assert_eq!(a.factors.get("no_corrosion_detected"), Some(&1.0));
        assert_eq!(a.recommendations.len(), 2);
        assert_eq!(a.urgency, Urgency::Low);
    }

    #[test]
    fn environment_defaults_to_neutral() {
        let state = SharedState::new("P", "A");
        assert!((environmental_factor(&state) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn environment_uses_readings() {
        let mut state = SharedState::new("P", "A");
        for (kind, value) in [
            (MeasurementKind::Temperature, 35.0),
            (MeasurementKind::Humidity, 90.0),
            (MeasurementKind::Ph, 8.0),
        ] {
            state
                .sensor_readings
                .push(SensorReading::new("s", kind, value, "", Location::origin(), 1.0));
        }
        // 0.3 * 1 + 0.4 * 1 + 0.3 * 0
        assert!((environmental_factor(&state) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn score_is_weighted_sum() {
        let mut state = SharedState::new("P", "A");
        state.findings = vec![finding(300.0, 2.5), finding(300.0, 1.0)];
        let a = assess(&InspectionConfig::default(), &state);
        let expected = 0.3 * 0.12 + 0.4 * (2.5 / 3.0) + 0.2 * 0.2 + 0.1 * 0.5;
        assert!((a.risk_score - expected).abs() < 1e-9);
        assert_eq!(a.level, RiskLevel::Medium);
        assert_eq!(a.urgency, Urgency::Medium);
        assert_eq!(a.factors.len(), 4);
    }

    #[test]
    fn deep_findings_raise_urgency() {
        let config = InspectionConfig::default();
        assert_eq!(urgency_for(&config, RiskLevel::Low, 3.1), Urgency::Urgent);
        assert_eq!(urgency_for(&config, RiskLevel::Low, 2.6), Urgency::High);
        assert_eq!(urgency_for(&config, RiskLevel::Low, 2.5), Urgency::Low);
        assert_eq!(urgency_for(&config, RiskLevel::Critical, 0.0), Urgency::Urgent);
    }

    #[test]
    fn every_level_has_recommendations() {
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High, RiskLevel::Critical] {
            assert!(recommendations_for(level).len() >= 3);
        }
    }
}
