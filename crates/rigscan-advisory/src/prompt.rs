//! Prompt construction and response parsing for text-completion advisors.

use crate::provider::SummaryContext;
use rigscan_core::{CorrosionFinding, Metadata, RiskAssessment, SensorReading};
use serde_json::Value;

pub const ANALYSIS_SYSTEM: &str =
    "You are a corrosion inspection specialist for offshore oil and gas platforms.";
pub const SUMMARY_SYSTEM: &str =
    "You write inspection report summaries for offshore platform asset managers.";
pub const MAINTENANCE_SYSTEM: &str =
    "You are an offshore platform maintenance planner.";

const MAX_INSIGHTS: usize = 5;
const RAW_EXCERPT_CHARS: usize = 200;

pub fn analysis_prompt(readings: &[SensorReading], findings: &[CorrosionFinding]) -> String {
    format!(
        "Analyze the following inspection data.\n\n\
         Sensor readings:\n{}\n\n\
         Corrosion findings:\n{}\n\n\
         Assess corrosion severity, likely root causes, the influence of the \
         environment and the expected trend.\n\
         Respond with a single JSON object with the fields severity_assessment \
         (string), root_causes (list of strings), environmental_factors (string), \
         trend_prediction (string) and technical_insights (string).",
        format_readings(readings),
        format_findings(findings),
    )
}

pub fn summary_prompt(ctx: &SummaryContext<'_>) -> String {
    let risk = match ctx.assessment {
        Some(a) => format!(
            "- Risk level: {}\n- Risk score: {:.2}\n- Urgency: {}",
            a.level, a.risk_score, a.urgency
        ),
        None => "- No risk assessment available".to_string(),
    };
    format!(
        "Write a 150-250 word summary of this inspection for management.\n\n\
         Platform: {}\nInspected area: {}\nDate: {}\n\n\
         Sensor readings:\n{}\n\n\
         Corrosion findings:\n{}\n\n\
         Risk assessment:\n{}\n\n\
         Cover the inspection scope, the main findings, the risk conclusion and \
         the key recommendation.",
        ctx.platform_id,
        ctx.inspection_area,
        chrono::Utc::now().format("%Y-%m-%d"),
        format_readings(ctx.readings),
        format_findings(ctx.findings),
        risk,
    )
}

pub fn maintenance_prompt(assessment: &RiskAssessment) -> String {
    format!(
        "Based on this risk assessment, give 3 to 5 concrete maintenance actions.\n\n\
         Risk level: {}\nRisk score: {:.2}\nUrgency: {}\nCurrent recommendations: {}\n\n\
         Each action should name the steps, timing and resources, account for \
         offshore working conditions, and stay under 40 words.\n\
         Reply with a numbered list only.",
        assessment.level,
        assessment.risk_score,
        assessment.urgency,
        assessment.recommendations.join("; "),
    )
}

pub fn format_readings(readings: &[SensorReading]) -> String {
    if readings.is_empty() {
        return "none".to_string();
    }
    readings
        .iter()
        .map(|r| format!("- {}: {}{} (quality {:.2})", r.kind, r.value, r.unit, r.quality))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_findings(findings: &[CorrosionFinding]) -> String {
    if findings.is_empty() {
        return "no corrosion detected".to_string();
    }
    findings
        .iter()
        .map(|f| {
            format!(
                "- {}: area {:.1} mm², depth {:.1} mm, confidence {:.2}",
                f.kind, f.area_mm2, f.depth_mm, f.confidence
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse an analysis reply. A JSON object (optionally fenced) is used as is;
/// anything else is wrapped with an excerpt of the raw text.
pub fn parse_analysis(reply: &str) -> Metadata {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(strip_fence(reply)) {
        return map;
    }

    let trimmed = reply.trim();
    let excerpt = if trimmed.chars().count() > RAW_EXCERPT_CHARS {
        let head: String = trimmed.chars().take(RAW_EXCERPT_CHARS).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    };

    let mut map = Metadata::new();
    map.insert("severity_assessment".into(), "advisory analysis (unstructured reply)".into());
    map.insert("root_causes".into(), Value::Array(vec!["further analysis required".into()]));
    map.insert("environmental_factors".into(), "marine environment".into());
    map.insert("trend_prediction".into(), "continued monitoring required".into());
    map.insert("technical_insights".into(), excerpt.into());
    map
}

/// Extract numbered or bulleted lines, without their markers, at most five.
pub fn parse_insights(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| {
            line.starts_with(|c: char| c.is_ascii_digit()) || line.starts_with(['-', '•', '*'])
        })
        .map(strip_marker)
        .filter(|line| !line.is_empty())
        .take(MAX_INSIGHTS)
        .map(str::to_string)
        .collect()
}

fn strip_marker(line: &str) -> &str {
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() != line.len() {
        return rest.trim_start_matches(['.', ')', ':']).trim();
    }
    line.trim_start_matches(['-', '•', '*']).trim()
}

fn strip_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_json_is_used_directly() {
        let map = parse_analysis(r#"{"severity_assessment": "moderate", "root_causes": ["splash zone"]}"#);
        assert_eq!(map["severity_assessment"], "moderate");
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let map = parse_analysis("```json\n{\"trend_prediction\": \"slow\"}\n```");
        assert_eq!(map["trend_prediction"], "slow");
    }

    #[test]
    fn prose_reply_is_wrapped_and_truncated() {
        let reply = "x".repeat(500);
        let map = parse_analysis(&reply);
        let insights = map["technical_insights"].as_str().unwrap();
        assert_eq!(insights.chars().count(), RAW_EXCERPT_CHARS + 3);
        assert!(map.contains_key("severity_assessment"));
    }

    #[test]
    fn insights_drop_markers_and_cap_at_five() {
        let reply = "Here you go:\n1. Blast and recoat\n2) Install anodes\n- Inspect welds\n• Log results\n3. Re-survey\n4. Extra";
        let lines = parse_insights(reply);
        assert_eq!(
            lines,
            vec!["Blast and recoat", "Install anodes", "Inspect welds", "Log results", "Re-survey"]
        );
    }

    #[test]
    fn empty_collections_have_placeholders() {
        assert_eq!(format_readings(&[]), "none");
        assert_eq!(format_findings(&[]), "no corrosion detected");
    }
}
