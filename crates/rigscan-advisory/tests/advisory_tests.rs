//! Tests for rigscan-advisory: local determinism, fallback behaviour

use chrono::Utc;
use rigscan_advisory::*;
use rigscan_core::*;
use std::collections::BTreeMap;
use std::time::Duration;

fn finding(area: f64, depth: f64) -> CorrosionFinding {
    CorrosionFinding {
        finding_id: "f-1".into(),
        image_id: Some("img-1".into()),
        area_mm2: area,
        depth_mm: depth,
        kind: CorrosionKind::Localized,
        confidence: 0.8,
        regions: vec![BoundingBox::new(0, 0, 10, 10)],
        timestamp: Utc::now(),
    }
}

fn assessment(level: RiskLevel, recommendations: Vec<String>) -> RiskAssessment {
    RiskAssessment {
        assessment_id: "a-1".into(),
        level,
        risk_score: 0.45,
        factors: BTreeMap::new(),
        recommendations,
        urgency: Urgency::Medium,
        timestamp: Utc::now(),
    }
}

fn readings() -> Vec<SensorReading> {
    vec![
        SensorReading::new("T1", MeasurementKind::Thickness, 11.2, "mm", Location::origin(), 0.9),
        SensorReading::new("H1", MeasurementKind::Humidity, 80.0, "%RH", Location::origin(), 0.9),
    ]
}

struct Broken;

impl InsightGenerator for Broken {
    fn name(&self) -> &str {
        "broken"
    }
    fn analyze(&self, _: &[SensorReading], _: &[CorrosionFinding]) -> AdvisoryResult<Metadata> {
        Err(AdvisoryError::Unavailable("offline".into()))
    }
    fn summarize(&self, _: &SummaryContext<'_>) -> AdvisoryResult<String> {
        Err(AdvisoryError::RateLimited { retry_after_ms: 1000 })
    }
    fn maintenance_insights(&self, _: &RiskAssessment) -> AdvisoryResult<Vec<String>> {
        Err(AdvisoryError::AuthFailed("bad key".into()))
    }
}

// ===========================================================================
// LocalAdvisor
// ===========================================================================

#[test]
fn local_analysis_is_deterministic() {
    let advisor = LocalAdvisor::new();
    let findings = vec![finding(100.0, 1.0), finding(50.0, 0.5)];
    let a = advisor.analyze(&readings(), &findings).unwrap();
    let b = advisor.analyze(&readings(), &findings).unwrap();
    assert_eq!(a, b);
    assert_eq!(a["severity_assessment"], "2 corrosion site(s) detected");
    assert!(a.contains_key("technical_insights"));
}

#[test]
fn local_summary_is_long_enough_to_use() {
    let rec = vec!["schedule coating repair".to_string()];
    let a = assessment(RiskLevel::Medium, rec);
    let r = readings();
    let ctx = SummaryContext {
        platform_id: "PLT-7",
        inspection_area: "splash zone",
        readings: &r,
        findings: &[],
        assessment: Some(&a),
    };
    let text = LocalAdvisor::new().summarize(&ctx).unwrap();
    assert!(text.trim().len() > 50);
    assert!(text.contains("PLT-7"));
    assert!(text.contains("MEDIUM"));
    assert!(text.contains("schedule coating repair"));
}

#[test]
fn local_summary_without_assessment() {
    let ctx = SummaryContext {
        platform_id: "PLT-7",
        inspection_area: "deck",
        readings: &[],
        findings: &[],
        assessment: None,
    };
    let text = LocalAdvisor::new().summarize(&ctx).unwrap();
    assert!(text.contains("not assessed"));
}

#[test]
fn local_insights_never_empty() {
    let advisor = LocalAdvisor::new();
    let none = advisor.maintenance_insights(&assessment(RiskLevel::Low, vec![])).unwrap();
    assert_eq!(none.len(), 1);
    let kept = advisor
        .maintenance_insights(&assessment(RiskLevel::High, vec!["a".into(), "b".into()]))
        .unwrap();
    assert_eq!(kept, vec!["a", "b"]);
}

// ===========================================================================
// FallbackAdvisor
// ===========================================================================

#[test]
fn fallback_substitutes_local_results() {
    let advisor = FallbackAdvisor::new(Broken);
    assert_eq!(advisor.primary_name(), "broken");

    let analysis = advisor.analyze(&readings(), &[]).unwrap();
    assert_eq!(analysis["source"], "local");

    let ctx = SummaryContext {
        platform_id: "P",
        inspection_area: "A",
        readings: &[],
        findings: &[],
        assessment: None,
    };
    assert!(advisor.summarize(&ctx).is_ok());

    let insights = advisor
        .maintenance_insights(&assessment(RiskLevel::Low, vec!["keep watching".into()]))
        .unwrap();
    assert_eq!(insights, vec!["keep watching"]);
}

#[test]
fn unreachable_remote_falls_back() {
    let remote = RemoteAdvisor::new("test-key", Duration::from_secs(2))
        .unwrap()
        .with_base_url("http://127.0.0.1:9/v1");
    assert!(remote.analyze(&readings(), &[]).is_err());

    let advisor = FallbackAdvisor::new(remote);
    let analysis = advisor.analyze(&readings(), &[]).unwrap();
    assert_eq!(analysis["source"], "local");
}

#[tokio::test]
async fn unreachable_remote_falls_back_inside_a_runtime() {
    // built, called and dropped on a runtime thread
    let remote = RemoteAdvisor::new("test-key", Duration::from_secs(2))
        .unwrap()
        .with_base_url("http://127.0.0.1:9/v1");
    assert!(matches!(remote.analyze(&readings(), &[]), Err(AdvisoryError::Network(_))));

    let advisor = FallbackAdvisor::new(remote);
    assert_eq!(advisor.analyze(&readings(), &[]).unwrap()["source"], "local");
    let summary = advisor
        .summarize(&SummaryContext {
            platform_id: "PLT-1",
            inspection_area: "deck",
            readings: &readings(),
            findings: &[],
            assessment: None,
        })
        .unwrap();
    assert!(summary.contains("PLT-1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remote_advisor_is_usable_from_a_multi_thread_runtime() {
    let remote = RemoteAdvisor::new("test-key", Duration::from_secs(2))
        .unwrap()
        .with_base_url("http://127.0.0.1:9/v1");
    let advisor = FallbackAdvisor::new(remote);
    assert!(!advisor.analyze(&[], &[]).unwrap().is_empty());
}

#[test]
fn error_messages_are_descriptive() {
    let e = AdvisoryError::RateLimited { retry_after_ms: 60000 };
    assert_eq!(e.to_string(), "rate limited: retry after 60000ms");
    let e = AdvisoryError::Unavailable("no key".into());
    assert!(e.to_string().contains("no key"));
}
