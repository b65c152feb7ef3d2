//! Analysis stage: turns detected image regions into corrosion findings,
//! fuses thickness evidence and collects advisory commentary.

use crate::config::{AnalysisConfig, InspectionConfig};
use crate::vision::{DetectedRegion, VisionAnalyzer};
use chrono::Utc;
use rigscan_advisory::InsightGenerator;
use rigscan_core::{CorrosionFinding, CorrosionKind, ImageArtifact, MeasurementKind, Metadata, SharedState};
use rigscan_graph::{Route, Stage, StageOutcome};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const STAGE_NAME: &str = "analysis";

pub struct AnalysisStage {
    config: Arc<InspectionConfig>,
    vision: Arc<dyn VisionAnalyzer>,
    advisor: Arc<dyn InsightGenerator>,
}

impl AnalysisStage {
    pub fn new(
        config: Arc<InspectionConfig>,
        vision: Arc<dyn VisionAnalyzer>,
        advisor: Arc<dyn InsightGenerator>,
    ) -> Self {
        Self {
            config,
            vision,
            advisor,
        }
    }

    fn analyze_image(&self, image: &ImageArtifact) -> Option<CorrosionFinding> {
        let regions = match self.vision.detect_regions(image) {
            Ok(regions) => regions,
            Err(e) => {
                warn!(image = %image.image_id, error = %e, "vision analysis failed, treating as clean");
                return None;
            }
        };
        let finding = finding_from_regions(&self.config.analysis, Some(&image.image_id), &regions);
        if let Some(f) = &finding {
            debug!(image = %image.image_id, regions = regions.len(), area = f.area_mm2, depth = f.depth_mm, "finding");
        }
        finding
    }

    fn advisory(&self, state: &SharedState) -> Metadata {
        match self.advisor.analyze(&state.sensor_readings, &state.findings) {
            Ok(map) => map,
            Err(e) => {
                warn!(advisor = self.advisor.name(), error = %e, "advisory analysis failed");
                let mut map = Metadata::new();
                map.insert(
                    "severity_assessment".into(),
                    format!("{} corrosion site(s) detected", state.findings.len()).into(),
                );
                map.insert("technical_insights".into(), "advisory unavailable".into());
                map
            }
        }
    }
}

impl Stage for AnalysisStage {
    fn run(&self, state: &SharedState) -> StageOutcome {
        let mut next = state.clone();
        next.mark_stage(STAGE_NAME);

        let mut findings: Vec<CorrosionFinding> =
            state.images.iter().filter_map(|img| self.analyze_image(img)).collect();

        if let Some(mean_thickness) = state.mean_reading(MeasurementKind::Thickness) {
            let loss = self.config.intake.baseline_thickness_mm - mean_thickness;
            let factor = self.config.analysis.fusion_factor;
            findings = findings
                .iter()
                .map(|f| f.fused_with_thickness_loss(loss, factor))
                .collect();
            debug!(loss_mm = loss, "fused thickness evidence");
        }
        next.findings.extend(findings);

        let advisory = self.advisory(&next);
        next.advisory.extend(advisory);

        info!(
            findings = next.findings.len(),
            total_area_mm2 = next.total_finding_area(),
            "analysis complete"
        );
        StageOutcome::Updated(next)
    }
}

/// Build a finding from the regions detected in one image, if any.
pub fn finding_from_regions(
    config: &AnalysisConfig,
    image_id: Option<&str>,
    regions: &[DetectedRegion],
) -> Option<CorrosionFinding> {
    if regions.is_empty() {
        return None;
    }
    let n = regions.len();
    let pixels: u64 = regions.iter().map(|r| r.bbox.area()).sum();
    let area_mm2 = pixels as f64 * config.pixel_to_mm * config.pixel_to_mm;

    let depth_mm = regions
        .iter()
        .map(|r| {
            let darkness = (255.0 - r.mean_intensity) / 255.0;
            let variation = r.intensity_std / 128.0;
            darkness * variation * config.max_depth_mm
        })
        .fold(0.0, f64::max)
        .min(config.max_depth_mm);

    let kind = match n {
        1 => CorrosionKind::Localized,
        n if n > 3 => CorrosionKind::Pitting,
        _ => CorrosionKind::Uniform,
    };

    let region_factor = (1.0 - 0.05 * n as f64).max(0.1);
    let area_factor = (area_mm2 / 1000.0).min(1.0);
    let confidence = (0.7 * region_factor * (0.5 + 0.5 * area_factor)).clamp(0.3, 0.95);

    Some(CorrosionFinding {
        finding_id: uuid::Uuid::new_v4().to_string(),
        image_id: image_id.map(str::to_string),
        area_mm2,
        depth_mm,
        kind,
        confidence,
        regions: regions.iter().map(|r| r.bbox).collect(),
        timestamp: Utc::now(),
    })
}

/// Errors halt the run; a clean scan is labelled `clean` with a warning.
pub fn route_after_analysis(state: &SharedState) -> Route {
    if state.has_errors() {
        return Route::to("halt");
    }
    if state.findings.is_empty() {
        return Route::to("clean").with_warning("no corrosion findings in analyzed images");
    }
    Route::to("continue")
}
