//! Inspection agent: wires the four stages into a graph and runs it.
//!
//! ```text
//! intake --continue--> analysis --continue--> risk_scoring --> report --> END
//!    |stop               |clean  (risk_scoring, or END when halting on clean)
//!    v                   |halt   (END)
//!   END                  |retry  (analysis, reserved)
//! ```

use crate::analysis::{self, AnalysisStage};
use crate::config::InspectionConfig;
use crate::error::Result;
use crate::intake::{self, IntakeStage};
use crate::report::{self, ReportStage};
use crate::risk::{self, RiskStage};
use crate::sink::{JsonFileSink, ReportSink};
use crate::vision::{ColorThresholdAnalyzer, VisionAnalyzer};
use rigscan_advisory::{FallbackAdvisor, InsightGenerator, LocalAdvisor, RemoteAdvisor};
use rigscan_core::{RiskLevel, SharedState, Urgency};
use rigscan_graph::{CompiledGraph, RunTrace, StateGraph, Target};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Inputs of one inspection run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InspectionRequest {
    pub platform_id: String,
    pub inspection_area: String,
    #[serde(default)]
    pub image_files: Vec<PathBuf>,
    #[serde(default)]
    pub sensor_files: Vec<PathBuf>,
}

impl InspectionRequest {
    pub fn new(platform_id: impl Into<String>, inspection_area: impl Into<String>) -> Self {
        Self {
            platform_id: platform_id.into(),
            inspection_area: inspection_area.into(),
            ..Self::default()
        }
    }

    pub fn with_images(mut self, files: Vec<PathBuf>) -> Self {
        self.image_files = files;
        self
    }

    pub fn with_sensors(mut self, files: Vec<PathBuf>) -> Self {
        self.sensor_files = files;
        self
    }

    fn initial_state(&self) -> SharedState {
        SharedState::new(&self.platform_id, &self.inspection_area)
            .with_image_files(self.image_files.clone())
            .with_sensor_files(self.sensor_files.clone())
    }
}

pub struct InspectionAgent {
    config: Arc<InspectionConfig>,
    graph: CompiledGraph,
    advisor_name: String,
}

impl InspectionAgent {
    pub fn new(
        config: InspectionConfig,
        vision: Arc<dyn VisionAnalyzer>,
        advisor: Arc<dyn InsightGenerator>,
        sink: Arc<dyn ReportSink>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let advisor_name = advisor.name().to_string();

        let clean_target = if config.analysis.halt_on_clean_scan {
            Target::End
        } else {
            Target::stage(risk::STAGE_NAME)
        };

        let mut graph = StateGraph::new();
        graph
            .add_stage(intake::STAGE_NAME, IntakeStage::new(config.clone()))
            .add_stage(
                analysis::STAGE_NAME,
                AnalysisStage::new(config.clone(), vision, advisor.clone()),
            )
            .add_stage(risk::STAGE_NAME, RiskStage::new(config.clone(), advisor.clone()))
            .add_stage(report::STAGE_NAME, ReportStage::new(advisor, sink))
            .set_entry(intake::STAGE_NAME)
            .add_conditional_edge(
                intake::STAGE_NAME,
                intake::route_after_intake,
                [
                    ("continue", Target::stage(analysis::STAGE_NAME)),
                    ("stop", Target::End),
                ],
            )
            .add_conditional_edge(
                analysis::STAGE_NAME,
                analysis::route_after_analysis,
                [
                    ("continue", Target::stage(risk::STAGE_NAME)),
                    ("clean", clean_target),
                    ("retry", Target::stage(analysis::STAGE_NAME)),
                    ("halt", Target::End),
                ],
            )
            .add_edge(risk::STAGE_NAME, report::STAGE_NAME)
            .add_edge(report::STAGE_NAME, Target::End);

        let graph = graph.compile_with(config.graph.clone())?;
        info!(
            stages = ?graph.stage_names(),
            mode = ?config.graph.mode,
            advisor = %advisor_name,
            "inspection graph compiled"
        );
        Ok(Self {
            config,
            graph,
            advisor_name,
        })
    }

    /// Default collaborators: colour-threshold vision, a JSON report sink
    /// under `<output_dir>/reports`, and the remote advisor behind a local
    /// fallback when an API key is available.
    pub fn from_config(config: InspectionConfig) -> Result<Self> {
        let vision = Arc::new(ColorThresholdAnalyzer::new(config.analysis.min_region_area_px));
        let sink = Arc::new(JsonFileSink::new(config.reports_dir()));
        let advisor: Arc<dyn InsightGenerator> = match config.api_key() {
            Some(key) => {
                let remote = RemoteAdvisor::new(key, config.advisory_timeout())?
                    .with_base_url(&config.advisory.base_url)
                    .with_model(&config.advisory.model);
                Arc::new(FallbackAdvisor::new(remote))
            }
            None => {
                info!("no advisory API key, using local advisor");
                Arc::new(LocalAdvisor::new())
            }
        };
        Self::new(config, vision, advisor, sink)
    }

    pub fn config(&self) -> &InspectionConfig {
        &self.config
    }

    pub fn advisor_name(&self) -> &str {
        &self.advisor_name
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    pub fn run_inspection_sync(&self, request: &InspectionRequest) -> SharedState {
        self.trace_inspection(request).state
    }

    /// Same run as [`Self::run_inspection_sync`] behind an async signature.
    pub async fn run_inspection(&self, request: &InspectionRequest) -> SharedState {
        info!(platform = %request.platform_id, area = %request.inspection_area, "starting inspection");
        self.graph.invoke_async(request.initial_state()).await
    }

    /// Run and keep the per-step trace.
    pub fn trace_inspection(&self, request: &InspectionRequest) -> RunTrace {
        info!(platform = %request.platform_id, area = %request.inspection_area, "starting inspection");
        self.graph.run(request.initial_state())
    }
}

/// What the CLI prints after a run.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct RunSummary {
    pub session_id: String,
    pub platform_id: String,
    pub inspection_area: String,
    pub final_stage: String,
    pub readings: usize,
    pub images: usize,
    pub findings: usize,
    pub risk_level: Option<RiskLevel>,
    pub risk_score: Option<f64>,
    pub urgency: Option<Urgency>,
    pub report_id: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl RunSummary {
    pub fn from_state(state: &SharedState) -> Self {
        let assessment = state.risk_assessment.as_ref();
        Self {
            session_id: state.session_id.clone(),
            platform_id: state.platform_id.clone(),
            inspection_area: state.inspection_area.clone(),
            final_stage: state.current_stage.clone(),
            readings: state.sensor_readings.len(),
            images: state.images.len(),
            findings: state.findings.len(),
            risk_level: assessment.map(|a| a.level),
            risk_score: assessment.map(|a| a.risk_score),
            urgency: assessment.map(|a| a.urgency),
            report_id: state.report.as_ref().map(|r| r.report_id.clone()),
            errors: state.errors.clone(),
            warnings: state.warnings.clone(),
        }
    }

    pub fn completed(&self) -> bool {
        self.report_id.is_some()
    }
}
