//! rigscan-pipeline - the four-stage corrosion inspection pipeline
//!
//! intake → analysis → risk scoring → report, run on the rigscan-graph
//! executor with pluggable vision, advisory and report-sink collaborators.

pub mod agent;
pub mod analysis;
pub mod config;
pub mod error;
pub mod intake;
pub mod report;
pub mod risk;
pub mod sensors;
pub mod sink;
pub mod vision;

pub use agent::{InspectionAgent, InspectionRequest, RunSummary};
pub use config::InspectionConfig;
pub use error::{PipelineError, Result};
pub use sensors::SensorReader;
pub use sink::{JsonFileSink, ReportSink};
pub use vision::{ColorThresholdAnalyzer, DetectedRegion, VisionAnalyzer};
