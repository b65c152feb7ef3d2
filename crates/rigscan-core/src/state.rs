//! The shared run state threaded through every stage of an inspection run.

use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stage marker of a state that has not entered any stage yet.
pub const INITIAL_STAGE: &str = "init";

/// Single record owned by the executor for the duration of a run.
///
/// Stages receive it by reference and hand back an updated copy; nothing
/// retains it after the stage returns. `errors` and `warnings` are
/// append-only: [`SharedState::carry_diagnostics_from`] restores any entries a
/// stage dropped.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SharedState {
    pub session_id: String,
    pub platform_id: String,
    pub inspection_area: String,
    pub current_stage: String,
    pub started_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,

    #[serde(default)]
    pub image_files: Vec<PathBuf>,
    #[serde(default)]
    pub sensor_files: Vec<PathBuf>,

    #[serde(default)]
    pub sensor_readings: Vec<SensorReading>,
    #[serde(default)]
    pub images: Vec<ImageArtifact>,
    #[serde(default)]
    pub findings: Vec<CorrosionFinding>,
    #[serde(default)]
    pub risk_assessment: Option<RiskAssessment>,
    #[serde(default)]
    pub report: Option<InspectionReport>,

    /// Qualitative commentary merged in by the advisory collaborator.
    #[serde(default)]
    pub advisory: Metadata,

    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl SharedState {
    pub fn new(platform_id: impl Into<String>, inspection_area: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            platform_id: platform_id.into(),
            inspection_area: inspection_area.into(),
            current_stage: INITIAL_STAGE.into(),
            started_at: now,
            last_update: now,
            image_files: Vec::new(),
            sensor_files: Vec::new(),
            sensor_readings: Vec::new(),
            images: Vec::new(),
            findings: Vec::new(),
            risk_assessment: None,
            report: None,
            advisory: Metadata::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_image_files(mut self, files: Vec<PathBuf>) -> Self {
        self.image_files = files;
        self
    }

    pub fn with_sensor_files(mut self, files: Vec<PathBuf>) -> Self {
        self.sensor_files = files;
        self
    }

    /// Record entry into a stage.
    pub fn mark_stage(&mut self, stage: &str) {
        self.current_stage = stage.to_string();
        self.last_update = Utc::now();
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn record_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn readings_of(&self, kind: MeasurementKind) -> impl Iterator<Item = &SensorReading> {
        self.sensor_readings.iter().filter(move |r| r.kind == kind)
    }

    /// Mean value of all readings of `kind`, if any exist.
    pub fn mean_reading(&self, kind: MeasurementKind) -> Option<f64> {
        mean(self.readings_of(kind).map(|r| r.value))
    }

    pub fn total_finding_area(&self) -> f64 {
        self.findings.iter().map(|f| f.area_mm2).sum()
    }

    /// Deepest finding, or `None` when nothing was found.
    pub fn max_finding_depth(&self) -> Option<f64> {
        self.findings.iter().map(|f| f.depth_mm).reduce(f64::max)
    }

    /// Keep `previous`'s diagnostics as a prefix of ours.
    ///
    /// Entries this state already extends are left alone; if a stage replaced
    /// or truncated the lists, the previous entries are restored in front of
    /// whatever the stage added.
    pub fn carry_diagnostics_from(&mut self, previous: &SharedState) {
        carry_forward(&previous.errors, &mut self.errors);
        carry_forward(&previous.warnings, &mut self.warnings);
    }
}

fn carry_forward(previous: &[String], next: &mut Vec<String>) {
    if next.starts_with(previous) {
        return;
    }
    let common = previous
        .iter()
        .zip(next.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let added: Vec<String> = next.drain(..).skip(common).collect();
    next.extend(previous.iter().cloned());
    next.extend(added);
}

pub fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
