//! Inspection records: sensor readings, images, findings, assessments, reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Free-form key/value metadata attached to images and advisory output.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Kind of physical quantity a sensor measures.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementKind {
    Thickness,
    Conductivity,
    Temperature,
    Humidity,
    Ph,
    Pressure,
}

impl MeasurementKind {
    pub const ALL: [MeasurementKind; 6] = [
        Self::Thickness,
        Self::Conductivity,
        Self::Temperature,
        Self::Humidity,
        Self::Ph,
        Self::Pressure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thickness => "thickness",
            Self::Conductivity => "conductivity",
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Ph => "ph",
            Self::Pressure => "pressure",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == lowered)
            .ok_or_else(|| crate::Error::invalid_data(format!("unknown measurement kind: {}", s)))
    }
}

/// Point in platform coordinates.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn origin() -> Self {
        Self::default()
    }
}

/// A single sensor measurement. Immutable once created.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SensorReading {
    pub sensor_id: String,
    pub kind: MeasurementKind,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    pub location: Location,
    /// Data quality in [0, 1].
    pub quality: f64,
}

impl SensorReading {
    pub fn new(
        sensor_id: impl Into<String>,
        kind: MeasurementKind,
        value: f64,
        unit: impl Into<String>,
        location: Location,
        quality: f64,
    ) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            kind,
            value,
            unit: unit.into(),
            timestamp: Utc::now(),
            location,
            quality: clamp_unit(quality),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// An image captured or synthesized during intake.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ImageArtifact {
    pub image_id: String,
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub location: Location,
    pub resolution: Resolution,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Axis-aligned box in pixel coordinates.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CorrosionKind {
    Localized,
    Uniform,
    Pitting,
}

impl fmt::Display for CorrosionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Localized => write!(f, "localized"),
            Self::Uniform => write!(f, "uniform"),
            Self::Pitting => write!(f, "pitting"),
        }
    }
}

/// A detected corrosion region.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CorrosionFinding {
    pub finding_id: String,
    pub image_id: Option<String>,
    /// Affected area in mm².
    pub area_mm2: f64,
    /// Estimated depth in mm.
    pub depth_mm: f64,
    pub kind: CorrosionKind,
    /// Detection confidence in [0, 1].
    pub confidence: f64,
    #[serde(default)]
    pub regions: Vec<BoundingBox>,
    pub timestamp: DateTime<Utc>,
}

impl CorrosionFinding {
    /// Revision of this finding after thickness-sensor fusion. Depth is raised
    /// to at least `loss_mm * factor`; id, kind and regions are kept.
    pub fn fused_with_thickness_loss(&self, loss_mm: f64, factor: f64) -> Self {
        Self {
            depth_mm: self.depth_mm.max(loss_mm * factor),
            confidence: (self.confidence + 0.05).min(0.95),
            ..self.clone()
        }
    }
}

/// Ordinal corrosion risk level.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Urgent,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    pub assessment_id: String,
    pub level: RiskLevel,
    /// Weighted risk score in [0, 1].
    pub risk_score: f64,
    pub factors: BTreeMap<String, f64>,
    pub recommendations: Vec<String>,
    pub urgency: Urgency,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceRecommendation {
    pub recommendation_id: String,
    /// 1 (routine) to 5 (emergency).
    pub priority: u8,
    pub action_type: String,
    pub description: String,
    pub estimated_cost: Option<f64>,
    /// Estimated duration in hours.
    pub estimated_duration_hours: Option<u32>,
    #[serde(default)]
    pub required_resources: Vec<String>,
}

/// Terminal artifact of a run. Immutable once assembled.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InspectionReport {
    pub report_id: String,
    pub timestamp: DateTime<Utc>,
    pub inspector: String,
    pub platform_id: String,
    pub area_inspected: String,
    pub sensor_readings: Vec<SensorReading>,
    pub images: Vec<ImageArtifact>,
    pub findings: Vec<CorrosionFinding>,
    pub risk_assessment: Option<RiskAssessment>,
    pub maintenance: Vec<MaintenanceRecommendation>,
    pub summary: String,
    pub next_inspection: DateTime<Utc>,
}

/// Clamp to the closed unit interval, mapping NaN to 0.
pub fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}
