//! Inspection configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup, falls
//! back to defaults when no config file exists, then environment overrides
//! are applied on top.

use crate::error::{PipelineError, Result};
use rigscan_advisory::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use rigscan_core::RiskLevel;
use rigscan_graph::GraphConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Top-level inspection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InspectionConfig {
    /// Root for processed images, sample images and reports.
    pub output_dir: PathBuf,
    /// Step ceiling and compile mode of the stage graph.
    pub graph: GraphConfig,
    pub intake: IntakeConfig,
    pub analysis: AnalysisConfig,
    pub risk: RiskConfig,
    pub advisory: AdvisoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntakeConfig {
    /// Simulated thickness readings when no sensor file is given.
    pub thickness_points: usize,
    /// Nominal wall thickness in mm.
    pub baseline_thickness_mm: f64,
    /// Upper bound of simulated thickness loss in mm.
    pub max_thickness_loss_mm: f64,
    /// Placeholder images synthesized when no image files are supplied.
    pub sample_images: usize,
    pub image_width: u32,
    pub image_height: u32,
    /// Contrast boost and sharpening after resize.
    pub enhance_images: bool,
    /// Readings below this quality are dropped at intake.
    pub min_quality: f64,
    /// Seed for simulated readings and sample images. Unset means entropy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Millimetres per image pixel.
    pub pixel_to_mm: f64,
    /// Cap on image-derived depth in mm.
    pub max_depth_mm: f64,
    /// Share of measured thickness loss attributed to a visible finding.
    pub fusion_factor: f64,
    /// Smallest rust-coloured region, in pixels, that counts as a finding.
    pub min_region_area_px: u64,
    /// End the run when no corrosion is found instead of scoring it.
    pub halt_on_clean_scan: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskConfig {
    pub low_risk_threshold: f64,
    pub medium_risk_threshold: f64,
    pub high_risk_threshold: f64,
    /// Depth in mm above which urgency is at least "high".
    pub high_depth_mm: f64,
    /// Depth in mm above which urgency is "urgent".
    pub urgent_depth_mm: f64,
    /// Total corroded area that saturates the area factor.
    pub area_scale_mm2: f64,
    /// Depth that saturates the depth factor.
    pub depth_scale_mm: f64,
    /// Finding count that saturates the count factor.
    pub count_scale: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// Use the remote advisor when an API key is available.
    pub remote: bool,
    /// OpenAI-compatible base URL.
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

// ============================================================
// Defaults
// ============================================================

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            graph: GraphConfig::default(),
            intake: IntakeConfig::default(),
            analysis: AnalysisConfig::default(),
            risk: RiskConfig::default(),
            advisory: AdvisoryConfig::default(),
        }
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            thickness_points: 5,
            baseline_thickness_mm: 12.0,
            max_thickness_loss_mm: 3.0,
            sample_images: 3,
            image_width: 640,
            image_height: 480,
            enhance_images: true,
            min_quality: 0.0,
            seed: None,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pixel_to_mm: 0.1,
            max_depth_mm: 2.0,
            fusion_factor: 0.8,
            min_region_area_px: 100,
            halt_on_clean_scan: false,
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            low_risk_threshold: 0.3,
            medium_risk_threshold: 0.6,
            high_risk_threshold: 0.8,
            high_depth_mm: 2.5,
            urgent_depth_mm: 3.0,
            area_scale_mm2: 5000.0,
            depth_scale_mm: 3.0,
            count_scale: 10,
        }
    }
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            remote: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: "DASHSCOPE_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl InspectionConfig {
    /// `<config dir>/rigscan/config.toml`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rigscan").join("config.toml"))
    }

    /// Load config from a TOML file, falling back to defaults when the file
    /// does not exist. A file that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = toml::from_str(&content)?;
                tracing::info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {} - using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Apply `RIGSCAN_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup; unset keys are skipped,
    /// unparsable values are an error.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = parse_var(&lookup, "RIGSCAN_LOW_RISK_THRESHOLD")? {
            self.risk.low_risk_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "RIGSCAN_MEDIUM_RISK_THRESHOLD")? {
            self.risk.medium_risk_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "RIGSCAN_HIGH_RISK_THRESHOLD")? {
            self.risk.high_risk_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "RIGSCAN_MAX_STEPS")? {
            self.graph.max_steps = v;
        }
        if let Some(v) = lookup("RIGSCAN_OUTPUT_DIR").filter(|v| !v.trim().is_empty()) {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("RIGSCAN_ADVISORY_MODEL").filter(|v| !v.trim().is_empty()) {
            self.advisory.model = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.risk;
        let ascending = 0.0 < r.low_risk_threshold
            && r.low_risk_threshold < r.medium_risk_threshold
            && r.medium_risk_threshold < r.high_risk_threshold
            && r.high_risk_threshold <= 1.0;
        if !ascending {
            return Err(PipelineError::config(format!(
                "risk thresholds must satisfy 0 < low < medium < high <= 1 (got {}, {}, {})",
                r.low_risk_threshold, r.medium_risk_threshold, r.high_risk_threshold
            )));
        }
        if r.area_scale_mm2 <= 0.0 || r.depth_scale_mm <= 0.0 || r.count_scale == 0 {
            return Err(PipelineError::config("risk factor scales must be positive"));
        }
        if self.graph.max_steps == 0 {
            return Err(PipelineError::config("graph.max_steps must be at least 1"));
        }
        let i = &self.intake;
        if i.baseline_thickness_mm <= 0.0 || i.max_thickness_loss_mm < 0.0 {
            return Err(PipelineError::config("thickness baseline must be positive and loss non-negative"));
        }
        if i.image_width == 0 || i.image_height == 0 {
            return Err(PipelineError::config("image dimensions must be non-zero"));
        }
        if !(0.0..=1.0).contains(&i.min_quality) {
            return Err(PipelineError::config("intake.min_quality must be within [0, 1]"));
        }
        let a = &self.analysis;
        if a.pixel_to_mm <= 0.0 || a.max_depth_mm <= 0.0 {
            return Err(PipelineError::config("pixel_to_mm and max_depth_mm must be positive"));
        }
        Ok(())
    }

    /// Map a risk score to its level using the configured thresholds.
    pub fn level_for(&self, score: f64) -> RiskLevel {
        let r = &self.risk;
        if score < r.low_risk_threshold {
            RiskLevel::Low
        } else if score < r.medium_risk_threshold {
            RiskLevel::Medium
        } else if score < r.high_risk_threshold {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    /// API key for the remote advisor, if configured and present.
    pub fn api_key(&self) -> Option<String> {
        if !self.advisory.remote {
            return None;
        }
        std::env::var(&self.advisory.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn advisory_timeout(&self) -> Duration {
        Duration::from_secs(self.advisory.timeout_secs.max(1))
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.output_dir.join("reports")
    }

    pub fn processed_images_dir(&self) -> PathBuf {
        self.output_dir.join("processed_images")
    }

    pub fn sample_images_dir(&self) -> PathBuf {
        self.output_dir.join("sample_images")
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PipelineError::config(format!("{} has an invalid value: {:?}", key, raw))),
    }
}
