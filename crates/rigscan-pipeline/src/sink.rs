//! Report sink: where assembled reports are persisted.

use crate::error::{PipelineError, Result};
use rigscan_core::InspectionReport;
use std::path::{Path, PathBuf};

pub trait ReportSink: Send + Sync {
    /// Persist a report and return where it went.
    fn save(&self, report: &InspectionReport) -> Result<PathBuf>;

    /// Physical location of reports (for human inspection).
    fn location(&self) -> String;
}

/// Local filesystem sink: one pretty-printed `<report_id>.json` per report.
pub struct JsonFileSink {
    base_dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn report_path(&self, report_id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", report_id))
    }

    pub fn load(&self, report_id: &str) -> Result<InspectionReport> {
        let path = self.report_path(report_id);
        if !path.exists() {
            return Err(PipelineError::NotFound(path));
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl ReportSink for JsonFileSink {
    fn save(&self, report: &InspectionReport) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.base_dir)?;
        let path = self.report_path(&report.report_id);
        let body = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, body)?;
        Ok(path)
    }

    fn location(&self) -> String {
        self.base_dir.display().to_string()
    }
}
