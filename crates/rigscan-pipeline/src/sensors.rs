//! Sensor log reader for `.json`, `.csv` and `.txt` files.
//!
//! Records that cannot be understood (non-numeric value, bad timestamp) are
//! skipped with a debug line and unknown kinds are read as thickness. The
//! file as a whole only fails when it cannot be opened or is structurally
//! broken.

use crate::error::{PipelineError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rigscan_core::{Location, MeasurementKind, SensorReading};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default)]
pub struct SensorReader;

/// One record as it appears in a JSON log.
#[derive(Deserialize)]
struct JsonRecord {
    sensor_id: Option<String>,
    #[serde(alias = "sensor_type")]
    kind: String,
    value: serde_json::Value,
    #[serde(default)]
    unit: String,
    timestamp: Option<String>,
    location: Option<Location>,
    quality: Option<f64>,
}

/// One CSV row; location is flattened into x/y/z columns.
#[derive(Deserialize)]
struct CsvRecord {
    sensor_id: Option<String>,
    #[serde(alias = "sensor_type")]
    kind: String,
    value: f64,
    #[serde(default)]
    unit: String,
    timestamp: Option<String>,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    quality: Option<f64>,
}

impl SensorReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read_file(&self, path: &Path) -> Result<Vec<SensorReading>> {
        if !path.exists() {
            return Err(PipelineError::NotFound(path.to_path_buf()));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let readings = match ext.as_str() {
            "json" => self.read_json(path)?,
            "csv" => self.read_csv(path)?,
            "txt" => self.read_txt(path)?,
            _ => return Err(PipelineError::UnsupportedFormat(format!(".{}", ext))),
        };
        debug!(file = %path.display(), count = readings.len(), "sensor file read");
        Ok(readings)
    }

    /// Physical plausibility and quality range.
    pub fn validate(&self, reading: &SensorReading) -> bool {
        if !reading.value.is_finite() || !(0.0..=1.0).contains(&reading.quality) {
            return false;
        }
        let (lo, hi) = match reading.kind {
            MeasurementKind::Thickness => (0.0, 50.0),
            MeasurementKind::Temperature => (-50.0, 100.0),
            MeasurementKind::Humidity => (0.0, 100.0),
            MeasurementKind::Ph => (0.0, 14.0),
            MeasurementKind::Conductivity | MeasurementKind::Pressure => (0.0, f64::MAX),
        };
        (lo..=hi).contains(&reading.value)
    }

    pub fn filter_by_quality(&self, readings: Vec<SensorReading>, min_quality: f64) -> Vec<SensorReading> {
        readings.into_iter().filter(|r| r.quality >= min_quality).collect()
    }

    /// Readings taken within `[start, end]`, both ends inclusive.
    pub fn filter_by_time_range(
        &self,
        readings: Vec<SensorReading>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<SensorReading> {
        readings
            .into_iter()
            .filter(|r| (start..=end).contains(&r.timestamp))
            .collect()
    }

    pub fn readings_of_kind<'a>(
        &self,
        readings: &'a [SensorReading],
        kind: MeasurementKind,
    ) -> impl Iterator<Item = &'a SensorReading> {
        readings.iter().filter(move |r| r.kind == kind)
    }

    fn read_json(&self, path: &Path) -> Result<Vec<SensorReading>> {
        let content = std::fs::read_to_string(path)?;
        let items = match serde_json::from_str::<serde_json::Value>(&content)? {
            serde_json::Value::Array(items) => items,
            object @ serde_json::Value::Object(_) => vec![object],
            _ => return Err(rigscan_core::Error::invalid_data("expected an object or an array").into()),
        };
        let mut readings = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let parsed = serde_json::from_value::<JsonRecord>(item)
                .map_err(|e| e.to_string())
                .and_then(|r| {
                    let value = match &r.value {
                        serde_json::Value::Number(n) => n.as_f64(),
                        serde_json::Value::String(s) => s.trim().parse().ok(),
                        _ => None,
                    }
                    .ok_or_else(|| "value is not numeric".to_string())?;
                    build(r.sensor_id, &r.kind, value, r.unit, r.timestamp.as_deref(), r.location, r.quality)
                });
            match parsed {
                Ok(reading) => readings.push(reading),
                Err(reason) => debug!(file = %path.display(), index, %reason, "skipping sensor record"),
            }
        }
        Ok(readings)
    }

    fn read_csv(&self, path: &Path) -> Result<Vec<SensorReading>> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
        let mut readings = Vec::new();
        for (index, row) in reader.deserialize::<CsvRecord>().enumerate() {
            let parsed = row.map_err(|e| e.to_string()).and_then(|r| {
                let location = Location::new(r.x.unwrap_or(0.0), r.y.unwrap_or(0.0), r.z.unwrap_or(0.0));
                build(r.sensor_id, &r.kind, r.value, r.unit, r.timestamp.as_deref(), Some(location), r.quality)
            });
            match parsed {
                Ok(reading) => readings.push(reading),
                Err(reason) => debug!(file = %path.display(), row = index + 1, %reason, "skipping sensor row"),
            }
        }
        Ok(readings)
    }

    /// `id,kind,value,unit,timestamp[,x,y,z[,quality]]`, `#` starts a comment line.
    fn read_txt(&self, path: &Path) -> Result<Vec<SensorReading>> {
        let content = std::fs::read_to_string(path)?;
        let mut readings = Vec::new();
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_txt_line(line) {
                Ok(reading) => readings.push(reading),
                Err(reason) => debug!(file = %path.display(), line = number + 1, %reason, "skipping sensor line"),
            }
        }
        Ok(readings)
    }
}

fn parse_txt_line(line: &str) -> std::result::Result<SensorReading, String> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 5 {
        return Err(format!("expected at least 5 fields, got {}", parts.len()));
    }
    let number = |i: usize| -> std::result::Result<Option<f64>, String> {
        match parts.get(i) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| format!("field {} is not numeric", i + 1)),
        }
    };
    let value = number(2)?.ok_or_else(|| "missing value".to_string())?;
    let location = Location::new(
        number(5)?.unwrap_or(0.0),
        number(6)?.unwrap_or(0.0),
        number(7)?.unwrap_or(0.0),
    );
    let timestamp = (!parts[4].is_empty()).then_some(parts[4]);
    build(
        Some(parts[0].to_string()),
        parts[1],
        value,
        parts[3].to_string(),
        timestamp,
        Some(location),
        number(8)?,
    )
}

fn build(
    sensor_id: Option<String>,
    kind: &str,
    value: f64,
    unit: String,
    timestamp: Option<&str>,
    location: Option<Location>,
    quality: Option<f64>,
) -> std::result::Result<SensorReading, String> {
    let kind = kind.parse::<MeasurementKind>().unwrap_or_else(|_: rigscan_core::Error| {
        debug!(kind, "unknown measurement kind, reading as thickness");
        MeasurementKind::Thickness
    });
    let timestamp = match timestamp {
        Some(raw) => parse_timestamp(raw).ok_or_else(|| format!("unparsable timestamp {:?}", raw))?,
        None => Utc::now(),
    };
    Ok(SensorReading {
        sensor_id: sensor_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("sensor_{}", uuid::Uuid::new_v4().simple())),
        kind,
        value,
        unit,
        timestamp,
        location: location.unwrap_or_default(),
        // kept raw so validate() can reject out-of-range scores
        quality: quality.unwrap_or(1.0),
    })
}

/// RFC 3339, or a naive `YYYY-MM-DD[T ]HH:MM:SS[.f]` taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_in_common_shapes() {
        assert!(parse_timestamp("2024-03-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-03-01T10:00:00+08:00").is_some());
        assert!(parse_timestamp("2024-03-01T10:00:00").is_some());
        assert!(parse_timestamp("2024-03-01 10:00:00.5").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn txt_line_with_optional_fields() {
        let r = parse_txt_line("T-01, thickness, 11.4, mm, 2024-03-01T10:00:00Z, 1, 2, 3, 0.8").unwrap();
        assert_eq!(r.kind, MeasurementKind::Thickness);
        assert_eq!(r.location, Location::new(1.0, 2.0, 3.0));
        assert_eq!(r.quality, 0.8);

        let r = parse_txt_line("H-01,humidity,75,%RH,").unwrap();
        assert_eq!(r.quality, 1.0);
        assert!(parse_txt_line("H-01,humidity,75").is_err());
        assert!(parse_txt_line("H-01,humidity,damp,%RH,").is_err());
        let r = parse_txt_line("X,unobtainium,1,u,").unwrap();
        assert_eq!(r.kind, MeasurementKind::Thickness);
    }

    #[test]
    fn validation_ranges() {
        let reader = SensorReader::new();
        let ok = SensorReading::new("p", MeasurementKind::Ph, 8.1, "", Location::origin(), 0.9);
        assert!(reader.validate(&ok));
        let mut bad = ok.clone();
        bad.value = 15.0;
        assert!(!reader.validate(&bad));
        let mut bad_quality = ok;
        bad_quality.quality = 1.5;
        assert!(!reader.validate(&bad_quality));
    }

    fn reading_at(kind: MeasurementKind, timestamp: &str) -> SensorReading {
        let mut r = SensorReading::new("s", kind, 1.0, "", Location::origin(), 1.0);
        r.timestamp = parse_timestamp(timestamp).unwrap();
        r
    }

    #[test]
    fn time_range_keeps_both_ends() {
        let reader = SensorReader::new();
        let readings = vec![
            reading_at(MeasurementKind::Thickness, "2024-03-01T09:59:59Z"),
            reading_at(MeasurementKind::Thickness, "2024-03-01T10:00:00Z"),
            reading_at(MeasurementKind::Thickness, "2024-03-01T11:00:00Z"),
            reading_at(MeasurementKind::Thickness, "2024-03-01T12:00:00Z"),
            reading_at(MeasurementKind::Thickness, "2024-03-01T12:00:01Z"),
        ];
        let start = parse_timestamp("2024-03-01T10:00:00Z").unwrap();
        let end = parse_timestamp("2024-03-01T12:00:00Z").unwrap();
        let kept = reader.filter_by_time_range(readings, start, end);
        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|r| r.timestamp >= start && r.timestamp <= end));

        assert!(reader.filter_by_time_range(kept, end, start).is_empty());
    }

    #[test]
    fn readings_selected_by_kind() {
        let reader = SensorReader::new();
        let readings = vec![
            reading_at(MeasurementKind::Thickness, "2024-03-01T10:00:00Z"),
            reading_at(MeasurementKind::Humidity, "2024-03-01T10:00:00Z"),
            reading_at(MeasurementKind::Thickness, "2024-03-01T10:05:00Z"),
        ];
        assert_eq!(reader.readings_of_kind(&readings, MeasurementKind::Thickness).count(), 2);
        assert_eq!(reader.readings_of_kind(&readings, MeasurementKind::Humidity).count(), 1);
        assert_eq!(reader.readings_of_kind(&readings, MeasurementKind::Ph).count(), 0);
    }
}
