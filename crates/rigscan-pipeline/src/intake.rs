//! Intake stage: gathers sensor readings and inspection images.
//!
//! Real inputs are used when given. Without sensor files readings are
//! simulated around the configured wall-thickness baseline; without image
//! files placeholder plate images are synthesized. Supplied images that are
//! missing or cannot be processed are reported as warnings and never
//! replaced by samples.

use crate::config::InspectionConfig;
use crate::error::Result;
use crate::sensors::SensorReader;
use image::imageops::FilterType;
use image::{GenericImageView, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rigscan_core::{
    ImageArtifact, Location, MeasurementKind, Metadata, Resolution, SensorReading, SharedState,
};
use rigscan_graph::{Route, Stage, StageOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const STAGE_NAME: &str = "intake";

/// Percentage passed to `adjust_contrast`.
const CONTRAST_BOOST: f32 = 15.0;

/// 3×3 sharpening kernel (centre 9, neighbours -1).
const SHARPEN_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];

pub struct IntakeStage {
    config: Arc<InspectionConfig>,
    reader: SensorReader,
}

impl IntakeStage {
    pub fn new(config: Arc<InspectionConfig>) -> Self {
        Self {
            config,
            reader: SensorReader::new(),
        }
    }

    fn rng(&self) -> StdRng {
        match self.config.intake.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    fn collect_readings(&self, state: &mut SharedState, rng: &mut StdRng) {
        if state.sensor_files.is_empty() {
            let simulated = simulate_readings(&self.config, &state.inspection_area, rng);
            debug!(count = simulated.len(), "no sensor files, simulated readings");
            state.sensor_readings.extend(simulated);
            return;
        }

        let files = state.sensor_files.clone();
        for path in &files {
            let readings = match self.reader.read_file(path) {
                Ok(readings) => readings,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "sensor file unreadable");
                    state.record_error(format!("failed to read sensor file {}: {}", path.display(), e));
                    continue;
                }
            };
            let total = readings.len();
            let (valid, invalid): (Vec<_>, Vec<_>) =
                readings.into_iter().partition(|r| self.reader.validate(r));
            if !invalid.is_empty() {
                state.record_warning(format!(
                    "dropped {} of {} out-of-range readings from {}",
                    invalid.len(),
                    total,
                    path.display()
                ));
            }
            let kept = self.reader.filter_by_quality(valid, self.config.intake.min_quality);
            state.sensor_readings.extend(kept);
        }
    }

    fn collect_images(&self, state: &mut SharedState, rng: &mut StdRng) {
        if state.image_files.is_empty() {
            for index in 0..self.config.intake.sample_images {
                match self.synthesize_sample(index, &state.inspection_area, rng) {
                    Ok(artifact) => state.images.push(artifact),
                    Err(e) => {
                        warn!(index, error = %e, "failed to write sample image");
                        state.record_warning(format!("failed to write sample image {}: {}", index + 1, e));
                    }
                }
            }
            return;
        }

        let files = state.image_files.clone();
        for path in &files {
            if !path.exists() {
                state.record_warning(format!("image file not found: {}", path.display()));
                continue;
            }
            match self.process_image(path, &state.inspection_area) {
                Ok(artifact) => state.images.push(artifact),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unprocessable image");
                    state.record_warning(format!("failed to process image {}: {}", path.display(), e));
                }
            }
        }
    }

    /// Decode, resize, enhance and store a normalized copy of an input image.
    fn process_image(&self, path: &Path, area: &str) -> Result<ImageArtifact> {
        let (width, height) = (self.config.intake.image_width, self.config.intake.image_height);
        let source = image::open(path)?;
        let (source_width, source_height) = GenericImageView::dimensions(&source);
        let mut processed = source.resize_exact(width, height, FilterType::Triangle);
        if self.config.intake.enhance_images {
            processed = processed.adjust_contrast(CONTRAST_BOOST).filter3x3(&SHARPEN_KERNEL);
        }

        let dir = self.config.processed_images_dir();
        std::fs::create_dir_all(&dir)?;
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
        let out = dir.join(format!("{}_{}_processed.png", slug(stem), slug(area)));
        processed.to_rgb8().save(&out)?;

        let mut metadata = Metadata::new();
        metadata.insert("type".into(), "captured".into());
        metadata.insert("original_path".into(), path.display().to_string().into());
        metadata.insert("file_size".into(), std::fs::metadata(path)?.len().into());
        metadata.insert("source_width".into(), source_width.into());
        metadata.insert("source_height".into(), source_height.into());
        metadata.insert("processed".into(), true.into());
        Ok(artifact(out, width, height, metadata))
    }

    /// Grey steel plate with a few rust-coloured spots.
    fn synthesize_sample(&self, index: usize, area: &str, rng: &mut StdRng) -> Result<ImageArtifact> {
        let (width, height) = (self.config.intake.image_width, self.config.intake.image_height);
        let mut img = RgbImage::from_fn(width, height, |_, _| {
            Rgb([
                rng.random_range(80..=120),
                rng.random_range(80..=120),
                rng.random_range(80..=120),
            ])
        });

        let spots = rng.random_range(3..=7);
        for _ in 0..spots {
            let radius = rng.random_range(12..=30u32);
            let cx = rng.random_range(0..width);
            let cy = rng.random_range(0..height);
            paint_spot(&mut img, cx, cy, radius, rng);
        }

        let dir = self.config.sample_images_dir();
        std::fs::create_dir_all(&dir)?;
        let out = dir.join(format!("sample_{}_{}.png", index + 1, slug(area)));
        img.save(&out)?;

        let mut metadata = Metadata::new();
        metadata.insert("type".into(), "sample".into());
        metadata.insert("generated".into(), true.into());
        Ok(artifact(out, width, height, metadata))
    }
}

impl Stage for IntakeStage {
    fn run(&self, state: &SharedState) -> StageOutcome {
        let mut next = state.clone();
        next.mark_stage(STAGE_NAME);
        let mut rng = self.rng();

        self.collect_readings(&mut next, &mut rng);
        self.collect_images(&mut next, &mut rng);

        info!(
            readings = next.sensor_readings.len(),
            images = next.images.len(),
            "intake complete"
        );
        StageOutcome::Updated(next)
    }
}

/// Continue when there is anything to analyze, otherwise stop.
pub fn route_after_intake(state: &SharedState) -> Route {
    if state.sensor_readings.is_empty() && state.images.is_empty() {
        return Route::to("stop").with_warning("no sensor readings or images collected, stopping");
    }
    Route::to("continue")
}

pub fn simulate_readings(config: &InspectionConfig, area: &str, rng: &mut StdRng) -> Vec<SensorReading> {
    let intake = &config.intake;
    let area = slug(area);
    let mut readings = Vec::with_capacity(intake.thickness_points + 4);

    for i in 0..intake.thickness_points {
        let loss = rng.random_range(0.0..=intake.max_thickness_loss_mm);
        readings.push(SensorReading::new(
            format!("thickness_{}_{}", area, i + 1),
            MeasurementKind::Thickness,
            intake.baseline_thickness_mm - loss,
            "mm",
            Location::new(i as f64 * 10.0, 0.0, 0.0),
            rng.random_range(0.8..=1.0),
        ));
    }

    let environment = [
        (MeasurementKind::Temperature, 15.0, 35.0, "°C"),
        (MeasurementKind::Humidity, 60.0, 90.0, "%RH"),
        (MeasurementKind::Ph, 7.5, 8.5, "pH"),
        (MeasurementKind::Conductivity, 50_000.0, 55_000.0, "µS/cm"),
    ];
    for (kind, lo, hi, unit) in environment {
        readings.push(SensorReading::new(
            format!("{}_{}", kind, area),
            kind,
            rng.random_range(lo..=hi),
            unit,
            Location::origin(),
            rng.random_range(0.85..=1.0),
        ));
    }
    readings
}

fn paint_spot(img: &mut RgbImage, cx: u32, cy: u32, radius: u32, rng: &mut StdRng) {
    let (w, h) = img.dimensions();
    let r2 = (radius * radius) as i64;
    let x0 = cx.saturating_sub(radius);
    let y0 = cy.saturating_sub(radius);
    let x1 = (cx + radius).min(w - 1);
    let y1 = (cy + radius).min(h - 1);
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as i64 - cx as i64;
            let dy = y as i64 - cy as i64;
            if dx * dx + dy * dy <= r2 {
                img.put_pixel(
                    x,
                    y,
                    Rgb([
                        rng.random_range(170..=190),
                        rng.random_range(55..=75),
                        rng.random_range(15..=25),
                    ]),
                );
            }
        }
    }
}

fn artifact(path: PathBuf, width: u32, height: u32, metadata: Metadata) -> ImageArtifact {
    ImageArtifact {
        image_id: uuid::Uuid::new_v4().to_string(),
        path,
        timestamp: chrono::Utc::now(),
        location: Location::origin(),
        resolution: Resolution { width, height },
        metadata,
    }
}

/// File-name safe form of a label.
fn slug(label: &str) -> String {
    let s: String = label
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if s.is_empty() {
        "unnamed".to_string()
    } else {
        s
    }
}
