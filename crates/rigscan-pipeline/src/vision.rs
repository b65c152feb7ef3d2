//! Vision analyzer: finds rust-coloured regions in inspection images.

use crate::error::Result;
use image::{Rgb, RgbImage};
use rigscan_core::{BoundingBox, ImageArtifact};
use std::collections::VecDeque;

/// A candidate corrosion region with greyscale statistics of its box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectedRegion {
    pub bbox: BoundingBox,
    /// Mean greyscale intensity within the box, 0-255.
    pub mean_intensity: f64,
    /// Population standard deviation of that intensity.
    pub intensity_std: f64,
}

pub trait VisionAnalyzer: Send + Sync {
    fn detect_regions(&self, image: &ImageArtifact) -> Result<Vec<DetectedRegion>>;
}

/// HSV threshold on orange-red hues, cleaned with a 3×3 close then open,
/// grouped into 4-connected components.
#[derive(Clone, Debug)]
pub struct ColorThresholdAnalyzer {
    pub hue_min_deg: f64,
    pub hue_max_deg: f64,
    pub min_saturation: f64,
    pub min_value: f64,
    /// Components with this many pixels or fewer are noise.
    pub min_area_px: u64,
}

impl Default for ColorThresholdAnalyzer {
    fn default() -> Self {
        Self {
            hue_min_deg: 10.0,
            hue_max_deg: 50.0,
            min_saturation: 0.35,
            min_value: 0.2,
            min_area_px: 100,
        }
    }
}

impl ColorThresholdAnalyzer {
    pub fn new(min_area_px: u64) -> Self {
        Self {
            min_area_px,
            ..Self::default()
        }
    }

    fn is_rust(&self, pixel: &Rgb<u8>) -> bool {
        let (h, s, v) = hsv(pixel);
        (self.hue_min_deg..=self.hue_max_deg).contains(&h)
            && s >= self.min_saturation
            && v >= self.min_value
    }

    /// Detect regions in an already decoded image.
    pub fn detect(&self, img: &RgbImage) -> Vec<DetectedRegion> {
        let (w, h) = img.dimensions();
        let (wu, hu) = (w as usize, h as usize);
        let raw: Vec<bool> = img.pixels().map(|p| self.is_rust(p)).collect();
        let mask = open(&close(&raw, wu, hu), wu, hu);
        let mut seen = vec![false; wu * hu];
        let mut regions = Vec::new();
        let mut queue = VecDeque::new();

        for start in 0..mask.len() {
            if !mask[start] || seen[start] {
                continue;
            }
            seen[start] = true;
            queue.push_back(start);
            let (mut min_x, mut min_y, mut max_x, mut max_y) = (w, h, 0u32, 0u32);
            let mut pixels = 0u64;

            while let Some(idx) = queue.pop_front() {
                let (x, y) = ((idx % wu) as u32, (idx / wu) as u32);
                pixels += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);

                let mut visit = |n: usize| {
                    if mask[n] && !seen[n] {
                        seen[n] = true;
                        queue.push_back(n);
                    }
                };
                if x > 0 {
                    visit(idx - 1);
                }
                if x + 1 < w {
                    visit(idx + 1);
                }
                if y > 0 {
                    visit(idx - wu);
                }
                if y + 1 < h {
                    visit(idx + wu);
                }
            }

            if pixels > self.min_area_px {
                let bbox = BoundingBox::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1);
                let (mean_intensity, intensity_std) = grey_stats(img, &bbox);
                regions.push(DetectedRegion {
                    bbox,
                    mean_intensity,
                    intensity_std,
                });
            }
        }
        regions
    }
}

impl VisionAnalyzer for ColorThresholdAnalyzer {
    fn detect_regions(&self, image: &ImageArtifact) -> Result<Vec<DetectedRegion>> {
        let img = image::open(&image.path)?.to_rgb8();
        Ok(self.detect(&img))
    }
}

fn close(mask: &[bool], w: usize, h: usize) -> Vec<bool> {
    morph(&morph(mask, w, h, true), w, h, false)
}

fn open(mask: &[bool], w: usize, h: usize) -> Vec<bool> {
    morph(&morph(mask, w, h, false), w, h, true)
}

/// One 3×3 dilation (`grow`) or erosion pass. Neighbours outside the image
/// are ignored.
fn morph(mask: &[bool], w: usize, h: usize, grow: bool) -> Vec<bool> {
    let mut out = vec![false; mask.len()];
    for y in 0..h {
        for x in 0..w {
            let mut window = (y.saturating_sub(1)..=(y + 1).min(h - 1))
                .flat_map(|ny| (x.saturating_sub(1)..=(x + 1).min(w - 1)).map(move |nx| ny * w + nx));
            out[y * w + x] = if grow {
                window.any(|n| mask[n])
            } else {
                window.all(|n| mask[n])
            };
        }
    }
    out
}

/// Hue in degrees, saturation and value in [0, 1].
fn hsv(pixel: &Rgb<u8>) -> (f64, f64, f64) {
    let [r, g, b] = pixel.0.map(|c| c as f64 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };
    (hue, saturation, max)
}

/// Rec. 601 luma mean and std over a box.
fn grey_stats(img: &RgbImage, bbox: &BoundingBox) -> (f64, f64) {
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut n = 0.0;
    for y in bbox.y..bbox.y + bbox.h {
        for x in bbox.x..bbox.x + bbox.w {
            let [r, g, b] = img.get_pixel(x, y).0;
            let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
            sum += luma;
            sum_sq += luma * luma;
            n += 1.0;
        }
    }
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = sum / n;
    let variance = (sum_sq / n - mean * mean).max(0.0);
    (mean, variance.sqrt())
}
