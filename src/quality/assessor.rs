use crate::config::QualityConfig;
use crate::error::{DatasetError, DatasetResult};
use crate::models::QualityMetrics;
use crate::quality::preprocessing;
use image::{DynamicImage, ImageReader};
use std::path::Path;

/// Scores images against the configured heuristics.
///
/// Assessment is a pure function of the pixels and the configuration, so a
/// single assessor can be shared by any number of worker threads.
#[derive(Debug, Clone)]
pub struct QualityAssessor {
    config: QualityConfig,
}

impl QualityAssessor {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Score a decoded image.
    pub fn assess(&self, img: &DynamicImage) -> QualityMetrics {
        let (width, height) = (img.width(), img.height());
        if width == 0 || height == 0 {
            return QualityMetrics::zeroed();
        }

        let gray = preprocessing::to_luminance(img);
        let (mean, std) = preprocessing::luminance_stats(&gray);
        let brightness = mean / 255.0;
        let contrast = std / 255.0;
        let sharpness = preprocessing::laplacian_variance(&gray);
        let saturation = preprocessing::mean_saturation(&img.to_rgb8());
        let has_reference_object = self.detect_reference_object(width);

        let mut metrics = QualityMetrics {
            brightness,
            contrast,
            sharpness,
            saturation,
            has_reference_object,
            width,
            height,
            aspect_ratio: width as f64 / height as f64,
            overall_score: 0.0,
        };
        metrics.overall_score = self.overall_score(&metrics);
        metrics
    }

    /// Decode and score the image at `path`, surfacing decode failures.
    pub fn try_assess_path(&self, path: &Path) -> DatasetResult<(QualityMetrics, DynamicImage)> {
        let img = load_image(path)?;
        Ok((self.assess(&img), img))
    }

    /// Decode and score the image at `path`. Fails closed: any decode error
    /// yields all-zero metrics.
    pub fn assess_path(&self, path: &Path) -> QualityMetrics {
        match self.try_assess_path(path) {
            Ok((metrics, _)) => metrics,
            Err(e) => {
                tracing::warn!("Quality assessment failed for {}: {}", path.display(), e);
                QualityMetrics::zeroed()
            }
        }
    }

    /// Whether the Laplacian variance falls below the blur threshold.
    pub fn is_blurred(&self, metrics: &QualityMetrics) -> bool {
        metrics.sharpness < self.config.sharpness_threshold
    }

    // Coarse proxy for a calibration object: enough horizontal resolution to
    // hold one next to the scrap piece.
    fn detect_reference_object(&self, width: u32) -> bool {
        width > self.config.min_resolution
    }

    fn brightness_score(&self, brightness: f64) -> f64 {
        let [low, high] = self.config.brightness_range;
        if brightness < low {
            brightness / low
        } else if brightness > high {
            (1.0 - brightness) / (1.0 - high)
        } else {
            1.0
        }
    }

    fn overall_score(&self, m: &QualityMetrics) -> f64 {
        let c = &self.config;
        let w = &c.weights;
        let reference = if m.has_reference_object {
            1.0
        } else {
            c.reference_missing_score
        };
        let scores = [
            (w.brightness, self.brightness_score(m.brightness)),
            (w.contrast, (m.contrast / c.contrast_target).min(1.0)),
            (w.sharpness, (m.sharpness / c.sharpness_threshold).min(1.0)),
            (w.saturation, (m.saturation / c.saturation_target).min(1.0)),
            (w.reference, reference),
        ];
        let score: f64 = scores.iter().map(|(w, s)| w * s.clamp(0.0, 1.0)).sum();
        score.clamp(0.0, 1.0)
    }
}

impl Default for QualityAssessor {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}

/// Decode an image, sniffing the format from content rather than extension.
pub fn load_image(path: &Path) -> DatasetResult<DynamicImage> {
    let reader = ImageReader::open(path)
        .map_err(|e| DatasetError::io(path, e))?
        .with_guessed_format()
        .map_err(|e| DatasetError::io(path, e))?;
    reader.decode().map_err(|source| DatasetError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn noisy(width: u32, height: u32) -> DynamicImage {
        // Deterministic pseudo-random colour noise.
        let mut state: u32 = 0x9e37_79b9;
        let img = RgbImage::from_fn(width, height, |_, _| {
            let mut next = || {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state & 0xff) as u8
            };
            Rgb([next(), next(), next()])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn noisy_colour_image_scores_high() {
        let metrics = QualityAssessor::default().assess(&noisy(400, 300));
        assert!(metrics.has_reference_object);
        assert!(metrics.sharpness > 100.0);
        assert!(metrics.overall_score > 0.9, "score {}", metrics.overall_score);
        assert!(metrics.overall_score <= 1.0);
    }

    #[test]
    fn flat_grey_image_scores_low() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 300, Rgb([128, 128, 128])));
        let assessor = QualityAssessor::default();
        let metrics = assessor.assess(&img);
        assert_eq!(metrics.contrast, 0.0);
        assert!(assessor.is_blurred(&metrics));
        // brightness + reference only
        assert!((metrics.overall_score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn small_image_loses_reference_bonus() {
        let assessor = QualityAssessor::default();
        let large = assessor.assess(&noisy(400, 300));
        let small = assessor.assess(&noisy(200, 150));
        assert!(!small.has_reference_object);
        assert!(small.overall_score < large.overall_score);
    }

    #[test]
    fn assessment_is_deterministic() {
        let img = noisy(64, 48);
        let assessor = QualityAssessor::default();
        assert_eq!(assessor.assess(&img), assessor.assess(&img));
    }

    #[test]
    fn undecodable_file_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let assessor = QualityAssessor::default();
        assert!(matches!(
            assessor.try_assess_path(&path),
            Err(DatasetError::Decode { .. })
        ));
        let metrics = assessor.assess_path(&path);
        assert_eq!(metrics, QualityMetrics::zeroed());
        assert_eq!(metrics.overall_score, 0.0);
    }

    #[test]
    fn brightness_band_falls_off_linearly() {
        let assessor = QualityAssessor::default();
        assert_eq!(assessor.brightness_score(0.5), 1.0);
        assert!((assessor.brightness_score(0.125) - 0.5).abs() < 1e-9);
        assert!(assessor.brightness_score(1.0).abs() < 1e-9);
    }
}
