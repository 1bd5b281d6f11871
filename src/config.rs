//! Pipeline configuration.
//!
//! Loaded from a TOML file; a missing file yields the defaults. Every
//! threshold and weight used by the quality assessor lives here rather than
//! in code.

use crate::error::{DatasetError, DatasetResult};
use crate::vocabulary::CategoryVocabulary;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub dataset: DatasetConfig,
    pub quality: QualityConfig,
    pub vocabulary: CategoryVocabulary,
    pub runtime: RuntimeConfig,
    pub reports: ReportConfig,
}

/// Collection and split settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Minimum overall score for a sample to enter the manifest (0.0-1.0)
    pub quality_threshold: f64,
    /// Manifest size below which the run aborts
    pub min_manifest_size: usize,
    pub train_ratio: f64,
    pub val_ratio: f64,
    pub test_ratio: f64,
    pub seed: u64,
    /// Lower-cased image extensions recognised in the source tree
    pub image_extensions: Vec<String>,
}

impl DatasetConfig {
    pub fn ratios(&self) -> SplitRatios {
        SplitRatios {
            train: self.train_ratio,
            val: self.val_ratio,
            test: self.test_ratio,
        }
    }

    pub fn is_image_extension(&self, ext: &str) -> bool {
        self.image_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatios {
    pub train: f64,
    pub val: f64,
    pub test: f64,
}

impl SplitRatios {
    pub fn new(train: f64, val: f64, test: f64) -> Self {
        Self { train, val, test }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, r) in [("train", self.train), ("val", self.val), ("test", self.test)] {
            if !r.is_finite() || r <= 0.0 || r >= 1.0 {
                return Err(format!("{name} ratio must be in (0, 1), got {r}"));
            }
        }
        let sum = self.train + self.val + self.test;
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(format!("Split ratios must sum to 1, got {sum}"));
        }
        Ok(())
    }
}

/// Weights of the overall quality score. Must sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub brightness: f64,
    pub contrast: f64,
    pub sharpness: f64,
    pub saturation: f64,
    pub reference: f64,
}

impl QualityWeights {
    pub fn sum(&self) -> f64 {
        self.brightness + self.contrast + self.sharpness + self.saturation + self.reference
    }
}

/// Quality assessment heuristics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    pub weights: QualityWeights,
    /// Mean luminance band that scores 1.0 [low, high]
    pub brightness_range: [f64; 2],
    /// Luminance stdev at or above which contrast scores 1.0
    pub contrast_target: f64,
    /// Laplacian variance below which an image counts as blurred
    pub sharpness_threshold: f64,
    /// Mean saturation at or above which saturation scores 1.0
    pub saturation_target: f64,
    /// Width (px) above which a reference object is assumed visible
    pub min_resolution: u32,
    /// Reference sub-score when no reference object is detected
    pub reference_missing_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Worker threads for per-sample assessment
    pub workers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory receiving processing/validation reports
    pub directory: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig {
                quality_threshold: 0.7,
                min_manifest_size: 20,
                train_ratio: 0.7,
                val_ratio: 0.2,
                test_ratio: 0.1,
                seed: 42,
                image_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
            },
            quality: QualityConfig::default(),
            vocabulary: CategoryVocabulary::default(),
            runtime: RuntimeConfig { workers: 1 },
            reports: ReportConfig {
                directory: PathBuf::from("metrics"),
            },
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            weights: QualityWeights {
                brightness: 0.2,
                contrast: 0.2,
                sharpness: 0.3,
                saturation: 0.2,
                reference: 0.1,
            },
            brightness_range: [0.25, 0.85],
            contrast_target: 0.15,
            sharpness_threshold: 100.0,
            saturation_target: 0.15,
            min_resolution: 320,
            reference_missing_score: 0.5,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> DatasetResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
        let config: PipelineConfig = toml::from_str(&contents).map_err(|e| {
            DatasetError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate().map_err(DatasetError::Config)?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> DatasetResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DatasetError::io(parent, e))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| DatasetError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, toml_string).map_err(|e| DatasetError::io(path, e))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("scrapset.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        let d = &self.dataset;
        if !(0.0..=1.0).contains(&d.quality_threshold) {
            return Err("Quality threshold must be between 0.0 and 1.0".to_string());
        }
        if d.min_manifest_size == 0 {
            return Err("Minimum manifest size must be at least 1".to_string());
        }
        d.ratios().validate()?;
        if d.image_extensions.is_empty() {
            return Err("At least one image extension is required".to_string());
        }

        let q = &self.quality;
        let w = &q.weights;
        let weights = [w.brightness, w.contrast, w.sharpness, w.saturation, w.reference];
        if weights.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err("Quality weights must be non-negative".to_string());
        }
        if (w.sum() - 1.0).abs() > SUM_TOLERANCE {
            return Err(format!("Quality weights must sum to 1, got {}", w.sum()));
        }
        let [lo, hi] = q.brightness_range;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo >= hi {
            return Err("Brightness range must satisfy 0 <= low < high <= 1".to_string());
        }
        if q.contrast_target <= 0.0 || q.contrast_target > 1.0 {
            return Err("Contrast target must be in (0, 1]".to_string());
        }
        if q.saturation_target <= 0.0 || q.saturation_target > 1.0 {
            return Err("Saturation target must be in (0, 1]".to_string());
        }
        if q.sharpness_threshold <= 0.0 {
            return Err("Sharpness threshold must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&q.reference_missing_score) {
            return Err("Reference missing score must be between 0.0 and 1.0".to_string());
        }

        self.vocabulary.validate()?;

        if self.runtime.workers == 0 {
            return Err("Worker count must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.dataset.quality_threshold, 0.7);
        assert_eq!(config.dataset.min_manifest_size, 20);
        assert_eq!(config.dataset.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad_weights = PipelineConfig::default();
        bad_weights.quality.weights.sharpness = 0.5;
        assert!(bad_weights.validate().is_err());

        let mut bad_ratios = PipelineConfig::default();
        bad_ratios.dataset.test_ratio = 0.3;
        assert!(bad_ratios.validate().is_err());

        let mut bad_threshold = PipelineConfig::default();
        bad_threshold.dataset.quality_threshold = 1.5;
        assert!(bad_threshold.validate().is_err());

        let mut no_workers = PipelineConfig::default();
        no_workers.runtime.workers = 0;
        assert!(no_workers.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("scrapset.toml");

        let mut config = PipelineConfig::default();
        config.dataset.seed = 7;
        config.save_to_file(&config_path).unwrap();

        let loaded = PipelineConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_toml_format() {
        let toml_string = toml::to_string_pretty(&PipelineConfig::default()).unwrap();
        assert!(toml_string.contains("[dataset]"));
        assert!(toml_string.contains("[quality.weights]"));
        assert!(toml_string.contains("[vocabulary]"));
        assert!(toml_string.contains("quality_threshold"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = PipelineConfig::load_from_file("nonexistent_scrapset.toml").unwrap();
        assert_eq!(result.dataset.seed, 42);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        let mut config = PipelineConfig::default();
        config.quality.weights.reference = 0.9;
        fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let err = PipelineConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, DatasetError::Config(_)));
    }
}
