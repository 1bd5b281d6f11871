use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// An image/annotation pair discovered in the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSample {
    pub image_path: PathBuf,
    pub annotation_path: PathBuf,
    /// Name of the immediate parent directory.
    pub category: String,
}

impl RawSample {
    /// File stem of the image, e.g. `bolt_007` for `steel/bolt_007.jpg`.
    pub fn stem(&self) -> String {
        self.image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lower-cased image extension, defaulting to `jpg`.
    pub fn extension(&self) -> String {
        self.image_path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_else(|| "jpg".to_string())
    }
}

/// Objective quality scores for one image.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Mean luminance in [0, 1].
    pub brightness: f64,
    /// Luminance standard deviation in [0, 1].
    pub contrast: f64,
    /// Variance of the Laplacian on the 0..255 luminance scale. Unbounded.
    pub sharpness: f64,
    /// Mean HSV saturation in [0, 1].
    pub saturation: f64,
    pub has_reference_object: bool,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    /// Weighted score in [0, 1].
    pub overall_score: f64,
}

impl QualityMetrics {
    /// Metrics reported for an image that could not be decoded.
    pub fn zeroed() -> Self {
        Self::default()
    }
}

/// Box as fractions of the image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedBox {
    pub fn components(&self) -> [f64; 4] {
        [self.x_center, self.y_center, self.width, self.height]
    }

    pub fn is_within_unit(&self) -> bool {
        self.components()
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
    }

    /// Inverse of normalization: `[x_min, y_min, x_max, y_max]` in pixels.
    pub fn to_pixels(&self, width: u32, height: u32) -> [f64; 4] {
        let w = width as f64;
        let h = height as f64;
        let half_w = self.width * w / 2.0;
        let half_h = self.height * h / 2.0;
        let cx = self.x_center * w;
        let cy = self.y_center * h;
        [cx - half_w, cy - half_h, cx + half_w, cy + half_h]
    }
}

/// Canonical label for one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub category: String,
    pub class_id: usize,
    pub bbox: NormalizedBox,
    pub weight_estimate: f64,
}

/// A quality-filtered, normalized sample ready for splitting.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub sample: RawSample,
    pub annotation: Annotation,
    pub quality: QualityMetrics,
    /// File stem used in the export layout.
    pub export_stem: String,
}

impl ManifestEntry {
    pub fn category(&self) -> &str {
        &self.sample.category
    }

    pub fn image_file_name(&self) -> String {
        format!("{}.{}", self.export_stem, self.sample.extension())
    }

    pub fn label_file_name(&self) -> String {
        format!("{}.txt", self.export_stem)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every manifest entry lands in exactly one of the three splits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitAssignment {
    pub train: Vec<ManifestEntry>,
    pub val: Vec<ManifestEntry>,
    pub test: Vec<ManifestEntry>,
}

impl SplitAssignment {
    pub fn get(&self, split: Split) -> &[ManifestEntry] {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }

    pub(crate) fn get_mut(&mut self, split: Split) -> &mut Vec<ManifestEntry> {
        match split {
            Split::Train => &mut self.train,
            Split::Val => &mut self.val,
            Split::Test => &mut self.test,
        }
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries paired with their split, in split order.
    pub fn iter(&self) -> impl Iterator<Item = (Split, &ManifestEntry)> {
        Split::ALL
            .into_iter()
            .flat_map(move |split| self.get(split).iter().map(move |e| (split, e)))
    }

    /// Count of entries per category in one split.
    pub fn category_counts(&self, split: Split) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.get(split) {
            *counts.entry(entry.category().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Image paths per split, for membership comparisons.
    pub fn membership(&self, split: Split) -> Vec<&Path> {
        self.get(split)
            .iter()
            .map(|e| e.sample.image_path.as_path())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    PoorQuality,
    MissingAnnotation,
    MalformedLabel,
    DecodeError,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::PoorQuality => "poor_quality",
            IssueKind::MissingAnnotation => "missing_annotation",
            IssueKind::MalformedLabel => "malformed_label",
            IssueKind::DecodeError => "decode_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub sample_reference: String,
    pub issue_kind: IssueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Issue {
    pub fn new(sample: &Path, kind: IssueKind) -> Self {
        Self {
            sample_reference: sample.display().to_string(),
            issue_kind: kind,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Layout descriptor read by downstream trainers (`data.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub path: String,
    pub train: String,
    pub val: String,
    pub test: String,
    pub names: BTreeMap<usize, String>,
    pub nc: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub per_category_counts: BTreeMap<String, usize>,
    pub per_split: BTreeMap<String, usize>,
    pub mean_quality: f64,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.issue_kind == kind)
    }
}
