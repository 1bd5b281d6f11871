//! Read-only integrity check of an exported corpus.

use crate::annotation::LabelLine;
use crate::config::PipelineConfig;
use crate::error::{DatasetError, DatasetResult};
use crate::models::{Issue, IssueKind, Split, ValidationReport};
use crate::quality::QualityAssessor;
use std::fs;
use std::path::{Path, PathBuf};

pub struct Validator<'a> {
    config: &'a PipelineConfig,
    assessor: QualityAssessor,
}

/// Image files directly inside `dir`, sorted. A missing directory is empty.
pub(crate) fn list_images(dir: &Path, config: &PipelineConfig) -> DatasetResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut images = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| DatasetError::io(dir, e))? {
        let path = entry.map_err(|e| DatasetError::io(dir, e))?.path();
        let is_image = path.is_file()
            && path
                .extension()
                .map(|ext| config.dataset.is_image_extension(&ext.to_string_lossy()))
                .unwrap_or(false);
        if is_image {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            assessor: QualityAssessor::new(config.quality.clone()),
        }
    }

    /// Check the label of one image. Returns the parsed label, or the
    /// issue describing why it is unusable.
    fn check_label(&self, image: &Path) -> Result<LabelLine, Issue> {
        let label_path = image.with_extension("txt");
        let contents = match fs::read_to_string(&label_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Issue::new(image, IssueKind::MissingAnnotation));
            }
            Err(e) => {
                return Err(Issue::new(&label_path, IssueKind::MalformedLabel).with_detail(e.to_string()));
            }
        };
        let malformed = |detail: String| Issue::new(&label_path, IssueKind::MalformedLabel).with_detail(detail);

        let label = LabelLine::parse(&contents).map_err(|e| malformed(e.to_string()))?;
        if !self.config.vocabulary.contains_index(label.class_id) {
            return Err(malformed(format!(
                "class id {} outside vocabulary of {}",
                label.class_id,
                self.config.vocabulary.len()
            )));
        }
        if !label.bbox.is_within_unit() {
            return Err(malformed(format!(
                "box {:?} outside [0,1]",
                label.bbox.components()
            )));
        }
        Ok(label)
    }

    /// Walk `root/{train,val,test}` and check every image and label.
    ///
    /// Only a missing root is fatal; every per-sample problem is recorded in
    /// the report.
    pub fn validate(&self, root: &Path) -> DatasetResult<ValidationReport> {
        if !root.is_dir() {
            return Err(DatasetError::CorpusMissing {
                path: root.to_path_buf(),
            });
        }

        let threshold = self.config.dataset.quality_threshold;
        let mut report = ValidationReport::default();
        let mut quality_sum = 0.0;

        for split in Split::ALL {
            let dir = root.join(split.as_str());
            if !dir.is_dir() {
                tracing::warn!("Split directory {} is missing", dir.display());
            }
            let images = list_images(&dir, self.config)?;
            report.per_split.insert(split.as_str().to_string(), images.len());

            for image in images {
                report.total += 1;
                let mut issues = Vec::new();

                let quality = match self.assessor.try_assess_path(&image) {
                    Ok((metrics, _)) => Some(metrics),
                    Err(e) => {
                        issues.push(Issue::new(&image, IssueKind::DecodeError).with_detail(e.to_string()));
                        None
                    }
                };
                let label = match self.check_label(&image) {
                    Ok(label) => Some(label),
                    Err(issue) => {
                        issues.push(issue);
                        None
                    }
                };
                if let Some(q) = quality.filter(|q| q.overall_score < threshold) {
                    issues.push(
                        Issue::new(&image, IssueKind::PoorQuality)
                            .with_detail(format!("score {:.3}", q.overall_score)),
                    );
                }

                match (issues.is_empty(), quality, label) {
                    (true, Some(q), Some(label)) => {
                        report.valid += 1;
                        quality_sum += q.overall_score;
                        let category = self
                            .config
                            .vocabulary
                            .name(label.class_id)
                            .unwrap_or("unknown")
                            .to_string();
                        *report.per_category_counts.entry(category).or_insert(0) += 1;
                    }
                    _ => {
                        report.invalid += 1;
                        for issue in &issues {
                            tracing::debug!("{}: {}", issue.issue_kind.as_str(), issue.sample_reference);
                        }
                        report.issues.extend(issues);
                    }
                }
            }
        }

        if report.valid > 0 {
            report.mean_quality = quality_sum / report.valid as f64;
        }
        tracing::info!(
            "Validation completed: {}/{} valid images",
            report.valid,
            report.total
        );
        Ok(report)
    }
}
