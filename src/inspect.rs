//! Read-only summaries of a source tree or an exported corpus.

use crate::annotation::LabelLine;
use crate::collector;
use crate::config::PipelineConfig;
use crate::error::{DatasetError, DatasetResult};
use crate::models::Split;
use crate::validator::list_images;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub images: usize,
    pub labels: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusSummary {
    pub splits: BTreeMap<String, SplitSummary>,
    /// Instances per category, decoded from label class ids.
    pub class_distribution: BTreeMap<String, usize>,
    /// Label files that could not be parsed.
    pub unreadable_labels: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceCategorySummary {
    pub images: usize,
    pub annotated: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub categories: BTreeMap<String, SourceCategorySummary>,
    pub total_images: usize,
    pub total_annotated: usize,
}

/// Count images and labels per split of an exported corpus.
pub fn summarize_export(root: &Path, config: &PipelineConfig) -> DatasetResult<CorpusSummary> {
    if !root.is_dir() {
        return Err(DatasetError::CorpusMissing {
            path: root.to_path_buf(),
        });
    }
    let vocab = &config.vocabulary;
    let mut view = CorpusSummary::default();
    for split in Split::ALL {
        let dir = root.join(split.as_str());
        let images = list_images(&dir, config)?.len();
        let mut labels = 0;
        if dir.is_dir() {
            let mut label_paths = Vec::new();
            for entry in fs::read_dir(&dir).map_err(|e| DatasetError::io(&dir, e))? {
                let path = entry.map_err(|e| DatasetError::io(&dir, e))?.path();
                if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
                    label_paths.push(path);
                }
            }
            labels = label_paths.len();
            for path in label_paths {
                let parsed = fs::read_to_string(&path)
                    .ok()
                    .and_then(|contents| LabelLine::parse(&contents).ok());
                match parsed.and_then(|label| vocab.name(label.class_id)) {
                    Some(name) => *view.class_distribution.entry(name.to_string()).or_insert(0) += 1,
                    None => view.unreadable_labels += 1,
                }
            }
        }
        view.splits
            .insert(split.as_str().to_string(), SplitSummary { images, labels });
    }
    Ok(view)
}

/// Count images and annotated images per category of a source tree.
pub fn summarize_source(root: &Path, config: &PipelineConfig) -> DatasetResult<SourceSummary> {
    let discovery = collector::discover(root, &config.dataset)?;
    let mut summary = SourceSummary::default();
    for (category, images) in &discovery.images_per_category {
        summary.categories.insert(
            category.clone(),
            SourceCategorySummary {
                images: *images,
                annotated: 0,
            },
        );
        summary.total_images += images;
    }
    for sample in &discovery.samples {
        if let Some(c) = summary.categories.get_mut(&sample.category) {
            c.annotated += 1;
        }
        summary.total_annotated += 1;
    }
    Ok(summary)
}
