//! Source-tree discovery, quality filtering and manifest assembly.

use crate::annotation::{self, Normalized};
use crate::config::{DatasetConfig, PipelineConfig};
use crate::error::{DatasetError, DatasetResult};
use crate::executor::AssessmentExecutor;
use crate::models::{Issue, IssueKind, ManifestEntry, QualityMetrics, RawSample};
use crate::quality::QualityAssessor;
use crate::vocabulary::CategoryVocabulary;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory names that belong to an export layout, never to a category.
const RESERVED_DIRS: [&str; 3] = ["train", "val", "test"];

/// Everything found under a source root before any image is decoded.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub samples: Vec<RawSample>,
    /// Images with no like-named annotation file.
    pub missing_annotation: Vec<PathBuf>,
    /// Image count per category directory.
    pub images_per_category: BTreeMap<String, usize>,
}

/// Per-sample verdict produced by [`evaluate_sample`].
#[derive(Debug, Clone)]
pub enum Outcome {
    Accepted(Normalized),
    Rejected(Issue),
}

#[derive(Debug, Clone)]
pub struct SampleEvaluation {
    pub sample: RawSample,
    pub quality: QualityMetrics,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub discovered: usize,
    pub accepted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub discovered: usize,
    pub accepted: usize,
    pub skipped_missing_annotation: usize,
    pub decode_errors: usize,
    pub poor_quality: usize,
    pub malformed: usize,
    /// Accepted samples whose material fell back to the default class.
    pub unknown_category: usize,
    pub per_category: BTreeMap<String, CategoryCounts>,
}

/// Result of a collection pass.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub manifest: Vec<ManifestEntry>,
    pub stats: CollectionStats,
    pub issues: Vec<Issue>,
    /// Overall score of every assessed sample, accepted or not.
    pub quality_scores: Vec<f64>,
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn sorted_entries(dir: &Path) -> DatasetResult<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| DatasetError::io(dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DatasetError::io(dir, e))?;
    entries.sort();
    Ok(entries)
}

/// Walk `root/<category>/` and pair every image with `<stem>.json`.
pub fn discover(root: &Path, config: &DatasetConfig) -> DatasetResult<Discovery> {
    if !root.is_dir() {
        return Err(DatasetError::CorpusMissing {
            path: root.to_path_buf(),
        });
    }

    let mut discovery = Discovery::default();
    for category_dir in sorted_entries(root)? {
        if !category_dir.is_dir() || is_hidden(&category_dir) {
            continue;
        }
        let category = match category_dir.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };
        if RESERVED_DIRS.contains(&category.as_str()) {
            tracing::debug!("Skipping reserved directory {}", category_dir.display());
            continue;
        }

        let mut images = 0;
        for path in sorted_entries(&category_dir)? {
            if !path.is_file() || is_hidden(&path) {
                continue;
            }
            let is_image = path
                .extension()
                .map(|ext| config.is_image_extension(&ext.to_string_lossy()))
                .unwrap_or(false);
            if !is_image {
                continue;
            }
            images += 1;

            let annotation_path = path.with_extension("json");
            if annotation_path.is_file() {
                discovery.samples.push(RawSample {
                    image_path: path,
                    annotation_path,
                    category: category.clone(),
                });
            } else {
                tracing::debug!("No annotation for {}", path.display());
                discovery.missing_annotation.push(path);
            }
        }
        tracing::info!("Category {}: {} images", category, images);
        discovery.images_per_category.insert(category, images);
    }
    Ok(discovery)
}

/// Assess, threshold and normalize one sample. Never fails: every per-sample
/// error becomes a rejection carrying its issue kind.
pub fn evaluate_sample(
    sample: RawSample,
    assessor: &QualityAssessor,
    vocab: &CategoryVocabulary,
    quality_threshold: f64,
) -> SampleEvaluation {
    let reject = |sample: RawSample, quality: QualityMetrics, issue: Issue| SampleEvaluation {
        sample,
        quality,
        outcome: Outcome::Rejected(issue),
    };

    let (quality, img) = match assessor.try_assess_path(&sample.image_path) {
        Ok(assessed) => assessed,
        Err(e) => {
            tracing::warn!("Dropping {}: {}", sample.image_path.display(), e);
            let kind = e.issue_kind().unwrap_or(IssueKind::DecodeError);
            let issue = Issue::new(&sample.image_path, kind).with_detail(e.to_string());
            return reject(sample, QualityMetrics::zeroed(), issue);
        }
    };

    if quality.overall_score < quality_threshold {
        tracing::debug!(
            "Dropping {}: quality {:.3} below {:.3}",
            sample.image_path.display(),
            quality.overall_score,
            quality_threshold
        );
        let issue = Issue::new(&sample.image_path, IssueKind::PoorQuality)
            .with_detail(format!("score {:.3}", quality.overall_score));
        return reject(sample, quality, issue);
    }

    let normalized = annotation::read_annotation(&sample.annotation_path).and_then(|record| {
        annotation::normalize(
            &record,
            (img.width(), img.height()),
            vocab,
            &sample.annotation_path,
        )
    });
    match normalized {
        Ok(normalized) => SampleEvaluation {
            sample,
            quality,
            outcome: Outcome::Accepted(normalized),
        },
        Err(e) => {
            // An unreadable annotation is a label problem, whatever the error.
            tracing::warn!("Dropping {}: {}", sample.image_path.display(), e);
            let issue =
                Issue::new(&sample.annotation_path, IssueKind::MalformedLabel).with_detail(e.to_string());
            reject(sample, quality, issue)
        }
    }
}

fn prefixed(entry: &ManifestEntry) -> String {
    format!("{}_{}", entry.sample.category, entry.sample.stem())
}

/// Give every entry a unique export stem.
///
/// Stems that occur once keep their name. Stems shared across categories
/// are prefixed with the category; if that is still ambiguous the image
/// extension is appended too. Any name that is already taken after that
/// gets a numeric suffix, so no two entries ever share an export file.
pub fn assign_export_stems(manifest: &mut [ManifestEntry]) {
    let mut by_stem: HashMap<String, usize> = HashMap::new();
    for entry in manifest.iter() {
        *by_stem.entry(entry.sample.stem()).or_insert(0) += 1;
    }
    let mut by_prefixed: HashMap<String, usize> = HashMap::new();
    for entry in manifest.iter().filter(|e| by_stem[&e.sample.stem()] > 1) {
        *by_prefixed.entry(prefixed(entry)).or_insert(0) += 1;
    }

    // Unique source stems are claimed first so they never get renamed.
    let mut taken: HashSet<String> = HashSet::new();
    for entry in manifest.iter_mut() {
        let stem = entry.sample.stem();
        if by_stem[&stem] == 1 {
            taken.insert(stem.clone());
            entry.export_stem = stem;
        }
    }
    for entry in manifest.iter_mut() {
        if by_stem[&entry.sample.stem()] == 1 {
            continue;
        }
        let base = prefixed(entry);
        let mut candidate = if by_prefixed[&base] > 1 {
            format!("{}_{}", base, entry.sample.extension())
        } else {
            base
        };
        let root = candidate.clone();
        let mut n = 2;
        while taken.contains(&candidate) {
            candidate = format!("{root}_{n}");
            n += 1;
        }
        tracing::debug!("Exporting {} as {}", entry.sample.image_path.display(), candidate);
        taken.insert(candidate.clone());
        entry.export_stem = candidate;
    }
}

/// Discovers samples, filters them by quality and emits the manifest.
pub struct CorpusCollector<'a> {
    config: &'a PipelineConfig,
    assessor: QualityAssessor,
    executor: AssessmentExecutor,
}

impl<'a> CorpusCollector<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            assessor: QualityAssessor::new(config.quality.clone()),
            executor: AssessmentExecutor::new(config.runtime.workers),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.executor = AssessmentExecutor::new(workers);
        self
    }

    /// Collect the manifest under `root`.
    ///
    /// Fails with [`DatasetError::InsufficientData`] when fewer samples than
    /// the configured minimum survive filtering.
    pub fn collect(&self, root: &Path) -> DatasetResult<Collection> {
        let collection = self.collect_unchecked(root)?;
        let required = self.config.dataset.min_manifest_size;
        if collection.manifest.len() < required {
            return Err(DatasetError::InsufficientData {
                found: collection.manifest.len(),
                required,
            });
        }
        Ok(collection)
    }

    /// Like [`collect`](Self::collect) without the minimum-size check.
    pub fn collect_unchecked(&self, root: &Path) -> DatasetResult<Collection> {
        let discovery = discover(root, &self.config.dataset)?;

        let mut collection = Collection::default();
        let stats = &mut collection.stats;
        stats.discovered = discovery.images_per_category.values().sum();
        stats.skipped_missing_annotation = discovery.missing_annotation.len();
        for (category, count) in &discovery.images_per_category {
            stats.per_category.insert(
                category.clone(),
                CategoryCounts {
                    discovered: *count,
                    accepted: 0,
                },
            );
        }
        for path in &discovery.missing_annotation {
            collection
                .issues
                .push(Issue::new(path, IssueKind::MissingAnnotation));
        }

        tracing::info!(
            "Assessing {} samples with {} worker(s)",
            discovery.samples.len(),
            self.executor.workers()
        );
        let vocab = &self.config.vocabulary;
        let threshold = self.config.dataset.quality_threshold;
        let evaluations = self.executor.execute(discovery.samples, |sample| {
            evaluate_sample(sample, &self.assessor, vocab, threshold)
        });

        for evaluation in evaluations {
            collection
                .quality_scores
                .push(evaluation.quality.overall_score);
            match evaluation.outcome {
                Outcome::Accepted(normalized) => {
                    let stats = &mut collection.stats;
                    stats.accepted += 1;
                    if !normalized.known_category {
                        stats.unknown_category += 1;
                        tracing::warn!(
                            "Unknown material '{}' in {}, using class {}",
                            normalized.annotation.category,
                            evaluation.sample.annotation_path.display(),
                            normalized.annotation.class_id
                        );
                    }
                    if let Some(counts) = stats.per_category.get_mut(&evaluation.sample.category) {
                        counts.accepted += 1;
                    }
                    collection.manifest.push(ManifestEntry {
                        export_stem: evaluation.sample.stem(),
                        sample: evaluation.sample,
                        annotation: normalized.annotation,
                        quality: evaluation.quality,
                    });
                }
                Outcome::Rejected(issue) => {
                    let stats = &mut collection.stats;
                    match issue.issue_kind {
                        IssueKind::DecodeError => stats.decode_errors += 1,
                        IssueKind::PoorQuality => stats.poor_quality += 1,
                        IssueKind::MalformedLabel => stats.malformed += 1,
                        IssueKind::MissingAnnotation => stats.skipped_missing_annotation += 1,
                    }
                    collection.issues.push(issue);
                }
            }
        }

        assign_export_stems(&mut collection.manifest);
        tracing::info!(
            "Collected {} of {} images ({} without annotation)",
            collection.stats.accepted,
            collection.stats.discovered,
            collection.stats.skipped_missing_annotation
        );
        Ok(collection)
    }
}
