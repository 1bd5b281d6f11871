//! Structured run reports written at the end of processing and validation.

use crate::atomic;
use crate::collector::CollectionStats;
use crate::error::{DatasetError, DatasetResult};
use crate::export::ExportSummary;
use crate::models::{Issue, Split, SplitAssignment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const PROCESSING_REPORT_FILE: &str = "processing_report.json";
pub const VALIDATION_REPORT_FILE: &str = "validation_report.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

impl QualityStats {
    pub fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let var = scores.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n;
        Self {
            mean,
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std: var.sqrt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub generated_at: String,
    pub source: String,
    pub output: String,
    pub seed: u64,
    pub vocabulary_version: u32,
    pub collection: CollectionStats,
    /// Entries per split.
    pub split_totals: BTreeMap<String, usize>,
    /// Entries per split and category.
    pub split_counts: BTreeMap<String, BTreeMap<String, usize>>,
    pub quality: QualityStats,
    pub export: ExportSummary,
    /// Set when the export step failed part way; `export` is then empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_error: Option<String>,
    pub issues: Vec<Issue>,
}

impl ProcessingReport {
    pub(crate) fn split_tables(
        assignment: &SplitAssignment,
    ) -> (BTreeMap<String, usize>, BTreeMap<String, BTreeMap<String, usize>>) {
        let mut totals = BTreeMap::new();
        let mut counts = BTreeMap::new();
        for split in Split::ALL {
            totals.insert(split.as_str().to_string(), assignment.get(split).len());
            counts.insert(split.as_str().to_string(), assignment.category_counts(split));
        }
        (totals, counts)
    }
}

/// Current local time (UTC if the offset is unknown) in RFC 3339.
pub fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// Serialize `report` as pretty JSON and write it atomically to `path`.
pub fn write_report<T: Serialize>(path: &Path, report: &T) -> DatasetResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| DatasetError::io(parent, e))?;
    }
    let json = serde_json::to_vec_pretty(report)
        .map_err(|e| DatasetError::Config(format!("Failed to serialize report: {e}")))?;
    atomic::write_atomic(path, &json).map_err(|e| DatasetError::io(path, e))?;
    tracing::info!("Report saved to {}", path.display());
    Ok(())
}
