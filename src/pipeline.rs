use crate::collector::{Collection, CorpusCollector};
use crate::config::PipelineConfig;
use crate::error::{DatasetError, DatasetResult};
use crate::export::{ExportSummary, Exporter};
use crate::models::SplitAssignment;
use crate::report::{self, ProcessingReport, QualityStats, timestamp};
use crate::splitter::StratifiedSplitter;
use std::path::Path;

/// Collect → split → export, end to end.
///
/// Assessment may run on several workers; splitting and export always run
/// sequentially on the complete, order-stable manifest.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline from a validated configuration
    pub fn new(config: PipelineConfig) -> DatasetResult<Self> {
        config.validate().map_err(DatasetError::Config)?;
        Ok(Self { config })
    }

    /// Override the split seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.dataset.seed = seed;
        self
    }

    /// Override the number of assessment workers
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.runtime.workers = workers.max(1);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Collect and split without writing anything.
    pub fn plan(&self, source: &Path) -> DatasetResult<(Collection, SplitAssignment)> {
        let collection = CorpusCollector::new(&self.config).collect(source)?;
        let splitter = StratifiedSplitter::new(self.config.dataset.ratios(), self.config.dataset.seed)?;
        let assignment = splitter.split(&collection.manifest)?;
        Ok((collection, assignment))
    }

    /// Run the full pipeline from `source` into `output`.
    ///
    /// Precondition failures (too few samples, a category too small to
    /// stratify) abort before anything is written. An export failure is
    /// returned as the error; use [`run_reported`](Self::run_reported) to
    /// keep the report in that case.
    pub fn run(&self, source: &Path, output: &Path) -> DatasetResult<ProcessingReport> {
        let (report, failure) = self.execute(source, output)?;
        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Like [`run`](Self::run), but once collection and splitting have
    /// succeeded the report is always written to `report_path`, including
    /// when the export fails part way.
    pub fn run_reported(
        &self,
        source: &Path,
        output: &Path,
        report_path: &Path,
    ) -> DatasetResult<ProcessingReport> {
        let (report, failure) = self.execute(source, output)?;
        report::write_report(report_path, &report)?;
        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    fn execute(
        &self,
        source: &Path,
        output: &Path,
    ) -> DatasetResult<(ProcessingReport, Option<DatasetError>)> {
        tracing::info!("Processing {} into {}", source.display(), output.display());
        let (collection, assignment) = self.plan(source)?;

        let exporter = Exporter::new(output, &self.config.vocabulary);
        let (export, failure) = match exporter.export(&assignment) {
            Ok(summary) => (summary, None),
            Err(e) => {
                tracing::error!("Export failed: {}", e);
                (ExportSummary::default(), Some(e))
            }
        };

        let (split_totals, split_counts) = ProcessingReport::split_tables(&assignment);
        let report = ProcessingReport {
            generated_at: timestamp(),
            source: source.display().to_string(),
            output: exporter.root().display().to_string(),
            seed: self.config.dataset.seed,
            vocabulary_version: self.config.vocabulary.version,
            quality: QualityStats::from_scores(&collection.quality_scores),
            collection: collection.stats,
            split_totals,
            split_counts,
            export,
            export_error: failure.as_ref().map(|e| e.to_string()),
            issues: collection.issues,
        };
        if failure.is_none() {
            tracing::info!(
                "Dataset processing completed. Exported {} of {} images",
                assignment.len(),
                report.collection.discovered
            );
        }
        Ok((report, failure))
    }
}
