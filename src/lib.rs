pub mod annotation;
pub mod atomic;
pub mod collector;
pub mod config;
pub mod error;
pub mod executor;
pub mod export;
pub mod inspect;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod splitter;
pub mod validator;
pub mod vocabulary;

pub use annotation::{LabelLine, RawAnnotation, normalize};
pub use collector::{Collection, CollectionStats, CorpusCollector};
pub use config::{PipelineConfig, SplitRatios};
pub use error::{DatasetError, DatasetResult};
pub use executor::AssessmentExecutor;
pub use export::Exporter;
pub use models::{
    Annotation, DatasetDescriptor, Issue, IssueKind, ManifestEntry, NormalizedBox,
    QualityMetrics, RawSample, Split, SplitAssignment, ValidationReport,
};
pub use pipeline::Pipeline;
pub use quality::QualityAssessor;
pub use report::ProcessingReport;
pub use splitter::StratifiedSplitter;
pub use validator::Validator;
pub use vocabulary::CategoryVocabulary;
