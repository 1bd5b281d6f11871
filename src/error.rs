//! Error taxonomy shared by every pipeline stage.

use crate::models::IssueKind;
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("image decode error at {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("annotation parse error at {path}: {msg}")]
    AnnotationParse { path: PathBuf, msg: String },
    #[error("label validation failed at {path}: {msg}")]
    Validation { path: PathBuf, msg: String },
    #[error(
        "insufficient data: {found} samples passed quality filtering, at least {required} are required"
    )]
    InsufficientData { found: usize, required: usize },
    #[error(
        "cannot stratify category '{category}': {count} samples, at least {required} are required for train/val/test"
    )]
    Stratification {
        category: String,
        count: usize,
        required: usize,
    },
    #[error("export write failed at {path}: {source}")]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corpus root does not exist: {path}")]
    CorpusMissing { path: PathBuf },
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DatasetError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn export(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DatasetError::ExportIo {
            path: path.into(),
            source,
        }
    }

    /// Issue kind recorded in reports when this error is recovered per sample.
    /// Pipeline-level failures have no issue kind.
    pub fn issue_kind(&self) -> Option<IssueKind> {
        match self {
            DatasetError::Decode { .. } => Some(IssueKind::DecodeError),
            DatasetError::AnnotationParse { .. } | DatasetError::Validation { .. } => {
                Some(IssueKind::MalformedLabel)
            }
            DatasetError::Io { .. } => Some(IssueKind::DecodeError),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_sample_errors_map_to_issue_kinds() {
        let parse = DatasetError::AnnotationParse {
            path: PathBuf::from("a.json"),
            msg: "missing field".into(),
        };
        assert_eq!(parse.issue_kind(), Some(IssueKind::MalformedLabel));

        let fatal = DatasetError::InsufficientData {
            found: 15,
            required: 20,
        };
        assert_eq!(fatal.issue_kind(), None);
        assert!(fatal.to_string().contains("15"));
    }
}
