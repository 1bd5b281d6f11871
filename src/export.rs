//! Materializes a split assignment as the on-disk training layout:
//! `out/{train,val,test}/<stem>.<ext>` with a sibling `<stem>.txt` label,
//! plus `out/data.yaml`.

use crate::annotation::LabelLine;
use crate::atomic::{self, TEMP_PREFIX};
use crate::error::{DatasetError, DatasetResult};
use crate::models::{DatasetDescriptor, Split, SplitAssignment};
use crate::vocabulary::CategoryVocabulary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const DESCRIPTOR_FILE: &str = "data.yaml";

/// Extensions the exporter owns inside split directories.
const OWNED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "txt", "json"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub images_written: usize,
    pub labels_written: usize,
    /// Files already present with identical contents.
    pub unchanged: usize,
    /// Files from an earlier export that are no longer assigned.
    pub removed_stale: usize,
    pub descriptor: PathBuf,
}

pub struct Exporter<'a> {
    root: PathBuf,
    vocab: &'a CategoryVocabulary,
}

impl<'a> Exporter<'a> {
    pub fn new(root: impl Into<PathBuf>, vocab: &'a CategoryVocabulary) -> Self {
        Self {
            root: root.into(),
            vocab,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn split_dir(&self, split: Split) -> PathBuf {
        self.root.join(split.as_str())
    }

    /// Write every assigned sample and the descriptor.
    ///
    /// Each file goes through [`atomic::write_atomic`], so an interrupted
    /// export never leaves a truncated file at a final path. Re-exporting an
    /// unchanged assignment leaves the tree byte-identical.
    pub fn export(&self, assignment: &SplitAssignment) -> DatasetResult<ExportSummary> {
        let mut summary = ExportSummary::default();

        for split in Split::ALL {
            let dir = self.split_dir(split);
            fs::create_dir_all(&dir).map_err(|e| DatasetError::export(&dir, e))?;

            let mut expected = BTreeSet::new();
            for entry in assignment.get(split) {
                let image_dest = dir.join(entry.image_file_name());
                let bytes = fs::read(&entry.sample.image_path)
                    .map_err(|e| DatasetError::export(&entry.sample.image_path, e))?;
                if atomic::write_if_changed(&image_dest, &bytes)
                    .map_err(|e| DatasetError::export(&image_dest, e))?
                {
                    summary.images_written += 1;
                } else {
                    summary.unchanged += 1;
                }

                let label_dest = dir.join(entry.label_file_name());
                let line = format!("{}\n", LabelLine::from_annotation(&entry.annotation));
                if atomic::write_if_changed(&label_dest, line.as_bytes())
                    .map_err(|e| DatasetError::export(&label_dest, e))?
                {
                    summary.labels_written += 1;
                } else {
                    summary.unchanged += 1;
                }

                expected.insert(entry.image_file_name());
                expected.insert(entry.label_file_name());
            }

            summary.removed_stale += self.prune(&dir, &expected)?;
            tracing::info!("Exported {} samples to {}", assignment.get(split).len(), dir.display());
        }

        summary.descriptor = self.write_descriptor()?;
        Ok(summary)
    }

    /// Build the descriptor for this export root.
    pub fn descriptor(&self) -> DatasetResult<DatasetDescriptor> {
        let absolute = fs::canonicalize(&self.root).map_err(|e| DatasetError::export(&self.root, e))?;
        Ok(DatasetDescriptor {
            path: absolute.display().to_string(),
            train: Split::Train.as_str().to_string(),
            val: Split::Val.as_str().to_string(),
            test: Split::Test.as_str().to_string(),
            names: self.vocab.names_by_index(),
            nc: self.vocab.len(),
        })
    }

    fn write_descriptor(&self) -> DatasetResult<PathBuf> {
        let descriptor = self.descriptor()?;
        let yaml = serde_yaml::to_string(&descriptor)
            .map_err(|e| DatasetError::Config(format!("Failed to serialize descriptor: {e}")))?;
        let path = self.root.join(DESCRIPTOR_FILE);
        atomic::write_if_changed(&path, yaml.as_bytes()).map_err(|e| DatasetError::export(&path, e))?;
        tracing::info!("Wrote dataset descriptor {}", path.display());
        Ok(path)
    }

    fn prune(&self, dir: &Path, expected: &BTreeSet<String>) -> DatasetResult<usize> {
        let mut removed = 0;
        let entries = fs::read_dir(dir).map_err(|e| DatasetError::export(dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| DatasetError::export(dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            let name = match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            let owned = name.starts_with(TEMP_PREFIX)
                || path
                    .extension()
                    .map(|ext| {
                        let ext = ext.to_string_lossy().to_ascii_lowercase();
                        OWNED_EXTENSIONS.contains(&ext.as_str())
                    })
                    .unwrap_or(false);
            if owned && !expected.contains(&name) {
                fs::remove_file(&path).map_err(|e| DatasetError::export(&path, e))?;
                tracing::debug!("Removed stale export file {}", path.display());
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Read a previously written descriptor.
pub fn read_descriptor(root: &Path) -> DatasetResult<DatasetDescriptor> {
    let path = root.join(DESCRIPTOR_FILE);
    let raw = fs::read_to_string(&path).map_err(|e| DatasetError::io(&path, e))?;
    serde_yaml::from_str(&raw)
        .map_err(|e| DatasetError::Config(format!("Failed to parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_lists_vocabulary_in_index_order() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = CategoryVocabulary::default();
        let exporter = Exporter::new(dir.path(), &vocab);
        exporter.export(&SplitAssignment::default()).unwrap();

        let descriptor = read_descriptor(dir.path()).unwrap();
        assert_eq!(descriptor.nc, 4);
        assert_eq!(descriptor.names[&0], "steel");
        assert_eq!(descriptor.names[&3], "brass");
        assert_eq!(descriptor.train, "train");
        assert!(Path::new(&descriptor.path).is_absolute());
        for split in Split::ALL {
            assert!(exporter.split_dir(split).is_dir());
        }
    }

    #[test]
    fn stale_files_are_pruned_but_foreign_files_kept() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = CategoryVocabulary::default();
        let exporter = Exporter::new(dir.path(), &vocab);
        let train = exporter.split_dir(Split::Train);
        fs::create_dir_all(&train).unwrap();
        fs::write(train.join("old.jpg"), b"x").unwrap();
        fs::write(train.join("old.txt"), b"0 0.5 0.5 0.1 0.1\n").unwrap();
        fs::write(train.join(".tmp-abc"), b"partial").unwrap();
        fs::write(train.join("README.md"), b"notes").unwrap();

        let summary = exporter.export(&SplitAssignment::default()).unwrap();
        assert_eq!(summary.removed_stale, 3);
        assert!(train.join("README.md").exists());
        assert!(!train.join("old.jpg").exists());
    }
}
