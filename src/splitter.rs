//! Per-category train/val/test partitioning.
//!
//! Each category is shuffled on its own with an RNG derived from the run seed
//! and the category name, then cut at the rounded ratio boundaries. Rare
//! categories therefore appear in every split instead of being starved by a
//! single global shuffle.

use crate::config::SplitRatios;
use crate::error::{DatasetError, DatasetResult};
use crate::models::{ManifestEntry, Split, SplitAssignment};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

/// Smallest category that can populate all three splits.
pub const MIN_CATEGORY_SIZE: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct StratifiedSplitter {
    ratios: SplitRatios,
    seed: u64,
}

// FNV-1a over the category name, mixed with the run seed.
fn category_seed(seed: u64, category: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in category.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash ^ seed.rotate_left(32)
}

/// Cut points `(train_end, val_end)` for a category of `count` entries,
/// clamped so that each split receives at least one entry. `None` when the
/// category is too small to fill all three splits.
pub(crate) fn cut_points(count: usize, ratios: &SplitRatios) -> Option<(usize, usize)> {
    if count < MIN_CATEGORY_SIZE {
        return None;
    }
    let n = count as f64;
    let train_end = ((n * ratios.train).round() as usize).clamp(1, count - 2);
    let val_end = ((n * (ratios.train + ratios.val)).round() as usize).clamp(train_end + 1, count - 1);
    Some((train_end, val_end))
}

impl StratifiedSplitter {
    pub fn new(ratios: SplitRatios, seed: u64) -> DatasetResult<Self> {
        ratios.validate().map_err(DatasetError::Config)?;
        Ok(Self { ratios, seed })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Partition `manifest` into train/val/test.
    ///
    /// Fails with [`DatasetError::Stratification`] before assigning anything
    /// if any category has fewer than [`MIN_CATEGORY_SIZE`] entries.
    pub fn split(&self, manifest: &[ManifestEntry]) -> DatasetResult<SplitAssignment> {
        let mut groups: BTreeMap<&str, Vec<&ManifestEntry>> = BTreeMap::new();
        for entry in manifest {
            groups.entry(entry.category()).or_default().push(entry);
        }

        if let Some((category, members)) = groups
            .iter()
            .find(|(_, members)| members.len() < MIN_CATEGORY_SIZE)
        {
            return Err(DatasetError::Stratification {
                category: category.to_string(),
                count: members.len(),
                required: MIN_CATEGORY_SIZE,
            });
        }

        let mut assignment = SplitAssignment::default();
        for (category, mut members) in groups {
            // Shuffle from a canonical order so the result does not depend on
            // how the manifest happened to be ordered.
            members.sort_by(|a, b| a.sample.image_path.cmp(&b.sample.image_path));
            let mut rng = StdRng::seed_from_u64(category_seed(self.seed, category));
            members.shuffle(&mut rng);

            let count = members.len();
            let Some((train_end, val_end)) = cut_points(count, &self.ratios) else {
                return Err(DatasetError::Stratification {
                    category: category.to_string(),
                    count,
                    required: MIN_CATEGORY_SIZE,
                });
            };
            for (i, entry) in members.into_iter().enumerate() {
                let split = if i < train_end {
                    Split::Train
                } else if i < val_end {
                    Split::Val
                } else {
                    Split::Test
                };
                assignment.get_mut(split).push(entry.clone());
            }
            tracing::debug!(
                "Category {}: train={} val={} test={}",
                category,
                train_end,
                val_end - train_end,
                count - val_end
            );
        }

        tracing::info!(
            "Split {} entries: train={} val={} test={}",
            assignment.len(),
            assignment.train.len(),
            assignment.val.len(),
            assignment.test.len()
        );
        Ok(assignment)
    }
}
