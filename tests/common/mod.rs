#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

use scrapset::PipelineConfig;

/// Default configuration with a single worker, suitable for small trees.
pub fn test_config() -> PipelineConfig {
    PipelineConfig::default()
}

/// Configuration assessing on `workers` threads.
pub fn test_config_with_workers(workers: usize) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.runtime.workers = workers;
    config
}
