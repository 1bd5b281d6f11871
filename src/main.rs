use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use scrapset::inspect;
use scrapset::report::{self, PROCESSING_REPORT_FILE, VALIDATION_REPORT_FILE};
use scrapset::{Pipeline, PipelineConfig, Validator, logging};

#[derive(Parser)]
#[command(name = "scrapset")]
#[command(about = "Build and validate scrap-metal detection training corpora")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ConfigArg {
    /// Pipeline configuration (TOML); defaults are used if missing
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl ConfigArg {
    fn load(&self) -> anyhow::Result<PipelineConfig> {
        let path = self.config.clone().unwrap_or_else(PipelineConfig::default_path);
        Ok(PipelineConfig::load_from_file(path)?)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Collect, filter, split and export a source tree
    Process {
        /// Source root containing one directory per category
        #[arg(long, value_name = "DIR")]
        input: PathBuf,

        /// Output corpus root
        #[arg(long, value_name = "DIR")]
        output: PathBuf,

        #[command(flatten)]
        config: ConfigArg,

        /// Processing report destination
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// Override the split seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the number of assessment workers
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Re-check an exported corpus
    Validate {
        #[arg(long, value_name = "DIR")]
        dataset: PathBuf,

        #[command(flatten)]
        config: ConfigArg,

        /// Validation report destination
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },
    /// Print counts for a source tree or an exported corpus
    Summary {
        /// Exported corpus root
        #[arg(long, value_name = "DIR", conflicts_with = "source", required_unless_present = "source")]
        dataset: Option<PathBuf>,

        /// Source root
        #[arg(long, value_name = "DIR")]
        source: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArg,
    },
    /// Write the default configuration
    InitConfig {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

fn report_path(explicit: Option<PathBuf>, config: &PipelineConfig, file: &str) -> PathBuf {
    explicit.unwrap_or_else(|| config.reports.directory.join(file))
}

fn process(
    input: &Path,
    output: &Path,
    config: PipelineConfig,
    report: Option<PathBuf>,
    seed: Option<u64>,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let report_file = report_path(report, &config, PROCESSING_REPORT_FILE);
    let mut pipeline = Pipeline::new(config)?;
    if let Some(seed) = seed {
        pipeline = pipeline.with_seed(seed);
    }
    if let Some(workers) = workers {
        pipeline = pipeline.with_workers(workers);
    }

    let result = pipeline.run_reported(input, output, &report_file)?;

    println!("\n=== Processing Results ===");
    println!(
        "Accepted {} of {} images ({} without annotation, {} poor quality, {} decode errors, {} malformed)",
        result.collection.accepted,
        result.collection.discovered,
        result.collection.skipped_missing_annotation,
        result.collection.poor_quality,
        result.collection.decode_errors,
        result.collection.malformed
    );
    for (split, total) in &result.split_totals {
        println!("  {split}: {total}");
    }
    println!(
        "Quality: mean {:.3}, min {:.3}, max {:.3}",
        result.quality.mean, result.quality.min, result.quality.max
    );
    println!("Descriptor: {}", result.export.descriptor.display());
    println!("Report: {}", report_file.display());
    Ok(())
}

fn validate(dataset: &Path, config: PipelineConfig, report: Option<PathBuf>) -> anyhow::Result<()> {
    let report_file = report_path(report, &config, VALIDATION_REPORT_FILE);
    let result = Validator::new(&config).validate(dataset)?;
    report::write_report(&report_file, &result)?;

    println!("\n=== Validation Results ===");
    println!("Valid: {}/{} ({} invalid)", result.valid, result.total, result.invalid);
    for (category, count) in &result.per_category_counts {
        println!("  {category}: {count}");
    }
    if !result.issues.is_empty() {
        println!("\nIssues:");
        for issue in &result.issues {
            println!("  {} {}", issue.issue_kind.as_str(), issue.sample_reference);
        }
    }
    println!("Report: {}", report_file.display());
    Ok(())
}

fn summary(dataset: Option<PathBuf>, source: Option<PathBuf>, config: PipelineConfig) -> anyhow::Result<()> {
    if let Some(source) = source {
        let summary = inspect::summarize_source(&source, &config)?;
        println!("\n=== Source Tree ===");
        for (category, counts) in &summary.categories {
            println!("  {category}: {} images, {} annotated", counts.images, counts.annotated);
        }
        println!("Total: {} images, {} annotated", summary.total_images, summary.total_annotated);
    } else if let Some(dataset) = dataset {
        let summary = inspect::summarize_export(&dataset, &config)?;
        println!("\n=== Dataset Summary ===");
        for (split, counts) in &summary.splits {
            println!("  {split}: {} images, {} labels", counts.images, counts.labels);
        }
        println!("\nMaterial distribution:");
        for (category, count) in &summary.class_distribution {
            println!("  {category}: {count} instances");
        }
        if summary.unreadable_labels > 0 {
            println!("Unreadable labels: {}", summary.unreadable_labels);
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Command::Process {
            input,
            output,
            config,
            report,
            seed,
            workers,
        } => process(&input, &output, config.load()?, report, seed, workers),
        Command::Validate {
            dataset,
            config,
            report,
        } => validate(&dataset, config.load()?, report),
        Command::Summary {
            dataset,
            source,
            config,
        } => summary(dataset, source, config.load()?),
        Command::InitConfig { path } => {
            PipelineConfig::default().save_to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}
