use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info, warn};

use scholarship_pipeline::combine::{
    check_duplicates_in_dir, check_duplicates_in_file, collect_pending_csv_files, combine_csv_files,
};
use scholarship_pipeline::db::{self, DbConfig};
use scholarship_pipeline::files::{validate_csv_file, verify_directory};
use scholarship_pipeline::scrapers;
use scholarship_pipeline::storage;
use scholarship_pipeline::{DedupStats, DetectorConfig};

/// Pause between two sources.
const SOURCE_PAUSE: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "scholarship_pipeline", about = "Scrape, deduplicate and upload scholarships")]
struct Cli {
    /// Directory holding tracking/sources.yml
    #[arg(long, env = "ROOT", default_value = ".", global = true)]
    root: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scrape every enabled source and combine the results
    Scrape {
        /// Only list what would be scraped
        #[arg(long)]
        dry_run: bool,
        #[arg(long, default_value = "scholarship_data")]
        output_dir: PathBuf,
        /// Title similarity above which records need only one corroborating field
        #[arg(long, default_value_t = 0.85)]
        threshold: f64,
    },
    /// Split one CSV file into unique and duplicate rows, or check every
    /// CSV file of a directory (default `scholarship_data`) against each other
    Dedup {
        input: Option<PathBuf>,
        #[arg(long, conflicts_with = "input")]
        dir: Option<PathBuf>,
        /// Defaults to the input file's directory, or the checked directory
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, default_value_t = 0.85)]
        threshold: f64,
    },
    /// Check every CSV file under a directory and repair broken ones
    Verify {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Insert new scholarships into MySQL
    Upload {
        #[arg(long, default_value = "scholarship_data")]
        data_dir: PathBuf,
    },
}

fn print_stats(stats: &DedupStats) {
    println!("📊 Statistics:");
    println!("   - Total scholarships: {}", stats.total_processed);
    println!("   - Duplicates found: {}", stats.duplicates_found);
    println!("   - Unique scholarships: {}", stats.unique_scholarships);
    if let Ok(json) = serde_json::to_string(stats) {
        println!("{}", json);
    }
}

async fn run_scrape(root: &str, dry_run: bool, output_dir: &Path, threshold: f64) -> Result<()> {
    let sources = storage::load_sources(root)?;
    let enabled: Vec<_> = sources.sources.iter().filter(|s| s.enabled).collect();

    if dry_run {
        println!("\n=== DRY RUN - No actual scraping will be performed ===");
        for source in &enabled {
            println!("Would scrape {} from {} using {} scraper", source.name, source.url, source.site);
        }
        return Ok(());
    }

    let work_dir = PathBuf::from(root);
    let mut csv_files = Vec::new();

    for (i, source) in enabled.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(SOURCE_PAUSE).await;
        }

        let started = Instant::now();
        match scrapers::scrape_source(source, &work_dir).await {
            Ok(Some(path)) => csv_files.push(path),
            Ok(None) => warn!("CSV file for {} was not created", source.name),
            Err(e) => {
                error!("Error scraping {}: {:#}", source.name, e);
                continue;
            }
        }
        println!("Completed {} in {:.1} seconds", source.name, started.elapsed().as_secs_f64());
    }

    println!("\n==== Checking for any unprocessed CSV files ====");
    let csv_files = collect_pending_csv_files(&work_dir, csv_files)?;
    if csv_files.is_empty() {
        warn!("No CSV files were created during scraping");
        return Ok(());
    }

    let valid: Vec<PathBuf> = csv_files
        .into_iter()
        .filter(|f| {
            let ok = validate_csv_file(f);
            if !ok {
                warn!("Skipping invalid file: {:?}", f);
            }
            ok
        })
        .collect();

    let config = DetectorConfig::default().with_title_threshold(threshold);
    let stats = combine_csv_files(&valid, output_dir, config)?;

    println!("\n🎉 All data successfully scraped and combined!");
    print_stats(&stats);
    println!("📂 Files saved in '{}' folder", output_dir.display());
    Ok(())
}

/// Directory checked by `dedup` when neither a file nor `--dir` is given.
const DEFAULT_DEDUP_DIR: &str = "scholarship_data";

fn run_dedup_dir(dir: &Path, output: Option<&Path>, threshold: f64) -> Result<()> {
    let config = DetectorConfig::default().with_title_threshold(threshold);
    let (stats, outputs) = check_duplicates_in_dir(dir, output, config)
        .with_context(|| format!("Duplicate check failed for directory {:?}", dir))?;

    println!("\n🔍 Duplicate check completed for {}", dir.display());
    print_stats(&stats);
    println!("📂 Results saved to:");
    println!("   - {} (Full analysis)", outputs.analysis.display());
    println!("   - {} (Deduplicated scholarships)", outputs.deduplicated.display());
    Ok(())
}

fn run_dedup(input: &Path, output: Option<&Path>, threshold: f64) -> Result<()> {
    let config = DetectorConfig::default().with_title_threshold(threshold);
    let (stats, outputs) = check_duplicates_in_file(input, output, config)
        .with_context(|| format!("Duplicate check failed for {:?}", input))?;

    println!("\n🔍 Duplicate check completed for {}", input.display());
    print_stats(&stats);
    println!("📂 Results saved to:");
    println!("   - {} (Unique scholarships)", outputs.unique.display());
    if let Some(duplicates) = outputs.duplicates {
        println!("   - {} (Duplicate scholarships)", duplicates.display());
    }
    Ok(())
}

fn run_verify(dir: &Path) -> Result<()> {
    let summary = verify_directory(dir)?;
    println!("\nSummary:");
    println!("  Total files checked: {}", summary.checked);
    println!("  Valid files: {}", summary.valid);
    println!("  Repaired files: {}", summary.repaired);
    println!("  Failed files: {}", summary.failed);
    Ok(())
}

async fn run_upload(data_dir: &Path) -> Result<()> {
    let config = DbConfig::from_env()?;
    let stats = db::upload(&config, data_dir, Path::new(".")).await?;

    println!("\n📊 Upload Summary:");
    println!("CSV files processed: {}", stats.files);
    println!("Total scholarships records: {}", stats.rows);
    println!("New scholarships inserted: {}", stats.inserted);
    println!("Existing scholarships skipped: {}", stats.skipped);
    println!("Errors encountered: {}", stats.errors);
    if let Ok(json) = serde_json::to_string(&stats) {
        println!("{}", json);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("Using root directory {:?}", cli.root);

    match cli.command {
        Command::Scrape { dry_run, output_dir, threshold } => {
            run_scrape(&cli.root, dry_run, &output_dir, threshold).await
        }
        Command::Dedup { input: Some(input), output, threshold, .. } => {
            run_dedup(&input, output.as_deref(), threshold)
        }
        Command::Dedup { input: None, dir, output, threshold } => {
            let dir = dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DEDUP_DIR));
            run_dedup_dir(&dir, output.as_deref(), threshold)
        }
        Command::Verify { dir } => run_verify(&dir),
        Command::Upload { data_dir } => run_upload(&data_dir).await,
    }
}
