//! Combine Module
//!
//! Provides functions to:
//! - Merge the per-region CSV files of a scrape run into master files
//! - Split a single CSV file into unique and duplicate rows
//! - Check every CSV file of a directory against each other
//! - Pick up region files left behind by interrupted runs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{error, info, warn};

use crate::dedup::{DedupStats, DetectorConfig, DuplicateChecker, MatchReason};
use crate::files::{safe_file_move, timestamped_filename, validate_csv_file};
use crate::storage::{read_scholarships, write_scholarships};
use crate::types::{Record, Scholarship, CSV_HEADERS};

pub const ALL_FILE: &str = "all_scholarships.csv";
pub const UNIQUE_FILE: &str = "unique_scholarships.csv";
const REGION_PREFIX: &str = "scholarships-";
const ANALYSIS_PREFIX: &str = "duplicates_analysis";
const DEDUPLICATED_PREFIX: &str = "scholarships_deduplicated";
pub const SOURCE_FILE_COLUMN: &str = "source_file";

/// Run every row of `files`, in order, through one detector.
///
/// Writes `all_scholarships.csv` and `unique_scholarships.csv` into
/// `output_dir` and moves each region file there (backing up any file it
/// replaces). A file that cannot be read is logged and skipped.
pub fn combine_csv_files(
    files: &[PathBuf],
    output_dir: &Path,
    config: DetectorConfig,
) -> Result<DedupStats> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let mut checker = DuplicateChecker::new(config);
    let mut all_rows: Vec<Scholarship> = Vec::new();

    for file in files {
        if !file.exists() {
            warn!("CSV file {:?} does not exist, skipping", file);
            continue;
        }

        let rows = match read_scholarships(file) {
            Ok(rows) => rows,
            Err(e) => {
                error!("Error processing CSV file {:?}: {:#}", file, e);
                continue;
            }
        };

        info!("Combining {} rows from {:?}", rows.len(), file);
        for row in rows {
            checker.submit(row.clone());
            all_rows.push(row);
        }

        if let Some(name) = file.file_name() {
            if let Err(e) = safe_file_move(file, &output_dir.join(name), true) {
                error!("Failed to move {:?} into {:?}: {:#}", file, output_dir, e);
            }
        }
    }

    let stats = checker.stats();
    if all_rows.is_empty() {
        warn!("No scholarship data was extracted from CSV files");
        return Ok(stats);
    }

    let all_path = output_dir.join(ALL_FILE);
    write_scholarships(&all_path, &all_rows)?;
    println!("✅ Wrote {} scholarships to {}", all_rows.len(), all_path.display());

    let unique_path = output_dir.join(UNIQUE_FILE);
    write_scholarships(&unique_path, checker.accepted())?;
    println!(
        "✅ Wrote {} unique scholarships to {}",
        checker.accepted().len(),
        unique_path.display()
    );

    Ok(stats)
}

/// Paths written by [`check_duplicates_in_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupOutputs {
    pub unique: PathBuf,
    /// Only written when at least one duplicate was found.
    pub duplicates: Option<PathBuf>,
}

/// Split `input` into `<stem>_unique.csv` and `<stem>_duplicates.csv`.
///
/// Outputs go to `output_dir`, or next to the input when it is `None`.
pub fn check_duplicates_in_file(
    input: &Path,
    output_dir: Option<&Path>,
    config: DetectorConfig,
) -> Result<(DedupStats, DedupOutputs)> {
    let rows = read_scholarships(input)?;

    let output_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let mut checker = DuplicateChecker::new(config);
    let mut duplicate_rows = Vec::new();
    for row in rows {
        if !checker.submit(row.clone()) {
            duplicate_rows.push(row);
        }
    }

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scholarships".to_string());

    let unique = output_dir.join(format!("{}_unique.csv", stem));
    write_scholarships(&unique, checker.accepted())?;

    let duplicates = if duplicate_rows.is_empty() {
        None
    } else {
        let path = output_dir.join(format!("{}_duplicates.csv", stem));
        write_scholarships(&path, &duplicate_rows)?;
        Some(path)
    };

    Ok((checker.stats(), DedupOutputs { unique, duplicates }))
}

/// A row tagged with the name of the CSV file it was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedScholarship {
    pub row: Scholarship,
    pub source_file: String,
}

impl Record for SourcedScholarship {
    fn field(&self, name: &str) -> Option<&str> {
        if name == SOURCE_FILE_COLUMN {
            Some(self.source_file.as_str()).filter(|s| !s.is_empty())
        } else {
            self.row.field(name)
        }
    }
}

/// Paths written by [`check_duplicates_in_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirDedupOutputs {
    /// Every row with its source file and duplicate verdict.
    pub analysis: PathBuf,
    /// Accepted rows sorted by region then title.
    pub deduplicated: PathBuf,
}

fn is_report_file(name: &str) -> bool {
    name.starts_with(ANALYSIS_PREFIX) || name.starts_with(DEDUPLICATED_PREFIX)
}

/// `*.csv` files in `dir`, sorted, leaving out reports from earlier runs.
fn csv_inputs_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if path.is_file() && name.ends_with(".csv") && !is_report_file(name) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn write_sourced<'a>(
    path: &Path,
    rows: impl IntoIterator<Item = (&'a SourcedScholarship, Option<(&'a SourcedScholarship, MatchReason)>)>,
    with_verdict: bool,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV {:?}", path))?;

    let mut header: Vec<&str> = CSV_HEADERS.to_vec();
    header.push(SOURCE_FILE_COLUMN);
    if with_verdict {
        header.extend(["is_duplicate", "duplicate_of", "match_reason"]);
    }
    writer.write_record(&header)?;

    for (record, verdict) in rows {
        let mut fields: Vec<String> = CSV_HEADERS
            .iter()
            .map(|name| record.field(name).unwrap_or("").to_string())
            .collect();
        fields.push(record.source_file.clone());
        if with_verdict {
            match verdict {
                Some((kept, reason)) => {
                    fields.push("true".to_string());
                    fields.push(format!("{} ({})", kept.row.title, kept.source_file));
                    fields.push(reason.to_string());
                }
                None => fields.extend([String::from("false"), String::new(), String::new()]),
            }
        }
        writer
            .write_record(&fields)
            .with_context(|| format!("Failed to write row to {:?}", path))?;
    }

    writer.flush()?;
    Ok(())
}

/// Check every CSV file in `dir` against each other through one detector.
///
/// Files are read in name order, so the first-seen posting comes from the
/// alphabetically first file. Writes `duplicates_analysis-<ts>.csv` and
/// `scholarships_deduplicated-<ts>.csv` into `output_dir`, or into `dir`
/// when it is `None`. A file that cannot be read is logged and skipped.
pub fn check_duplicates_in_dir(
    dir: &Path,
    output_dir: Option<&Path>,
    config: DetectorConfig,
) -> Result<(DedupStats, DirDedupOutputs)> {
    let files = csv_inputs_in(dir)?;
    if files.is_empty() {
        bail!("No CSV files found in {:?}", dir);
    }
    println!("Checking for duplicates across {} files...", files.len());

    let mut records = Vec::new();
    for file in &files {
        let source_file = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match read_scholarships(file) {
            Ok(rows) => {
                println!("Loaded {} scholarships from {}", rows.len(), source_file);
                records.extend(rows.into_iter().map(|row| SourcedScholarship {
                    row,
                    source_file: source_file.clone(),
                }));
            }
            Err(e) => error!("Error loading {:?}: {:#}", file, e),
        }
    }

    let mut checker = DuplicateChecker::new(config);
    let mut verdicts: Vec<Option<(usize, MatchReason)>> = Vec::with_capacity(records.len());
    for record in &records {
        if checker.submit(record.clone()) {
            verdicts.push(None);
        } else {
            verdicts.push(checker.find_match(record).map(|m| (m.index, m.reason)));
        }
    }

    let output_dir = output_dir.unwrap_or(dir);
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let accepted = checker.accepted();
    let analysis = timestamped_filename(&output_dir.join(format!("{}.csv", ANALYSIS_PREFIX)));
    write_sourced(
        &analysis,
        records.iter().zip(&verdicts).map(|(record, &verdict)| {
            (record, verdict.map(|(index, reason)| (&accepted[index], reason)))
        }),
        true,
    )?;
    println!("Full analysis saved to {}", analysis.display());

    let mut kept: Vec<&SourcedScholarship> = accepted.iter().collect();
    kept.sort_by(|a, b| (&a.row.region, &a.row.title).cmp(&(&b.row.region, &b.row.title)));
    let deduplicated =
        timestamped_filename(&output_dir.join(format!("{}.csv", DEDUPLICATED_PREFIX)));
    write_sourced(&deduplicated, kept.into_iter().map(|r| (r, None)), false)?;
    println!("Deduplicated data saved to {}", deduplicated.display());

    Ok((checker.stats(), DirDedupOutputs { analysis, deduplicated }))
}

/// Add stray `scholarships-*.csv` files in `dir` to `known`.
///
/// Valid strays are queued for combining; invalid or empty ones are deleted.
pub fn collect_pending_csv_files(dir: &Path, mut known: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let known_names: Vec<String> = known
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();

    let mut strays = Vec::new();
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))?;
    for entry in entries {
        let path = entry?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        if !name.starts_with(REGION_PREFIX) || !name.ends_with(".csv") || !path.is_file() {
            continue;
        }
        if known_names.contains(&name) {
            continue;
        }
        strays.push((name, path));
    }
    strays.sort();

    for (name, path) in strays {
        if validate_csv_file(&path) {
            println!("Found unprocessed CSV file: {}", name);
            known.push(path);
        } else {
            println!("Cleaning up invalid/empty CSV file: {}", name);
            if let Err(e) = fs::remove_file(&path) {
                warn!("Error removing {:?}: {}", path, e);
            }
        }
    }

    Ok(known)
}
